//! Outgoing connections to the dispatcher.
//!
//! The session does not open sockets itself; it asks a [`Connector`]
//! for a [`Transport`].  [`TcpConnector`] is what the client uses in
//! production.  Tests hand the session a connector that returns an
//! in-memory pipe instead.

use std::future::Future;
use std::io;

use tokio::net::TcpStream;
use tracing::debug;

use super::transport::Transport;

/// Something that can open a [`Transport`] to `host:port`.
pub trait Connector: Send + Sync {
    fn connect(&self, host: &str, port: u16)
        -> impl Future<Output = io::Result<Transport>> + Send;
}

/// Plain TCP, with Nagle disabled since frames are small and
/// interactive.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

impl Connector for TcpConnector {
    async fn connect(&self, host: &str, port: u16) -> io::Result<Transport> {
        debug!(host, port, "opening tcp connection");
        let stream = TcpStream::connect((host, port)).await?;
        Transport::from_tcp(stream)
    }
}
