//! Shared fixtures for session tests: a sink that records every call,
//! connectors that hand out in-memory transports, and writers that
//! fail on cue.

#![allow(dead_code)]

use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWrite, DuplexStream};
use tokio::sync::oneshot;

use chatwire::{Connector, Session, Sink, Transport};

pub const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Append(String),
    Status(String),
    ConnectionFailed,
}

/// Sink that remembers what it was told, in order.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<Event>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Everything except status lines.
    pub fn core_events(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| !matches!(e, Event::Status(_)))
            .collect()
    }

    pub fn appended(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Append(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Status(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn failures(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| **e == Event::ConnectionFailed)
            .count()
    }

    /// Poll until `n` appends have arrived.
    pub async fn wait_for_appends(&self, n: usize) -> Vec<String> {
        tokio::time::timeout(WAIT, async {
            loop {
                let appended = self.appended();
                if appended.len() >= n {
                    return appended;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for inbound text")
    }
}

impl Sink for RecordingSink {
    fn append(&self, text: &str) {
        self.events.lock().unwrap().push(Event::Append(text.to_string()));
    }

    fn connection_failed(&self) {
        self.events.lock().unwrap().push(Event::ConnectionFailed);
    }

    fn status(&self, text: &str) {
        self.events.lock().unwrap().push(Event::Status(text.to_string()));
    }
}

/// Hands out one prepared transport, then refuses.
pub struct MockConnector {
    transport: Mutex<Option<Transport>>,
    calls: Mutex<Vec<(String, u16)>>,
}

impl MockConnector {
    pub fn new(transport: Transport) -> Self {
        Self {
            transport: Mutex::new(Some(transport)),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, u16)> {
        self.calls.lock().unwrap().clone()
    }
}

impl Connector for MockConnector {
    async fn connect(&self, host: &str, port: u16) -> io::Result<Transport> {
        self.calls.lock().unwrap().push((host.to_string(), port));
        let transport = self.transport.lock().unwrap().take();
        transport.ok_or_else(|| io::ErrorKind::ConnectionRefused.into())
    }
}

/// Connector backed by an in-memory pipe.  The returned stream is the
/// dispatcher's end.
pub fn duplex_connector() -> (MockConnector, DuplexStream) {
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (reader, writer) = tokio::io::split(client);
    (
        MockConnector::new(Transport::new("mock:8700", reader, writer)),
        server,
    )
}

/// Connector whose reader is a live pipe but whose writer is `writer`.
pub fn connector_with_writer<W>(writer: W) -> (MockConnector, DuplexStream)
where
    W: AsyncWrite + Send + Unpin + 'static,
{
    let (client, server) = tokio::io::duplex(64 * 1024);
    let (reader, _unused) = tokio::io::split(client);
    (
        MockConnector::new(Transport::new("mock:8700", reader, writer)),
        server,
    )
}

/// Always refuses.
pub struct RefusingConnector;

impl Connector for RefusingConnector {
    async fn connect(&self, _host: &str, _port: u16) -> io::Result<Transport> {
        Err(io::ErrorKind::ConnectionRefused.into())
    }
}

/// Never completes.
pub struct HangingConnector;

impl Connector for HangingConnector {
    async fn connect(&self, _host: &str, _port: u16) -> io::Result<Transport> {
        std::future::pending().await
    }
}

/// Holds the connection open until the test releases the gate.
pub struct GatedConnector {
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    inner: MockConnector,
}

impl GatedConnector {
    pub fn new(inner: MockConnector) -> (Self, oneshot::Sender<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                gate: Mutex::new(Some(rx)),
                inner,
            },
            tx,
        )
    }
}

impl Connector for GatedConnector {
    async fn connect(&self, host: &str, port: u16) -> io::Result<Transport> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.inner.connect(host, port).await
    }
}

/// Accepts `budget` bytes, then fails every write with `BrokenPipe`.
pub struct FlakyWriter {
    budget: usize,
}

impl FlakyWriter {
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }

    pub fn broken() -> Self {
        Self { budget: 0 }
    }
}

impl AsyncWrite for FlakyWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.budget == 0 {
            return Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()));
        }
        let n = buf.len().min(self.budget);
        self.budget -= n;
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Accepts `budget` bytes, then never completes another write.
pub struct StallingWriter {
    budget: usize,
}

impl StallingWriter {
    pub fn new(budget: usize) -> Self {
        Self { budget }
    }
}

impl AsyncWrite for StallingWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.budget == 0 {
            return Poll::Pending;
        }
        let n = buf.len().min(self.budget);
        self.budget -= n;
        Poll::Ready(Ok(n))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Read the username announce from the dispatcher's end.
pub async fn read_handshake(server: &mut DuplexStream) -> String {
    let mut len = [0u8; 4];
    server.read_exact(&mut len).await.unwrap();
    let mut name = vec![0u8; u32::from_be_bytes(len) as usize];
    server.read_exact(&mut name).await.unwrap();
    String::from_utf8(name).unwrap()
}

/// Read one raw frame from the dispatcher's end as `(tag, payload)`.
pub async fn read_frame(server: &mut DuplexStream) -> (u8, Vec<u8>) {
    let mut header = [0u8; 5];
    server.read_exact(&mut header).await.unwrap();
    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    let mut payload = vec![0u8; len as usize];
    server.read_exact(&mut payload).await.unwrap();
    (header[0], payload)
}

/// Wait for the session to reach a terminal state, then make sure the
/// receive task has finished so every sink call has landed.
pub async fn settle(session: &Session) {
    tokio::time::timeout(WAIT, session.closed())
        .await
        .expect("session did not close");
    tokio::time::timeout(WAIT, session.disconnect())
        .await
        .expect("disconnect hung");
}
