//! Networking layer for the chat client.
//!
//! [`connector`] opens connections and [`transport`] frames bytes on
//! them.  Nothing in here knows about session state; that lives in
//! [`crate::session`].

pub mod connector;
pub mod transport;

pub use connector::{Connector, TcpConnector};
pub use transport::{FrameReader, FrameWriter, Transport};
