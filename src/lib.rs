//! Client side of a text chat: a persistent session with a central
//! dispatcher.
//!
//! The crate is layered bottom-up.  [`protocol`] defines the
//! envelope wire format, [`network`] opens connections and frames
//! bytes on them, and [`session`] drives the connection lifecycle,
//! the username handshake, the background receive loop and teardown.
//! Presentation is kept out of the core: the session reports through
//! a [`Sink`](sink::Sink) supplied by the caller.  If you are new to
//! the codebase, start with [`session::Session`].

pub mod config;
pub mod console;
pub mod error;
pub mod network;
pub mod protocol;
pub mod session;
pub mod sink;

pub use config::{Config, SessionConfig};
pub use error::{ConfigError, DecodeError, SessionError};
pub use network::{Connector, TcpConnector, Transport};
pub use protocol::{Envelope, Kind};
pub use session::{Session, SessionState};
pub use sink::{ConsoleSink, Sink};
