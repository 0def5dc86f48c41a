//! Error types for the chat session layer.
//!
//! Errors are split by the layer that produces them.  The codec
//! reports [`DecodeError`], which distinguishes conditions the
//! receive loop can skip past (an unknown kind tag, a payload that is
//! not UTF-8) from conditions that leave the byte stream unusable.
//! The session reports [`SessionError`] to callers of `start` and
//! `send`.  Configuration loading has its own [`ConfigError`].

use std::io;
use std::string::FromUtf8Error;

use thiserror::Error;

use crate::session::SessionState;

/// Failure to turn bytes into an [`Envelope`](crate::protocol::Envelope).
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The kind tag is outside the known range.  The payload has
    /// already been consumed, so the stream is still in sync.
    #[error("unknown envelope kind {0:#04x}")]
    UnknownKind(u8),

    /// The payload was framed correctly but is not UTF-8 text.
    #[error("envelope payload is not valid UTF-8")]
    InvalidUtf8(#[from] FromUtf8Error),

    /// The declared length exceeds the configured limit.  The framing
    /// can no longer be trusted.
    #[error("envelope payload of {len} bytes exceeds limit of {max}")]
    Oversize { len: u32, max: u32 },

    /// The buffer ended before the declared frame did.
    #[error("envelope truncated: expected {expected} bytes, got {actual}")]
    Truncated { expected: usize, actual: usize },

    /// Extra bytes followed a complete frame in a single-frame buffer.
    #[error("{0} unexpected bytes after envelope")]
    TrailingBytes(usize),

    /// The underlying channel failed or was closed.
    #[error("transport i/o error: {0}")]
    Io(#[from] io::Error),
}

impl DecodeError {
    /// Whether the receive loop may discard the unit and keep reading.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, DecodeError::UnknownKind(_) | DecodeError::InvalidUtf8(_))
    }
}

/// Errors surfaced by [`Session`](crate::session::Session).
#[derive(Error, Debug)]
pub enum SessionError {
    /// The transport could not be opened.
    #[error("error connecting to server {address}: {source}")]
    Connection {
        address: String,
        #[source]
        source: io::Error,
    },

    /// The username announce could not be written.
    #[error("exception doing login: {0}")]
    Handshake(#[source] io::Error),

    /// An outbound envelope could not be written.
    #[error("error writing to server: {0}")]
    Send(#[source] io::Error),

    /// The receive loop hit a fatal read failure.
    #[error("server has closed the connection: {0}")]
    Receive(#[source] DecodeError),

    /// `send` was called while the session was not active.
    #[error("session is not connected")]
    NotConnected,

    /// `start` was called on a session that already left `New`.
    #[error("session cannot be started from state {0}")]
    InvalidState(SessionState),

    /// The outbound payload is larger than the configured cap.
    #[error("payload of {len} bytes exceeds limit of {max}")]
    PayloadTooLarge { len: usize, max: u32 },
}

/// Errors raised while loading a configuration file.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
