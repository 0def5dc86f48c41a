//! Session lifecycle states.
//!
//! ```text
//!  NEW ──start()──▶ CONNECTING ──open──▶ HANDSHAKING ──announce──▶ ACTIVE
//!                       │                     │                      │
//!                  open failed         announce failed      disconnect / read error
//!                       ▼                     ▼                      ▼
//!                    FAILED                CLOSED ◀──────────────────┘
//! ```
//!
//! `FAILED` and `CLOSED` are terminal.  A new session has to be built
//! to reconnect.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Parameters only; nothing opened yet.
    #[default]
    New,
    /// Opening the transport.
    Connecting,
    /// Transport open; username announce in flight.
    Handshaking,
    /// Envelopes flow in both directions.
    Active,
    /// Torn down after being started, or disconnected before start.
    Closed,
    /// The transport never opened.
    Failed,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::New => "NEW",
            SessionState::Connecting => "CONNECTING",
            SessionState::Handshaking => "HANDSHAKING",
            SessionState::Active => "ACTIVE",
            SessionState::Closed => "CLOSED",
            SessionState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}
