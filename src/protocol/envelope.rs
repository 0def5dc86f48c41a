//! Envelope format for the chat protocol.
//!
//! An envelope is the atomic unit exchanged with the dispatcher once
//! the username handshake is done.  On the wire it is a fixed
//! five-byte header followed by the payload:
//!
//! ```text
//! +------------+--------------------+---------------------+
//! | kind (u8)  | payload len (u32)  | payload (UTF-8)     |
//! |            | big-endian         | `len` bytes         |
//! +------------+--------------------+---------------------+
//! ```
//!
//! The length prefix makes every frame self-delimiting, so a reader
//! that meets a kind tag it does not understand can still consume the
//! payload and carry on with the next frame.

use std::fmt;
use std::io;

use crate::error::DecodeError;

/// Size of the kind tag plus the length prefix.
pub const HEADER_SIZE: usize = 5;

/// Default cap on payload size, in bytes (1 MiB).
pub const DEFAULT_MAX_PAYLOAD: u32 = 1024 * 1024;

/// The four kinds of envelope the dispatcher understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    /// Ask for the roster of connected users.
    UserList,
    /// An ordinary chat message.
    Text,
    /// Announce an intentional disconnect.
    Logout,
    /// Ask for the chat log.
    History,
}

impl Kind {
    /// All kinds, in tag order.
    pub const ALL: [Kind; 4] = [Kind::UserList, Kind::Text, Kind::Logout, Kind::History];

    /// Wire tag for this kind.
    pub fn to_byte(self) -> u8 {
        match self {
            Kind::UserList => 0,
            Kind::Text => 1,
            Kind::Logout => 2,
            Kind::History => 3,
        }
    }

    /// Map a wire tag back to a kind.
    pub fn from_byte(tag: u8) -> Result<Self, DecodeError> {
        match tag {
            0 => Ok(Kind::UserList),
            1 => Ok(Kind::Text),
            2 => Ok(Kind::Logout),
            3 => Ok(Kind::History),
            other => Err(DecodeError::UnknownKind(other)),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::UserList => "USERLIST",
            Kind::Text => "MESSAGE",
            Kind::Logout => "LOGOUT",
            Kind::History => "HISTORY",
        };
        f.write_str(name)
    }
}

/// A typed protocol message.  Envelopes are immutable once built;
/// use the constructors below and read them back through the
/// accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    kind: Kind,
    payload: String,
}

impl Envelope {
    /// Build an envelope of any kind.
    pub fn new(kind: Kind, payload: impl Into<String>) -> Self {
        Self {
            kind,
            payload: payload.into(),
        }
    }

    /// A chat message.  The body may be empty.
    pub fn text(body: impl Into<String>) -> Self {
        Self::new(Kind::Text, body)
    }

    /// A roster request.
    pub fn user_list() -> Self {
        Self::new(Kind::UserList, "")
    }

    /// A chat log request.
    pub fn history() -> Self {
        Self::new(Kind::History, "")
    }

    /// A logout notice.
    pub fn logout() -> Self {
        Self::new(Kind::Logout, "")
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Consume the envelope and return its payload.
    pub fn into_payload(self) -> String {
        self.payload
    }

    /// Length of the payload in bytes.
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Serialise to the wire format.  Fails if the payload does not
    /// fit the 32-bit length prefix.
    pub fn encode(&self) -> io::Result<Vec<u8>> {
        let body = self.payload.as_bytes();
        let mut out = Vec::with_capacity(HEADER_SIZE + body.len());
        out.push(self.kind.to_byte());
        out.extend_from_slice(&length_prefix(body.len())?);
        out.extend_from_slice(body);
        Ok(out)
    }

    /// Parse exactly one envelope from `bytes`.
    ///
    /// The buffer must hold one complete frame and nothing else.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        if bytes.len() < HEADER_SIZE {
            return Err(DecodeError::Truncated {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }
        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&bytes[..HEADER_SIZE]);
        let (tag, len) = split_header(&header);

        let expected = HEADER_SIZE + len as usize;
        if bytes.len() < expected {
            return Err(DecodeError::Truncated {
                expected,
                actual: bytes.len(),
            });
        }
        if bytes.len() > expected {
            return Err(DecodeError::TrailingBytes(bytes.len() - expected));
        }
        Self::from_parts(tag, bytes[HEADER_SIZE..].to_vec())
    }

    /// Build an envelope from an already-framed tag and payload.
    pub(crate) fn from_parts(tag: u8, payload: Vec<u8>) -> Result<Self, DecodeError> {
        let kind = Kind::from_byte(tag)?;
        let payload = String::from_utf8(payload)?;
        Ok(Self { kind, payload })
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} bytes)", self.kind, self.payload.len())
    }
}

/// Big-endian `u32` length prefix for a body of `len` bytes.
pub(crate) fn length_prefix(len: usize) -> io::Result<[u8; 4]> {
    u32::try_from(len).map(u32::to_be_bytes).map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{len} bytes do not fit a 32-bit length prefix"),
        )
    })
}

/// Split a raw header into its kind tag and payload length.
pub(crate) fn split_header(header: &[u8; HEADER_SIZE]) -> (u8, u32) {
    let len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    (header[0], len)
}
