//! Protocol primitives for the chat client.
//!
//! The protocol has two phases.  Right after the connection opens the
//! client announces its username in a single length-prefixed frame
//! (see [`encode_handshake`]).  Everything after that is an
//! [`Envelope`]: a kind tag, a length and a UTF-8 payload.  The
//! dispatcher answers queries asynchronously with further envelopes.

pub mod envelope;

pub use envelope::{Envelope, Kind, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};

use std::io;

use envelope::length_prefix;

/// Frame the username announce.  The username is sent as raw UTF-8
/// behind a 4-byte big-endian length, with no kind tag.
pub fn encode_handshake(username: &str) -> io::Result<Vec<u8>> {
    let name = username.as_bytes();
    let mut out = Vec::with_capacity(4 + name.len());
    out.extend_from_slice(&length_prefix(name.len())?);
    out.extend_from_slice(name);
    Ok(out)
}
