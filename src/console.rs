//! Console command parsing.
//!
//! Each line typed at the prompt becomes one envelope.  Three words
//! are reserved, compared case-insensitively after trimming:
//! `LOGOUT`, `USERLIST` and `HISTORY`.  Anything else is sent as a chat
//! message verbatim.

use crate::protocol::{Envelope, Kind};

/// Map an input line to the envelope it should produce.  Blank lines
/// produce nothing.
pub fn parse_line(line: &str) -> Option<Envelope> {
    let line = line.trim_end_matches(['\r', '\n']);
    let word = line.trim();
    if word.is_empty() {
        return None;
    }
    let envelope = if word.eq_ignore_ascii_case("LOGOUT") {
        Envelope::logout()
    } else if word.eq_ignore_ascii_case("USERLIST") {
        Envelope::user_list()
    } else if word.eq_ignore_ascii_case("HISTORY") {
        Envelope::history()
    } else {
        Envelope::new(Kind::Text, line)
    };
    Some(envelope)
}
