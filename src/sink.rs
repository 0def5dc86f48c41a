//! Presentation hooks.
//!
//! The session never talks to a window or a terminal directly.  It
//! reports through a [`Sink`] supplied at construction time: decoded
//! inbound text goes to [`Sink::append`], the end of the session goes
//! to [`Sink::connection_failed`] and everything else the user might
//! want to see (connection banner, write failures) goes to
//! [`Sink::status`].
//!
//! Sink methods are called from both the caller's task and the receive
//! task, so they must be cheap and must not block.

use std::io::Write;

/// Consumer of inbound text and lifecycle notices.
pub trait Sink: Send + Sync + 'static {
    /// Display inbound text.
    fn append(&self, text: &str);

    /// The session has ended.  Called exactly once per session.
    fn connection_failed(&self);

    /// A diagnostic line for the user.  Ignored unless overridden.
    fn status(&self, _text: &str) {}
}

/// Default sink for terminal use.  Inbound text goes to stdout and the
/// input prompt is redrawn after it.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

pub const PROMPT: &str = "> ";

impl Sink for ConsoleSink {
    fn append(&self, text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", text.trim_end_matches('\n'));
        let _ = write!(out, "{PROMPT}");
        let _ = out.flush();
    }

    fn connection_failed(&self) {
        let _ = writeln!(std::io::stdout().lock(), "\nDisconnected from server.");
    }

    fn status(&self, text: &str) {
        let _ = writeln!(std::io::stdout().lock(), "{text}");
    }
}
