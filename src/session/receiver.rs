//! Background receive loop.
//!
//! One task per active session.  It owns the inbound half of the
//! transport and forwards decoded text to the sink until either the
//! channel fails or the session is torn down from elsewhere.  In the
//! second case the pending read is dropped mid-flight, which releases
//! the input channel.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::Inner;
use crate::error::SessionError;
use crate::network::FrameReader;
use crate::protocol::Kind;

pub(super) async fn run(inner: Arc<Inner>, mut reader: FrameReader) {
    let mut state = inner.state.subscribe();
    loop {
        let next = tokio::select! {
            biased;
            _ = state.wait_for(|s| s.is_terminal()) => {
                debug!(user = %inner.username, "session closed, receiver exiting");
                return;
            }
            next = reader.read_envelope() => next,
        };

        match next {
            Ok(envelope) if envelope.kind() == Kind::Logout => {
                info!(user = %inner.username, "dispatcher ended the session");
                if !envelope.payload().is_empty() {
                    inner.sink.append(envelope.payload());
                }
                break;
            }
            Ok(envelope) => {
                debug!(kind = %envelope.kind(), len = envelope.payload_len(), "received envelope");
                inner.sink.append(envelope.payload());
            }
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, "skipping malformed envelope");
            }
            Err(e) => {
                let err = SessionError::Receive(e);
                warn!(user = %inner.username, error = %err, "receive loop stopped");
                inner.sink.status(&err.to_string());
                break;
            }
        }
    }
    drop(reader);
    inner.teardown().await;
}
