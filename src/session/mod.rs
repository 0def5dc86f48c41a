//! Client session: connect, announce, exchange envelopes, tear down.
//!
//! A [`Session`] is built from connection parameters and a
//! [`Sink`].  [`Session::start`] opens the transport, writes the
//! username announce and spawns the receive task.  From then on two
//! contexts share the session: whoever calls [`Session::send`], and the
//! receive task forwarding inbound text to the sink.
//!
//! Teardown can be triggered by the caller ([`Session::disconnect`],
//! [`Session::logout`]), by the receive task on a fatal read, or by a
//! failed write.  Whichever path gets there first flips the state to
//! `CLOSED`; the others find a terminal state and return.  The state
//! lives in a `watch` channel so the receive task can notice the flip
//! while it is parked on a read.

mod receiver;
mod state;

pub use state::SessionState;

use std::fmt;
use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::network::{Connector, FrameWriter, TcpConnector};
use crate::protocol::Envelope;
use crate::sink::{ConsoleSink, Sink};

/// State shared between the session handle and its receive task.
pub(crate) struct Inner {
    address: String,
    port: u16,
    username: String,
    config: SessionConfig,
    sink: Arc<dyn Sink>,
    state: watch::Sender<SessionState>,
    /// Outbound half.  The lock serialises concurrent senders so frames
    /// never interleave.
    writer: AsyncMutex<Option<FrameWriter>>,
    peer: Mutex<Option<String>>,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Move from `from` to `to`.  Returns false, leaving the state
    /// alone, if the session is no longer in `from`.
    fn transition(&self, from: SessionState, to: SessionState) -> bool {
        let moved = self.state.send_if_modified(|s| {
            if *s == from {
                *s = to;
                true
            } else {
                false
            }
        });
        if moved {
            debug!(user = %self.username, %from, %to, "session state changed");
        }
        moved
    }

    /// Drive `fut` unless the session closes first.  A write cut short
    /// this way gives up the writer lock so teardown never waits on it.
    async fn until_closed<F: Future>(&self, fut: F) -> Option<F::Output> {
        let mut state = self.state.subscribe();
        tokio::select! {
            biased;
            _ = state.wait_for(|s| s.is_terminal()) => None,
            out = fut => Some(out),
        }
    }

    /// Flip any non-terminal state to `CLOSED`.  Exactly one caller
    /// ever sees `true`.
    fn mark_closed(&self) -> bool {
        let mut previous = None;
        let won = self.state.send_if_modified(|s| {
            if s.is_terminal() {
                false
            } else {
                previous = Some(*s);
                *s = SessionState::Closed;
                true
            }
        });
        if let Some(previous) = previous {
            info!(user = %self.username, %previous, "closing session");
        }
        won
    }

    /// Release the transport and notify the sink, once.
    ///
    /// The input channel belongs to the receive task, which drops it
    /// as soon as it observes `CLOSED`.  The output channel is shut down
    /// here; writers in flight observe `CLOSED` too and drop the lock.
    /// The connection itself goes away with the last half.
    async fn teardown(&self) {
        if !self.mark_closed() {
            return;
        }
        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            match with_deadline(self.config.write_timeout(), writer.shutdown()).await {
                Ok(()) => debug!("output channel closed"),
                Err(e) => debug!(error = %e, "error closing output channel"),
            }
        }
        self.sink.connection_failed();
    }
}

/// A chat session with the dispatcher.
pub struct Session {
    inner: Arc<Inner>,
}

impl Session {
    /// Build a session with default settings.  Without a sink, output
    /// goes to the console.
    pub fn new(
        address: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        sink: Option<Arc<dyn Sink>>,
    ) -> Self {
        Self::with_config(address, port, username, sink, SessionConfig::default())
    }

    pub fn with_config(
        address: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        sink: Option<Arc<dyn Sink>>,
        config: SessionConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::New);
        let sink = sink.unwrap_or_else(|| Arc::new(ConsoleSink));
        Self {
            inner: Arc::new(Inner {
                address: address.into(),
                port,
                username: username.into(),
                config,
                sink,
                state,
                writer: AsyncMutex::new(None),
                peer: Mutex::new(None),
                receiver: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.state()
    }

    pub fn address(&self) -> &str {
        &self.inner.address
    }

    pub fn port(&self) -> u16 {
        self.inner.port
    }

    pub fn username(&self) -> &str {
        &self.inner.username
    }

    /// Label of the remote end, once the transport has opened.
    pub fn peer(&self) -> Option<String> {
        lock(&self.inner.peer).clone()
    }

    /// Connect over TCP.  See [`start_with`](Self::start_with).
    pub async fn start(&self) -> Result<(), SessionError> {
        self.start_with(&TcpConnector).await
    }

    /// Open the transport through `connector`, announce the username
    /// and spawn the receive task.
    ///
    /// Only valid on a `NEW` session.  If the transport cannot be
    /// opened the session ends up `FAILED` and nothing needs tearing
    /// down.  If the announce fails the session is disconnected and
    /// ends up `CLOSED`.
    pub async fn start_with<C: Connector>(&self, connector: &C) -> Result<(), SessionError> {
        let inner = &self.inner;
        if inner.state() != SessionState::New {
            return Err(SessionError::InvalidState(inner.state()));
        }
        let max = inner.config.max_payload;
        if inner.username.len() > max as usize {
            return Err(SessionError::PayloadTooLarge {
                len: inner.username.len(),
                max,
            });
        }
        if !inner.transition(SessionState::New, SessionState::Connecting) {
            return Err(SessionError::InvalidState(inner.state()));
        }
        info!(address = %inner.address, port = inner.port, user = %inner.username, "connecting");

        let opened = with_deadline(
            inner.config.connect_timeout(),
            connector.connect(&inner.address, inner.port),
        )
        .await;
        let transport = match opened {
            Ok(transport) => transport,
            Err(source) => {
                inner.transition(SessionState::Connecting, SessionState::Failed);
                let err = SessionError::Connection {
                    address: format!("{}:{}", inner.address, inner.port),
                    source,
                };
                warn!(error = %err, "connection failed");
                inner.sink.status(&err.to_string());
                return Err(err);
            }
        };

        let peer = transport.peer().to_string();
        *lock(&inner.peer) = Some(peer.clone());
        let (reader, writer) = transport.into_split(inner.config.max_payload);
        *inner.writer.lock().await = Some(writer);

        if !inner.transition(SessionState::Connecting, SessionState::Handshaking) {
            // Disconnected while the connection was opening.
            inner.writer.lock().await.take();
            return Err(SessionError::NotConnected);
        }
        info!(%peer, "connection accepted");
        inner.sink.status(&format!("Connection accepted {peer}"));

        let announced = {
            let mut guard = inner.writer.lock().await;
            let Some(writer) = guard.as_mut() else {
                return Err(SessionError::NotConnected);
            };
            inner
                .until_closed(with_deadline(
                    inner.config.handshake_timeout(),
                    writer.write_handshake(&inner.username),
                ))
                .await
        };
        let Some(announced) = announced else {
            // Disconnected during the announce.
            return Err(SessionError::NotConnected);
        };
        if let Err(e) = announced {
            let err = SessionError::Handshake(e);
            warn!(error = %err, "handshake failed");
            inner.sink.status(&err.to_string());
            drop(reader);
            inner.teardown().await;
            return Err(err);
        }

        {
            // Publish ACTIVE and the task handle together, so a racing
            // disconnect always finds the handle to join.
            let mut slot = lock(&inner.receiver);
            if !inner.transition(SessionState::Handshaking, SessionState::Active) {
                return Err(SessionError::NotConnected);
            }
            *slot = Some(tokio::spawn(receiver::run(Arc::clone(inner), reader)));
        }
        info!(user = %inner.username, "session active");
        Ok(())
    }

    /// Write one envelope.
    ///
    /// Fails with [`SessionError::NotConnected`] outside `ACTIVE`
    /// without touching the transport, or if the session closes while
    /// the write is in flight.  A write failure is reported to
    /// the sink and returned; unless `close_on_send_error` is off it
    /// also closes the session.
    pub async fn send(&self, envelope: &Envelope) -> Result<(), SessionError> {
        let inner = &self.inner;
        if inner.state() != SessionState::Active {
            return Err(SessionError::NotConnected);
        }
        let max = inner.config.max_payload;
        if envelope.payload_len() > max as usize {
            return Err(SessionError::PayloadTooLarge {
                len: envelope.payload_len(),
                max,
            });
        }

        let written = {
            let mut guard = inner.writer.lock().await;
            let Some(writer) = guard.as_mut() else {
                return Err(SessionError::NotConnected);
            };
            inner
                .until_closed(with_deadline(
                    inner.config.write_timeout(),
                    writer.write_envelope(envelope),
                ))
                .await
        };

        match written {
            None => Err(SessionError::NotConnected),
            Some(Ok(())) => {
                debug!(kind = %envelope.kind(), len = envelope.payload_len(), "sent envelope");
                Ok(())
            }
            Some(Err(e)) => {
                let err = SessionError::Send(e);
                warn!(error = %err, "send failed");
                inner.sink.status(&err.to_string());
                if inner.config.close_on_send_error {
                    self.disconnect().await;
                }
                Err(err)
            }
        }
    }

    /// Tell the dispatcher we are leaving, then disconnect.  The
    /// session is closed even if the notice could not be sent.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let sent = self.send(&Envelope::logout()).await;
        self.disconnect().await;
        sent
    }

    /// Close the session.  Safe to call any number of times and from
    /// any task; only the first call releases the transport and
    /// notifies the sink.  Returns after the receive task has exited.
    ///
    /// On a `FAILED` session this does nothing.
    pub async fn disconnect(&self) {
        self.inner.teardown().await;
        let handle = lock(&self.inner.receiver).take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "receive task ended abnormally");
            }
        }
    }

    /// Wait until the session reaches a terminal state.
    pub async fn closed(&self) -> SessionState {
        let mut rx = self.inner.state.subscribe();
        let state = match rx.wait_for(|s| s.is_terminal()).await {
            Ok(state) => *state,
            Err(_) => self.inner.state(),
        };
        state
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // The receive task sees CLOSED and drops the input half; the
        // output half goes with the writer slot.
        if self.inner.mark_closed() {
            if let Ok(mut writer) = self.inner.writer.try_lock() {
                writer.take();
            }
            self.inner.sink.connection_failed();
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.inner.address)
            .field("port", &self.inner.port)
            .field("username", &self.inner.username)
            .field("state", &self.state())
            .finish()
    }
}

async fn with_deadline<T, F>(limit: Option<Duration>, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.unwrap_or_else(|_| {
            Err(io::Error::new(io::ErrorKind::TimedOut, "operation timed out"))
        }),
        None => fut.await,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
