//! Byte-stream transport and envelope framing.
//!
//! A [`Transport`] bundles a human friendly peer label with the two
//! directions of a connection.  It is split once, when the session
//! goes live: the [`FrameReader`] moves into the receive task and the
//! [`FrameWriter`] stays behind the session's writer lock.  Both
//! halves are boxed trait objects so that a TCP stream, an in-memory
//! duplex pipe or a test double can stand in for the network.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::DecodeError;
use crate::protocol::envelope::{split_header, HEADER_SIZE};
use crate::protocol::{encode_handshake, Envelope};

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// An open connection to the dispatcher.
pub struct Transport {
    peer: String,
    reader: BoxedReader,
    writer: BoxedWriter,
}

impl Transport {
    /// Wrap an arbitrary reader/writer pair.  `peer` is only used in
    /// logs and in the connection banner.
    pub fn new<R, W>(peer: impl Into<String>, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            peer: peer.into(),
            reader: Box::new(reader),
            writer: Box::new(writer),
        }
    }

    /// Wrap a connected TCP stream.
    pub fn from_tcp(stream: TcpStream) -> io::Result<Self> {
        let peer = stream.peer_addr()?.to_string();
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok(Self::new(peer, reader, writer))
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Split into framed halves.  `max_payload` bounds inbound frames
    /// on the reader and outbound frames on the writer.
    pub fn into_split(self, max_payload: u32) -> (FrameReader, FrameWriter) {
        (
            FrameReader {
                inner: self.reader,
                max_payload,
            },
            FrameWriter {
                inner: self.writer,
                max_payload,
            },
        )
    }
}

/// Inbound half: decodes one envelope per call.
pub struct FrameReader {
    inner: BoxedReader,
    max_payload: u32,
}

impl FrameReader {
    /// Read the next envelope.
    ///
    /// The whole frame is consumed before the kind tag and UTF-8 are
    /// checked, so a recoverable error leaves the reader positioned at
    /// the start of the next frame.  A declared length above the cap
    /// is reported as [`DecodeError::Oversize`] without reading the
    /// payload; the stream is unusable after that.
    pub async fn read_envelope(&mut self) -> Result<Envelope, DecodeError> {
        let mut header = [0u8; HEADER_SIZE];
        self.inner.read_exact(&mut header).await?;
        let (tag, len) = split_header(&header);
        if len > self.max_payload {
            return Err(DecodeError::Oversize {
                len,
                max: self.max_payload,
            });
        }
        let mut payload = vec![0u8; len as usize];
        self.inner.read_exact(&mut payload).await?;
        Envelope::from_parts(tag, payload)
    }
}

/// Outbound half.  Each call writes a whole frame and flushes.
pub struct FrameWriter {
    inner: BoxedWriter,
    max_payload: u32,
}

impl FrameWriter {
    /// Send the username announce.
    pub async fn write_handshake(&mut self, username: &str) -> io::Result<()> {
        self.write_frame(&encode_handshake(username)?).await
    }

    /// Send one envelope.
    pub async fn write_envelope(&mut self, envelope: &Envelope) -> io::Result<()> {
        if envelope.payload_len() > self.max_payload as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!(
                    "payload of {} bytes exceeds limit of {}",
                    envelope.payload_len(),
                    self.max_payload
                ),
            ));
        }
        self.write_frame(&envelope.encode()?).await
    }

    /// Close the outbound direction.
    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }

    async fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes).await?;
        self.inner.flush().await
    }
}
