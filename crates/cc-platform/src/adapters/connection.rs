//! A single framed text channel to one peer.
//!
//! `Connection` owns a transport handle (any async reader/writer pair) plus
//! the peer's `SessionId`. It can be split so the publisher writes broadcasts
//! from the registry while a separate task drains the peer's requests.

use async_trait::async_trait;
use cc_core::error::{ConnError, DecodeError};
use cc_core::ids::SessionId;
use cc_core::ports::PollTransportPort;
use cc_core::protocol::{self, Request, MAX_FRAME_BYTES};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, trace};

use super::framing::{read_frame, write_frame, Frame};

pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Read half of a [`Connection`].
pub struct ConnectionReader {
    id: SessionId,
    reader: BufReader<BoxedReader>,
    max_frame_bytes: usize,
}

impl ConnectionReader {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Receive the next text frame.
    ///
    /// Frames that are not protocol messages (empty, invalid UTF-8, longer
    /// than `max_bytes`) come back as `Ok(None)`. EOF and I/O errors are
    /// `ConnError::Disconnected`.
    pub async fn receive(&mut self, max_bytes: usize) -> Result<Option<String>, ConnError> {
        let frame = read_frame(&mut self.reader, max_bytes)
            .await?
            .ok_or_else(|| ConnError::disconnected("connection closed by peer"))?;

        match frame {
            Frame::Body(body) => match protocol::decode_text(body) {
                Ok(text) => Ok(Some(text)),
                Err(e) => {
                    debug!(peer = %self.id, error = %e, "ignoring undecodable frame");
                    Ok(None)
                }
            },
            Frame::Skipped(len) => {
                let e = DecodeError::Oversize { len, max: max_bytes };
                debug!(peer = %self.id, error = %e, "ignoring undecodable frame");
                Ok(None)
            }
        }
    }
}

/// Write half of a [`Connection`].
pub struct ConnectionWriter {
    id: SessionId,
    writer: BoxedWriter,
    send_timeout: Option<Duration>,
    open: bool,
}

impl ConnectionWriter {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Send one text frame. The first failure closes this half for good.
    pub async fn send(&mut self, text: &str) -> Result<(), ConnError> {
        if !self.open {
            return Err(ConnError::disconnected("connection already closed"));
        }

        let write = write_frame(&mut self.writer, text.as_bytes());
        let result = match self.send_timeout {
            Some(limit) => match tokio::time::timeout(limit, write).await {
                Ok(result) => result.map_err(ConnError::from),
                Err(_) => Err(ConnError::disconnected(format!(
                    "send timed out after {}ms",
                    limit.as_millis()
                ))),
            },
            None => write.await.map_err(ConnError::from),
        };

        if result.is_err() {
            self.open = false;
        }
        trace!(peer = %self.id, len = text.len(), ok = result.is_ok(), "frame sent");
        result
    }

    /// Shut down the write direction. Errors are irrelevant at this point.
    pub async fn close(&mut self) {
        if self.open {
            self.open = false;
            if let Err(e) = self.writer.shutdown().await {
                trace!(peer = %self.id, error = %e, "shutdown after close failed");
            }
        }
    }
}

/// Bidirectional framed text channel to one peer.
pub struct Connection {
    reader: ConnectionReader,
    writer: ConnectionWriter,
}

impl Connection {
    pub fn new<R, W>(id: SessionId, reader: R, writer: W) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: ConnectionReader {
                id,
                reader: BufReader::new(Box::new(reader) as BoxedReader),
                max_frame_bytes: MAX_FRAME_BYTES,
            },
            writer: ConnectionWriter {
                id,
                writer: Box::new(writer),
                send_timeout: None,
                open: true,
            },
        }
    }

    /// Wrap an accepted or connected TCP stream.
    pub fn from_tcp(id: SessionId, stream: TcpStream) -> Self {
        if let Err(e) = stream.set_nodelay(true) {
            debug!(peer = %id, error = %e, "failed to set TCP_NODELAY");
        }
        let (reader, writer) = stream.into_split();
        Self::new(id, reader, writer)
    }

    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.reader.max_frame_bytes = max_frame_bytes;
        self
    }

    pub fn with_send_timeout(mut self, send_timeout: Duration) -> Self {
        self.writer.send_timeout = Some(send_timeout);
        self
    }

    pub fn id(&self) -> SessionId {
        self.writer.id
    }

    pub fn is_open(&self) -> bool {
        self.writer.open
    }

    pub async fn send(&mut self, text: &str) -> Result<(), ConnError> {
        self.writer.send(text).await
    }

    pub async fn receive(&mut self, max_bytes: usize) -> Result<Option<String>, ConnError> {
        let result = self.reader.receive(max_bytes).await;
        if result.is_err() {
            self.writer.close().await;
        }
        result
    }

    pub async fn close(&mut self) {
        self.writer.close().await;
    }

    pub fn into_split(self) -> (ConnectionReader, ConnectionWriter) {
        (self.reader, self.writer)
    }
}

#[async_trait]
impl PollTransportPort for Connection {
    fn session_id(&self) -> SessionId {
        self.id()
    }

    async fn send_request(&mut self) -> Result<(), ConnError> {
        self.send(Request::Check.as_wire()).await
    }

    async fn receive(&mut self) -> Result<Option<String>, ConnError> {
        let max = self.reader.max_frame_bytes;
        Connection::receive(self, max).await
    }

    async fn close(&mut self) {
        Connection::close(self).await;
    }
}
