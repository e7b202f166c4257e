//! Length-delimited framing for the broadcast protocol.
//!
//! Every message is a 4-byte big-endian length followed by the UTF-8 body.
//! Stream transports coalesce and split writes, so the prefix is the only
//! thing that keeps a payload with embedded newlines or sentinels intact.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{trace, warn};

/// One frame read from the stream.
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    Body(Vec<u8>),
    /// Body longer than the receiver accepts; it was read and discarded.
    Skipped(usize),
}

/// Write a length-prefixed payload to the provided async writer.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let len: u32 = payload.len().try_into().map_err(|_| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("frame too large for u32: {} bytes", payload.len()),
        )
    })?;

    trace!(stage = "write_len_prefix", len = len, "writing frame length");
    writer.write_all(&len.to_be_bytes()).await?;

    trace!(stage = "write_payload", len = len, "writing frame payload");
    writer.write_all(payload).await?;

    writer.flush().await
}

/// Read a single length-prefixed frame.
///
/// Returns `Ok(None)` if the stream ends cleanly before the length prefix.
/// A body above `max_frame_bytes` is drained and reported as
/// [`Frame::Skipped`] so the next read starts on a frame boundary.
pub async fn read_frame<R>(reader: &mut R, max_frame_bytes: usize) -> io::Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    trace!(stage = "read_len_prefix", "reading frame length");

    // Read the first chunk to detect clean EOF.
    let n = reader.read(&mut len_buf).await?;
    if n == 0 {
        return Ok(None);
    }

    // If we read partial length, finish reading it.
    if n < 4 {
        if let Err(e) = reader.read_exact(&mut len_buf[n..]).await {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                warn!(
                    stage = "read_len_prefix",
                    error = %e,
                    expected = 4,
                    read = n,
                    "unexpected eof reading length"
                );
            }
            return Err(e);
        }
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > max_frame_bytes {
        warn!(len = len, max = max_frame_bytes, "skipping oversize frame");
        let mut body = (&mut *reader).take(len as u64);
        let skipped = tokio::io::copy(&mut body, &mut tokio::io::sink()).await?;
        if skipped < len as u64 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream ended inside oversize frame: {skipped} of {len} bytes"),
            ));
        }
        return Ok(Some(Frame::Skipped(len)));
    }

    let mut buf = vec![0u8; len];
    trace!(stage = "read_payload", len = len, "reading frame payload");
    if let Err(e) = reader.read_exact(&mut buf).await {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            warn!(
                stage = "read_payload",
                error = %e,
                expected = len,
                "unexpected eof reading payload"
            );
        }
        return Err(e);
    }
    Ok(Some(Frame::Body(buf)))
}
