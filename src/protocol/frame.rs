//! Outer framing of the Kafka wire protocol.
//!
//! Every message on the socket is a 4-byte big-endian length followed by that
//! many bytes. A response payload starts with the 4-byte correlation ID echoed
//! from the request; everything after it is an API-specific body that this
//! module treats as opaque.

use bytes::{Buf, Bytes};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound for a single response frame.
///
/// Frames claiming to be larger are treated as framing corruption rather than
/// honored with a matching allocation.
pub const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum FrameError {
    #[error("Cannot read frame: {0}")]
    IO(#[from] std::io::Error),

    #[error("Invalid frame length: {len}")]
    InvalidLength { len: i32 },

    #[error("Frame of {size} bytes exceeds the limit of {limit} bytes")]
    TooLarge { size: usize, limit: usize },
}

/// One framed broker response, split into correlation ID and opaque body.
#[derive(Debug, PartialEq, Eq)]
pub struct ResponseFrame {
    pub correlation_id: i32,
    pub payload: Bytes,
}

/// Read a single response frame.
///
/// Cancel-safety: this future is not cancel safe; dropping it mid-frame loses
/// the stream position. The connection only ever cancels it together with the
/// whole stream.
pub async fn read_response_frame<R>(
    reader: &mut R,
    max_frame_size: usize,
) -> Result<ResponseFrame, FrameError>
where
    R: AsyncRead + Unpin,
{
    let len = reader.read_i32().await?;

    // the correlation ID must fit
    let size = match usize::try_from(len) {
        Ok(size) if size >= 4 => size,
        _ => return Err(FrameError::InvalidLength { len }),
    };
    if size > max_frame_size {
        return Err(FrameError::TooLarge {
            size,
            limit: max_frame_size,
        });
    }

    let mut buf = vec![0u8; size];
    reader.read_exact(&mut buf).await?;

    let mut payload = Bytes::from(buf);
    let correlation_id = payload.get_i32();

    Ok(ResponseFrame {
        correlation_id,
        payload,
    })
}

/// Write one length-prefixed request frame and flush it.
pub async fn write_request_frame<W>(writer: &mut W, frame: &[u8]) -> Result<(), std::io::Error>
where
    W: AsyncWrite + Unpin,
{
    let len = i32::try_from(frame.len()).map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("request frame of {} bytes overflows the length prefix", frame.len()),
        )
    })?;

    writer.write_i32(len).await?;
    writer.write_all(frame).await?;
    writer.flush().await?;
    Ok(())
}
