//! Length-prefix framing: `[u32 big-endian N][N payload bytes]`.
//!
//! One frame carries one encoded evidence bundle. The declared length is
//! validated against [`MAX_PAYLOAD_SIZE`] before any body byte is read or
//! any buffer is sized from it.

pub mod codec;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::codec::Decoder;

use crate::error::FrameError;

use self::codec::FrameCodec;

/// Size of the big-endian length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Maximum payload size: 1 MiB.
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Prefix `payload` with its 4-byte big-endian length.
pub fn frame(payload: &[u8]) -> Result<Bytes, FrameError> {
    let mut buf = BytesMut::new();
    codec::put_frame(payload, MAX_PAYLOAD_SIZE, &mut buf)?;
    Ok(buf.freeze())
}

/// Read exactly one frame from `source` and return its payload.
///
/// End of stream before the 4-byte prefix is complete yields
/// [`FrameError::TruncatedLength`]; end of stream before the declared body
/// is complete yields [`FrameError::TruncatedPayload`]. A declared length over
/// [`MAX_PAYLOAD_SIZE`] fails with [`FrameError::PayloadTooLarge`] as soon as
/// the prefix is read.
pub async fn read_frame<R>(source: &mut R) -> Result<Bytes, FrameError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    read_frame_with(source, FrameCodec::new()).await
}

/// Like [`read_frame`] with a caller-supplied codec (e.g. a lower size limit).
pub async fn read_frame_with<R>(source: &mut R, mut codec: FrameCodec) -> Result<Bytes, FrameError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = BytesMut::new();
    loop {
        if let Some(payload) = codec.decode(&mut buf)? {
            return Ok(payload);
        }
        let n = source.read_buf(&mut buf).await?;
        if n == 0 {
            return match codec.decode_eof(&mut buf)? {
                Some(payload) => Ok(payload),
                // Clean EOF with zero bytes: still no length prefix.
                None => Err(FrameError::TruncatedLength { received: 0 }),
            };
        }
    }
}
