use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::{LENGTH_PREFIX_SIZE, MAX_PAYLOAD_SIZE};
use crate::error::FrameError;

/// Upper bound on how much buffer space a single decode call reserves for a
/// pending payload. The rest is grown as bytes actually arrive.
const MAX_RESERVE_PER_DECODE: usize = 64 * 1024;

/// Tokio codec for length-prefixed evidence frames.
#[derive(Debug)]
pub struct FrameCodec {
    /// Declared length from a prefix already consumed from the buffer.
    pending_len: Option<usize>,
    /// Configured maximum payload size (never above `MAX_PAYLOAD_SIZE`).
    max_payload_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec {
    pub fn new() -> Self {
        Self {
            pending_len: None,
            max_payload_size: MAX_PAYLOAD_SIZE,
        }
    }

    /// Create a codec with a stricter maximum payload size.
    ///
    /// Values above [`MAX_PAYLOAD_SIZE`] are clamped to it.
    pub fn with_max_payload_size(max_payload_size: usize) -> Self {
        Self {
            pending_len: None,
            max_payload_size: max_payload_size.min(MAX_PAYLOAD_SIZE),
        }
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }
}

fn check_len(size: usize, max: usize) -> Result<(), FrameError> {
    if size > max {
        return Err(FrameError::PayloadTooLarge { size, max });
    }
    Ok(())
}

/// Append one frame for `payload` to `dst`.
pub(crate) fn put_frame(payload: &[u8], max: usize, dst: &mut BytesMut) -> Result<(), FrameError> {
    check_len(payload.len(), max)?;
    dst.reserve(LENGTH_PREFIX_SIZE + payload.len());
    // max <= MAX_PAYLOAD_SIZE, far below u32::MAX.
    dst.put_u32(payload.len() as u32);
    dst.extend_from_slice(payload);
    Ok(())
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let payload_len = match self.pending_len.take() {
            Some(len) => len,
            None => {
                if src.len() < LENGTH_PREFIX_SIZE {
                    return Ok(None);
                }
                let len = src.get_u32() as usize;
                check_len(len, self.max_payload_size)?;
                len
            }
        };

        if src.len() < payload_len {
            let missing = payload_len - src.len();
            src.reserve(missing.min(MAX_RESERVE_PER_DECODE));
            self.pending_len = Some(payload_len);
            return Ok(None);
        }

        Ok(Some(src.split_to(payload_len).freeze()))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(payload) = self.decode(src)? {
            return Ok(Some(payload));
        }
        match self.pending_len.take() {
            Some(expected) => Err(FrameError::TruncatedPayload {
                expected,
                received: src.len(),
            }),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::TruncatedLength {
                received: src.len(),
            }),
        }
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        put_frame(&payload, self.max_payload_size, dst)
    }
}

impl Encoder<&[u8]> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, payload: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        put_frame(payload, self.max_payload_size, dst)
    }
}
