use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{EvidenceBundle, EvidenceCodec, EvidenceType, SignedEvidencePiece};
use crate::error::CodecError;

/// Magic bytes: "SEVL" (signed evidence list).
pub const MAGIC: [u8; 4] = *b"SEVL";

/// Current encoding version.
pub const ENCODING_VERSION: u8 = 1;

/// magic(4) + version(1) + piece count(4).
const LIST_HEADER_SIZE: usize = 4 + 1 + 4;

/// type(2) + data_len(4) + signature_len(4), with empty data and signature.
const MIN_PIECE_SIZE: usize = 2 + 4 + 4;

/// Reference binary encoding for [`EvidenceBundle`].
///
/// Layout (all integers big-endian):
///
/// ```text
/// "SEVL" | version u8 | count u32 | count × (type u16 | len u32 | data | len u32 | signature)
/// ```
///
/// Decoding is strict: trailing bytes, truncated fields and piece counts that
/// cannot fit in the remaining input are rejected before allocation.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinaryCodec;

impl BinaryCodec {
    pub fn new() -> Self {
        Self
    }
}

fn checked_u32(field: &'static str, size: usize) -> Result<u32, CodecError> {
    u32::try_from(size).map_err(|_| CodecError::FieldTooLarge { field, size })
}

fn take_u16(buf: &mut Bytes, what: &'static str) -> Result<u16, CodecError> {
    if buf.remaining() < 2 {
        return Err(CodecError::Truncated(what));
    }
    Ok(buf.get_u16())
}

fn take_u32(buf: &mut Bytes, what: &'static str) -> Result<u32, CodecError> {
    if buf.remaining() < 4 {
        return Err(CodecError::Truncated(what));
    }
    Ok(buf.get_u32())
}

fn take_field(buf: &mut Bytes, what: &'static str) -> Result<Bytes, CodecError> {
    let len = take_u32(buf, what)? as usize;
    if buf.remaining() < len {
        return Err(CodecError::Truncated(what));
    }
    Ok(buf.split_to(len))
}

impl EvidenceCodec for BinaryCodec {
    fn encode(&self, bundle: &EvidenceBundle) -> Result<Bytes, CodecError> {
        let count = checked_u32("piece count", bundle.len())?;
        let body: usize = bundle
            .iter()
            .map(|p| MIN_PIECE_SIZE + p.data.len() + p.signature.len())
            .sum();

        let mut buf = BytesMut::with_capacity(LIST_HEADER_SIZE + body);
        buf.extend_from_slice(&MAGIC);
        buf.put_u8(ENCODING_VERSION);
        buf.put_u32(count);
        for piece in bundle {
            buf.put_u16(piece.evidence_type.0);
            buf.put_u32(checked_u32("evidence data", piece.data.len())?);
            buf.extend_from_slice(&piece.data);
            buf.put_u32(checked_u32("evidence signature", piece.signature.len())?);
            buf.extend_from_slice(&piece.signature);
        }
        Ok(buf.freeze())
    }

    fn decode(&self, mut buf: Bytes) -> Result<EvidenceBundle, CodecError> {
        if buf.len() < MAGIC.len() || buf[..MAGIC.len()] != MAGIC {
            return Err(CodecError::InvalidMagic {
                expected: MAGIC,
                actual: buf[..buf.len().min(MAGIC.len())].to_vec(),
            });
        }
        buf.advance(MAGIC.len());

        if !buf.has_remaining() {
            return Err(CodecError::Truncated("encoding version"));
        }
        let version = buf.get_u8();
        if version != ENCODING_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }

        let count = take_u32(&mut buf, "piece count")?;
        // Bound the allocation by what the input can actually hold.
        if (count as usize) > buf.remaining() / MIN_PIECE_SIZE {
            return Err(CodecError::PieceCountOverflow {
                count,
                remaining: buf.remaining(),
            });
        }

        let mut pieces = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let evidence_type = EvidenceType(take_u16(&mut buf, "evidence type")?);
            let data = take_field(&mut buf, "evidence data")?;
            let signature = take_field(&mut buf, "evidence signature")?;
            pieces.push(SignedEvidencePiece {
                evidence_type,
                data,
                signature,
            });
        }

        if buf.has_remaining() {
            return Err(CodecError::TrailingBytes(buf.remaining()));
        }

        Ok(EvidenceBundle { pieces })
    }
}
