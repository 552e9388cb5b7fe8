pub mod binary;

use std::fmt;

use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::error::CodecError;

pub use binary::BinaryCodec;

/// Type tag of a signed evidence piece.
///
/// The transport never interprets pieces, so any tag value is carried
/// through; the constants name the tags produced by known collectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EvidenceType(pub u16);

impl EvidenceType {
    pub const SEV_SNP_REPORT: Self = Self(0x0001);
    pub const SEV_SNP_VCEK: Self = Self(0x0002);
    pub const TDX_REPORT: Self = Self(0x0010);
    pub const TDX_COLLATERAL: Self = Self(0x0011);
    pub const TPM_QUOTE: Self = Self(0x0020);
    pub const TPMT_PUBLIC: Self = Self(0x0021);
    pub const TPM_CERTIFY: Self = Self(0x0022);
    pub const AK_CERTIFICATE: Self = Self(0x0023);
    pub const NVIDIA_GPU_REPORT: Self = Self(0x0030);

    /// Human-readable name for known tags.
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::SEV_SNP_REPORT => "sev-snp-report",
            Self::SEV_SNP_VCEK => "sev-snp-vcek",
            Self::TDX_REPORT => "tdx-report",
            Self::TDX_COLLATERAL => "tdx-collateral",
            Self::TPM_QUOTE => "tpm-quote",
            Self::TPMT_PUBLIC => "tpmt-public",
            Self::TPM_CERTIFY => "tpm-certify",
            Self::AK_CERTIFICATE => "ak-certificate",
            Self::NVIDIA_GPU_REPORT => "nvidia-gpu-report",
            _ => return None,
        })
    }
}

impl fmt::Display for EvidenceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:04X}", self.0),
        }
    }
}

/// One unit of signed platform evidence: type tag, data, signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedEvidencePiece {
    pub evidence_type: EvidenceType,
    pub data: Bytes,
    pub signature: Bytes,
}

impl SignedEvidencePiece {
    pub fn new(
        evidence_type: EvidenceType,
        data: impl Into<Bytes>,
        signature: impl Into<Bytes>,
    ) -> Self {
        Self {
            evidence_type,
            data: data.into(),
            signature: signature.into(),
        }
    }
}

/// An ordered list of evidence pieces, exchanged as one unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvidenceBundle {
    pub pieces: Vec<SignedEvidencePiece>,
}

impl EvidenceBundle {
    pub fn new(pieces: Vec<SignedEvidencePiece>) -> Self {
        Self { pieces }
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SignedEvidencePiece> {
        self.pieces.iter()
    }
}

impl From<Vec<SignedEvidencePiece>> for EvidenceBundle {
    fn from(pieces: Vec<SignedEvidencePiece>) -> Self {
        Self { pieces }
    }
}

impl FromIterator<SignedEvidencePiece> for EvidenceBundle {
    fn from_iter<I: IntoIterator<Item = SignedEvidencePiece>>(iter: I) -> Self {
        Self {
            pieces: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EvidenceBundle {
    type Item = &'a SignedEvidencePiece;
    type IntoIter = std::slice::Iter<'a, SignedEvidencePiece>;

    fn into_iter(self) -> Self::IntoIter {
        self.pieces.iter()
    }
}

/// Serializes evidence bundles to and from their wire payload.
///
/// Implementations must be deterministic enough that
/// `decode(encode(b)) == b` for every bundle they accept.
pub trait EvidenceCodec: Send + Sync {
    fn encode(&self, bundle: &EvidenceBundle) -> Result<Bytes, CodecError>;

    /// Decode an untrusted payload. Must fail, never panic, on arbitrary input.
    fn decode(&self, payload: Bytes) -> Result<EvidenceBundle, CodecError>;
}

impl<C: EvidenceCodec + ?Sized> EvidenceCodec for &C {
    fn encode(&self, bundle: &EvidenceBundle) -> Result<Bytes, CodecError> {
        (**self).encode(bundle)
    }

    fn decode(&self, payload: Bytes) -> Result<EvidenceBundle, CodecError> {
        (**self).decode(payload)
    }
}

/// Short hex digest (first 8 bytes of SHA-256) of an encoded payload, for logs.
pub fn payload_digest(payload: &[u8]) -> String {
    let digest = Sha256::digest(payload);
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evidence_type_display() {
        assert_eq!(EvidenceType::TDX_REPORT.to_string(), "tdx-report");
        assert_eq!(EvidenceType(0xBEEF).to_string(), "0xBEEF");
    }

    #[test]
    fn digest_is_stable_and_short() {
        let a = payload_digest(b"evidence");
        assert_eq!(a.len(), 16);
        assert_eq!(a, payload_digest(b"evidence"));
        assert_ne!(a, payload_digest(b"evidencf"));
    }

    #[test]
    fn bundle_collects_from_iterator() {
        let bundle: EvidenceBundle = (0..3u16)
            .map(|i| SignedEvidencePiece::new(EvidenceType(i), vec![i as u8], Bytes::new()))
            .collect();
        assert_eq!(bundle.len(), 3);
        assert_eq!(bundle.pieces[2].evidence_type, EvidenceType(2));
    }
}
