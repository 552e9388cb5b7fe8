#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use confidential_evidence_transport::{BinaryCodec, EvidenceCodec};

fuzz_target!(|data: &[u8]| {
    // BinaryCodec::decode validates magic, version, piece count and every
    // field length. None of these should ever panic on arbitrary input.
    if let Ok(bundle) = BinaryCodec.decode(Bytes::copy_from_slice(data)) {
        // Anything accepted must re-encode to the same bytes.
        let encoded = BinaryCodec.encode(&bundle).expect("decoded bundle re-encodes");
        assert_eq!(&encoded[..], data);
    }
});
