#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use tokio_util::codec::Decoder;

use confidential_evidence_transport::frame::codec::FrameCodec;
use confidential_evidence_transport::{BinaryCodec, EvidenceCodec};

fuzz_target!(|data: &[u8]| {
    // Fuzz the frame decoder: feed arbitrary bytes and ensure no panics.
    let mut codec = FrameCodec::new();
    let mut buf = BytesMut::from(data);

    match codec.decode_eof(&mut buf) {
        Ok(Some(payload)) => {
            // A complete frame: the payload goes through the evidence decoder.
            let _ = BinaryCodec.decode(payload);
        }
        Ok(None) => {}
        Err(_) => {} // Parse error is fine, panics are not.
    }
});
