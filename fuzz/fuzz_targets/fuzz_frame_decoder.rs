//! Fuzz target: `FrameDecoder::push`
//!
//! Drives arbitrary byte sequences into the marker-synchronised frame
//! decoder and asserts that it never panics, never yields an empty or
//! oversized payload, and only yields payloads that were framed by both
//! markers.
//!
//! cargo fuzz run fuzz_frame_decoder

#![no_main]

use libfuzzer_sys::fuzz_target;
use verdure::serial::codec::{FrameDecoder, MAX_PAYLOAD, START_MARKER, Step};

fuzz_target!(|data: &[u8]| {
    let mut decoder = FrameDecoder::new();

    for (i, byte) in data.iter().enumerate() {
        if let Step::Frame(payload) = decoder.push(*byte) {
            assert!(!payload.is_empty(), "decoder must not yield empty payload");
            assert!(payload.len() <= MAX_PAYLOAD, "payload exceeds MAX_PAYLOAD");
            // start(2) + length(2) + payload + end(2) bytes must have been fed.
            let frame_len = payload.len() + 6;
            assert!(i + 1 >= frame_len);
            let start = i + 1 - frame_len;
            assert_eq!(&data[start..start + 2], &START_MARKER);
        }
    }

    // After a reset the decoder must accept bytes cleanly again.
    decoder.reset();
    assert!(!decoder.in_frame());
    for byte in data {
        let _ = decoder.push(*byte);
    }
});
