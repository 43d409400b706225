//! Payload compression for split-topic telemetry.
//!
//! JSON text → zlib (`miniz_oxide`, level 9) → standard base64.  The
//! consumer reverses the three steps.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::warn;
use miniz_oxide::deflate::compress_to_vec_zlib;
use miniz_oxide::inflate::decompress_to_vec_zlib;

/// Maximum zlib compression level.
const COMPRESSION_LEVEL: u8 = 9;

/// Compress and encode a JSON document.
pub fn compress(json: &str) -> String {
    let compressed = compress_to_vec_zlib(json.as_bytes(), COMPRESSION_LEVEL);
    STANDARD.encode(compressed)
}

/// Reverse [`compress`].  `None` on bad base64, bad zlib, or non-UTF-8.
pub fn decompress(encoded: &str) -> Option<String> {
    let compressed = match STANDARD.decode(encoded) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("decompress: base64 error: {}", e);
            return None;
        }
    };
    let raw = match decompress_to_vec_zlib(&compressed) {
        Ok(data) => data,
        Err(e) => {
            warn!("decompress: zlib error: {:?}", e);
            return None;
        }
    };
    String::from_utf8(raw).ok()
}

// ── Tests ────────────────────────────────────────────────────
