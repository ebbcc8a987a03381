//! Content hashing for audit artifacts.
//!
//! Hashes are computed over the canonical JSON encoding of a value. Going
//! through `serde_json::Value` sorts object keys, so the digest does not
//! depend on struct field order or map insertion order.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of raw bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Hex-encoded SHA-256 of a value's canonical JSON encoding.
pub fn canonical_hash<T: Serialize + ?Sized>(value: &T) -> String {
    let canonical = serde_json::to_value(value).and_then(|v| serde_json::to_vec(&v));
    match canonical {
        Ok(bytes) => sha256_hex(&bytes),
        // Only reachable for maps with non-string keys, which no contract type has.
        Err(_) => sha256_hex(b"<unserializable>"),
    }
}
