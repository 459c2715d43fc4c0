//! Hex validation and sha256 digests.

use sha2::{Digest, Sha256};

/// Returns `true` iff `s` is exactly `length` characters of lowercase hex.
///
/// Uppercase hex digits are rejected: identifiers are compared byte-wise, so
/// `"AB"` and `"ab"` would otherwise name two different objects.
pub fn valid_hex(length: usize, s: &str) -> bool {
    s.len() == length && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Lowercase hex sha256 of `content`. Always 64 characters.
pub fn digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}
