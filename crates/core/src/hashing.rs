//! SHA-256 digest helpers.
//!
//! Used for output file checksums and for verifying downloaded inputs
//! against the checksum declared in their descriptor.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Whether `data` hashes to `expected`, compared case-insensitively.
pub fn matches_sha256_hex(data: &[u8], expected: &str) -> bool {
    sha256_hex(data).eq_ignore_ascii_case(expected.trim())
}
