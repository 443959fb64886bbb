//! # Hashing Utilities
//!
//! SHA-256 and nothing else. The backend hashes canonical payloads with
//! SHA-256, derives addresses with SHA-256 and checks base58 payloads with a
//! double SHA-256, so there is no room for a second hash function here.

use sha2::{Digest, Sha256};

/// SHA-256 of `data` as a fixed-size array.
///
/// # Example
///
/// ```
/// use satchel_core::crypto::sha256;
///
/// let hash = sha256(b"satchel");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// `SHA-256(SHA-256(data))`, the base58check checksum hash.
pub fn double_sha256(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}
