//! # Base58 and Base58check
//!
//! Bitcoin-alphabet base58 for human-facing identifiers, and base58check
//! (payload plus the first four bytes of a double SHA-256) wherever a typo
//! has to be caught before it costs money.
//!
//! Leading zero bytes map one-to-one onto leading `'1'` characters, so
//! `[0, 0, 7]` and `[0, 7]` encode differently. The raw encoding itself comes
//! from `bs58`; the checksum and the error reporting are ours.

use thiserror::Error;

use super::hash::double_sha256;
use crate::config::BASE58_CHECKSUM_LENGTH;

const ALPHABET: &str = "123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

/// Errors while decoding base58 or base58check text.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Base58Error {
    #[error("invalid base58 character {character:?} at position {index}")]
    InvalidCharacter { character: char, index: usize },

    #[error("base58check checksum mismatch")]
    ChecksumMismatch,

    #[error("decoded data is {len} bytes, shorter than the 4-byte checksum")]
    PayloadTooShort { len: usize },

    #[error("base58 decoding failed: {0}")]
    Decode(String),
}

/// Raw base58. Empty input gives the empty string.
pub fn base58_encode(data: &[u8]) -> String {
    bs58::encode(data).into_string()
}

/// Raw base58 decode. The empty string gives an empty vector.
pub fn base58_decode(text: &str) -> Result<Vec<u8>, Base58Error> {
    if let Some((index, character)) = text.chars().enumerate().find(|(_, c)| !ALPHABET.contains(*c)) {
        return Err(Base58Error::InvalidCharacter { character, index });
    }
    bs58::decode(text)
        .into_vec()
        .map_err(|e| Base58Error::Decode(e.to_string()))
}

/// Base58 of `payload || double_sha256(payload)[..4]`.
///
/// # Example
///
/// ```
/// use satchel_core::crypto::{base58_check_decode, base58_check_encode};
///
/// let text = base58_check_encode(&[0x00, 0x01, 0x02]);
/// assert!(text.starts_with('1'));
/// assert_eq!(base58_check_decode(&text).unwrap(), vec![0x00, 0x01, 0x02]);
/// ```
pub fn base58_check_encode(payload: &[u8]) -> String {
    let checksum = double_sha256(payload);
    let mut data = Vec::with_capacity(payload.len() + BASE58_CHECKSUM_LENGTH);
    data.extend_from_slice(payload);
    data.extend_from_slice(&checksum[..BASE58_CHECKSUM_LENGTH]);
    base58_encode(&data)
}

/// Decode base58check text and verify its checksum.
pub fn base58_check_decode(text: &str) -> Result<Vec<u8>, Base58Error> {
    let mut data = base58_decode(text)?;
    if data.len() < BASE58_CHECKSUM_LENGTH {
        return Err(Base58Error::PayloadTooShort { len: data.len() });
    }

    let split = data.len() - BASE58_CHECKSUM_LENGTH;
    let expected = double_sha256(&data[..split]);
    if data[split..] != expected[..BASE58_CHECKSUM_LENGTH] {
        return Err(Base58Error::ChecksumMismatch);
    }

    data.truncate(split);
    Ok(data)
}
