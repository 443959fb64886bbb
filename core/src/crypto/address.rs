//! Address derivation.
//!
//! An address is `hex(SHA-256(0x04 || X || Y))` cut to 40 characters. Both
//! coordinates are padded to 32 bytes first; skipping the padding produces
//! a different address for roughly one key in 256.

use super::hash::sha256;
use super::keys::{KeyError, PublicKey};
use crate::config::ADDRESS_HEX_LENGTH;

/// Derive the wallet address of `public_key`.
///
/// Fails only if a coordinate is wider than 32 bytes.
pub fn derive_address(public_key: &PublicKey) -> Result<String, KeyError> {
    let point = public_key.to_sec1_bytes()?;
    let mut digest = hex::encode(sha256(&point));
    digest.truncate(ADDRESS_HEX_LENGTH);
    Ok(digest)
}

/// `true` for exactly 40 lowercase hex characters.
pub fn is_valid_address(address: &str) -> bool {
    address.len() == ADDRESS_HEX_LENGTH
        && address
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bigint::from_be_bytes;
    use crate::crypto::PrivateKey;
    use num_bigint::BigUint;

    #[test]
    fn address_is_prefix_of_point_hash() {
        let pk = PrivateKey::generate().public_key();
        let address = derive_address(&pk).unwrap();
        let full = hex::encode(sha256(&pk.to_sec1_bytes().unwrap()));
        assert_eq!(address.len(), 40);
        assert!(full.starts_with(&address));
        assert!(is_valid_address(&address));
    }

    #[test]
    fn short_coordinates_are_padded() {
        // X with a zero top byte must hash as a full 32-byte coordinate.
        let mut x = [0x22u8; 32];
        x[0] = 0;
        let pk = PublicKey::new(from_be_bytes(&x), BigUint::from(5u8));

        let mut point = vec![0x04];
        point.extend_from_slice(&x);
        let mut y = [0u8; 32];
        y[31] = 5;
        point.extend_from_slice(&y);

        let expected = &hex::encode(sha256(&point))[..40];
        assert_eq!(derive_address(&pk).unwrap(), expected);
    }

    #[test]
    fn oversized_coordinate_is_an_error() {
        let pk = PublicKey::new(BigUint::from(1u8) << 300, BigUint::from(1u8));
        assert_eq!(derive_address(&pk).unwrap_err(), KeyError::InvalidPublicKey);
    }

    #[test]
    fn address_validation() {
        assert!(is_valid_address(&"a".repeat(40)));
        assert!(!is_valid_address(&"A".repeat(40)));
        assert!(!is_valid_address(&"a".repeat(39)));
        assert!(!is_valid_address(&"g".repeat(40)));
    }
}
