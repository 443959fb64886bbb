//! # AES-256-GCM Encryption
//!
//! Authenticated encryption for sealing private keys at rest.
//!
//! ## Nonce management
//!
//! Random 96-bit nonces from the OS CSPRNG. Each sealed record is encrypted
//! under a freshly derived key (new salt every time), so nonce reuse under one
//! key would need a salt collision first.
//!
//! ## Wire format
//!
//! [`seal`] returns `nonce || ciphertext || tag` as one buffer and [`open`]
//! expects the same. The associated data is authenticated but not stored; the
//! caller supplies it again on the way back in.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use thiserror::Error;

use crate::config::{AES_KEY_LENGTH, AES_NONCE_LENGTH};

/// Errors from sealing or opening. A wrong key, wrong AAD and a tampered
/// buffer all surface as `DecryptFailed`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncryptionError {
    #[error("could not seal data")]
    EncryptFailed,

    #[error("could not open sealed data")]
    DecryptFailed,

    #[error("sealed buffer shorter than its {AES_NONCE_LENGTH}-byte nonce")]
    CiphertextTooShort,
}

/// Encrypt `plaintext` under `key`, binding `aad`.
pub fn seal(
    key: &[u8; AES_KEY_LENGTH],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::EncryptFailed)?;

    let mut nonce_bytes = [0u8; AES_NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| EncryptionError::EncryptFailed)?;

    let mut out = Vec::with_capacity(AES_NONCE_LENGTH + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a buffer produced by [`seal`] with the same key and `aad`.
pub fn open(key: &[u8; AES_KEY_LENGTH], data: &[u8], aad: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    if data.len() < AES_NONCE_LENGTH {
        return Err(EncryptionError::CiphertextTooShort);
    }

    let (nonce_bytes, ciphertext) = data.split_at(AES_NONCE_LENGTH);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::DecryptFailed)?;

    cipher
        .decrypt(
            Nonce::from_slice(nonce_bytes),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| EncryptionError::DecryptFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_roundtrip() {
        let key = [7u8; 32];
        let sealed = seal(&key, b"secret scalar", b"acct-1").unwrap();
        assert_eq!(open(&key, &sealed, b"acct-1").unwrap(), b"secret scalar");
    }

    #[test]
    fn nonces_differ_between_seals() {
        let key = [7u8; 32];
        let a = seal(&key, b"same", b"").unwrap();
        let b = seal(&key, b"same", b"").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_aad_or_tamper_fails() {
        let key = [7u8; 32];
        let sealed = seal(&key, b"secret", b"acct-1").unwrap();

        assert_eq!(open(&[8u8; 32], &sealed, b"acct-1"), Err(EncryptionError::DecryptFailed));
        assert_eq!(open(&key, &sealed, b"acct-2"), Err(EncryptionError::DecryptFailed));

        let mut tampered = sealed.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 1;
        assert_eq!(open(&key, &tampered, b"acct-1"), Err(EncryptionError::DecryptFailed));
    }

    #[test]
    fn short_input_is_rejected() {
        assert_eq!(open(&[0u8; 32], &[1, 2, 3], b""), Err(EncryptionError::CiphertextTooShort));
    }
}
