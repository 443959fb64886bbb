//! # Key Vault
//!
//! Where private keys live between signatures. The signing flow only needs
//! one operation, [`KeyVault::get_private_key`], so that is the whole trait;
//! a hardware or OS keychain backend can slot in behind it.
//!
//! [`PasswordVault`] is the built-in backend: each key is sealed with
//! AES-256-GCM under a key stretched from the user's password with Argon2id,
//! and stored as one JSON record per account.
//!
//! ## Errors are deliberately coarse
//!
//! A wrong password and a tampered ciphertext both come back as
//! [`VaultError::WrongPassword`]. The caller can't tell them apart and neither
//! can anyone probing the vault.

pub mod sealed;

use thiserror::Error;

use crate::crypto::{KeyError, PrivateKey};
use crate::storage::StoreError;

pub use sealed::{KdfParams, PasswordVault, SealedKeyRecord};

#[derive(Debug, Error)]
pub enum VaultError {
    #[error("wrong password or corrupted key record")]
    WrongPassword,

    #[error("no key stored for account {0}")]
    KeyNotFound(String),

    #[error("key record for account {account} is corrupt: {reason}")]
    CorruptRecord { account: String, reason: String },

    #[error("key derivation failed: {0}")]
    Kdf(String),

    #[error("encryption failed")]
    Encryption,

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("key error: {0}")]
    Key(#[from] KeyError),
}

pub type VaultResult<T> = Result<T, VaultError>;

/// Source of private keys for signing.
pub trait KeyVault: Send + Sync {
    /// Unseal the key for `account_id`.
    fn get_private_key(&self, account_id: &str, password: &str) -> VaultResult<PrivateKey>;
}
