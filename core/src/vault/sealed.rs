//! Password-sealed key records.
//!
//! Record layout under `vault_key_<account>`:
//!
//! ```text
//! {
//!   "version": 1,
//!   "kdf": {"memoryKib": 19456, "iterations": 2, "parallelism": 1},
//!   "salt": "<16 bytes hex>",
//!   "ciphertext": "<nonce || AES-256-GCM(scalar) || tag, hex>",
//!   "address": "<40 hex>"
//! }
//! ```
//!
//! The account id is bound as associated data, so a record copied under a
//! different account won't open. KDF parameters travel with the record, so
//! raising the defaults later doesn't strand existing keys.

use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::{KeyVault, VaultError, VaultResult};
use crate::config::{
    vault_key, AES_KEY_LENGTH, KDF_ITERATIONS, KDF_MAX_ITERATIONS, KDF_MAX_MEMORY_KIB,
    KDF_MAX_PARALLELISM, KDF_MEMORY_KIB, KDF_PARALLELISM, KDF_SALT_LENGTH, VAULT_RECORD_VERSION,
};
use crate::crypto::encryption::{open, seal};
use crate::crypto::{derive_address, PrivateKey};
use crate::storage::KeyValueStore;

/// Argon2id cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: KDF_MEMORY_KIB,
            iterations: KDF_ITERATIONS,
            parallelism: KDF_PARALLELISM,
        }
    }
}

impl KdfParams {
    /// The cheapest parameters Argon2 accepts. Tests only.
    pub fn insecure_fast() -> Self {
        Self {
            memory_kib: 8,
            iterations: 1,
            parallelism: 1,
        }
    }

    /// Rejects costs above the configured maximums.
    fn check_limits(&self) -> Result<(), String> {
        if self.memory_kib > KDF_MAX_MEMORY_KIB {
            return Err(format!(
                "kdf memory {} KiB exceeds {KDF_MAX_MEMORY_KIB}",
                self.memory_kib
            ));
        }
        if self.iterations > KDF_MAX_ITERATIONS {
            return Err(format!(
                "kdf iterations {} exceed {KDF_MAX_ITERATIONS}",
                self.iterations
            ));
        }
        if self.parallelism > KDF_MAX_PARALLELISM {
            return Err(format!(
                "kdf parallelism {} exceeds {KDF_MAX_PARALLELISM}",
                self.parallelism
            ));
        }
        Ok(())
    }

    fn derive(
        &self,
        password: &str,
        salt: &[u8],
    ) -> VaultResult<Zeroizing<[u8; AES_KEY_LENGTH]>> {
        let params = Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(AES_KEY_LENGTH),
        )
        .map_err(|e| VaultError::Kdf(e.to_string()))?;

        let mut key = Zeroizing::new([0u8; AES_KEY_LENGTH]);
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
            .hash_password_into(password.as_bytes(), salt, &mut *key)
            .map_err(|e| VaultError::Kdf(e.to_string()))?;
        Ok(key)
    }
}

/// The stored form of one sealed key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SealedKeyRecord {
    pub version: u32,
    pub kdf: KdfParams,
    pub salt: String,
    pub ciphertext: String,
    pub address: String,
}

/// [`KeyVault`] backed by password-sealed records in a [`KeyValueStore`].
pub struct PasswordVault<S: KeyValueStore> {
    store: Arc<S>,
    params: KdfParams,
}

impl<S: KeyValueStore> PasswordVault<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self::with_params(store, KdfParams::default())
    }

    /// Use non-default KDF costs for newly sealed records.
    pub fn with_params(store: Arc<S>, params: KdfParams) -> Self {
        Self { store, params }
    }

    /// Seal `key` under `password` and store it. Replaces any existing record
    /// for the account. Returns the key's address.
    pub fn store_private_key(
        &self,
        account_id: &str,
        key: &PrivateKey,
        password: &str,
    ) -> VaultResult<String> {
        let record = self.seal_record(account_id, key, password)?;
        let address = record.address.clone();
        self.write_record(account_id, &record)?;
        info!(account = account_id, %address, "stored sealed key");
        Ok(address)
    }

    /// Re-seal an account's key under a new password.
    ///
    /// The old password must open the current record. The rewrite is a
    /// single store write, so there is no window with no usable record.
    pub fn change_password(
        &self,
        account_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> VaultResult<()> {
        let key = self.get_private_key(account_id, old_password)?;
        let record = self.seal_record(account_id, &key, new_password)?;
        self.write_record(account_id, &record)?;
        info!(account = account_id, "changed vault password");
        Ok(())
    }

    pub fn contains(&self, account_id: &str) -> VaultResult<bool> {
        Ok(self.store.get(&vault_key(account_id))?.is_some())
    }

    /// The stored address for an account, without unsealing anything.
    pub fn address(&self, account_id: &str) -> VaultResult<String> {
        Ok(self.read_record(account_id)?.address)
    }

    pub fn remove(&self, account_id: &str) -> VaultResult<()> {
        self.store.remove(&vault_key(account_id))?;
        Ok(())
    }

    fn seal_record(
        &self,
        account_id: &str,
        key: &PrivateKey,
        password: &str,
    ) -> VaultResult<SealedKeyRecord> {
        let mut salt = [0u8; KDF_SALT_LENGTH];
        rand::rngs::OsRng.fill_bytes(&mut salt);

        let wrapping_key = self.params.derive(password, &salt)?;
        let scalar = key.to_bytes();
        let ciphertext = seal(&wrapping_key, scalar.as_slice(), account_id.as_bytes())
            .map_err(|_| VaultError::Encryption)?;

        Ok(SealedKeyRecord {
            version: VAULT_RECORD_VERSION,
            kdf: self.params,
            salt: hex::encode(salt),
            ciphertext: hex::encode(ciphertext),
            address: derive_address(&key.public_key())?,
        })
    }

    fn read_record(&self, account_id: &str) -> VaultResult<SealedKeyRecord> {
        let raw = self
            .store
            .get(&vault_key(account_id))?
            .ok_or_else(|| VaultError::KeyNotFound(account_id.to_string()))?;
        let record: SealedKeyRecord =
            serde_json::from_str(&raw).map_err(|e| corrupt(account_id, e.to_string()))?;
        if record.version != VAULT_RECORD_VERSION {
            return Err(corrupt(
                account_id,
                format!("unsupported record version {}", record.version),
            ));
        }
        record.kdf.check_limits().map_err(|reason| corrupt(account_id, reason))?;
        Ok(record)
    }

    fn write_record(&self, account_id: &str, record: &SealedKeyRecord) -> VaultResult<()> {
        let raw = serde_json::to_string(record).map_err(|e| corrupt(account_id, e.to_string()))?;
        self.store.set(&vault_key(account_id), &raw)?;
        Ok(())
    }
}

impl<S: KeyValueStore> KeyVault for PasswordVault<S> {
    fn get_private_key(&self, account_id: &str, password: &str) -> VaultResult<PrivateKey> {
        let record = self.read_record(account_id)?;
        let salt = hex::decode(&record.salt).map_err(|e| corrupt(account_id, e.to_string()))?;
        let ciphertext =
            hex::decode(&record.ciphertext).map_err(|e| corrupt(account_id, e.to_string()))?;

        let wrapping_key = record.kdf.derive(password, &salt)?;
        let scalar = Zeroizing::new(
            open(&wrapping_key, &ciphertext, account_id.as_bytes())
                .map_err(|_| VaultError::WrongPassword)?,
        );
        let key = PrivateKey::from_bytes(&scalar)?;

        if derive_address(&key.public_key())? != record.address {
            return Err(corrupt(account_id, "address does not match sealed key".into()));
        }
        debug!(account = account_id, "unsealed private key");
        Ok(key)
    }
}

fn corrupt(account_id: &str, reason: String) -> VaultError {
    VaultError::CorruptRecord {
        account: account_id.to_string(),
        reason,
    }
}
