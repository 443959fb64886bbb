//! Lock records, configuration and outcomes.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{LOCK_EXPIRY_SECS, LOCK_SET_VERSION};
use crate::storage::{JournalError, StoreError};
use crate::transaction::{AssetType, Utxo};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum LockError {
    /// Only in [`LockMode::Strict`]. Nothing was written.
    #[error("output {output_id} is already locked by transaction {held_by}")]
    LockConflict { output_id: String, held_by: String },

    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("lock set serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type LockResult<T> = Result<T, LockError>;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One reserved output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockedOutput {
    pub output_id: String,
    pub address: String,
    pub amount: u64,
    #[serde(default)]
    pub asset_type: AssetType,
    /// Unix milliseconds.
    pub locked_at: i64,
    pub transaction_id: String,
}

impl LockedOutput {
    pub fn from_utxo(utxo: &Utxo, transaction_id: &str, locked_at: i64) -> Self {
        Self {
            output_id: utxo.output_id(),
            address: utxo.address.clone(),
            amount: utxo.amount,
            asset_type: utxo.asset_type,
            locked_at,
            transaction_id: transaction_id.to_string(),
        }
    }

    /// `true` once more than `expiry` has passed since `locked_at`.
    pub fn is_expired(&self, now_ms: i64, expiry: Duration) -> bool {
        now_ms.saturating_sub(self.locked_at) > expiry.num_milliseconds()
    }
}

/// The persisted form of one account's locks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockSet {
    pub version: u32,
    pub locked_utxos: Vec<LockedOutput>,
    /// Unix milliseconds of the last write.
    pub last_update: i64,
}

impl LockSet {
    pub fn new(locked_utxos: Vec<LockedOutput>, last_update: i64) -> Self {
        Self {
            version: LOCK_SET_VERSION,
            locked_utxos,
            last_update,
        }
    }
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What `lock_utxos` does with outputs another transaction already holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockMode {
    /// Skip them and report them in [`LockOutcome::conflicted`].
    #[default]
    Lenient,
    /// Fail the whole call with [`LockError::LockConflict`].
    Strict,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    pub expiry: Duration,
    pub mode: LockMode,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            expiry: Duration::seconds(LOCK_EXPIRY_SECS),
            mode: LockMode::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of a `lock_utxos` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockOutcome {
    /// Newly reserved by this call.
    pub locked: Vec<String>,
    /// Already held by the same transaction. Left as is.
    pub already_locked: Vec<String>,
    /// Held by a different transaction or account. Left as is.
    pub conflicted: Vec<String>,
}

impl LockOutcome {
    /// No output was held by someone else.
    pub fn is_clean(&self) -> bool {
        self.conflicted.is_empty()
    }
}
