//! # Account Snapshots
//!
//! The last known UTXO set and balance of an account, kept so the wallet can
//! show something useful before the backend answers.
//!
//! A snapshot is split across two keys: a small metadata record that is cheap
//! to read for the account list, and the full UTXO list. Both are written in
//! one journaled batch. On load, the metadata's `utxoCount` must match the
//! list; a mismatch means the halves came from different saves and the
//! snapshot is dropped instead of shown.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{snapshot_meta_key, snapshot_utxos_key};
use crate::storage::{
    JournalError, KeyValueStore, RecoveryOutcome, StorageJournal, StoreError, WriteBatch,
};
use crate::transaction::Utxo;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;

/// An account's UTXO set at a point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub account_id: String,
    pub address: String,
    pub utxos: Vec<Utxo>,
    pub balance: u64,
    pub captured_at: DateTime<Utc>,
}

impl AccountSnapshot {
    /// Build a snapshot; the balance is the saturating sum of `utxos`.
    pub fn new(
        account_id: impl Into<String>,
        address: impl Into<String>,
        utxos: Vec<Utxo>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        let balance = utxos.iter().fold(0u64, |acc, u| acc.saturating_add(u.amount));
        Self {
            account_id: account_id.into(),
            address: address.into(),
            utxos,
            balance,
            captured_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotMeta {
    account_id: String,
    address: String,
    balance: u64,
    utxo_count: usize,
    captured_at: DateTime<Utc>,
}

/// Journaled snapshot persistence.
pub struct SnapshotStore<S: KeyValueStore> {
    journal: StorageJournal<S>,
}

impl<S: KeyValueStore> SnapshotStore<S> {
    /// Open over `store`, running journal recovery first.
    pub fn open(store: Arc<S>) -> SnapshotResult<(Self, RecoveryOutcome)> {
        let journal = StorageJournal::new(store);
        let outcome = journal.recover()?;
        match &outcome {
            RecoveryOutcome::Clean => {}
            RecoveryOutcome::RollbackIncomplete { .. } => {
                warn!(?outcome, "snapshot store opened with an unresolved journal");
            }
            _ => info!(?outcome, "journal recovered while opening snapshot store"),
        }
        Ok((Self { journal }, outcome))
    }

    /// Persist both halves of `snapshot` atomically.
    pub fn save(&self, snapshot: &AccountSnapshot) -> SnapshotResult<()> {
        let meta = SnapshotMeta {
            account_id: snapshot.account_id.clone(),
            address: snapshot.address.clone(),
            balance: snapshot.balance,
            utxo_count: snapshot.utxos.len(),
            captured_at: snapshot.captured_at,
        };
        let batch = WriteBatch::new()
            .set(
                snapshot_meta_key(&snapshot.account_id),
                serde_json::to_string(&meta)?,
            )
            .set(
                snapshot_utxos_key(&snapshot.account_id),
                serde_json::to_string(&snapshot.utxos)?,
            );
        self.journal.commit(batch)?;
        debug!(account = %snapshot.account_id, utxos = meta.utxo_count, "saved snapshot");
        Ok(())
    }

    /// Load an account's snapshot. Missing or inconsistent snapshots read as
    /// `None`.
    pub fn load(&self, account_id: &str) -> SnapshotResult<Option<AccountSnapshot>> {
        let store = self.journal.store();
        let Some(raw_meta) = store.get(&snapshot_meta_key(account_id))? else {
            return Ok(None);
        };
        let meta: SnapshotMeta = match serde_json::from_str(&raw_meta) {
            Ok(meta) => meta,
            Err(err) => {
                warn!(account = account_id, error = %err, "corrupt snapshot metadata, ignoring");
                return Ok(None);
            }
        };

        let utxos: Vec<Utxo> = match store.get(&snapshot_utxos_key(account_id))? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(utxos) => utxos,
                Err(err) => {
                    warn!(account = account_id, error = %err, "corrupt snapshot UTXO list, ignoring");
                    return Ok(None);
                }
            },
            None => {
                warn!(account = account_id, "snapshot UTXO list missing, ignoring");
                return Ok(None);
            }
        };

        if utxos.len() != meta.utxo_count {
            warn!(
                account = account_id,
                expected = meta.utxo_count,
                found = utxos.len(),
                "snapshot halves disagree, ignoring"
            );
            return Ok(None);
        }

        Ok(Some(AccountSnapshot::new(
            meta.account_id,
            meta.address,
            utxos,
            meta.captured_at,
        )))
    }

    /// Remove both halves atomically.
    pub fn clear(&self, account_id: &str) -> SnapshotResult<()> {
        self.journal.commit(
            WriteBatch::new()
                .remove(snapshot_meta_key(account_id))
                .remove(snapshot_utxos_key(account_id)),
        )?;
        Ok(())
    }
}
