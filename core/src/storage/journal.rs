//! # Write-Ahead Storage Journal
//!
//! Makes a multi-key write all-or-nothing across crashes, on top of a store
//! that only promises single-key atomicity.
//!
//! ## Protocol
//!
//! ```text
//! commit(batch)
//!   1. read `before` for every key
//!   2. write {status: pending, entries} to __satchel_journal__
//!   3. apply every `after`
//!   4. rewrite the journal with status: done
//!   5. remove the journal
//! ```
//!
//! A crash anywhere in 3 leaves a pending journal; recovery puts every
//! `before` back (newest first) and the store looks like the commit never
//! started. A crash in 4 or 5 leaves either a pending journal (rolled back,
//! the write is lost but consistent) or a done journal (discarded, the write
//! stands).
//!
//! ## One slot
//!
//! There's exactly one journal slot. A commit that finds it occupied runs
//! recovery first, so an old interrupted write is always resolved before a new
//! one starts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::store::{KeyValueStore, StoreError};
use crate::config::JOURNAL_KEY;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("key {0:?} is reserved for the journal")]
    ReservedKey(String),

    #[error("journal serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A leftover journal could not be fully rolled back, so the slot is
    /// still occupied and no new commit can start.
    #[error("journal {journal_id} is still pending rollback")]
    RecoveryIncomplete { journal_id: String },

    /// The journal slot holds something that isn't a journal. Recovery
    /// handles this by clearing the slot; it never reaches callers.
    #[error("journal record is corrupt: {0}")]
    JournalCorrupt(String),
}

pub type JournalResult<T> = Result<T, JournalError>;

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One key's state before and after the logical write. `None` means absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub key: String,
    pub before: Option<String>,
    pub after: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JournalStatus {
    Pending,
    Done,
}

/// The record stored in the journal slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Journal {
    pub id: String,
    pub status: JournalStatus,
    pub started_at: DateTime<Utc>,
    pub entries: Vec<JournalEntry>,
}

/// What startup recovery found in the journal slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// Slot was empty.
    Clean,
    /// A pending journal was rolled back.
    RolledBack {
        journal_id: String,
        keys_restored: usize,
    },
    /// A completed journal was left behind and removed.
    DiscardedCompleted,
    /// The slot held garbage and was cleared.
    DiscardedCorrupt,
    /// Some keys of a pending journal could not be restored. The rest were,
    /// and the journal stays in the slot for the next attempt.
    RollbackIncomplete {
        journal_id: String,
        failed_keys: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// WriteBatch
// ---------------------------------------------------------------------------

/// A set of key writes to commit together.
///
/// Writing the same key twice keeps the last value. The journal still records
/// the key's original `before`.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<(String, Option<String>)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.push(key.into(), Some(value.into()));
        self
    }

    pub fn remove(mut self, key: impl Into<String>) -> Self {
        self.push(key.into(), None);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    fn push(&mut self, key: String, value: Option<String>) {
        match self.ops.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.ops.push((key, value)),
        }
    }
}

// ---------------------------------------------------------------------------
// StorageJournal
// ---------------------------------------------------------------------------

/// Journaled multi-key writes over a shared [`KeyValueStore`].
pub struct StorageJournal<S: KeyValueStore> {
    store: Arc<S>,
}

impl<S: KeyValueStore> Clone for StorageJournal<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<S: KeyValueStore> StorageJournal<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Apply `batch` atomically.
    ///
    /// On a failed write the keys applied so far are restored and the
    /// original error is returned. If that restore also fails, the pending
    /// journal stays in place for [`recover`](Self::recover).
    pub fn commit(&self, batch: WriteBatch) -> JournalResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        if let Some((key, _)) = batch.ops.iter().find(|(k, _)| k == JOURNAL_KEY) {
            return Err(JournalError::ReservedKey(key.clone()));
        }

        if self.store.get(JOURNAL_KEY)?.is_some() {
            let outcome = self.recover()?;
            debug!(?outcome, "resolved leftover journal before commit");
            if let RecoveryOutcome::RollbackIncomplete { journal_id, .. } = outcome {
                return Err(JournalError::RecoveryIncomplete { journal_id });
            }
        }

        let mut entries = Vec::with_capacity(batch.ops.len());
        for (key, after) in batch.ops {
            let before = self.store.get(&key)?;
            entries.push(JournalEntry { key, before, after });
        }

        let mut journal = Journal {
            id: Uuid::new_v4().to_string(),
            status: JournalStatus::Pending,
            started_at: Utc::now(),
            entries,
        };
        self.write_journal(&journal)?;
        debug!(journal_id = %journal.id, keys = journal.entries.len(), "journal pending");

        for (i, entry) in journal.entries.iter().enumerate() {
            if let Err(err) = apply(&*self.store, &entry.key, entry.after.as_deref()) {
                warn!(journal_id = %journal.id, key = %entry.key, error = %err, "journaled write failed, rolling back");
                self.abort(&journal, i + 1);
                return Err(err.into());
            }
        }

        journal.status = JournalStatus::Done;
        if let Err(err) = self.write_journal(&journal) {
            warn!(journal_id = %journal.id, error = %err, "could not mark journal done, rolling back");
            self.abort(&journal, journal.entries.len());
            return Err(err);
        }

        if let Err(err) = self.store.remove(JOURNAL_KEY) {
            // The write is complete. A leftover done journal is discarded at
            // the next recovery.
            warn!(journal_id = %journal.id, error = %err, "could not remove completed journal");
        }
        debug!(journal_id = %journal.id, "journal committed");
        Ok(())
    }

    /// Resolve whatever is in the journal slot. Run before any other read.
    pub fn recover(&self) -> JournalResult<RecoveryOutcome> {
        let Some(raw) = self.store.get(JOURNAL_KEY)? else {
            return Ok(RecoveryOutcome::Clean);
        };

        let journal = match parse_journal(&raw) {
            Ok(journal) => journal,
            Err(err) => {
                warn!(error = %err, "clearing corrupt journal");
                self.store.remove(JOURNAL_KEY)?;
                return Ok(RecoveryOutcome::DiscardedCorrupt);
            }
        };

        match journal.status {
            JournalStatus::Done => {
                self.store.remove(JOURNAL_KEY)?;
                info!(journal_id = %journal.id, "discarded completed journal");
                Ok(RecoveryOutcome::DiscardedCompleted)
            }
            JournalStatus::Pending => {
                let failed_keys = self.restore(&journal.id, &journal.entries);
                if !failed_keys.is_empty() {
                    warn!(
                        journal_id = %journal.id,
                        failed = failed_keys.len(),
                        "rollback incomplete, keeping journal for the next recovery"
                    );
                    return Ok(RecoveryOutcome::RollbackIncomplete {
                        journal_id: journal.id,
                        failed_keys,
                    });
                }
                let keys_restored = journal.entries.len();
                self.store.remove(JOURNAL_KEY)?;
                info!(journal_id = %journal.id, keys_restored, "rolled back interrupted journal");
                Ok(RecoveryOutcome::RolledBack {
                    journal_id: journal.id,
                    keys_restored,
                })
            }
        }
    }

    /// The journal currently in the slot, if any. Does not modify anything.
    pub fn pending(&self) -> JournalResult<Option<Journal>> {
        match self.store.get(JOURNAL_KEY)? {
            Some(raw) => parse_journal(&raw).map(Some),
            None => Ok(None),
        }
    }

    fn write_journal(&self, journal: &Journal) -> JournalResult<()> {
        let raw = serde_json::to_string(journal)?;
        self.store.set(JOURNAL_KEY, &raw)?;
        Ok(())
    }

    /// Put back the `before` of every entry, newest first. A key that can't
    /// be written doesn't stop the others. Returns the keys that failed.
    fn restore(&self, journal_id: &str, entries: &[JournalEntry]) -> Vec<String> {
        let mut failed = Vec::new();
        for entry in entries.iter().rev() {
            if let Err(err) = apply(&*self.store, &entry.key, entry.before.as_deref()) {
                warn!(journal_id, key = %entry.key, error = %err, "could not restore key");
                failed.push(entry.key.clone());
            }
        }
        failed
    }

    /// In-process rollback of the first `applied` entries.
    fn abort(&self, journal: &Journal, applied: usize) {
        let failed = self.restore(&journal.id, &journal.entries[..applied]);
        if failed.is_empty() {
            if let Err(err) = self.store.remove(JOURNAL_KEY) {
                warn!(journal_id = %journal.id, error = %err, "rolled back but could not clear journal");
            }
            return;
        }

        warn!(journal_id = %journal.id, failed = failed.len(), "rollback failed, leaving journal for recovery");
        // A done journal would be discarded, not rolled back.
        if journal.status == JournalStatus::Done {
            let mut pending = journal.clone();
            pending.status = JournalStatus::Pending;
            if let Err(err) = self.write_journal(&pending) {
                warn!(
                    journal_id = %journal.id,
                    error = %err,
                    "could not reset journal to pending"
                );
            }
        }
    }
}

fn apply<S: KeyValueStore + ?Sized>(
    store: &S,
    key: &str,
    value: Option<&str>,
) -> Result<(), StoreError> {
    match value {
        Some(value) => store.set(key, value),
        None => store.remove(key),
    }
}

fn parse_journal(raw: &str) -> JournalResult<Journal> {
    serde_json::from_str(raw).map_err(|e| JournalError::JournalCorrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use parking_lot::Mutex;

    /// Wraps a MemoryStore. Fails `set` on chosen keys, or every write once a
    /// write budget runs out.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        fail_on: Mutex<Vec<String>>,
        fail_after_writes: Mutex<Option<usize>>,
    }

    impl FlakyStore {
        fn fail_key(&self, key: &str) {
            self.fail_on.lock().push(key.to_string());
        }

        fn heal(&self) {
            self.fail_on.lock().clear();
            *self.fail_after_writes.lock() = None;
        }

        fn check_key(&self, key: &str) -> Result<(), StoreError> {
            if self.fail_on.lock().iter().any(|k| k == key) {
                return Err(StoreError::Unavailable(format!("write to {key} failed")));
            }
            Ok(())
        }

        fn check_budget(&self) -> Result<(), StoreError> {
            let mut budget = self.fail_after_writes.lock();
            if let Some(left) = budget.as_mut() {
                if *left == 0 {
                    return Err(StoreError::Unavailable("crash".into()));
                }
                *left -= 1;
            }
            Ok(())
        }
    }

    impl KeyValueStore for FlakyStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            self.check_key(key)?;
            self.check_budget()?;
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            self.check_budget()?;
            self.inner.remove(key)
        }
    }

    fn journal_over(store: &Arc<FlakyStore>) -> StorageJournal<FlakyStore> {
        StorageJournal::new(Arc::clone(store))
    }

    #[test]
    fn commit_applies_everything_and_clears_slot() {
        let store = Arc::new(MemoryStore::new());
        store.set("a", "old").unwrap();
        store.set("c", "gone").unwrap();

        let journal = StorageJournal::new(Arc::clone(&store));
        journal
            .commit(WriteBatch::new().set("a", "new").set("b", "fresh").remove("c"))
            .unwrap();

        assert_eq!(store.get("a").unwrap().as_deref(), Some("new"));
        assert_eq!(store.get("b").unwrap().as_deref(), Some("fresh"));
        assert_eq!(store.get("c").unwrap(), None);
        assert_eq!(store.get(JOURNAL_KEY).unwrap(), None);
    }

    #[test]
    fn empty_batch_is_a_noop() {
        let store = Arc::new(MemoryStore::new());
        StorageJournal::new(Arc::clone(&store))
            .commit(WriteBatch::new())
            .unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn reserved_key_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let err = StorageJournal::new(Arc::clone(&store))
            .commit(WriteBatch::new().set("a", "1").set(JOURNAL_KEY, "x"))
            .unwrap_err();
        assert!(matches!(err, JournalError::ReservedKey(k) if k == JOURNAL_KEY));
        assert!(store.is_empty());
    }

    #[test]
    fn batch_keeps_last_write_per_key() {
        let batch = WriteBatch::new().set("k", "1").remove("k").set("k", "2");
        assert_eq!(batch.len(), 1);

        let store = Arc::new(MemoryStore::new());
        StorageJournal::new(Arc::clone(&store)).commit(batch).unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("2"));
    }

    #[test]
    fn failed_apply_rolls_back_in_process() {
        let store = Arc::new(FlakyStore::default());
        store.inner.set("a", "a0").unwrap();
        store.inner.set("b", "b0").unwrap();
        store.fail_key("c");

        let journal = journal_over(&store);
        let err = journal
            .commit(WriteBatch::new().set("a", "a1").set("b", "b1").set("c", "c1"))
            .unwrap_err();
        assert!(matches!(err, JournalError::Store(StoreError::Unavailable(_))));

        assert_eq!(store.get("a").unwrap().as_deref(), Some("a0"));
        assert_eq!(store.get("b").unwrap().as_deref(), Some("b0"));
        assert_eq!(store.get("c").unwrap(), None);
        assert_eq!(store.get(JOURNAL_KEY).unwrap(), None);
    }

    #[test]
    fn failed_rollback_leaves_journal_for_recovery() {
        let store = Arc::new(FlakyStore::default());
        store.inner.set("a", "a0").unwrap();

        // Journal write plus "a" succeed, then every write fails.
        *store.fail_after_writes.lock() = Some(2);
        let journal = journal_over(&store);
        assert!(journal
            .commit(WriteBatch::new().set("a", "a1").set("b", "b1"))
            .is_err());

        assert_eq!(store.get("a").unwrap().as_deref(), Some("a1"));
        let pending = journal.pending().unwrap().unwrap();
        assert_eq!(pending.status, JournalStatus::Pending);

        store.heal();
        let outcome = journal.recover().unwrap();
        assert!(matches!(outcome, RecoveryOutcome::RolledBack { keys_restored: 2, .. }));
        assert_eq!(store.get("a").unwrap().as_deref(), Some("a0"));
        assert_eq!(store.get("b").unwrap(), None);
        assert_eq!(store.get(JOURNAL_KEY).unwrap(), None);
    }

    #[test]
    fn failed_done_mark_keeps_pending_journal_when_nothing_can_be_written() {
        let store = Arc::new(FlakyStore::default());
        store.inner.set("a", "a0").unwrap();

        // Journal write, "a" and "b" succeed. Marking done fails, and so does
        // every write of the rollback, including re-marking the journal.
        *store.fail_after_writes.lock() = Some(3);
        let journal = journal_over(&store);
        assert!(journal
            .commit(WriteBatch::new().set("a", "a1").set("b", "b1"))
            .is_err());

        let pending = journal.pending().unwrap().unwrap();
        assert_eq!(pending.status, JournalStatus::Pending);
        assert_eq!(store.get("a").unwrap().as_deref(), Some("a1"));

        store.heal();
        assert!(matches!(
            journal.recover().unwrap(),
            RecoveryOutcome::RolledBack { keys_restored: 2, .. }
        ));
        assert_eq!(store.get("a").unwrap().as_deref(), Some("a0"));
        assert_eq!(store.get("b").unwrap(), None);
    }

    #[test]
    fn interrupted_journal_is_rolled_back_at_recovery() {
        // Simulate a crash: journal written, one of two entries applied.
        let store = Arc::new(MemoryStore::new());
        store.set("x", "x0").unwrap();
        let interrupted = Journal {
            id: "j-1".into(),
            status: JournalStatus::Pending,
            started_at: Utc::now(),
            entries: vec![
                JournalEntry {
                    key: "x".into(),
                    before: Some("x0".into()),
                    after: Some("x1".into()),
                },
                JournalEntry {
                    key: "y".into(),
                    before: None,
                    after: Some("y1".into()),
                },
            ],
        };
        store
            .set(JOURNAL_KEY, &serde_json::to_string(&interrupted).unwrap())
            .unwrap();
        store.set("x", "x1").unwrap();

        let journal = StorageJournal::new(Arc::clone(&store));
        assert_eq!(
            journal.recover().unwrap(),
            RecoveryOutcome::RolledBack {
                journal_id: "j-1".into(),
                keys_restored: 2
            }
        );
        assert_eq!(store.get("x").unwrap().as_deref(), Some("x0"));
        assert_eq!(store.get("y").unwrap(), None);
        assert_eq!(store.get(JOURNAL_KEY).unwrap(), None);
        assert_eq!(journal.recover().unwrap(), RecoveryOutcome::Clean);
    }

    #[test]
    fn partial_rollback_restores_what_it_can_and_keeps_journal() {
        let store = Arc::new(FlakyStore::default());
        store.inner.set("a", "a1").unwrap();
        store.inner.set("b", "b1").unwrap();
        let interrupted = Journal {
            id: "j-3".into(),
            status: JournalStatus::Pending,
            started_at: Utc::now(),
            entries: vec![
                JournalEntry {
                    key: "a".into(),
                    before: Some("a0".into()),
                    after: Some("a1".into()),
                },
                JournalEntry {
                    key: "b".into(),
                    before: Some("b0".into()),
                    after: Some("b1".into()),
                },
            ],
        };
        store
            .inner
            .set(JOURNAL_KEY, &serde_json::to_string(&interrupted).unwrap())
            .unwrap();
        store.fail_key("a");

        let journal = journal_over(&store);
        assert_eq!(
            journal.recover().unwrap(),
            RecoveryOutcome::RollbackIncomplete {
                journal_id: "j-3".into(),
                failed_keys: vec!["a".into()],
            }
        );
        assert_eq!(store.get("a").unwrap().as_deref(), Some("a1"));
        assert_eq!(store.get("b").unwrap().as_deref(), Some("b0"));
        assert_eq!(journal.pending().unwrap(), Some(interrupted));

        // No new commit may overwrite the unresolved journal.
        assert!(matches!(
            journal.commit(WriteBatch::new().set("c", "1")),
            Err(JournalError::RecoveryIncomplete { journal_id }) if journal_id == "j-3"
        ));
        assert_eq!(store.get("c").unwrap(), None);

        store.heal();
        assert!(matches!(
            journal.recover().unwrap(),
            RecoveryOutcome::RolledBack { keys_restored: 2, .. }
        ));
        assert_eq!(store.get("a").unwrap().as_deref(), Some("a0"));
        assert_eq!(store.get(JOURNAL_KEY).unwrap(), None);
    }

    #[test]
    fn done_journal_is_discarded_not_rolled_back() {
        let store = Arc::new(MemoryStore::new());
        store.set("x", "x1").unwrap();
        let done = Journal {
            id: "j-2".into(),
            status: JournalStatus::Done,
            started_at: Utc::now(),
            entries: vec![JournalEntry {
                key: "x".into(),
                before: Some("x0".into()),
                after: Some("x1".into()),
            }],
        };
        store.set(JOURNAL_KEY, &serde_json::to_string(&done).unwrap()).unwrap();

        let journal = StorageJournal::new(Arc::clone(&store));
        assert_eq!(journal.recover().unwrap(), RecoveryOutcome::DiscardedCompleted);
        assert_eq!(store.get("x").unwrap().as_deref(), Some("x1"));
        assert_eq!(store.get(JOURNAL_KEY).unwrap(), None);
    }

    #[test]
    fn corrupt_journal_is_cleared() {
        let store = Arc::new(MemoryStore::new());
        store.set(JOURNAL_KEY, "{not json").unwrap();
        let journal = StorageJournal::new(Arc::clone(&store));
        assert!(matches!(journal.pending(), Err(JournalError::JournalCorrupt(_))));
        assert_eq!(journal.recover().unwrap(), RecoveryOutcome::DiscardedCorrupt);
        assert_eq!(store.get(JOURNAL_KEY).unwrap(), None);
    }

    #[test]
    fn commit_recovers_leftover_journal_first() {
        let store = Arc::new(MemoryStore::new());
        let leftover = Journal {
            id: "old".into(),
            status: JournalStatus::Pending,
            started_at: Utc::now(),
            entries: vec![JournalEntry {
                key: "x".into(),
                before: None,
                after: Some("half".into()),
            }],
        };
        store.set(JOURNAL_KEY, &serde_json::to_string(&leftover).unwrap()).unwrap();
        store.set("x", "half").unwrap();

        let journal = StorageJournal::new(Arc::clone(&store));
        journal.commit(WriteBatch::new().set("y", "1")).unwrap();

        assert_eq!(store.get("x").unwrap(), None);
        assert_eq!(store.get("y").unwrap().as_deref(), Some("1"));
        assert_eq!(store.get(JOURNAL_KEY).unwrap(), None);
    }

    #[test]
    fn journal_wire_shape() {
        let journal = Journal {
            id: "j".into(),
            status: JournalStatus::Pending,
            started_at: Utc::now(),
            entries: vec![],
        };
        let value = serde_json::to_value(&journal).unwrap();
        assert_eq!(value["status"], "pending");
        assert!(value.get("startedAt").is_some());
    }
}
