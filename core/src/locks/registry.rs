//! Entry point to the lock subsystem.
//!
//! A [`LockRegistry`] owns the store, journal, clock and configuration.
//! Opening one runs journal recovery before anything reads a lock set, then
//! hands out cheap per-account [`UtxoLockManager`]s that share all of it.

use std::sync::Arc;
use tracing::{info, warn};

use super::manager::{read_index, read_lock_set, UtxoLockManager};
use super::types::{LockConfig, LockResult, LockedOutput};
use crate::clock::{Clock, SystemClock};
use crate::storage::{KeyValueStore, RecoveryOutcome, StorageJournal};

pub struct LockRegistry<S: KeyValueStore> {
    journal: StorageJournal<S>,
    clock: Arc<dyn Clock>,
    config: LockConfig,
    recovery: RecoveryOutcome,
}

impl<S: KeyValueStore> LockRegistry<S> {
    /// Open with the wall clock and default configuration.
    pub fn open(store: Arc<S>) -> LockResult<Self> {
        Self::open_with(store, Arc::new(SystemClock), LockConfig::default())
    }

    /// Open with an explicit clock and configuration. Runs recovery first.
    pub fn open_with(store: Arc<S>, clock: Arc<dyn Clock>, config: LockConfig) -> LockResult<Self> {
        let journal = StorageJournal::new(store);
        let recovery = journal.recover()?;
        match &recovery {
            RecoveryOutcome::Clean => {}
            RecoveryOutcome::RollbackIncomplete { .. } => {
                warn!(?recovery, "lock registry opened with an unresolved journal");
            }
            _ => info!(?recovery, "journal recovered while opening lock registry"),
        }
        Ok(Self {
            journal,
            clock,
            config,
            recovery,
        })
    }

    /// What recovery did when this registry was opened.
    pub fn recovery(&self) -> &RecoveryOutcome {
        &self.recovery
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    pub fn journal(&self) -> &StorageJournal<S> {
        &self.journal
    }

    /// The lock manager for `account_id`.
    pub fn manager(&self, account_id: &str) -> UtxoLockManager<S> {
        UtxoLockManager::new(
            account_id.to_string(),
            self.journal.clone(),
            Arc::clone(&self.clock),
            self.config,
        )
    }

    /// Accounts that currently hold at least one stored lock.
    pub fn accounts(&self) -> LockResult<Vec<String>> {
        Ok(read_index(&**self.journal.store())?.into_iter().collect())
    }

    /// Find which account holds `output_id`, if any. Expired locks are
    /// swept on the way.
    pub fn find_lock(&self, output_id: &str) -> LockResult<Option<(String, LockedOutput)>> {
        for account in self.accounts()? {
            if let Some(lock) = self.manager(&account).get_locked_utxo_info(output_id)? {
                return Ok(Some((account, lock)));
            }
        }
        Ok(None)
    }

    /// Release `transaction_id` in every account. Returns the total released.
    pub fn release_transaction(&self, transaction_id: &str) -> LockResult<usize> {
        let mut released = 0;
        for account in self.accounts()? {
            released += self.manager(&account).unlock_by_transaction_id(transaction_id)?;
        }
        Ok(released)
    }

    /// Count of stored (possibly expired) locks per account, without sweeping.
    pub fn raw_counts(&self) -> LockResult<Vec<(String, usize)>> {
        let store = self.journal.store();
        self.accounts()?
            .into_iter()
            .map(|account| -> LockResult<(String, usize)> {
                let (set, _) = read_lock_set(&**store, &account)?;
                Ok((account, set.len()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{lock_key, JOURNAL_KEY};
    use crate::storage::{Journal, JournalEntry, JournalStatus, MemoryStore, StoreError};
    use crate::transaction::{AssetType, Utxo};
    use chrono::Utc;

    #[test]
    fn open_recovers_interrupted_lock_write() {
        let store = Arc::new(MemoryStore::new());
        let key = lock_key("acct");
        let half_written = Journal {
            id: "crash".into(),
            status: JournalStatus::Pending,
            started_at: Utc::now(),
            entries: vec![JournalEntry {
                key: key.clone(),
                before: None,
                after: Some(r#"{"version":1,"lockedUtxos":[],"lastUpdate":0}"#.into()),
            }],
        };
        store
            .set(JOURNAL_KEY, &serde_json::to_string(&half_written).unwrap())
            .unwrap();
        store.set(&key, "partial").unwrap();

        let registry = LockRegistry::open(Arc::clone(&store)).unwrap();
        assert!(matches!(registry.recovery(), RecoveryOutcome::RolledBack { .. }));
        assert_eq!(store.get(&key).unwrap(), None);
        assert_eq!(store.get(JOURNAL_KEY).unwrap(), None);
    }

    /// MemoryStore that refuses every write to one key.
    struct StuckKeyStore {
        inner: MemoryStore,
        stuck: String,
    }

    impl KeyValueStore for StuckKeyStore {
        fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
            if key == self.stuck {
                return Err(StoreError::Unavailable(format!("{key} is read-only")));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<(), StoreError> {
            if key == self.stuck {
                return Err(StoreError::Unavailable(format!("{key} is read-only")));
            }
            self.inner.remove(key)
        }
    }

    #[test]
    fn open_survives_rollback_that_cannot_finish() {
        let store = Arc::new(StuckKeyStore {
            inner: MemoryStore::new(),
            stuck: lock_key("bob"),
        });
        let half_written = Journal {
            id: "crash".into(),
            status: JournalStatus::Pending,
            started_at: Utc::now(),
            entries: vec![
                JournalEntry {
                    key: lock_key("alice"),
                    before: None,
                    after: Some("partial".into()),
                },
                JournalEntry {
                    key: lock_key("bob"),
                    before: None,
                    after: Some("partial".into()),
                },
            ],
        };
        store
            .inner
            .set(JOURNAL_KEY, &serde_json::to_string(&half_written).unwrap())
            .unwrap();
        store.inner.set(&lock_key("alice"), "partial").unwrap();
        store.inner.set(&lock_key("bob"), "partial").unwrap();

        let registry = LockRegistry::open(Arc::clone(&store)).unwrap();
        assert_eq!(
            registry.recovery(),
            &RecoveryOutcome::RollbackIncomplete {
                journal_id: "crash".into(),
                failed_keys: vec![lock_key("bob")],
            }
        );
        assert_eq!(store.get(&lock_key("alice")).unwrap(), None);
        assert!(store.get(JOURNAL_KEY).unwrap().is_some());
    }

    #[test]
    fn registry_level_lookup_and_release() {
        let store = Arc::new(MemoryStore::new());
        let registry = LockRegistry::open(Arc::clone(&store)).unwrap();
        assert_eq!(registry.recovery(), &RecoveryOutcome::Clean);

        let u = |tx: &str| Utxo::new(tx, 0, "a", 1, AssetType::Coin);
        registry.manager("alice").lock_utxos(&[u("t1")], "txX").unwrap();
        registry.manager("bob").lock_utxos(&[u("t2")], "txX").unwrap();
        registry.manager("bob").lock_utxos(&[u("t3")], "txY").unwrap();

        assert_eq!(registry.accounts().unwrap(), vec!["alice", "bob"]);
        let (account, lock) = registry.find_lock("t3_0").unwrap().unwrap();
        assert_eq!(account, "bob");
        assert_eq!(lock.transaction_id, "txY");
        assert!(registry.find_lock("zz_0").unwrap().is_none());

        assert_eq!(
            registry.raw_counts().unwrap(),
            vec![("alice".to_string(), 1), ("bob".to_string(), 2)]
        );
        assert_eq!(registry.release_transaction("txX").unwrap(), 2);
        assert_eq!(registry.accounts().unwrap(), vec!["bob"]);
    }
}
