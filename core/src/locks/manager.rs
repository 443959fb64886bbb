//! Per-account lock set.
//!
//! Every read loads the account's set from storage, drops expired entries,
//! and writes the swept set back before answering. There is no in-memory
//! cache to go stale; the store is the only copy.
//!
//! Writes go through the journal together with the `utxo_lock_accounts`
//! index, so the index and the sets it points at never disagree after a
//! crash.

use chrono::Duration;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

use super::types::{LockConfig, LockError, LockMode, LockOutcome, LockResult, LockSet, LockedOutput};
use crate::clock::Clock;
use crate::config::{lock_key, LOCK_ACCOUNTS_KEY, LOCK_SET_VERSION};
use crate::storage::{KeyValueStore, StorageJournal, WriteBatch};
use crate::transaction::Utxo;

/// Lock manager for one account. Obtain one from
/// [`LockRegistry::manager`](super::LockRegistry::manager).
pub struct UtxoLockManager<S: KeyValueStore> {
    account_id: String,
    journal: StorageJournal<S>,
    clock: Arc<dyn Clock>,
    config: LockConfig,
}

impl<S: KeyValueStore> UtxoLockManager<S> {
    pub(crate) fn new(
        account_id: String,
        journal: StorageJournal<S>,
        clock: Arc<dyn Clock>,
        config: LockConfig,
    ) -> Self {
        Self {
            account_id,
            journal,
            clock,
            config,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Locking
    // -----------------------------------------------------------------------

    /// Reserve `outputs` for `transaction_id`.
    ///
    /// Outputs already held are left alone: by the same transaction they are
    /// reported as `already_locked`, by another transaction (in this account
    /// or any other) as `conflicted`. In strict mode a conflict fails the call
    /// and nothing is written.
    pub fn lock_utxos(&self, outputs: &[Utxo], transaction_id: &str) -> LockResult<LockOutcome> {
        let mut current = self.load()?;
        let foreign = self.foreign_locks()?;
        let now = self.now_ms();

        let held: HashMap<String, String> = current
            .iter()
            .map(|l| (l.output_id.clone(), l.transaction_id.clone()))
            .collect();

        let mut outcome = LockOutcome::default();
        let mut fresh = Vec::new();
        let mut seen = HashSet::new();

        for utxo in outputs {
            let id = utxo.output_id();
            if !seen.insert(id.clone()) {
                continue;
            }
            let holder = held.get(&id).or_else(|| foreign.get(&id));
            match holder {
                Some(tx) if tx == transaction_id && held.contains_key(&id) => {
                    outcome.already_locked.push(id)
                }
                Some(tx) => {
                    if self.config.mode == LockMode::Strict {
                        return Err(LockError::LockConflict {
                            output_id: id,
                            held_by: tx.clone(),
                        });
                    }
                    outcome.conflicted.push(id);
                }
                None => {
                    fresh.push(LockedOutput::from_utxo(utxo, transaction_id, now));
                    outcome.locked.push(id);
                }
            }
        }

        if !fresh.is_empty() {
            current.extend(fresh);
            self.persist(&current)?;
        }

        debug!(
            account = %self.account_id,
            transaction_id,
            locked = outcome.locked.len(),
            already_locked = outcome.already_locked.len(),
            conflicted = outcome.conflicted.len(),
            "lock_utxos"
        );
        Ok(outcome)
    }

    /// Release the given outputs. Returns how many were actually locked.
    pub fn unlock_utxos<I, T>(&self, output_ids: I) -> LockResult<usize>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let ids: HashSet<String> = output_ids.into_iter().map(|s| s.as_ref().to_string()).collect();
        self.release_where(|l| ids.contains(&l.output_id))
    }

    /// Release everything held by `transaction_id`.
    pub fn unlock_by_transaction_id(&self, transaction_id: &str) -> LockResult<usize> {
        self.release_where(|l| l.transaction_id == transaction_id)
    }

    /// Release every lock in this account.
    pub fn clear_all(&self) -> LockResult<usize> {
        self.release_where(|_| true)
    }

    /// Release every lock on outputs paying `address`.
    pub fn clear_by_address(&self, address: &str) -> LockResult<usize> {
        self.release_where(|l| l.address == address)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn is_locked(&self, output_id: &str) -> LockResult<bool> {
        Ok(self.load()?.iter().any(|l| l.output_id == output_id))
    }

    pub fn is_available(&self, output_id: &str) -> LockResult<bool> {
        self.is_locked(output_id).map(|locked| !locked)
    }

    pub fn get_locked_utxo_info(&self, output_id: &str) -> LockResult<Option<LockedOutput>> {
        Ok(self.load()?.into_iter().find(|l| l.output_id == output_id))
    }

    /// Every live lock, in the order they were taken.
    pub fn locked_utxos(&self) -> LockResult<Vec<LockedOutput>> {
        self.load()
    }

    /// The subset of `utxos` not locked by this account, order preserved.
    pub fn filter_available(&self, utxos: &[Utxo]) -> LockResult<Vec<Utxo>> {
        let locked: HashSet<String> = self.load()?.into_iter().map(|l| l.output_id).collect();
        Ok(utxos
            .iter()
            .filter(|u| !locked.contains(&u.output_id()))
            .cloned()
            .collect())
    }

    /// Total locked amount, optionally only for outputs paying `address`.
    pub fn get_locked_balance(&self, address: Option<&str>) -> LockResult<u64> {
        Ok(self
            .load()?
            .iter()
            .filter(|l| address.map_or(true, |a| l.address == a))
            .fold(0u64, |acc, l| acc.saturating_add(l.amount)))
    }

    // -----------------------------------------------------------------------
    // Persistence
    // -----------------------------------------------------------------------

    fn now_ms(&self) -> i64 {
        self.clock.now().timestamp_millis()
    }

    /// Load, sweep and (if anything changed) write back.
    fn load(&self) -> LockResult<Vec<LockedOutput>> {
        let store = self.journal.store();
        let (set, repaired) = read_lock_set(&**store, &self.account_id)?;
        let now = self.now_ms();

        let before = set.len();
        let live = sweep(set, now, self.config.expiry);
        let expired = before - live.len();

        if expired > 0 || repaired {
            debug!(account = %self.account_id, expired, repaired, "persisting swept lock set");
            self.persist(&live)?;
        }
        Ok(live)
    }

    fn release_where<F: Fn(&LockedOutput) -> bool>(&self, pred: F) -> LockResult<usize> {
        let current = self.load()?;
        let before = current.len();
        let remaining: Vec<LockedOutput> = current.into_iter().filter(|l| !pred(l)).collect();
        let released = before - remaining.len();
        if released > 0 {
            self.persist(&remaining)?;
            debug!(account = %self.account_id, released, "released locks");
        }
        Ok(released)
    }

    /// Locks held by every other indexed account, ignoring expired ones.
    fn foreign_locks(&self) -> LockResult<HashMap<String, String>> {
        let store = self.journal.store();
        let now = self.now_ms();
        let mut out = HashMap::new();
        for account in read_index(&**store)? {
            if account == self.account_id {
                continue;
            }
            let (set, _) = read_lock_set(&**store, &account)?;
            for lock in sweep(set, now, self.config.expiry) {
                out.insert(lock.output_id, lock.transaction_id);
            }
        }
        Ok(out)
    }

    /// Write `locks` and keep the account index in step, in one journal.
    fn persist(&self, locks: &[LockedOutput]) -> LockResult<()> {
        let store = self.journal.store();
        let key = lock_key(&self.account_id);
        let mut index = read_index(&**store)?;
        let indexed = index.contains(&self.account_id);

        let mut batch = WriteBatch::new();
        if locks.is_empty() {
            batch = batch.remove(key);
            if indexed {
                index.remove(&self.account_id);
                batch = batch.set(LOCK_ACCOUNTS_KEY, serde_json::to_string(&index)?);
            }
        } else {
            let set = LockSet::new(locks.to_vec(), self.now_ms());
            batch = batch.set(key, serde_json::to_string(&set)?);
            if !indexed {
                index.insert(self.account_id.clone());
                batch = batch.set(LOCK_ACCOUNTS_KEY, serde_json::to_string(&index)?);
            }
        }

        self.journal.commit(batch)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Store helpers
// ---------------------------------------------------------------------------

/// Read an account's locks. Missing, corrupt or unknown-version data loads as
/// an empty set; the flag says whether the stored value needs rewriting.
pub(crate) fn read_lock_set<S: KeyValueStore + ?Sized>(
    store: &S,
    account_id: &str,
) -> LockResult<(Vec<LockedOutput>, bool)> {
    let Some(raw) = store.get(&lock_key(account_id))? else {
        return Ok((Vec::new(), false));
    };
    match serde_json::from_str::<LockSet>(&raw) {
        Ok(set) if set.version == LOCK_SET_VERSION => Ok((set.locked_utxos, false)),
        Ok(set) => {
            warn!(account = account_id, version = set.version, "unknown lock set version, resetting");
            Ok((Vec::new(), true))
        }
        Err(err) => {
            warn!(account = account_id, error = %err, "corrupt lock set, resetting");
            Ok((Vec::new(), true))
        }
    }
}

/// Accounts that currently hold a lock set. A corrupt index reads as empty.
pub(crate) fn read_index<S: KeyValueStore + ?Sized>(store: &S) -> LockResult<BTreeSet<String>> {
    let Some(raw) = store.get(LOCK_ACCOUNTS_KEY)? else {
        return Ok(BTreeSet::new());
    };
    match serde_json::from_str(&raw) {
        Ok(index) => Ok(index),
        Err(err) => {
            warn!(error = %err, "corrupt lock account index, ignoring");
            Ok(BTreeSet::new())
        }
    }
}

fn sweep(locks: Vec<LockedOutput>, now_ms: i64, expiry: Duration) -> Vec<LockedOutput> {
    locks
        .into_iter()
        .filter(|l| !l.is_expired(now_ms, expiry))
        .collect()
}
