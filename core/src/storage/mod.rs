//! # Storage Module
//!
//! Persistence for Satchel's client-side state: lock sets, snapshots and
//! sealed keys. Nothing here knows what it is storing; every value is a
//! JSON string under a string key.
//!
//! ## Architecture
//!
//! ```text
//! store.rs      : KeyValueStore port, MemoryStore, StoreError
//! sled_store.rs : sled-backed store for the CLI and integration tests
//! journal.rs    : write-ahead journal for all-or-nothing multi-key writes
//! ```
//!
//! ## Key Layout
//!
//! | Key                      | Value                                   |
//! |--------------------------|-----------------------------------------|
//! | `utxo_locks_<account>`   | lock set `{version, lockedUtxos, ...}`  |
//! | `utxo_lock_accounts`     | JSON array of accounts holding locks    |
//! | `account_meta_<account>` | snapshot metadata                       |
//! | `account_utxos_<account>`| snapshot UTXO list                      |
//! | `vault_key_<account>`    | sealed private key record               |
//! | `__satchel_journal__`    | the one in-flight journal, if any       |
//!
//! ## Atomicity
//!
//! A single `set` is atomic in every backend we support. Anything that spans
//! two keys goes through [`StorageJournal::commit`], and every component that
//! reads persisted state runs [`StorageJournal::recover`] first.

pub mod journal;
pub mod sled_store;
pub mod store;

pub use journal::{
    Journal, JournalEntry, JournalError, JournalStatus, RecoveryOutcome, StorageJournal,
    WriteBatch,
};
pub use sled_store::SledStore;
pub use store::{KeyValueStore, MemoryStore, StoreError};
