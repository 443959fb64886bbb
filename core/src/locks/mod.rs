//! # UTXO Locks
//!
//! Between "signed" and "confirmed" a transaction's inputs are still unspent
//! as far as the backend's UTXO list is concerned. Without a reservation the
//! wallet would happily offer the same outputs to the next transaction and
//! the backend would reject it as a double-spend.
//!
//! Each output moves `Free -> Locked -> Free`:
//!
//! - **Locked** by [`UtxoLockManager::lock_utxos`] when a transaction is about
//!   to be submitted.
//! - **Freed** on confirmation or rejection (release by transaction id), by
//!   an explicit unlock or clear, or silently once the lock is older than the
//!   expiry window (24 hours by default).
//!
//! Locks are a client-side courtesy. The backend stays the authority on
//! spend status, so damaged lock state is reset and logged, never fatal.

pub mod manager;
pub mod registry;
pub mod types;

pub use manager::UtxoLockManager;
pub use registry::LockRegistry;
pub use types::{LockConfig, LockError, LockMode, LockOutcome, LockResult, LockSet, LockedOutput};
