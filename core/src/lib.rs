// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Satchel: Transaction Integrity Core
//!
//! The part of the Satchel wallet that has to be right. The UI can be wrong
//! about a color; this crate cannot be wrong about a byte.
//!
//! Satchel talks to a Go backend that independently rebuilds every signed
//! payload and checks the signature against its own bytes. One reordered key,
//! one quoted integer, one missing placeholder field and the backend rejects
//! the transaction. So the client carries its own integrity machinery:
//!
//! - **codec**: Canonical serialization. The exact bytes the backend hashes.
//! - **crypto**: ECDSA P-256 over SHA-256, addresses, base58check.
//! - **storage**: Key-value persistence port plus a write-ahead journal that
//!   makes multi-key writes all-or-nothing across crashes.
//! - **locks**: UTXO reservations for in-flight transactions, so the same
//!   output is never offered twice before the first spend confirms.
//! - **vault**: Password-sealed private keys behind the `KeyVault` trait.
//! - **transaction**: Typed transactions, builder, signing, verification and
//!   the normalization step for loosely shaped backend JSON.
//! - **snapshot**: Journaled account snapshots.
//! - **wallet**: Session glue that signs a transaction and reserves its inputs.
//! - **config**: Every constant lives here.
//!
//! ## Data flow
//!
//! ```text
//! Transaction ─► CanonicalCodec ─► SHA-256 ─► ECDSA P-256 ─► Signature
//!      │
//!      └─► UtxoLockManager ─► StorageJournal ─► KeyValueStore
//! ```
//!
//! ## Ground rules
//!
//! 1. The backend is the authority on spend status. Locks are a client-side
//!    courtesy, and corrupt lock state is repaired, never fatal.
//! 2. A signature is never produced from a payload that failed to canonicalize.
//! 3. Recovery runs before anything else reads persisted state.
//! 4. Key material is never logged.

pub mod bigint;
pub mod clock;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod locks;
pub mod snapshot;
pub mod storage;
pub mod transaction;
pub mod vault;
pub mod wallet;

pub use codec::{CanonicalCodec, CodecError};
pub use crypto::{PrivateKey, PublicKey, Signature, SignatureEngine};
pub use locks::{LockRegistry, LockedOutput, UtxoLockManager};
pub use storage::{KeyValueStore, MemoryStore, SledStore, StorageJournal};
pub use transaction::{AssetType, Transaction, TransactionBuilder, Utxo};
pub use wallet::WalletSession;
