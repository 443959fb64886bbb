//! # Transaction Module
//!
//! Construction, signing, verification and normalization for Satchel
//! transactions.
//!
//! ## Architecture
//!
//! ```text
//! types.rs       : AssetType, Utxo, TxInput, TxOutput
//! builder.rs     : Transaction and the fluent TransactionBuilder
//! signing.rs     : sign_transaction with a P-256 key
//! verification.rs: TransactionError and verify_transaction
//! normalize.rs   : loosely shaped backend JSON into the typed model
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Normalize**: UTXOs from the backend go through [`normalize_utxos`].
//! 2. **Build**: [`TransactionBuilder`] checks the arithmetic and sets the ID.
//! 3. **Sign**: [`sign_transaction`] fills `PublicKey` and `Signature`.
//! 4. **Verify**: [`verify_transaction`] runs the backend's checks locally.
//! 5. **Reserve**: the wallet locks the spent outputs until the backend
//!    confirms or rejects.
//!
//! ## Design Decisions
//!
//! - Wire names are the backend's Go field names (`TxID`, `OutputIndex`, ...).
//!   The canonical codec depends on them.
//! - All amounts are `u64` in the smallest unit. No floating point anywhere.

pub mod builder;
pub mod normalize;
pub mod signing;
pub mod types;
pub mod verification;

pub use builder::{Transaction, TransactionBuilder};
pub use normalize::{
    normalize_public_key, normalize_signature, normalize_utxo, normalize_utxos, NormalizeError,
};
pub use signing::sign_transaction;
pub use types::{output_id, AssetType, TxInput, TxOutput, Utxo};
pub use verification::{verify_transaction, TransactionError};
