//! Structural and cryptographic checks on a signed transaction.
//!
//! This is the client-side mirror of what the backend does on submission.
//! Running it before submitting catches a bad signature locally instead of
//! burning a round trip and a lock.

use thiserror::Error;

use super::builder::Transaction;
use crate::codec::CodecError;
use crate::config::SIGNATURE_FIELD;
use crate::crypto::{derive_address, KeyError, SignatureEngine, SignatureError};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("transaction has no inputs")]
    NoInputs,

    #[error("transaction has no outputs")]
    NoOutputs,

    #[error("output {output_id} is spent twice")]
    DuplicateInput { output_id: String },

    #[error("output {index} has a zero amount")]
    ZeroAmount { index: usize },

    #[error("amount arithmetic overflowed")]
    AmountOverflow,

    #[error("insufficient funds: inputs total {available}, outputs plus fee need {required}")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("transaction ID mismatch: expected {expected}, got {actual}")]
    IdMismatch { expected: String, actual: String },

    #[error("transaction is unsigned")]
    MissingSignature,

    #[error("transaction has no public key")]
    MissingPublicKey,

    #[error("input {index} belongs to {address}, not the signer")]
    InputNotOwned { index: usize, address: String },

    #[error("signature does not verify against the attached public key")]
    InvalidSignature,

    #[error("canonicalization failed: {0}")]
    Codec(#[from] CodecError),

    #[error("signing failed: {0}")]
    Signing(#[from] SignatureError),

    #[error("key error: {0}")]
    Key(#[from] KeyError),
}

// ---------------------------------------------------------------------------
// Verification
// ---------------------------------------------------------------------------

/// Check a signed transaction.
///
/// In order:
///
/// 1. **Shape**: at least one input and output.
/// 2. **Balance**: inputs cover outputs plus fee without overflow.
/// 3. **ID**: equals the hash of the canonical preimage.
/// 4. **Signed**: public key and non-zero signature present.
/// 5. **Ownership**: every input address is the signer's address.
/// 6. **Signature**: ECDSA over the canonical payload with `Signature` zeroed.
///
/// Returns the first failure.
pub fn verify_transaction(tx: &Transaction, engine: &SignatureEngine) -> Result<(), TransactionError> {
    if tx.inputs.is_empty() {
        return Err(TransactionError::NoInputs);
    }
    if tx.outputs.is_empty() {
        return Err(TransactionError::NoOutputs);
    }

    let available = tx.total_input().ok_or(TransactionError::AmountOverflow)?;
    let required = tx
        .total_output()
        .and_then(|total| total.checked_add(tx.fee))
        .ok_or(TransactionError::AmountOverflow)?;
    if available < required {
        return Err(TransactionError::InsufficientFunds {
            available,
            required,
        });
    }

    let expected = tx.compute_id(engine.codec())?;
    if tx.id != expected {
        return Err(TransactionError::IdMismatch {
            expected,
            actual: tx.id.clone(),
        });
    }

    let public_key = tx
        .public_key
        .as_ref()
        .ok_or(TransactionError::MissingPublicKey)?;
    if !tx.is_signed() {
        return Err(TransactionError::MissingSignature);
    }

    let signer = derive_address(public_key)?;
    if let Some((index, input)) = tx
        .inputs
        .iter()
        .enumerate()
        .find(|(_, input)| input.address != signer)
    {
        return Err(TransactionError::InputNotOwned {
            index,
            address: input.address.clone(),
        });
    }

    if !engine.verify(tx, &[SIGNATURE_FIELD], &tx.signature, public_key) {
        return Err(TransactionError::InvalidSignature);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
