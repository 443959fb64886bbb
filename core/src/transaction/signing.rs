//! Transaction signing with P-256 keys.
//!
//! Signing is separate from building because the key may not be unlocked
//! yet when the transaction is assembled. The signed payload is the whole
//! transaction in canonical form with `Signature` replaced by its zero value;
//! `PublicKey` is filled in first, so the signer's key is covered by the
//! signature it accompanies.

use super::builder::Transaction;
use super::verification::TransactionError;
use crate::config::SIGNATURE_FIELD;
use crate::crypto::{PrivateKey, SignatureEngine};

/// Sign `tx` in place and return it for chaining.
///
/// Overwrites any existing `PublicKey` and `Signature`. The ID is untouched.
pub fn sign_transaction<'a>(
    tx: &'a mut Transaction,
    key: &PrivateKey,
    engine: &SignatureEngine,
) -> Result<&'a Transaction, TransactionError> {
    tx.public_key = Some(key.public_key());
    tx.signature = engine.sign(&*tx, &[SIGNATURE_FIELD], key)?;
    Ok(tx)
}
