//! Transaction construction via the builder pattern.
//!
//! [`TransactionBuilder`] collects inputs and outputs, checks the arithmetic,
//! and hands back an unsigned [`Transaction`] whose ID is already computed.
//! Signing happens separately in [`super::signing`], so construction stays
//! testable without key material.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use super::types::{AssetType, TxInput, TxOutput, Utxo};
use super::verification::TransactionError;
use crate::codec::{CanonicalCodec, CodecError};
use crate::crypto::{PublicKey, Signature};

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A transfer, shaped exactly like the backend's `Transaction` struct.
///
/// Field order is the signing order. Don't reorder fields here without the
/// backend doing the same.
///
/// The ID is `hex(SHA-256(canonical {Inputs, Outputs, Fee, Timestamp}))`, so it
/// is fixed at build time and signing doesn't change it. `Metadata` is a map
/// field: the codec sorts its keys, so `HashMap` iteration order never leaks
/// into the signed bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Inputs")]
    pub inputs: Vec<TxInput>,
    #[serde(rename = "Outputs")]
    pub outputs: Vec<TxOutput>,
    #[serde(rename = "Fee")]
    pub fee: u64,
    /// Unix milliseconds.
    #[serde(rename = "Timestamp")]
    pub timestamp: i64,
    #[serde(rename = "Metadata", default)]
    pub metadata: HashMap<String, String>,
    #[serde(rename = "PublicKey", default)]
    pub public_key: Option<PublicKey>,
    #[serde(rename = "Signature", default)]
    pub signature: Signature,
}

/// The fields an ID commits to.
#[derive(Serialize)]
struct IdPreimage<'a> {
    #[serde(rename = "Inputs")]
    inputs: &'a [TxInput],
    #[serde(rename = "Outputs")]
    outputs: &'a [TxOutput],
    #[serde(rename = "Fee")]
    fee: u64,
    #[serde(rename = "Timestamp")]
    timestamp: i64,
}

impl Transaction {
    /// Recompute the ID from the current inputs, outputs, fee and timestamp.
    pub fn compute_id(&self, codec: &CanonicalCodec) -> Result<String, CodecError> {
        let preimage = IdPreimage {
            inputs: &self.inputs,
            outputs: &self.outputs,
            fee: self.fee,
            timestamp: self.timestamp,
        };
        Ok(hex::encode(codec.canonical_hash(&preimage, &[])?))
    }

    pub fn is_signed(&self) -> bool {
        !self.signature.is_zero()
    }

    /// Ids (`txId_index`) of every output this transaction spends.
    pub fn spent_output_ids(&self) -> Vec<String> {
        self.inputs.iter().map(TxInput::output_id).collect()
    }

    /// Sum of input amounts, `None` on overflow.
    pub fn total_input(&self) -> Option<u64> {
        self.inputs.iter().try_fold(0u64, |acc, i| acc.checked_add(i.amount))
    }

    /// Sum of output amounts, `None` on overflow.
    pub fn total_output(&self) -> Option<u64> {
        self.outputs.iter().try_fold(0u64, |acc, o| acc.checked_add(o.amount))
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for unsigned transactions.
///
/// ```
/// use satchel_core::transaction::{AssetType, TransactionBuilder, Utxo};
///
/// let utxo = Utxo::new("txA", 0, "aa".repeat(20), 1_000, AssetType::Coin);
/// let tx = TransactionBuilder::new()
///     .input(&utxo)
///     .output("bb".repeat(20), 900, AssetType::Coin)
///     .fee(100)
///     .timestamp(1_700_000_000_000)
///     .build()
///     .unwrap();
///
/// assert_eq!(tx.id.len(), 64);
/// assert!(!tx.is_signed());
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransactionBuilder {
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    fee: u64,
    timestamp: Option<i64>,
    metadata: HashMap<String, String>,
    change_address: Option<String>,
    codec: CanonicalCodec,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a non-default codec for the ID.
    pub fn codec(mut self, codec: CanonicalCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Spend `utxo`.
    pub fn input(mut self, utxo: &Utxo) -> Self {
        self.inputs.push(TxInput::from(utxo));
        self
    }

    pub fn inputs<'a>(mut self, utxos: impl IntoIterator<Item = &'a Utxo>) -> Self {
        self.inputs.extend(utxos.into_iter().map(TxInput::from));
        self
    }

    pub fn output(mut self, address: impl Into<String>, amount: u64, asset_type: AssetType) -> Self {
        self.outputs.push(TxOutput {
            address: address.into(),
            amount,
            asset_type,
        });
        self
    }

    pub fn fee(mut self, fee: u64) -> Self {
        self.fee = fee;
        self
    }

    /// Unix milliseconds. Defaults to now at build time.
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Send any surplus (inputs minus outputs minus fee) back here.
    ///
    /// The change output takes the asset type of the first input.
    pub fn change_address(mut self, address: impl Into<String>) -> Self {
        self.change_address = Some(address.into());
        self
    }

    /// Validate and produce an unsigned transaction with its ID set.
    pub fn build(mut self) -> Result<Transaction, TransactionError> {
        if self.inputs.is_empty() {
            return Err(TransactionError::NoInputs);
        }
        if self.outputs.is_empty() {
            return Err(TransactionError::NoOutputs);
        }

        let mut seen = HashSet::new();
        for input in &self.inputs {
            let id = input.output_id();
            if !seen.insert(id.clone()) {
                return Err(TransactionError::DuplicateInput { output_id: id });
            }
        }

        if let Some(index) = self.outputs.iter().position(|o| o.amount == 0) {
            return Err(TransactionError::ZeroAmount { index });
        }

        let available = self
            .inputs
            .iter()
            .try_fold(0u64, |acc, i| acc.checked_add(i.amount))
            .ok_or(TransactionError::AmountOverflow)?;
        let required = self
            .outputs
            .iter()
            .try_fold(self.fee, |acc, o| acc.checked_add(o.amount))
            .ok_or(TransactionError::AmountOverflow)?;
        if available < required {
            return Err(TransactionError::InsufficientFunds {
                available,
                required,
            });
        }

        let surplus = available - required;
        if surplus > 0 {
            if let Some(address) = self.change_address.take() {
                self.outputs.push(TxOutput {
                    address,
                    amount: surplus,
                    asset_type: self.inputs[0].asset_type,
                });
            }
        }

        let mut tx = Transaction {
            id: String::new(),
            inputs: self.inputs,
            outputs: self.outputs,
            fee: self.fee,
            timestamp: self
                .timestamp
                .unwrap_or_else(|| Utc::now().timestamp_millis()),
            metadata: self.metadata,
            public_key: None,
            signature: Signature::default(),
        };
        tx.id = tx.compute_id(&self.codec)?;
        Ok(tx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
