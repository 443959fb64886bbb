//! Core value types for transactions and the outputs they spend.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// AssetType
// ---------------------------------------------------------------------------

/// What an output holds. Serialized lowercase on every wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetType {
    /// The native coin.
    #[default]
    Coin,
    /// A fungible token issued on top of the chain.
    Token,
    /// Coins bonded for staking.
    Stake,
}

impl AssetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Coin => "coin",
            AssetType::Token => "token",
            AssetType::Stake => "stake",
        }
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssetType {
    type Err = String;

    /// Case-insensitive. Backends disagree on `"COIN"` vs `"coin"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coin" => Ok(AssetType::Coin),
            "token" => Ok(AssetType::Token),
            "stake" => Ok(AssetType::Stake),
            other => Err(format!("unknown asset type {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Utxo
// ---------------------------------------------------------------------------

/// An unspent output the wallet can spend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utxo {
    pub tx_id: String,
    pub output_index: u32,
    pub address: String,
    pub amount: u64,
    #[serde(default)]
    pub asset_type: AssetType,
}

impl Utxo {
    pub fn new(
        tx_id: impl Into<String>,
        output_index: u32,
        address: impl Into<String>,
        amount: u64,
        asset_type: AssetType,
    ) -> Self {
        Self {
            tx_id: tx_id.into(),
            output_index,
            address: address.into(),
            amount,
            asset_type,
        }
    }

    /// `"<txId>_<outputIndex>"`, the identity used by locks.
    pub fn output_id(&self) -> String {
        output_id(&self.tx_id, self.output_index)
    }
}

/// Build an output id from its parts.
pub fn output_id(tx_id: &str, output_index: u32) -> String {
    format!("{tx_id}_{output_index}")
}

// ---------------------------------------------------------------------------
// Inputs & Outputs
// ---------------------------------------------------------------------------

/// A spent output, as the backend's `TxInput` struct marshals it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    #[serde(rename = "TxID")]
    pub tx_id: String,
    #[serde(rename = "OutputIndex")]
    pub output_index: u32,
    #[serde(rename = "Amount")]
    pub amount: u64,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "AssetType", default)]
    pub asset_type: AssetType,
}

impl TxInput {
    pub fn output_id(&self) -> String {
        output_id(&self.tx_id, self.output_index)
    }
}

impl From<&Utxo> for TxInput {
    fn from(utxo: &Utxo) -> Self {
        Self {
            tx_id: utxo.tx_id.clone(),
            output_index: utxo.output_index,
            amount: utxo.amount,
            address: utxo.address.clone(),
            asset_type: utxo.asset_type,
        }
    }
}

/// A new output created by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Amount")]
    pub amount: u64,
    #[serde(rename = "AssetType", default)]
    pub asset_type: AssetType,
}
