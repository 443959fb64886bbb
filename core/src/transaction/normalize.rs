//! Normalization of loosely shaped backend JSON.
//!
//! Different endpoints hand back the same things under different casings:
//! `txId`, `TxID`, `tx_id`; `X` or `x`; amounts as numbers or as strings; public
//! keys as `{Curve, X, Y}` objects or as SEC1 hex. Everything is funneled into
//! the typed model here, once, so the rest of the crate never guesses at
//! field names.

use num_bigint::BigUint;
use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

use super::types::{AssetType, Utxo};
use crate::bigint;
use crate::config::CURVE_NAME;
use crate::crypto::{KeyError, PublicKey, Signature};

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("expected {expected}, found {found}")]
    UnexpectedShape {
        expected: &'static str,
        found: &'static str,
    },

    #[error("key error: {0}")]
    Key(#[from] KeyError),
}

// ---------------------------------------------------------------------------
// UTXOs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawUtxo {
    #[serde(alias = "txId", alias = "txid", alias = "TxID", alias = "TxId", alias = "transactionId")]
    tx_id: String,
    #[serde(alias = "outputIndex", alias = "OutputIndex", alias = "vout", alias = "index")]
    output_index: u32,
    #[serde(alias = "Address")]
    address: String,
    #[serde(alias = "Amount", alias = "value", deserialize_with = "lenient_amount")]
    amount: u64,
    #[serde(
        alias = "assetType",
        alias = "AssetType",
        default,
        deserialize_with = "lenient_asset_type"
    )]
    asset_type: AssetType,
}

/// Parse one UTXO record in any of the casings the backend uses.
pub fn normalize_utxo(value: &Value) -> Result<Utxo, NormalizeError> {
    let raw = RawUtxo::deserialize(value)?;
    Ok(Utxo {
        tx_id: raw.tx_id,
        output_index: raw.output_index,
        address: raw.address,
        amount: raw.amount,
        asset_type: raw.asset_type,
    })
}

/// Parse a UTXO list: a bare array, or an object wrapping one under
/// `utxos`/`UTXOs`/`data`.
pub fn normalize_utxos(value: &Value) -> Result<Vec<Utxo>, NormalizeError> {
    let list = match value {
        Value::Array(items) => items,
        Value::Object(map) => match ["utxos", "UTXOs", "Utxos", "data"]
            .iter()
            .find_map(|k| map.get(*k))
        {
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(NormalizeError::UnexpectedShape {
                    expected: "an array of UTXOs",
                    found: kind(other),
                })
            }
            None => {
                return Err(NormalizeError::UnexpectedShape {
                    expected: "an array of UTXOs",
                    found: "an object without a UTXO list",
                })
            }
        },
        other => {
            return Err(NormalizeError::UnexpectedShape {
                expected: "an array of UTXOs",
                found: kind(other),
            })
        }
    };
    list.iter().map(normalize_utxo).collect()
}

// ---------------------------------------------------------------------------
// Public keys & signatures
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawPublicKey {
    #[serde(alias = "Curve", alias = "curveName", alias = "CurveName", default)]
    curve: Option<String>,
    #[serde(alias = "X", with = "bigint::decimal")]
    x: BigUint,
    #[serde(alias = "Y", with = "bigint::decimal")]
    y: BigUint,
}

/// Parse a public key from a `{Curve, X, Y}` object (any casing, decimal
/// coordinates as strings or numbers) or an uncompressed SEC1 hex string.
///
/// A missing curve name is taken to be P-256.
pub fn normalize_public_key(value: &Value) -> Result<PublicKey, NormalizeError> {
    match value {
        Value::String(hex) => Ok(PublicKey::from_hex(hex)?),
        Value::Object(_) => {
            let raw = RawPublicKey::deserialize(value)?;
            Ok(PublicKey {
                curve_name: raw.curve.unwrap_or_else(|| CURVE_NAME.to_string()),
                x: raw.x,
                y: raw.y,
            })
        }
        other => Err(NormalizeError::UnexpectedShape {
            expected: "a public key object or hex string",
            found: kind(other),
        }),
    }
}

#[derive(Deserialize)]
struct RawSignature {
    #[serde(alias = "R", with = "bigint::option_decimal", default)]
    r: Option<BigUint>,
    #[serde(alias = "S", with = "bigint::option_decimal", default)]
    s: Option<BigUint>,
}

/// Parse a signature from an `{R, S}` object (any casing), a raw `r || s` hex
/// string, or `null` (the zero signature).
pub fn normalize_signature(value: &Value) -> Result<Signature, NormalizeError> {
    match value {
        Value::Null => Ok(Signature::default()),
        Value::String(hex) => Ok(Signature::from_hex(hex)?),
        Value::Object(_) => {
            let raw = RawSignature::deserialize(value)?;
            Ok(Signature { r: raw.r, s: raw.s })
        }
        other => Err(NormalizeError::UnexpectedShape {
            expected: "a signature object or hex string",
            found: kind(other),
        }),
    }
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a non-negative integer amount, as a number or a string")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
        Ok(v)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
        u64::try_from(v).map_err(|_| E::custom(format!("negative amount {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
        let trimmed = v.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(E::custom(format!("invalid amount {v:?}")));
        }
        trimmed
            .parse()
            .map_err(|_| E::custom(format!("amount {v:?} does not fit in 64 bits")))
    }
}

fn lenient_amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    deserializer.deserialize_any(AmountVisitor)
}

fn lenient_asset_type<'de, D: Deserializer<'de>>(deserializer: D) -> Result<AssetType, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        Some(s) => s.parse().map_err(de::Error::custom),
        None => Ok(AssetType::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::PrivateKey;
    use serde_json::json;

    #[test]
    fn utxo_casings_agree() {
        let expected = Utxo::new("t1", 2, "addr", 500, AssetType::Token);
        let shapes = [
            json!({"txId": "t1", "outputIndex": 2, "address": "addr", "amount": 500, "assetType": "token"}),
            json!({"TxID": "t1", "OutputIndex": 2, "Address": "addr", "Amount": "500", "AssetType": "TOKEN"}),
            json!({"tx_id": "t1", "vout": 2, "address": "addr", "value": " 500 ", "asset_type": "Token"}),
        ];
        for shape in &shapes {
            assert_eq!(normalize_utxo(shape).unwrap(), expected, "{shape}");
        }
    }

    #[test]
    fn asset_type_defaults_to_coin() {
        let utxo = normalize_utxo(&json!({"txid": "t", "index": 0, "address": "a", "amount": 1})).unwrap();
        assert_eq!(utxo.asset_type, AssetType::Coin);
        let null_asset =
            normalize_utxo(&json!({"txid": "t", "index": 0, "address": "a", "amount": 1, "assetType": null}))
                .unwrap();
        assert_eq!(null_asset.asset_type, AssetType::Coin);
    }

    #[test]
    fn bad_amounts_are_rejected() {
        for amount in [json!(-1), json!("1.5"), json!("abc"), json!("99999999999999999999999"), json!(1.5)] {
            let record = json!({"txId": "t", "outputIndex": 0, "address": "a", "amount": amount});
            assert!(normalize_utxo(&record).is_err(), "accepted {amount}");
        }
    }

    #[test]
    fn utxo_list_wrappers() {
        let item = json!({"txId": "t", "outputIndex": 0, "address": "a", "amount": 1});
        assert_eq!(normalize_utxos(&json!([item.clone()])).unwrap().len(), 1);
        assert_eq!(normalize_utxos(&json!({"utxos": [item.clone(), item.clone()]})).unwrap().len(), 2);
        assert_eq!(normalize_utxos(&json!({"data": []})).unwrap().len(), 0);
        assert!(normalize_utxos(&json!({"other": []})).is_err());
        assert!(normalize_utxos(&json!("nope")).is_err());
    }

    #[test]
    fn public_key_shapes() {
        let pk = PrivateKey::generate().public_key();
        let x = bigint::to_decimal(&pk.x);
        let y = bigint::to_decimal(&pk.y);

        let upper = json!({"Curve": "P-256", "X": x, "Y": y});
        let lower = json!({"curveName": "P-256", "x": x, "y": y});
        let no_curve = json!({"x": x, "y": y});
        let hex = json!(pk.to_hex());

        for shape in [&upper, &lower, &no_curve, &hex] {
            assert_eq!(normalize_public_key(shape).unwrap(), pk);
        }
        assert!(normalize_public_key(&json!(12)).is_err());
        assert!(normalize_public_key(&json!("04zz")).is_err());
    }

    #[test]
    fn signature_shapes() {
        let sig = Signature::new(BigUint::from(7u8), BigUint::from(9u8));
        assert_eq!(normalize_signature(&json!({"R": "7", "S": 9})).unwrap(), sig);
        assert_eq!(normalize_signature(&json!({"r": 7, "s": "9"})).unwrap(), sig);
        assert_eq!(normalize_signature(&json!(sig.to_hex().unwrap())).unwrap(), sig);
        assert!(normalize_signature(&Value::Null).unwrap().is_zero());
        assert!(normalize_signature(&json!({"R": null, "S": null})).unwrap().is_zero());
        assert!(normalize_signature(&json!([1, 2])).is_err());
    }
}
