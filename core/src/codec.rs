//! # Canonical Codec
//!
//! Turns a signable object into the exact bytes the Go backend hashes when it
//! re-verifies a signature. The backend never sees our bytes; it rebuilds its
//! own from the submitted JSON with `encoding/json`. Agreement therefore comes
//! from applying the same rules on both sides:
//!
//! 1. **Author order.** Struct fields keep their declared order. There is no
//!    global key sort; Go doesn't do one either.
//! 2. **Sorted maps.** Designated map fields (Go `map[string]T`) have their keys
//!    sorted by code point, because that's how Go emits maps.
//! 3. **Zero-value signatures.** A signature field excluded from its own payload
//!    is replaced with `{"R":null,"S":null}`. The key stays. A nil
//!    `*big.Int` pair is what the backend sees before it knows the signature.
//! 4. **Bare big integers.** Designated numeric fields (`X`, `Y`, `R`, `S`)
//!    hold quoted decimal strings in memory-side JSON; the quotes are stripped
//!    so they read as numeric literals, matching `*big.Int`'s marshaler.
//! 5. **Compact output.** No whitespace, UTF-8.
//! 6. **Integer amounts.** Backend numbers are Go integers. A float with no
//!    fractional part is written as an integer (`1.0` becomes `1`); any other
//!    float is rejected, since Go would not decode it into an integer field.
//!
//! Designated names match at any nesting depth, so a signature inside each
//! transaction input is neutralized just like a top-level one.
//!
//! ## Example
//!
//! ```
//! use satchel_core::codec::CanonicalCodec;
//! use serde_json::json;
//!
//! let codec = CanonicalCodec::default();
//! let doc = json!({
//!     "ID": "tx-1",
//!     "Metadata": {"zeta": "1", "alpha": "2"},
//!     "PublicKey": {"Curve": "P-256", "X": "12", "Y": "34"},
//!     "Signature": {"R": "5", "S": "6"},
//! });
//!
//! let bytes = codec.canonicalize(&doc, &["Signature"]).unwrap();
//! assert_eq!(
//!     String::from_utf8(bytes).unwrap(),
//!     r#"{"ID":"tx-1","Metadata":{"alpha":"2","zeta":"1"},"PublicKey":{"Curve":"P-256","X":12,"Y":34},"Signature":{"R":null,"S":null}}"#
//! );
//! ```

use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::bigint::is_canonical_decimal;
use crate::config::{
    DEFAULT_MAP_FIELDS, DEFAULT_NUMERIC_FIELDS, SIGNATURE_R_FIELD, SIGNATURE_S_FIELD,
};
use crate::crypto::hash::sha256;

/// Errors from canonicalization.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A designated field name can't be matched safely (empty, or contains a
    /// quote, backslash or control character). This is a caller bug.
    #[error("invalid designated field name {0:?}")]
    InvalidFieldName(String),

    /// A number that has no exact integer form, like `0.1` or `1e21`.
    #[error("number {0} is not an integer the backend can decode")]
    NonIntegralNumber(String),

    /// The object couldn't be turned into JSON at all.
    #[error("failed to encode signable object: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Deterministic, backend-compatible serializer for signable objects.
///
/// Configuration (map fields, numeric fields) is fixed at construction.
/// Signature fields to exclude are chosen per call, because the same object
/// can be signed by different parties over different fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalCodec {
    map_fields: BTreeSet<String>,
    numeric_fields: BTreeSet<String>,
}

/// Builder for a non-default [`CanonicalCodec`].
#[derive(Debug, Clone, Default)]
pub struct CodecBuilder {
    map_fields: Vec<String>,
    numeric_fields: Vec<String>,
}

impl CodecBuilder {
    /// Add a field whose object value gets its keys sorted.
    pub fn map_field(mut self, name: impl Into<String>) -> Self {
        self.map_fields.push(name.into());
        self
    }

    /// Add a field whose decimal string value is emitted as a bare number.
    pub fn numeric_field(mut self, name: impl Into<String>) -> Self {
        self.numeric_fields.push(name.into());
        self
    }

    /// Validate every name and build the codec.
    pub fn build(self) -> Result<CanonicalCodec, CodecError> {
        for name in self.map_fields.iter().chain(&self.numeric_fields) {
            validate_field_name(name)?;
        }
        Ok(CanonicalCodec {
            map_fields: self.map_fields.into_iter().collect(),
            numeric_fields: self.numeric_fields.into_iter().collect(),
        })
    }
}

impl Default for CanonicalCodec {
    /// The backend profile: sorted `Metadata`/`Balances`, bare `X`/`Y`/`R`/`S`.
    fn default() -> Self {
        Self {
            map_fields: DEFAULT_MAP_FIELDS.iter().map(|s| s.to_string()).collect(),
            numeric_fields: DEFAULT_NUMERIC_FIELDS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl CanonicalCodec {
    /// Start an empty configuration.
    pub fn builder() -> CodecBuilder {
        CodecBuilder::default()
    }

    pub fn map_fields(&self) -> impl Iterator<Item = &str> {
        self.map_fields.iter().map(String::as_str)
    }

    pub fn numeric_fields(&self) -> impl Iterator<Item = &str> {
        self.numeric_fields.iter().map(String::as_str)
    }

    /// Canonical bytes of `object` with every `excluded` field zeroed.
    ///
    /// The caller's object is never touched; work happens on a JSON copy.
    pub fn canonicalize<T: Serialize + ?Sized>(
        &self,
        object: &T,
        excluded: &[&str],
    ) -> Result<Vec<u8>, CodecError> {
        self.canonical_string(object, excluded).map(String::into_bytes)
    }

    /// Same as [`canonicalize`](Self::canonicalize), as a `String`.
    pub fn canonical_string<T: Serialize + ?Sized>(
        &self,
        object: &T,
        excluded: &[&str],
    ) -> Result<String, CodecError> {
        for name in excluded {
            validate_field_name(name)?;
        }

        let mut value = serde_json::to_value(object)?;
        self.neutralize(&mut value, excluded)?;
        let compact = serde_json::to_string(&value)?;
        Ok(unquote_numeric_fields(&compact, &self.numeric_fields))
    }

    /// SHA-256 of the canonical bytes. This is what gets signed.
    pub fn canonical_hash<T: Serialize + ?Sized>(
        &self,
        object: &T,
        excluded: &[&str],
    ) -> Result<[u8; 32], CodecError> {
        Ok(sha256(&self.canonicalize(object, excluded)?))
    }

    fn neutralize(&self, value: &mut Value, excluded: &[&str]) -> Result<(), CodecError> {
        match value {
            Value::Object(map) => {
                for (key, child) in map.iter_mut() {
                    if excluded.contains(&key.as_str()) {
                        *child = zero_signature();
                        continue;
                    }
                    if self.map_fields.contains(key) {
                        sort_object_keys(child);
                    }
                    self.neutralize(child, excluded)?;
                }
            }
            Value::Array(items) => {
                for item in items {
                    self.neutralize(item, excluded)?;
                }
            }
            Value::Number(n) if n.is_f64() => {
                let integral = integral_number(n)?;
                *value = integral;
            }
            _ => {}
        }
        Ok(())
    }
}

/// Largest magnitude below which every integer is exact in an f64.
const MAX_EXACT_F64_INTEGER: f64 = 9_007_199_254_740_992.0;

/// The integer form of a float-typed number, if it has one.
fn integral_number(n: &serde_json::Number) -> Result<Value, CodecError> {
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() <= MAX_EXACT_F64_INTEGER => {
            Ok(Value::from(f as i64))
        }
        _ => Err(CodecError::NonIntegralNumber(n.to_string())),
    }
}

/// `{"R":null,"S":null}`, the zero value of a signature.
pub fn zero_signature() -> Value {
    let mut map = Map::new();
    map.insert(SIGNATURE_R_FIELD.to_string(), Value::Null);
    map.insert(SIGNATURE_S_FIELD.to_string(), Value::Null);
    Value::Object(map)
}

fn validate_field_name(name: &str) -> Result<(), CodecError> {
    let bad = name.is_empty() || name.chars().any(|c| c == '"' || c == '\\' || c.is_control());
    if bad {
        return Err(CodecError::InvalidFieldName(name.to_string()));
    }
    Ok(())
}

fn sort_object_keys(value: &mut Value) {
    if let Value::Object(map) = value {
        let mut entries: Vec<(String, Value)> = std::mem::take(map).into_iter().collect();
        // String ordering is byte-wise UTF-8, which is code point order.
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        *map = entries.into_iter().collect();
    }
}

/// Index of the closing quote of the JSON string starting at `start`.
fn string_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i),
            _ => i += 1,
        }
    }
    None
}

/// Strip quotes from `"<field>":"<digits>"` pairs in compact JSON.
///
/// Tracks string boundaries, so text inside other string values is never
/// rewritten even if it happens to look like a designated pair. Only values
/// in canonical decimal form are unquoted; anything else would not be a valid
/// JSON number.
fn unquote_numeric_fields(json: &str, fields: &BTreeSet<String>) -> String {
    let bytes = json.as_bytes();
    let mut out = String::with_capacity(json.len());
    let mut numeric_key = false;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'"' {
            // Outside strings, compact JSON is ASCII. Copy up to the next string.
            let next = json[i..].find('"').map_or(bytes.len(), |off| i + off);
            for &b in &bytes[i..next] {
                if b != b':' {
                    numeric_key = false;
                }
            }
            out.push_str(&json[i..next]);
            i = next;
            continue;
        }

        let Some(end) = string_end(bytes, i) else {
            out.push_str(&json[i..]);
            break;
        };
        let inner = &json[i + 1..end];
        let is_key = bytes.get(end + 1) == Some(&b':');

        if is_key {
            numeric_key = fields.contains(inner);
            out.push_str(&json[i..=end]);
        } else if numeric_key && is_canonical_decimal(inner) {
            out.push_str(inner);
            numeric_key = false;
        } else {
            out.push_str(&json[i..=end]);
            numeric_key = false;
        }
        i = end + 1;
    }

    out
}
