//! # Big Integers at the Wire Boundary
//!
//! Curve coordinates and signature scalars are 256-bit numbers. In memory they
//! are always [`BigUint`]. They leave memory in exactly two shapes:
//!
//! - **Decimal digits** on the JSON path, because the backend's `*big.Int`
//!   marshals as a bare decimal literal.
//! - **Fixed-width, left-zero-padded big-endian bytes** on every binary path
//!   (SEC1 points, ECDSA scalars). A coordinate with a leading zero byte is
//!   still 32 bytes; dropping that byte breaks addresses and signatures on
//!   roughly one key in 256.
//!
//! The serde helpers (`decimal`, `option_decimal`) serialize as quoted decimal
//! strings. The canonical codec strips those quotes for designated fields.

use num_bigint::BigUint;
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};
use std::fmt;
use thiserror::Error;

/// Errors converting between big integers and their external forms.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BigIntError {
    #[error("value needs {needed} bytes but the target width is {width}")]
    Overflow { needed: usize, width: usize },

    #[error("invalid decimal integer: {0:?}")]
    InvalidDecimal(String),
}

/// Encode `value` as exactly `width` big-endian bytes, left-padded with zeros.
pub fn to_fixed_be(value: &BigUint, width: usize) -> Result<Vec<u8>, BigIntError> {
    let mut out = vec![0u8; width];
    if value.bits() == 0 {
        return Ok(out);
    }
    let bytes = value.to_bytes_be();
    if bytes.len() > width {
        return Err(BigIntError::Overflow {
            needed: bytes.len(),
            width,
        });
    }
    out[width - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

/// Fixed 32-byte form, the width of every P-256 scalar and coordinate.
pub fn to_be32(value: &BigUint) -> Result<[u8; 32], BigIntError> {
    let bytes = to_fixed_be(value, 32)?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Interpret big-endian bytes (any width, leading zeros allowed).
pub fn from_be_bytes(bytes: &[u8]) -> BigUint {
    BigUint::from_bytes_be(bytes)
}

/// Decimal digits with no sign, separators, or leading zeros.
pub fn to_decimal(value: &BigUint) -> String {
    value.to_str_radix(10)
}

/// Parse a string of ASCII decimal digits.
///
/// Stricter than `BigUint::from_str`: no `+`, no `_` separators, no
/// whitespace. Leading zeros are accepted on input.
pub fn from_decimal(s: &str) -> Result<BigUint, BigIntError> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(BigIntError::InvalidDecimal(s.to_string()));
    }
    BigUint::parse_bytes(s.as_bytes(), 10).ok_or_else(|| BigIntError::InvalidDecimal(s.to_string()))
}

/// `true` if `s` is exactly how [`to_decimal`] would print some integer.
pub fn is_canonical_decimal(s: &str) -> bool {
    match s.as_bytes() {
        [] => false,
        [b'0'] => true,
        [b'0', ..] => false,
        digits => digits.iter().all(u8::is_ascii_digit),
    }
}

struct DecimalVisitor;

impl<'de> Visitor<'de> for DecimalVisitor {
    type Value = BigUint;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an unsigned integer or a string of decimal digits")
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<BigUint, E> {
        Ok(BigUint::from(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<BigUint, E> {
        u64::try_from(v)
            .map(BigUint::from)
            .map_err(|_| E::custom(format!("negative integer {v}")))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<BigUint, E> {
        from_decimal(v).map_err(E::custom)
    }
}

/// Serde adapter: `BigUint` as a quoted decimal string.
///
/// Accepts either a decimal string or a JSON integer when deserializing.
pub mod decimal {
    use super::*;

    pub fn serialize<S: Serializer>(value: &BigUint, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&to_decimal(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<BigUint, D::Error> {
        deserializer.deserialize_any(DecimalVisitor)
    }
}

/// Serde adapter: `Option<BigUint>` as a quoted decimal string or `null`.
///
/// `None` always serializes as an explicit `null`; the key never disappears.
pub mod option_decimal {
    use super::*;

    struct OptionVisitor;

    impl<'de> Visitor<'de> for OptionVisitor {
        type Value = Option<BigUint>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("null or a decimal integer")
        }

        fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(DecimalVisitor).map(Some)
        }
    }

    pub fn serialize<S: Serializer>(
        value: &Option<BigUint>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&to_decimal(v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<BigUint>, D::Error> {
        deserializer.deserialize_option(OptionVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Wrapper {
        #[serde(with = "decimal")]
        value: BigUint,
        #[serde(with = "option_decimal", default)]
        maybe: Option<BigUint>,
    }

    #[test]
    fn fixed_width_pads_on_the_left() {
        let v = BigUint::from(0x0102u32);
        assert_eq!(to_fixed_be(&v, 4).unwrap(), vec![0, 0, 1, 2]);
    }

    #[test]
    fn zero_is_all_zero_bytes() {
        assert_eq!(to_fixed_be(&BigUint::from(0u8), 3).unwrap(), vec![0, 0, 0]);
        assert_eq!(to_be32(&BigUint::from(0u8)).unwrap(), [0u8; 32]);
    }

    #[test]
    fn too_wide_is_rejected() {
        let v = BigUint::from(1u8) << 256;
        assert_eq!(
            to_be32(&v),
            Err(BigIntError::Overflow {
                needed: 33,
                width: 32
            })
        );
    }

    #[test]
    fn leading_zero_coordinate_keeps_width() {
        // A coordinate whose top byte is zero must still encode as 32 bytes.
        let mut bytes = [0xABu8; 32];
        bytes[0] = 0;
        let v = from_be_bytes(&bytes);
        assert_eq!(v.to_bytes_be().len(), 31);
        assert_eq!(to_be32(&v).unwrap(), bytes);
    }

    #[test]
    fn decimal_beyond_u64() {
        let s = "115792089210356248762697446949407573529996955224135760342422259061068512044369";
        let v = from_decimal(s).unwrap();
        assert!(v.bits() > 64);
        assert_eq!(to_decimal(&v), s);
    }

    #[test]
    fn decimal_rejects_junk() {
        for bad in ["", "+1", "1_000", " 12", "12 ", "0x10", "-5", "1.5"] {
            assert!(from_decimal(bad).is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn canonical_decimal_detection() {
        assert!(is_canonical_decimal("0"));
        assert!(is_canonical_decimal("1234567890"));
        assert!(!is_canonical_decimal("007"));
        assert!(!is_canonical_decimal(""));
        assert!(!is_canonical_decimal("12a"));
    }

    #[test]
    fn serde_writes_strings_and_reads_both_forms() {
        let w = Wrapper {
            value: BigUint::from(42u8),
            maybe: None,
        };
        let json = serde_json::to_string(&w).unwrap();
        assert_eq!(json, r#"{"value":"42","maybe":null}"#);

        let from_number: Wrapper = serde_json::from_str(r#"{"value":42,"maybe":7}"#).unwrap();
        assert_eq!(from_number.value, BigUint::from(42u8));
        assert_eq!(from_number.maybe, Some(BigUint::from(7u8)));

        let missing: Wrapper = serde_json::from_str(r#"{"value":"1"}"#).unwrap();
        assert_eq!(missing.maybe, None);
    }

    #[test]
    fn serde_rejects_negative_numbers() {
        assert!(serde_json::from_str::<Wrapper>(r#"{"value":-1}"#).is_err());
    }

    proptest! {
        #[test]
        fn prop_fixed_width_roundtrip(bytes in proptest::collection::vec(any::<u8>(), 0..=32)) {
            let v = from_be_bytes(&bytes);
            let fixed = to_be32(&v).unwrap();
            prop_assert_eq!(from_be_bytes(&fixed), v);
            // The padded form ends with the significant input bytes.
            let significant: Vec<u8> = bytes.iter().copied().skip_while(|b| *b == 0).collect();
            prop_assert_eq!(&fixed[32 - significant.len()..], significant.as_slice());
        }

        #[test]
        fn prop_decimal_roundtrip(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
            let v = from_be_bytes(&bytes);
            let s = to_decimal(&v);
            prop_assert!(is_canonical_decimal(&s));
            prop_assert_eq!(from_decimal(&s).unwrap(), v);
        }
    }
}
