//! # Key and Signature Types
//!
//! Three types cross the integrity core:
//!
//! - [`PrivateKey`]: a P-256 signing scalar. Never serialized, never logged,
//!   wiped from memory on drop.
//! - [`PublicKey`]: `{Curve, X, Y}` exactly as the backend's
//!   `ecdsa.PublicKey` marshals it. Coordinates are [`BigUint`]s and travel as
//!   decimal on the JSON path.
//! - [`Signature`]: `{R, S}`, both optional. The all-null value is the zero
//!   signature the canonical codec substitutes for excluded fields.
//!
//! Every binary path (SEC1 points, raw `r || s`) goes through fixed-width
//! 32-byte big-endian encoding, so a coordinate with a leading zero byte is
//! handled the same as any other.

use num_bigint::BigUint;
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::EncodedPoint;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::bigint::{self, from_be_bytes, to_be32};
use crate::config::{
    COORDINATE_LENGTH, CURVE_NAME, SCALAR_LENGTH, UNCOMPRESSED_POINT_LENGTH,
    UNCOMPRESSED_POINT_TAG,
};

/// Errors when parsing or converting key material.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("invalid hex encoding")]
    InvalidHex,

    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Zero, or not below the curve order.
    #[error("private key scalar is out of range")]
    InvalidScalar,

    /// Wrong curve, coordinates too wide, or not a point on P-256.
    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid signature encoding")]
    InvalidSignature,
}

// ---------------------------------------------------------------------------
// PrivateKey
// ---------------------------------------------------------------------------

/// A P-256 private key.
///
/// Deliberately not `Serialize`. The only way out is [`PrivateKey::to_bytes`],
/// which hands back a buffer that wipes itself. The inner `SigningKey` zeroizes
/// its scalar on drop.
#[derive(Clone)]
pub struct PrivateKey {
    inner: SigningKey,
}

impl PrivateKey {
    /// Fresh key from the OS CSPRNG.
    pub fn generate() -> Self {
        Self {
            inner: SigningKey::random(&mut rand::rngs::OsRng),
        }
    }

    /// Parse a 32-byte big-endian scalar.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != SCALAR_LENGTH {
            return Err(KeyError::InvalidLength {
                expected: SCALAR_LENGTH,
                actual: bytes.len(),
            });
        }
        let inner = SigningKey::from_slice(bytes).map_err(|_| KeyError::InvalidScalar)?;
        Ok(Self { inner })
    }

    /// Parse a 64-character hex scalar. Surrounding whitespace is ignored.
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = Zeroizing::new(hex::decode(s.trim()).map_err(|_| KeyError::InvalidHex)?);
        Self::from_bytes(&bytes)
    }

    /// The scalar as 32 big-endian bytes, wiped when dropped.
    pub fn to_bytes(&self) -> Zeroizing<[u8; SCALAR_LENGTH]> {
        let mut out = Zeroizing::new([0u8; SCALAR_LENGTH]);
        out.copy_from_slice(&self.inner.to_bytes());
        out
    }

    /// Hex form of the scalar, wiped when dropped. For export only.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(*self.to_bytes()))
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey::from_verifying_key(self.inner.verifying_key())
    }

    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.inner
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("public_key", &self.public_key().to_hex())
            .finish_non_exhaustive()
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        // SigningKey's own comparison is constant-time.
        self.inner == other.inner
    }
}

impl Eq for PrivateKey {}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

/// A P-256 public key in the backend's wire shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    #[serde(rename = "Curve")]
    pub curve_name: String,
    #[serde(rename = "X", with = "bigint::decimal")]
    pub x: BigUint,
    #[serde(rename = "Y", with = "bigint::decimal")]
    pub y: BigUint,
}

impl PublicKey {
    pub fn new(x: BigUint, y: BigUint) -> Self {
        Self {
            curve_name: CURVE_NAME.to_string(),
            x,
            y,
        }
    }

    pub(crate) fn from_verifying_key(key: &VerifyingKey) -> Self {
        let point = key.to_encoded_point(false);
        // An uncompressed, non-identity point always has both coordinates.
        let x = point.x().map(|x| from_be_bytes(x)).unwrap_or_default();
        let y = point.y().map(|y| from_be_bytes(y)).unwrap_or_default();
        Self::new(x, y)
    }

    /// Uncompressed SEC1 bytes: `0x04 || X(32) || Y(32)`.
    pub fn to_sec1_bytes(&self) -> Result<[u8; UNCOMPRESSED_POINT_LENGTH], KeyError> {
        let x = to_be32(&self.x).map_err(|_| KeyError::InvalidPublicKey)?;
        let y = to_be32(&self.y).map_err(|_| KeyError::InvalidPublicKey)?;

        let mut out = [0u8; UNCOMPRESSED_POINT_LENGTH];
        out[0] = UNCOMPRESSED_POINT_TAG;
        out[1..1 + COORDINATE_LENGTH].copy_from_slice(&x);
        out[1 + COORDINATE_LENGTH..].copy_from_slice(&y);
        Ok(out)
    }

    /// Parse uncompressed SEC1 bytes and check the point is on the curve.
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != UNCOMPRESSED_POINT_LENGTH || bytes[0] != UNCOMPRESSED_POINT_TAG {
            return Err(KeyError::InvalidPublicKey);
        }
        let key = VerifyingKey::from_sec1_bytes(bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self::from_verifying_key(&key))
    }

    /// Hex of the uncompressed SEC1 encoding (130 characters).
    pub fn to_hex(&self) -> String {
        match self.to_sec1_bytes() {
            Ok(bytes) => hex::encode(bytes),
            Err(_) => String::new(),
        }
    }

    /// Parse the hex form produced by [`to_hex`](Self::to_hex).
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s.trim()).map_err(|_| KeyError::InvalidHex)?;
        Self::from_sec1_bytes(&bytes)
    }

    /// The curve-checked verifying key. Fails for any curve but P-256.
    pub fn to_verifying_key(&self) -> Result<VerifyingKey, KeyError> {
        if self.curve_name != CURVE_NAME {
            return Err(KeyError::InvalidPublicKey);
        }
        let bytes = self.to_sec1_bytes()?;
        let point = EncodedPoint::from_bytes(bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        VerifyingKey::from_encoded_point(&point).map_err(|_| KeyError::InvalidPublicKey)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// An ECDSA signature in the backend's wire shape.
///
/// `Signature::default()` is the zero signature: both components `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature {
    #[serde(rename = "R", with = "bigint::option_decimal", default)]
    pub r: Option<BigUint>,
    #[serde(rename = "S", with = "bigint::option_decimal", default)]
    pub s: Option<BigUint>,
}

impl Signature {
    pub fn new(r: BigUint, s: BigUint) -> Self {
        Self {
            r: Some(r),
            s: Some(s),
        }
    }

    /// `true` for the placeholder with neither component set.
    pub fn is_zero(&self) -> bool {
        self.r.is_none() && self.s.is_none()
    }

    /// Raw `r || s`, each left-padded to 32 bytes.
    pub fn to_bytes(&self) -> Result<[u8; 2 * SCALAR_LENGTH], KeyError> {
        let (Some(r), Some(s)) = (&self.r, &self.s) else {
            return Err(KeyError::InvalidSignature);
        };
        let r = to_be32(r).map_err(|_| KeyError::InvalidSignature)?;
        let s = to_be32(s).map_err(|_| KeyError::InvalidSignature)?;

        let mut out = [0u8; 2 * SCALAR_LENGTH];
        out[..SCALAR_LENGTH].copy_from_slice(&r);
        out[SCALAR_LENGTH..].copy_from_slice(&s);
        Ok(out)
    }

    /// Parse raw `r || s` (64 bytes).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyError> {
        if bytes.len() != 2 * SCALAR_LENGTH {
            return Err(KeyError::InvalidLength {
                expected: 2 * SCALAR_LENGTH,
                actual: bytes.len(),
            });
        }
        let (r, s) = bytes.split_at(SCALAR_LENGTH);
        Ok(Self::new(from_be_bytes(r), from_be_bytes(s)))
    }

    pub fn to_hex(&self) -> Result<String, KeyError> {
        self.to_bytes().map(hex::encode)
    }

    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s.trim()).map_err(|_| KeyError::InvalidHex)?;
        Self::from_bytes(&bytes)
    }

    pub(crate) fn from_ecdsa(sig: &p256::ecdsa::Signature) -> Self {
        let (r, s) = sig.split_bytes();
        Self::new(from_be_bytes(&r), from_be_bytes(&s))
    }

    pub(crate) fn to_ecdsa(&self) -> Result<p256::ecdsa::Signature, KeyError> {
        let bytes = self.to_bytes()?;
        p256::ecdsa::Signature::from_slice(&bytes).map_err(|_| KeyError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCALAR_ONE: &str = "0000000000000000000000000000000000000000000000000000000000000001";

    #[test]
    fn private_key_hex_roundtrip() {
        let key = PrivateKey::generate();
        let restored = PrivateKey::from_hex(&key.to_hex()).unwrap();
        assert_eq!(key, restored);
        assert_eq!(key.public_key(), restored.public_key());
    }

    #[test]
    fn private_key_rejects_bad_input() {
        assert_eq!(PrivateKey::from_hex("zz").unwrap_err(), KeyError::InvalidHex);
        assert_eq!(
            PrivateKey::from_hex("0102").unwrap_err(),
            KeyError::InvalidLength {
                expected: 32,
                actual: 2
            }
        );
        assert_eq!(
            PrivateKey::from_bytes(&[0u8; 32]).unwrap_err(),
            KeyError::InvalidScalar
        );
        assert_eq!(
            PrivateKey::from_bytes(&[0xFFu8; 32]).unwrap_err(),
            KeyError::InvalidScalar
        );
    }

    #[test]
    fn generator_point_for_scalar_one() {
        let key = PrivateKey::from_hex(SCALAR_ONE).unwrap();
        let pk = key.public_key();
        assert_eq!(pk.curve_name, "P-256");
        assert_eq!(
            hex::encode(to_be32(&pk.x).unwrap()),
            "6b17d1f2e12c4247f8bce6e563a440f277037d812deb33a0f4a13945d898c296"
        );
        assert_eq!(
            hex::encode(to_be32(&pk.y).unwrap()),
            "4fe342e2fe1a7f9b8ee7eb4a7c0f9e162bce33576b315ececbb6406837bf51f5"
        );
    }

    #[test]
    fn debug_does_not_leak_scalar() {
        let key = PrivateKey::from_hex(SCALAR_ONE).unwrap();
        let rendered = format!("{key:?}");
        assert!(!rendered.contains(SCALAR_ONE));
    }

    #[test]
    fn public_key_sec1_roundtrip() {
        let pk = PrivateKey::generate().public_key();
        let bytes = pk.to_sec1_bytes().unwrap();
        assert_eq!(bytes[0], 0x04);
        assert_eq!(PublicKey::from_sec1_bytes(&bytes).unwrap(), pk);
        assert_eq!(PublicKey::from_hex(&pk.to_hex()).unwrap(), pk);
    }

    #[test]
    fn public_key_rejects_off_curve_and_other_curves() {
        let off_curve = PublicKey::new(BigUint::from(1u8), BigUint::from(2u8));
        assert_eq!(
            off_curve.to_verifying_key().unwrap_err(),
            KeyError::InvalidPublicKey
        );

        let mut other = PrivateKey::generate().public_key();
        other.curve_name = "P-384".into();
        assert_eq!(other.to_verifying_key().unwrap_err(), KeyError::InvalidPublicKey);

        let mut bytes = [0u8; 65];
        bytes[0] = 0x02;
        assert!(PublicKey::from_sec1_bytes(&bytes).is_err());
    }

    #[test]
    fn public_key_wire_shape() {
        let pk = PublicKey::new(BigUint::from(12u8), BigUint::from(34u8));
        let json = serde_json::to_string(&pk).unwrap();
        assert_eq!(json, r#"{"Curve":"P-256","X":"12","Y":"34"}"#);
        let back: PublicKey = serde_json::from_str(r#"{"Curve":"P-256","X":12,"Y":"34"}"#).unwrap();
        assert_eq!(back, pk);
    }

    #[test]
    fn zero_signature_serializes_as_nulls() {
        let sig = Signature::default();
        assert!(sig.is_zero());
        assert_eq!(serde_json::to_string(&sig).unwrap(), r#"{"R":null,"S":null}"#);
        assert_eq!(sig.to_bytes().unwrap_err(), KeyError::InvalidSignature);
    }

    #[test]
    fn signature_bytes_keep_leading_zeros() {
        let mut raw = [0x11u8; 64];
        raw[0] = 0;
        raw[32] = 0;
        let sig = Signature::from_bytes(&raw).unwrap();
        assert_eq!(sig.to_bytes().unwrap(), raw);
        assert_eq!(Signature::from_hex(&sig.to_hex().unwrap()).unwrap(), sig);
    }
}
