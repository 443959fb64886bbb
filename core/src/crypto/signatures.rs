//! # Digital Signatures
//!
//! ECDSA P-256 over SHA-256, the only scheme the backend verifies.
//!
//! [`SignatureEngine`] binds a [`CanonicalCodec`] to the curve operations so
//! callers sign *objects*, not bytes. Signing always goes
//! object → canonical bytes → SHA-256 → ECDSA. If canonicalization fails, no
//! signature is produced.
//!
//! ## Determinism
//!
//! Nonces follow RFC 6979, so the same key and payload always give the same
//! `(r, s)`. The backend doesn't care, but it makes test vectors stable.
//!
//! ## Verification never errors
//!
//! [`SignatureEngine::verify`] answers `true` or `false`. A malformed public
//! key, an off-curve point, a zero signature and a bad payload are all just
//! "no". Callers don't get an oracle for why.

use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use super::address::derive_address;
use super::keys::{KeyError, PrivateKey, PublicKey, Signature};
use crate::codec::{CanonicalCodec, CodecError};

/// Errors while producing a signature.
#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("failed to canonicalize signing payload: {0}")]
    Codec(#[from] CodecError),

    #[error("key error: {0}")]
    Key(#[from] KeyError),

    #[error("ECDSA signing failed")]
    SigningFailed,
}

/// Sign and verify canonical payloads with ECDSA P-256.
///
/// # Example
///
/// ```
/// use satchel_core::crypto::{PrivateKey, SignatureEngine};
/// use serde_json::json;
///
/// let engine = SignatureEngine::default();
/// let key = PrivateKey::generate();
/// let tx = json!({"ID": "t1", "Signature": {"R": null, "S": null}});
///
/// let sig = engine.sign(&tx, &["Signature"], &key).unwrap();
/// assert!(engine.verify(&tx, &["Signature"], &sig, &key.public_key()));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SignatureEngine {
    codec: CanonicalCodec,
}

impl SignatureEngine {
    pub fn new(codec: CanonicalCodec) -> Self {
        Self { codec }
    }

    pub fn codec(&self) -> &CanonicalCodec {
        &self.codec
    }

    /// Sign the canonical form of `object` with `excluded` fields zeroed.
    pub fn sign<T: Serialize + ?Sized>(
        &self,
        object: &T,
        excluded: &[&str],
        key: &PrivateKey,
    ) -> Result<Signature, SignatureError> {
        let digest = self.codec.canonical_hash(object, excluded)?;
        let sig = sign_digest(key, &digest)?;
        debug!(digest = %hex::encode(digest), "signed canonical payload");
        Ok(sig)
    }

    /// Check `signature` against the canonical form of `object`.
    pub fn verify<T: Serialize + ?Sized>(
        &self,
        object: &T,
        excluded: &[&str],
        signature: &Signature,
        public_key: &PublicKey,
    ) -> bool {
        match self.codec.canonical_hash(object, excluded) {
            Ok(digest) => verify_digest(public_key, &digest, signature),
            Err(err) => {
                debug!(error = %err, "verification payload failed to canonicalize");
                false
            }
        }
    }

    pub fn derive_public_key(&self, key: &PrivateKey) -> PublicKey {
        key.public_key()
    }

    pub fn derive_address(&self, public_key: &PublicKey) -> Result<String, KeyError> {
        derive_address(public_key)
    }
}

/// ECDSA-sign a precomputed SHA-256 digest.
pub fn sign_digest(key: &PrivateKey, digest: &[u8; 32]) -> Result<Signature, SignatureError> {
    let sig: p256::ecdsa::Signature = key
        .signing_key()
        .sign_prehash(digest)
        .map_err(|_| SignatureError::SigningFailed)?;
    Ok(Signature::from_ecdsa(&sig))
}

/// Verify a signature over a precomputed SHA-256 digest.
pub fn verify_digest(public_key: &PublicKey, digest: &[u8; 32], signature: &Signature) -> bool {
    let Ok(verifying_key) = public_key.to_verifying_key() else {
        return false;
    };
    let Ok(sig) = signature.to_ecdsa() else {
        return false;
    };
    verifying_key.verify_prehash(digest, &sig).is_ok()
}
