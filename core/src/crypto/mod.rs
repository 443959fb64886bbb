//! # Cryptographic Primitives for Satchel
//!
//! Everything that touches key material or produces bytes the backend will
//! check lives here:
//!
//! - **ECDSA P-256 over SHA-256** for signatures, because that's what the Go
//!   backend verifies with `crypto/ecdsa`.
//! - **SHA-256** for hashing, addresses and base58check checksums.
//! - **AES-256-GCM** for sealing private keys at rest.
//!
//! ## A note on "rolling your own crypto"
//!
//! We don't. Curve arithmetic, nonce generation and AEAD all come from the
//! RustCrypto crates. This module only decides which bytes go in, and in what
//! order.

pub mod address;
pub mod base58;
pub mod encryption;
pub mod hash;
pub mod keys;
pub mod signatures;

pub use address::derive_address;
pub use base58::{base58_check_decode, base58_check_encode, base58_decode, base58_encode, Base58Error};
pub use hash::{double_sha256, sha256};
pub use keys::{KeyError, PrivateKey, PublicKey, Signature};
pub use signatures::{SignatureEngine, SignatureError};
