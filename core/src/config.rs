//! # Constants & Storage Layout
//!
//! Every magic number in Satchel lives here. Several of them are shared with
//! the backend verifier (curve name, numeric field names, address length), so
//! changing one is a protocol change, not a refactor.

use std::time::Duration;

// ---------------------------------------------------------------------------
// Curve & Key Parameters
// ---------------------------------------------------------------------------

/// Curve name as the Go backend reports it (`elliptic.P256().Params().Name`).
pub const CURVE_NAME: &str = "P-256";

/// P-256 scalars (private keys, signature `r`/`s`) are 32 bytes big-endian.
pub const SCALAR_LENGTH: usize = 32;

/// P-256 affine coordinates are 32 bytes big-endian.
pub const COORDINATE_LENGTH: usize = 32;

/// SEC1 tag for an uncompressed point.
pub const UNCOMPRESSED_POINT_TAG: u8 = 0x04;

/// Tag byte plus two coordinates.
pub const UNCOMPRESSED_POINT_LENGTH: usize = 1 + 2 * COORDINATE_LENGTH;

/// Addresses are the first 40 hex characters (20 bytes) of
/// `SHA-256(uncompressed point)`.
pub const ADDRESS_HEX_LENGTH: usize = 40;

/// Base58check appends the first four bytes of a double SHA-256.
pub const BASE58_CHECKSUM_LENGTH: usize = 4;

// ---------------------------------------------------------------------------
// Canonical Encoding
// ---------------------------------------------------------------------------

/// Field holding a transaction's own signature. Zeroed before hashing.
pub const SIGNATURE_FIELD: &str = "Signature";

/// Map fields the backend serializes with sorted keys (Go maps).
pub const DEFAULT_MAP_FIELDS: &[&str] = &["Metadata", "Balances"];

/// Big-integer fields the backend serializes as bare numbers (`*big.Int`).
pub const DEFAULT_NUMERIC_FIELDS: &[&str] = &["X", "Y", "R", "S"];

/// Wire names of the signature components.
pub const SIGNATURE_R_FIELD: &str = "R";
pub const SIGNATURE_S_FIELD: &str = "S";

// ---------------------------------------------------------------------------
// UTXO Locks
// ---------------------------------------------------------------------------

/// Lock expiry in seconds. Orphaned locks from crashed flows heal after this.
pub const LOCK_EXPIRY_SECS: i64 = 24 * 60 * 60;

/// Lock expiry as a `Duration`. Keep in sync with [`LOCK_EXPIRY_SECS`].
pub const LOCK_EXPIRY: Duration = Duration::from_secs(LOCK_EXPIRY_SECS as u64);

/// Schema version of a persisted lock set. Unknown versions load as empty.
pub const LOCK_SET_VERSION: u32 = 1;

/// Per-account lock set key prefix: `utxo_locks_<account>`.
pub const LOCK_KEY_PREFIX: &str = "utxo_locks_";

/// Index of accounts that currently hold a lock set.
pub const LOCK_ACCOUNTS_KEY: &str = "utxo_lock_accounts";

// ---------------------------------------------------------------------------
// Storage Layout
// ---------------------------------------------------------------------------

/// The single reserved slot for the write-ahead journal.
pub const JOURNAL_KEY: &str = "__satchel_journal__";

/// Account snapshot metadata: `account_meta_<account>`.
pub const SNAPSHOT_META_PREFIX: &str = "account_meta_";

/// Account snapshot UTXO list: `account_utxos_<account>`.
pub const SNAPSHOT_UTXOS_PREFIX: &str = "account_utxos_";

/// Sealed private key record: `vault_key_<account>`.
pub const VAULT_KEY_PREFIX: &str = "vault_key_";

/// sled tree holding all Satchel keys.
pub const SLED_TREE_NAME: &str = "satchel";

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// Schema version of a sealed key record.
pub const VAULT_RECORD_VERSION: u32 = 1;

/// AES-256-GCM key length.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length. Twelve bytes.
pub const AES_NONCE_LENGTH: usize = 12;

/// Random salt per sealed key.
pub const KDF_SALT_LENGTH: usize = 16;

/// Argon2id memory cost in KiB (19 MiB, the OWASP baseline).
pub const KDF_MEMORY_KIB: u32 = 19 * 1024;

/// Argon2id passes.
pub const KDF_ITERATIONS: u32 = 2;

/// Argon2id lanes.
pub const KDF_PARALLELISM: u32 = 1;

/// Highest memory cost a stored record may ask for (1 GiB).
pub const KDF_MAX_MEMORY_KIB: u32 = 1024 * 1024;

/// Highest pass count a stored record may ask for.
pub const KDF_MAX_ITERATIONS: u32 = 16;

/// Highest lane count a stored record may ask for.
pub const KDF_MAX_PARALLELISM: u32 = 16;

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

/// Storage key of an account's lock set.
pub fn lock_key(account_id: &str) -> String {
    format!("{LOCK_KEY_PREFIX}{account_id}")
}

/// Storage key of an account's snapshot metadata.
pub fn snapshot_meta_key(account_id: &str) -> String {
    format!("{SNAPSHOT_META_PREFIX}{account_id}")
}

/// Storage key of an account's snapshot UTXO list.
pub fn snapshot_utxos_key(account_id: &str) -> String {
    format!("{SNAPSHOT_UTXOS_PREFIX}{account_id}")
}

/// Storage key of an account's sealed private key.
pub fn vault_key(account_id: &str) -> String {
    format!("{VAULT_KEY_PREFIX}{account_id}")
}
