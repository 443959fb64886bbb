//! # CLI Interface
//!
//! Argument structure for the `satchel` operator tool, via `clap` derive.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// Satchel wallet integrity tool.
///
/// Derives keys and addresses, canonicalizes and signs JSON payloads the way
/// the backend expects them, and inspects or repairs the wallet's persisted
/// UTXO reservations.
#[derive(Parser, Debug)]
#[command(
    name = "satchel",
    about = "Satchel wallet integrity tool",
    version,
    propagate_version = true
)]
pub struct SatchelCli {
    /// Directory holding the wallet database.
    #[arg(long, short = 'd', global = true, env = "SATCHEL_DATA_DIR", default_value = ".satchel")]
    pub data_dir: PathBuf,

    /// Log output format.
    #[arg(long, global = true, env = "SATCHEL_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Account the command applies to.
    #[arg(long, short = 'a', global = true, env = "SATCHEL_ACCOUNT", default_value = "default")]
    pub account: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a fresh P-256 key. Optionally seal it in the wallet vault.
    Keygen(KeygenArgs),
    /// Derive the address of a private or public key.
    Address(AddressArgs),
    /// Base58 / base58check encoding.
    #[command(subcommand)]
    B58(B58Command),
    /// Print the canonical form and SHA-256 of a JSON document.
    Canonicalize(CanonicalizeArgs),
    /// Sign a JSON document.
    Sign(SignArgs),
    /// Verify a signed JSON document.
    Verify(VerifyArgs),
    /// Inspect or release UTXO reservations.
    #[command(subcommand)]
    Locks(LocksCommand),
    /// Run journal recovery and report what it did.
    Recover,
}

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Seal the key in the vault under `--account` instead of printing it.
    #[arg(long)]
    pub store: bool,

    /// Vault password. Required with `--store`.
    #[arg(long, env = "SATCHEL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct AddressArgs {
    /// Hex-encoded 32-byte private scalar.
    #[arg(long)]
    pub private_key: Option<String>,

    /// Hex-encoded uncompressed SEC1 public key.
    #[arg(long)]
    pub public_key: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum B58Command {
    /// Encode hex bytes.
    Encode {
        hex: String,
        /// Plain base58, no checksum.
        #[arg(long)]
        raw: bool,
    },
    /// Decode to hex bytes.
    Decode {
        text: String,
        /// Plain base58, no checksum.
        #[arg(long)]
        raw: bool,
    },
}

/// Where a JSON document comes from.
#[derive(Args, Debug)]
pub struct DocumentArgs {
    /// JSON file to read. Reads stdin when omitted or `-`.
    pub file: Option<PathBuf>,

    /// Top-level fields replaced by the zero signature before hashing.
    #[arg(long = "exclude", default_value = "Signature")]
    pub excluded: Vec<String>,
}

#[derive(Args, Debug)]
pub struct CanonicalizeArgs {
    #[command(flatten)]
    pub document: DocumentArgs,
}

#[derive(Args, Debug)]
pub struct SignArgs {
    #[command(flatten)]
    pub document: DocumentArgs,

    /// Hex private key. When omitted the key is unsealed from the vault.
    #[arg(long, env = "SATCHEL_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Vault password, used when no `--private-key` is given.
    #[arg(long, env = "SATCHEL_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Print the document with `Signature` and `PublicKey` filled in.
    #[arg(long)]
    pub embed: bool,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    #[command(flatten)]
    pub document: DocumentArgs,

    /// Signature as `r || s` hex. Defaults to the document's `Signature`.
    #[arg(long)]
    pub signature: Option<String>,

    /// Public key as SEC1 hex. Defaults to the document's `PublicKey`.
    #[arg(long)]
    pub public_key: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum LocksCommand {
    /// List live reservations of `--account`, or of every account with `--all`.
    List {
        #[arg(long)]
        all: bool,
    },
    /// Release every reservation held for a transaction, in all accounts.
    Release {
        #[arg(long)]
        tx_id: String,
    },
    /// Drop reservations of `--account`, optionally only for one address.
    Clear {
        #[arg(long)]
        address: Option<String>,
    },
}
