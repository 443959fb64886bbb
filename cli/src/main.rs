// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Satchel Operator Tool
//!
//! Entry point for the `satchel` binary. Parses arguments, initializes
//! logging, opens the wallet database when the command needs it, and runs
//! one command.
//!
//! - `keygen`, `address`, `b58`  work on keys and encodings only
//! - `canonicalize`, `sign`, `verify`  work on a JSON document
//! - `locks`, `recover`  work on the wallet database in `--data-dir`

mod cli;
mod logging;

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde_json::{json, Value};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use satchel_core::codec::CanonicalCodec;
use satchel_core::crypto::{
    base58_check_decode, base58_check_encode, base58_decode, base58_encode, derive_address,
    sha256, PrivateKey, PublicKey, Signature, SignatureEngine,
};
use satchel_core::locks::LockRegistry;
use satchel_core::storage::{SledStore, StorageJournal};
use satchel_core::transaction::{normalize_public_key, normalize_signature};
use satchel_core::vault::{KeyVault, PasswordVault};

use cli::{B58Command, Commands, DocumentArgs, LocksCommand, SatchelCli};

fn main() -> Result<()> {
    let cli = SatchelCli::parse();
    logging::init_logging("satchel=info,satchel_core=info", cli.log_format);

    match cli.command {
        Commands::Keygen(args) => keygen(&cli.data_dir, &cli.account, args),
        Commands::Address(args) => address(args),
        Commands::B58(cmd) => b58(cmd),
        Commands::Canonicalize(args) => canonicalize(args.document),
        Commands::Sign(args) => sign(&cli.data_dir, &cli.account, args),
        Commands::Verify(args) => verify(args),
        Commands::Locks(cmd) => locks(&cli.data_dir, &cli.account, cmd),
        Commands::Recover => recover(&cli.data_dir),
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Opens the sled database under `data_dir`, creating the directory first.
fn open_store(data_dir: &Path) -> Result<Arc<SledStore>> {
    let db_path = data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let store = SledStore::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::debug!(path = %db_path.display(), "database opened");
    Ok(Arc::new(store))
}

fn read_document(args: &DocumentArgs) -> Result<Value> {
    let raw = match args.file.as_deref() {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read document from stdin")?;
            buf
        }
    };
    serde_json::from_str(&raw).context("document is not valid JSON")
}

fn excluded(args: &DocumentArgs) -> Vec<&str> {
    args.excluded.iter().map(String::as_str).collect()
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ---------------------------------------------------------------------------
// Keys & encodings
// ---------------------------------------------------------------------------

fn keygen(data_dir: &Path, account: &str, args: cli::KeygenArgs) -> Result<()> {
    let key = PrivateKey::generate();
    let public_key = key.public_key();
    let address = derive_address(&public_key)?;

    if args.store {
        let Some(password) = args.password else {
            bail!("--store needs a password (--password or SATCHEL_PASSWORD)");
        };
        let vault = PasswordVault::new(open_store(data_dir)?);
        vault
            .store_private_key(account, &key, &password)
            .with_context(|| format!("failed to seal key for account {account}"))?;
        tracing::info!(account, %address, "key sealed in vault");
        return print_json(&json!({
            "account": account,
            "address": address,
            "publicKey": public_key.to_hex(),
        }));
    }

    print_json(&json!({
        "privateKey": key.to_hex().as_str(),
        "publicKey": public_key.to_hex(),
        "address": address,
    }))
}

fn address(args: cli::AddressArgs) -> Result<()> {
    let public_key = match (args.private_key, args.public_key) {
        (Some(hex), _) => PrivateKey::from_hex(&hex)
            .context("invalid private key")?
            .public_key(),
        (None, Some(hex)) => PublicKey::from_hex(&hex).context("invalid public key")?,
        (None, None) => bail!("pass --private-key or --public-key"),
    };
    println!("{}", derive_address(&public_key)?);
    Ok(())
}

fn b58(cmd: B58Command) -> Result<()> {
    match cmd {
        B58Command::Encode { hex, raw } => {
            let bytes = hex::decode(hex.trim()).context("input is not hex")?;
            let text = if raw {
                base58_encode(&bytes)
            } else {
                base58_check_encode(&bytes)
            };
            println!("{text}");
        }
        B58Command::Decode { text, raw } => {
            let bytes = if raw {
                base58_decode(text.trim())?
            } else {
                base58_check_decode(text.trim())?
            };
            println!("{}", hex::encode(bytes));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

fn canonicalize(args: DocumentArgs) -> Result<()> {
    let doc = read_document(&args)?;
    let canonical = CanonicalCodec::default()
        .canonical_string(&doc, &excluded(&args))
        .context("failed to canonicalize document")?;
    println!("{canonical}");
    eprintln!("sha256: {}", hex::encode(sha256(canonical.as_bytes())));
    Ok(())
}

fn sign(data_dir: &Path, account: &str, args: cli::SignArgs) -> Result<()> {
    let mut doc = read_document(&args.document)?;
    let key = match (&args.private_key, &args.password) {
        (Some(hex), _) => PrivateKey::from_hex(hex).context("invalid private key")?,
        (None, Some(password)) => PasswordVault::new(open_store(data_dir)?)
            .get_private_key(account, password)
            .with_context(|| format!("failed to unseal key for account {account}"))?,
        (None, None) => bail!("pass --private-key, or --password to unseal the vault key"),
    };

    let engine = SignatureEngine::default();
    let public_key = key.public_key();
    if args.embed {
        // The public key is part of the signed payload when embedded.
        if let Value::Object(map) = &mut doc {
            map.insert("PublicKey".into(), serde_json::to_value(&public_key)?);
        }
    }
    let signature = engine
        .sign(&doc, &excluded(&args.document), &key)
        .context("signing failed")?;

    if args.embed {
        if let Value::Object(map) = &mut doc {
            map.insert("Signature".into(), serde_json::to_value(&signature)?);
        }
        return print_json(&doc);
    }

    print_json(&json!({
        "signature": serde_json::to_value(&signature)?,
        "signatureHex": signature.to_hex()?,
        "publicKey": public_key.to_hex(),
        "address": derive_address(&public_key)?,
    }))
}

fn verify(args: cli::VerifyArgs) -> Result<()> {
    let doc = read_document(&args.document)?;

    let signature = match &args.signature {
        Some(hex) => Signature::from_hex(hex).context("invalid signature")?,
        None => normalize_signature(doc.get("Signature").unwrap_or(&Value::Null))
            .context("document has no usable Signature")?,
    };
    let public_key = match &args.public_key {
        Some(hex) => PublicKey::from_hex(hex).context("invalid public key")?,
        None => normalize_public_key(doc.get("PublicKey").unwrap_or(&Value::Null))
            .context("document has no usable PublicKey")?,
    };

    let valid = SignatureEngine::default().verify(
        &doc,
        &excluded(&args.document),
        &signature,
        &public_key,
    );
    println!("{}", if valid { "valid" } else { "invalid" });
    if !valid {
        bail!("signature does not verify");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Wallet database
// ---------------------------------------------------------------------------

fn locks(data_dir: &Path, account: &str, cmd: LocksCommand) -> Result<()> {
    let registry = LockRegistry::open(open_store(data_dir)?).context("failed to open lock registry")?;

    match cmd {
        LocksCommand::List { all } => {
            let accounts = if all {
                registry.accounts()?
            } else {
                vec![account.to_string()]
            };
            let mut listing = serde_json::Map::new();
            for account in accounts {
                let manager = registry.manager(&account);
                let locked = manager.locked_utxos()?;
                listing.insert(
                    account,
                    json!({
                        "lockedBalance": manager.get_locked_balance(None)?,
                        "locks": locked,
                    }),
                );
            }
            print_json(&Value::Object(listing))
        }
        LocksCommand::Release { tx_id } => {
            let released = registry.release_transaction(&tx_id)?;
            tracing::info!(tx_id = %tx_id, released, "released reservations");
            println!("{released}");
            Ok(())
        }
        LocksCommand::Clear { address } => {
            let manager = registry.manager(account);
            let released = match address {
                Some(address) => manager.clear_by_address(&address)?,
                None => manager.clear_all()?,
            };
            tracing::info!(account, released, "cleared reservations");
            println!("{released}");
            Ok(())
        }
    }
}

fn recover(data_dir: &Path) -> Result<()> {
    let journal = StorageJournal::new(open_store(data_dir)?);
    let pending = journal.pending().ok().flatten();
    let outcome = journal.recover().context("journal recovery failed")?;
    print_json(&json!({
        "outcome": format!("{outcome:?}"),
        "journal": pending,
    }))
}
