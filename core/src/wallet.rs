//! # Wallet Session
//!
//! The glue between the pieces: pick spendable outputs, build, sign, reserve.
//!
//! ```text
//! spendable ─► build_payment ─► sign_and_reserve ─► (submit) ─► confirm / reject
//!                                   │                               │
//!                                   └─ lock inputs under tx.ID      └─ release by tx.ID
//! ```
//!
//! Reservation happens after signing and before the caller submits. If any
//! input turns out to be held by another transaction the new locks are
//! released again and the call fails, so a half-reserved transaction never
//! leaves this module.

use thiserror::Error;
use tracing::{debug, info};

use crate::crypto::{PrivateKey, SignatureEngine};
use crate::locks::{LockError, LockOutcome, LockRegistry, UtxoLockManager};
use crate::storage::KeyValueStore;
use crate::transaction::{
    sign_transaction, AssetType, Transaction, TransactionBuilder, TransactionError, TxInput, Utxo,
};
use crate::vault::{KeyVault, VaultError};

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("output {output_id} is reserved by another transaction")]
    OutputUnavailable { output_id: String },

    #[error("insufficient spendable funds: have {available}, need {required}")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("lock error: {0}")]
    Locks(#[from] LockError),

    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),

    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
}

pub type WalletResult<T> = Result<T, WalletError>;

/// One account's signing session.
pub struct WalletSession<S: KeyValueStore> {
    account_id: String,
    engine: SignatureEngine,
    locks: UtxoLockManager<S>,
}

impl<S: KeyValueStore> WalletSession<S> {
    pub fn new(registry: &LockRegistry<S>, account_id: &str, engine: SignatureEngine) -> Self {
        Self {
            account_id: account_id.to_string(),
            engine,
            locks: registry.manager(account_id),
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn locks(&self) -> &UtxoLockManager<S> {
        &self.locks
    }

    pub fn engine(&self) -> &SignatureEngine {
        &self.engine
    }

    /// `utxos` minus everything this account has reserved.
    pub fn spendable(&self, utxos: &[Utxo]) -> WalletResult<Vec<Utxo>> {
        Ok(self.locks.filter_available(utxos)?)
    }

    /// Build an unsigned payment from spendable outputs of one asset type.
    ///
    /// Outputs are picked largest first until `amount + fee` is covered; any
    /// surplus goes back to `change_address`.
    pub fn build_payment(
        &self,
        utxos: &[Utxo],
        to: &str,
        amount: u64,
        asset_type: AssetType,
        fee: u64,
        change_address: &str,
    ) -> WalletResult<Transaction> {
        let required = amount
            .checked_add(fee)
            .ok_or(TransactionError::AmountOverflow)?;

        let mut candidates: Vec<Utxo> = self
            .spendable(utxos)?
            .into_iter()
            .filter(|u| u.asset_type == asset_type)
            .collect();
        candidates.sort_by(|a, b| b.amount.cmp(&a.amount));

        let mut selected = Vec::new();
        let mut total = 0u64;
        for utxo in candidates {
            if total >= required {
                break;
            }
            total = total.saturating_add(utxo.amount);
            selected.push(utxo);
        }
        if total < required {
            return Err(WalletError::InsufficientFunds {
                available: total,
                required,
            });
        }

        let tx = TransactionBuilder::new()
            .codec(self.engine.codec().clone())
            .inputs(&selected)
            .output(to, amount, asset_type)
            .fee(fee)
            .change_address(change_address)
            .build()?;
        debug!(account = %self.account_id, tx_id = %tx.id, inputs = selected.len(), "built payment");
        Ok(tx)
    }

    /// Sign `tx` with `key` and reserve its inputs under `tx.id`.
    ///
    /// `tx` is only updated once the reservation holds. If an input is already
    /// reserved by a different transaction, of this account or another one,
    /// any new locks are released and `tx` is returned unsigned.
    pub fn sign_and_reserve(
        &self,
        tx: &mut Transaction,
        key: &PrivateKey,
    ) -> WalletResult<LockOutcome> {
        for input in &tx.inputs {
            let id = input.output_id();
            if let Some(lock) = self.locks.get_locked_utxo_info(&id)? {
                if lock.transaction_id != tx.id {
                    return Err(WalletError::OutputUnavailable { output_id: id });
                }
            }
        }

        let mut signed = tx.clone();
        sign_transaction(&mut signed, key, &self.engine)?;

        let spent: Vec<Utxo> = signed.inputs.iter().map(input_as_utxo).collect();
        let outcome = self.locks.lock_utxos(&spent, &signed.id)?;
        if let Some(output_id) = outcome.conflicted.first() {
            self.locks.unlock_utxos(&outcome.locked)?;
            return Err(WalletError::OutputUnavailable {
                output_id: output_id.clone(),
            });
        }

        *tx = signed;
        info!(account = %self.account_id, tx_id = %tx.id, reserved = outcome.locked.len(), "signed and reserved");
        Ok(outcome)
    }

    /// Same as [`sign_and_reserve`](Self::sign_and_reserve), unsealing the key
    /// from `vault` first. The key is dropped before returning.
    pub fn sign_and_reserve_with_vault(
        &self,
        tx: &mut Transaction,
        vault: &dyn KeyVault,
        password: &str,
    ) -> WalletResult<LockOutcome> {
        let key = vault.get_private_key(&self.account_id, password)?;
        self.sign_and_reserve(tx, &key)
    }

    /// The backend accepted `transaction_id`; its inputs are spent for real.
    pub fn confirm(&self, transaction_id: &str) -> WalletResult<usize> {
        let released = self.locks.unlock_by_transaction_id(transaction_id)?;
        info!(account = %self.account_id, transaction_id, released, "transaction confirmed");
        Ok(released)
    }

    /// The backend rejected `transaction_id`; its inputs are spendable again.
    pub fn reject(&self, transaction_id: &str) -> WalletResult<usize> {
        let released = self.locks.unlock_by_transaction_id(transaction_id)?;
        info!(account = %self.account_id, transaction_id, released, "transaction rejected");
        Ok(released)
    }
}

fn input_as_utxo(input: &TxInput) -> Utxo {
    Utxo::new(
        input.tx_id.clone(),
        input.output_index,
        input.address.clone(),
        input.amount,
        input.asset_type,
    )
}
