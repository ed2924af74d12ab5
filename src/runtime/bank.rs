// ---------------------------------------------------------------------------
// Bank — the entry point for transactions.
//
// The Bank owns committed state (AccountsDB), the builtin program registry
// and the clock. It is the security layer that rejects invalid transactions
// BEFORE any execution begins, then hands the rest to the executor.
//
// Responsibilities:
//   1. Serialize the message into canonical bytes
//   2. Verify every required Ed25519 signature against those bytes
//   3. Execute with the current clock and rent exposed as sysvars
//
// Processing takes &mut self: one transaction at a time, in order.
// ---------------------------------------------------------------------------

use ed25519_dalek::{Verifier, VerifyingKey};

use crate::config::RuntimeConfig;
use crate::error::{BankError, TransactionError};
use crate::programs::{default_builtins, system};
use crate::runtime::accounts_db::AccountsDB;
use crate::runtime::invoke_context::{BuiltinFunction, BuiltinPrograms, ExecutionEnvironment};
use crate::runtime::svm::{self, TransactionReceipt};
use crate::runtime::sysvar::{Clock, Rent};
use crate::types::account::{AccountSharedData, Lamports, Pubkey};
use crate::types::transaction::Transaction;

pub struct Bank {
    accounts_db: AccountsDB,
    builtins: BuiltinPrograms,
    clock: Clock,
    config: RuntimeConfig,
}

impl Bank {
    /// A bank with the default builtins and the clock at the configured genesis.
    pub fn new(config: RuntimeConfig) -> Self {
        Bank {
            accounts_db: AccountsDB::new(),
            builtins: default_builtins(),
            clock: Clock {
                slot: 0,
                unix_timestamp: config.genesis_unix_timestamp,
            },
            config,
        }
    }

    pub fn add_builtin(&mut self, program_id: Pubkey, entrypoint: BuiltinFunction) {
        self.builtins.add(program_id, entrypoint);
    }

    pub fn process_transaction(
        &mut self,
        tx: &Transaction,
    ) -> Result<TransactionReceipt, TransactionError> {
        if let Err(err) = verify_signatures(tx) {
            log::warn!("[bank] rejected before execution: {err}");
            return Err(err);
        }

        let environment = ExecutionEnvironment {
            clock: self.clock,
            rent: self.config.rent,
            max_instruction_stack_depth: self.config.max_instruction_stack_depth,
        };
        match svm::execute(tx, &mut self.accounts_db, &self.builtins, environment) {
            Ok(receipt) => {
                log::info!(
                    "[bank] committed {} instruction(s) at {}",
                    tx.message.instructions.len(),
                    self.clock.unix_timestamp
                );
                Ok(receipt)
            }
            Err(err) => {
                log::warn!("[bank] transaction failed: {err}");
                Err(err)
            }
        }
    }

    /// Credit a wallet from outside the ledger; creates it system-owned if
    /// missing.
    pub fn deposit(&mut self, pubkey: &Pubkey, lamports: Lamports) {
        let account = match self.accounts_db.load(pubkey) {
            Some(existing) => {
                let mut account = existing.clone();
                account.set_lamports(existing.lamports().saturating_add(lamports));
                account
            }
            None => AccountSharedData::new(lamports, 0, system::ID),
        };
        self.accounts_db.store(*pubkey, account);
    }

    pub fn store_account(&mut self, pubkey: Pubkey, account: AccountSharedData) {
        self.accounts_db.store(pubkey, account);
    }

    pub fn get_account(&self, pubkey: &Pubkey) -> Option<&AccountSharedData> {
        self.accounts_db.load(pubkey)
    }

    pub fn get_balance(&self, pubkey: &Pubkey) -> Lamports {
        self.accounts_db.lamports(pubkey)
    }

    pub fn capitalization(&self) -> u128 {
        self.accounts_db.capitalization()
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn rent(&self) -> Rent {
        self.config.rent
    }

    /// Move the clock to `unix_timestamp`. Standing still is allowed.
    pub fn warp_timestamp(&mut self, unix_timestamp: i64) -> Result<(), BankError> {
        if unix_timestamp < self.clock.unix_timestamp {
            return Err(BankError::ClockWentBackwards {
                current: self.clock.unix_timestamp,
                requested: unix_timestamp,
            });
        }
        self.clock = Clock {
            slot: self.clock.slot + 1,
            unix_timestamp,
        };
        log::debug!("[bank] clock at {unix_timestamp}");
        Ok(())
    }

    pub fn advance_clock(&mut self, seconds: u32) {
        let unix_timestamp = self.clock.unix_timestamp.saturating_add(seconds as i64);
        self.clock = Clock {
            slot: self.clock.slot + 1,
            unix_timestamp,
        };
    }
}

// ---------------------------------------------------------------------------
// verify_signatures — run before the executor.
//
// The message must fit its wire format first; the signed bytes are
// message.serialize().
//
// For each signer i in 0..num_required_signatures:
//   - pubkey    = message.account_keys[i]
//   - signature = transaction.signatures[i]
//   - verify that signature is a valid Ed25519 signature of
//     message.serialize() under pubkey
// ---------------------------------------------------------------------------
pub fn verify_signatures(tx: &Transaction) -> Result<(), TransactionError> {
    tx.message.sanitize()?;
    let num_required = tx.message.header.num_required_signatures as usize;

    if tx.signatures.len() < num_required {
        return Err(TransactionError::NotEnoughSignatures {
            expected: num_required,
            got: tx.signatures.len(),
        });
    }

    let message_bytes = tx.message.serialize();

    for index in 0..num_required {
        let pubkey = tx
            .message
            .account_keys
            .get(index)
            .ok_or(TransactionError::InvalidPublicKey { index })?;

        let verifying_key = VerifyingKey::from_bytes(&pubkey.0)
            .map_err(|_| TransactionError::InvalidPublicKey { index })?;

        let signature = ed25519_dalek::Signature::from_bytes(&tx.signatures[index].0);

        verifying_key
            .verify(&message_bytes, &signature)
            .map_err(|_| TransactionError::SignatureVerificationFailed { index })?;
    }

    Ok(())
}
