// ---------------------------------------------------------------------------
// SVM — the transaction executor.
//
// Takes a signature-checked Transaction, loads every account it names from
// AccountsDB into a working set, runs each instruction through an
// InvokeContext, and commits the working set back only if every
// instruction (and every nested call beneath it) succeeded.
//
// It knows nothing about signatures or the clock. Those belong to the Bank,
// which hands the executor the sysvars it should expose.
// ---------------------------------------------------------------------------

use crate::error::TransactionError;
use crate::runtime::accounts_db::AccountsDB;
use crate::runtime::invoke_context::{
    BuiltinPrograms, ExecutionEnvironment, InstructionAccount, InvokeContext,
};
use crate::types::account::{AccountSharedData, Pubkey};
use crate::types::transaction::{Message, Transaction};

/// What a committed transaction leaves behind besides account changes.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TransactionReceipt {
    pub logs: Vec<String>,
    /// Program id and bytes of the last instruction that set return data.
    pub return_data: Option<(Pubkey, Vec<u8>)>,
}

impl TransactionReceipt {
    /// Return data decoded as a u128 LE, the staking program's points format.
    pub fn return_u128(&self) -> Option<u128> {
        let (_, data) = self.return_data.as_ref()?;
        let bytes: [u8; 16] = data.as_slice().try_into().ok()?;
        Some(u128::from_le_bytes(bytes))
    }
}

// ---------------------------------------------------------------------------
// execute — run a transaction against the accounts DB.
//
//   1. Check every compiled index against message.account_keys.
//   2. Load the working set. Accounts that don't exist yet start empty and
//      system-owned; CreateAccount will populate them.
//   3. Run each instruction. The first failure, or a nested failure some
//      handler swallowed, aborts the transaction with nothing committed.
//   4. Commit the working set.
// ---------------------------------------------------------------------------
pub fn execute(
    tx: &Transaction,
    accounts_db: &mut AccountsDB,
    builtins: &BuiltinPrograms,
    environment: ExecutionEnvironment,
) -> Result<TransactionReceipt, TransactionError> {
    let message = &tx.message;
    message.sanitize()?;
    check_indexes(message)?;

    let working_set: Vec<AccountSharedData> = message
        .account_keys
        .iter()
        .map(|pubkey| accounts_db.load(pubkey).cloned().unwrap_or_default())
        .collect();

    let mut ctx = InvokeContext::new(
        message.account_keys.clone(),
        working_set,
        builtins,
        environment,
    );

    for (index, instruction) in message.instructions.iter().enumerate() {
        let program_id = message.account_keys[instruction.program_id_index as usize];
        let accounts = instruction
            .accounts
            .iter()
            .map(|&account_index| {
                let account_index = account_index as usize;
                InstructionAccount {
                    index_in_transaction: account_index,
                    is_signer: message.is_signer(account_index),
                    is_writable: message.is_writable(account_index),
                }
            })
            .collect();

        ctx.process_instruction(program_id, accounts, &instruction.data)
            .and_then(|()| ctx.take_nested_failure().map_or(Ok(()), Err))
            .map_err(|error| {
                log::debug!("[svm] instruction {index} failed: {error}");
                TransactionError::InstructionError { index, error }
            })?;
    }

    let (working_set, logs, return_data) = ctx.finish();
    for (pubkey, account) in message.account_keys.iter().zip(working_set) {
        // Don't materialise accounts the transaction only looked at.
        if accounts_db.contains(pubkey) || account != AccountSharedData::default() {
            accounts_db.store(*pubkey, account);
        }
    }

    Ok(TransactionReceipt { logs, return_data })
}

fn check_indexes(message: &Message) -> Result<(), TransactionError> {
    let num_keys = message.account_keys.len();
    for (instruction, compiled) in message.instructions.iter().enumerate() {
        let indexes = std::iter::once(&compiled.program_id_index).chain(&compiled.accounts);
        for &index in indexes {
            if index as usize >= num_keys {
                return Err(TransactionError::AccountIndexOutOfBounds { instruction, index });
            }
        }
    }
    Ok(())
}
