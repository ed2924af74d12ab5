use thiserror::Error;

use crate::types::account::{Lamports, Pubkey};

/// Which privilege a nested call or a dispatcher role check found missing.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Privilege {
    Signer,
    Writable,
}

impl std::fmt::Display for Privilege {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Privilege::Signer => f.write_str("signer"),
            Privilege::Writable => f.write_str("writable"),
        }
    }
}

/// Failure of a single instruction, nested or top-level.
///
/// Every variant names the offending account or field so a failed
/// transaction can be diagnosed from the error alone.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum InstructionError {
    #[error("derived address mismatch: expected {expected}, got {actual}")]
    AddressMismatch { expected: Pubkey, actual: Pubkey },

    #[error("account {0} is already initialized")]
    AlreadyInitialized(Pubkey),

    #[error("account {0} is not initialized")]
    Uninitialized(Pubkey),

    #[error("account {account} has {balance} lamports, {required} required")]
    InsufficientFunds {
        account: Pubkey,
        balance: Lamports,
        required: Lamports,
    },

    #[error("cannot unstake {requested} lamports, only {staked} staked")]
    InsufficientStake { staked: u64, requested: u64 },

    #[error("account {account} would keep {remaining} lamports, minimum is {minimum}")]
    BelowMinimumBalance {
        account: Pubkey,
        remaining: Lamports,
        minimum: Lamports,
    },

    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("invalid instruction for program {program}: {reason}")]
    InvalidInstruction {
        program: Pubkey,
        reason: &'static str,
    },

    #[error("missing required signature for account {0}")]
    SignerMissing(Pubkey),

    #[error("{account}'s {privilege} privilege escalated")]
    PrivilegeEscalation {
        account: Pubkey,
        privilege: Privilege,
    },

    #[error("instruction stack depth {max_depth} exceeded")]
    CallDepthExceeded { max_depth: usize },

    #[error("account {0} not found in caller's account list")]
    AccountNotFound(Pubkey),

    #[error("amount must be greater than 0")]
    InvalidAmount,

    #[error("account {0} holds malformed data")]
    InvalidAccountData(Pubkey),

    #[error("account {0} is not owned by the expected program or signer")]
    IllegalOwner(Pubkey),

    #[error("expected program {expected}, got {actual}")]
    IncorrectProgramId { expected: Pubkey, actual: Pubkey },

    #[error("account {0} is already in use")]
    AccountAlreadyInUse(Pubkey),

    #[error("instruction expects {expected} accounts, got {got}")]
    NotEnoughAccountKeys { expected: usize, got: usize },

    #[error("unknown program {0}")]
    UnknownProgram(Pubkey),

    #[error("readonly account {0} was modified")]
    ReadonlyAccountModified(Pubkey),

    #[error("program modified account {0} it does not own")]
    ExternalAccountModified(Pubkey),

    #[error("sum of account lamports changed: before {before}, after {after}")]
    UnbalancedInstruction { before: u128, after: u128 },

    #[error("seeds do not produce a valid derived address")]
    InvalidSeeds,

    #[error(
        "seed longer than {max_len} bytes or more than {max_seeds} seeds",
        max_len = crate::address::MAX_SEED_LEN,
        max_seeds = crate::address::MAX_SEEDS
    )]
    MaxSeedLengthExceeded,
}

/// Failure of a whole transaction. Nothing is committed when one is returned.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum TransactionError {
    #[error("transaction requires {expected} signatures, got {got}")]
    NotEnoughSignatures { expected: usize, got: usize },

    #[error("account key at index {index} is not a valid ed25519 public key")]
    InvalidPublicKey { index: usize },

    #[error("signature at index {index} failed verification")]
    SignatureVerificationFailed { index: usize },

    #[error("instruction {instruction} references account index {index} out of bounds")]
    AccountIndexOutOfBounds { instruction: usize, index: u8 },

    #[error("message {field} has {len} entries, at most {max} fit the wire format")]
    MessageTooLarge {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("instruction {index} failed: {error}")]
    InstructionError {
        index: usize,
        error: InstructionError,
    },
}

impl TransactionError {
    /// The instruction-level cause, if the transaction failed during execution.
    pub fn instruction_error(&self) -> Option<&InstructionError> {
        match self {
            TransactionError::InstructionError { error, .. } => Some(error),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum BankError {
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error("clock cannot move backwards from {current} to {requested}")]
    ClockWentBackwards { current: i64, requested: i64 },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
