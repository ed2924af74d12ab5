// ---------------------------------------------------------------------------
// SystemProgram — account allocation and native transfers.
//
// Lives at the all-zeros address. It owns every plain wallet and is the
// only program that can:
//   1. Create new accounts (allocate space, assign an owner)
//   2. Debit lamports from the wallets it owns
//
// Other programs reach it through nested calls: the staking program uses it
// to allocate stake records (signing for the derived address with its seeds)
// and to move staked lamports in.
// ---------------------------------------------------------------------------

use crate::error::InstructionError;
use crate::programs::{AccountRole, ProgramInstruction, dispatch};
use crate::runtime::invoke_context::InvokeContext;
use crate::types::account::Pubkey;
use crate::types::instruction::{AccountMeta, Instruction};

pub const ID: Pubkey = Pubkey::new([0u8; 32]);

/// Largest data size CreateAccount/Allocate will hand out.
pub const MAX_PERMITTED_DATA_LENGTH: u64 = 10 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Instruction — the discriminator is the first 4 bytes, little-endian u32.
// ---------------------------------------------------------------------------
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SystemInstruction {
    /// Create a new account.
    ///
    /// Accounts expected:
    ///   [0] funder      — writable, signer. Pays the lamports.
    ///   [1] new account — writable, signer. The address being created.
    ///
    /// Data layout (52 bytes):
    ///   [0..4]   discriminator = 0  (u32 LE)
    ///   [4..12]  lamports           (u64 LE)
    ///   [12..20] space              (u64 LE)
    ///   [20..52] owner              ([u8;32])
    CreateAccount {
        lamports: u64,
        space: u64,
        owner: Pubkey,
    },

    /// Transfer lamports from a system-owned account.
    ///
    /// Accounts expected:
    ///   [0] from — writable, signer.
    ///   [1] to   — writable.
    ///
    /// Data layout (12 bytes):
    ///   [0..4]  discriminator = 2  (u32 LE)
    ///   [4..12] lamports           (u64 LE)
    Transfer { lamports: u64 },

    /// Change the owner of a system-owned account.
    ///
    /// Accounts expected:
    ///   [0] account — writable, signer.
    ///
    /// Data layout (36 bytes):
    ///   [0..4]  discriminator = 8  (u32 LE)
    ///   [4..36] owner              ([u8;32])
    Assign { owner: Pubkey },

    /// Give a system-owned, data-less account `space` zeroed bytes.
    ///
    /// Accounts expected:
    ///   [0] account — writable, signer.
    ///
    /// Data layout (12 bytes):
    ///   [0..4]  discriminator = 9  (u32 LE)
    ///   [4..12] space              (u64 LE)
    Allocate { space: u64 },
}

const CREATE_ACCOUNT: u32 = 0;
const TRANSFER: u32 = 2;
const ASSIGN: u32 = 8;
const ALLOCATE: u32 = 9;

fn invalid(reason: &'static str) -> InstructionError {
    InstructionError::InvalidInstruction {
        program: ID,
        reason,
    }
}

fn read_u64(data: &[u8], at: usize) -> Result<u64, InstructionError> {
    data.get(at..at + 8)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or_else(|| invalid("truncated u64 field"))
}

fn read_pubkey(data: &[u8], at: usize) -> Result<Pubkey, InstructionError> {
    data.get(at..at + 32)
        .and_then(|bytes| <[u8; 32]>::try_from(bytes).ok())
        .map(Pubkey)
        .ok_or_else(|| invalid("truncated pubkey field"))
}

impl SystemInstruction {
    /// Parse raw instruction bytes. The length must match the variant exactly.
    pub fn decode(data: &[u8]) -> Result<Self, InstructionError> {
        let discriminator = data
            .get(0..4)
            .and_then(|bytes| bytes.try_into().ok())
            .map(u32::from_le_bytes)
            .ok_or_else(|| invalid("missing discriminator"))?;

        let (instruction, expected_len) = match discriminator {
            CREATE_ACCOUNT => (
                SystemInstruction::CreateAccount {
                    lamports: read_u64(data, 4)?,
                    space: read_u64(data, 12)?,
                    owner: read_pubkey(data, 20)?,
                },
                52,
            ),
            TRANSFER => (
                SystemInstruction::Transfer {
                    lamports: read_u64(data, 4)?,
                },
                12,
            ),
            ASSIGN => (
                SystemInstruction::Assign {
                    owner: read_pubkey(data, 4)?,
                },
                36,
            ),
            ALLOCATE => (
                SystemInstruction::Allocate {
                    space: read_u64(data, 4)?,
                },
                12,
            ),
            _ => return Err(invalid("unknown discriminator")),
        };

        if data.len() != expected_len {
            return Err(invalid("trailing bytes after instruction"));
        }
        Ok(instruction)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(52);
        match self {
            SystemInstruction::CreateAccount {
                lamports,
                space,
                owner,
            } => {
                data.extend_from_slice(&CREATE_ACCOUNT.to_le_bytes());
                data.extend_from_slice(&lamports.to_le_bytes());
                data.extend_from_slice(&space.to_le_bytes());
                data.extend_from_slice(&owner.0);
            }
            SystemInstruction::Transfer { lamports } => {
                data.extend_from_slice(&TRANSFER.to_le_bytes());
                data.extend_from_slice(&lamports.to_le_bytes());
            }
            SystemInstruction::Assign { owner } => {
                data.extend_from_slice(&ASSIGN.to_le_bytes());
                data.extend_from_slice(&owner.0);
            }
            SystemInstruction::Allocate { space } => {
                data.extend_from_slice(&ALLOCATE.to_le_bytes());
                data.extend_from_slice(&space.to_le_bytes());
            }
        }
        data
    }
}

impl ProgramInstruction for SystemInstruction {
    fn unpack(_program_id: &Pubkey, data: &[u8]) -> Result<Self, InstructionError> {
        Self::decode(data)
    }

    fn account_roles(&self) -> &'static [AccountRole] {
        match self {
            SystemInstruction::CreateAccount { .. } => {
                &[AccountRole::SIGNER_WRITABLE, AccountRole::SIGNER_WRITABLE]
            }
            SystemInstruction::Transfer { .. } => {
                &[AccountRole::SIGNER_WRITABLE, AccountRole::WRITABLE]
            }
            SystemInstruction::Assign { .. } | SystemInstruction::Allocate { .. } => {
                &[AccountRole::SIGNER_WRITABLE]
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Instruction builders.
// ---------------------------------------------------------------------------

pub fn create_account(
    from: &Pubkey,
    to: &Pubkey,
    lamports: u64,
    space: u64,
    owner: &Pubkey,
) -> Instruction {
    let data = SystemInstruction::CreateAccount {
        lamports,
        space,
        owner: *owner,
    };
    Instruction::new(
        ID,
        data.encode(),
        vec![AccountMeta::new(*from, true), AccountMeta::new(*to, true)],
    )
}

pub fn transfer(from: &Pubkey, to: &Pubkey, lamports: u64) -> Instruction {
    Instruction::new(
        ID,
        SystemInstruction::Transfer { lamports }.encode(),
        vec![AccountMeta::new(*from, true), AccountMeta::new(*to, false)],
    )
}

pub fn assign(account: &Pubkey, owner: &Pubkey) -> Instruction {
    Instruction::new(
        ID,
        SystemInstruction::Assign { owner: *owner }.encode(),
        vec![AccountMeta::new(*account, true)],
    )
}

pub fn allocate(account: &Pubkey, space: u64) -> Instruction {
    Instruction::new(
        ID,
        SystemInstruction::Allocate { space }.encode(),
        vec![AccountMeta::new(*account, true)],
    )
}

// ---------------------------------------------------------------------------
// Process.
// ---------------------------------------------------------------------------
pub fn process_instruction(ctx: &mut InvokeContext, data: &[u8]) -> Result<(), InstructionError> {
    match dispatch::<SystemInstruction>(ctx, data)? {
        SystemInstruction::CreateAccount {
            lamports,
            space,
            owner,
        } => {
            let new_key = ctx.key(1)?;
            if ctx.account(1)?.is_in_use() {
                ctx.log(format!("Create Account: account {new_key} already in use"));
                return Err(InstructionError::AccountAlreadyInUse(new_key));
            }
            debit(ctx, 0, lamports)?;
            ctx.account_mut(1)?.set_lamports(lamports);
            allocate_and_assign(ctx, space, owner)
        }

        SystemInstruction::Transfer { lamports } => {
            let from_key = ctx.key(0)?;
            if !ctx.account(0)?.data().is_empty() {
                ctx.log("Transfer: `from` must not carry data");
                return Err(InstructionError::InvalidAccountData(from_key));
            }
            if from_key == ctx.key(1)? {
                let balance = ctx.account(0)?.lamports();
                if balance < lamports {
                    return Err(InstructionError::InsufficientFunds {
                        account: from_key,
                        balance,
                        required: lamports,
                    });
                }
                return Ok(());
            }
            let to = ctx.account(1)?;
            let to_lamports = to
                .lamports()
                .checked_add(lamports)
                .ok_or(InstructionError::Overflow("lamports"))?;
            debit(ctx, 0, lamports)?;
            ctx.account_mut(1)?.set_lamports(to_lamports);
            Ok(())
        }

        SystemInstruction::Assign { owner } => {
            let key = ctx.key(0)?;
            if ctx.account(0)?.owner() != &ID {
                return Err(InstructionError::IllegalOwner(key));
            }
            ctx.account_mut(0)?.set_owner(owner);
            Ok(())
        }

        SystemInstruction::Allocate { space } => {
            let key = ctx.key(0)?;
            let account = ctx.account(0)?;
            if account.owner() != &ID {
                return Err(InstructionError::IllegalOwner(key));
            }
            if !account.data().is_empty() {
                return Err(InstructionError::AccountAlreadyInUse(key));
            }
            allocate_space(ctx, 0, space)
        }
    }
}

/// Take `lamports` from the system-owned account at `position`.
fn debit(ctx: &mut InvokeContext, position: usize, lamports: u64) -> Result<(), InstructionError> {
    let key = ctx.key(position)?;
    let account = ctx.account(position)?;
    if account.owner() != &ID {
        return Err(InstructionError::IllegalOwner(key));
    }
    let balance = account.lamports();
    let remaining = balance
        .checked_sub(lamports)
        .ok_or(InstructionError::InsufficientFunds {
            account: key,
            balance,
            required: lamports,
        })?;
    ctx.account_mut(position)?.set_lamports(remaining);
    Ok(())
}

fn allocate_space(
    ctx: &mut InvokeContext,
    position: usize,
    space: u64,
) -> Result<(), InstructionError> {
    if space > MAX_PERMITTED_DATA_LENGTH {
        return Err(invalid("space exceeds maximum data length"));
    }
    ctx.account_mut(position)?.data_mut().resize(space as usize, 0);
    Ok(())
}

fn allocate_and_assign(
    ctx: &mut InvokeContext,
    space: u64,
    owner: Pubkey,
) -> Result<(), InstructionError> {
    allocate_space(ctx, 1, space)?;
    ctx.account_mut(1)?.set_owner(owner);
    Ok(())
}
