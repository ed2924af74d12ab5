use borsh::{BorshDeserialize, BorshSerialize};

use crate::address::derive_stake_address;
use crate::error::InstructionError;
use crate::programs::{AccountRole, ProgramInstruction, system, unpack_borsh};
use crate::types::account::Pubkey;
use crate::types::instruction::{AccountMeta, Instruction};

/// Opcode is the borsh variant index (0..=4); amounts are u64 LE.
#[derive(Clone, Copy, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub enum StakeInstruction {
    /// Allocate the owner's stake record at its derived address.
    ///
    ///   [0] owner         — signer, writable (pays the rent minimum)
    ///   [1] stake account — writable
    ///   [2] system program
    Create,

    /// Accrue, then move `amount` lamports from the owner into the record.
    ///
    ///   [0] owner         — signer, writable
    ///   [1] stake account — writable
    ///   [2] system program
    Stake { amount: u64 },

    /// Accrue, then return `amount` staked lamports to the owner.
    ///
    ///   [0] owner         — signer, writable
    ///   [1] stake account — writable
    Unstake { amount: u64 },

    /// Accrue and publish the total as return data (u128 LE).
    ///
    ///   [0] owner         — signer
    ///   [1] stake account — writable
    GetPoints,

    /// Accrue, publish the total as return data and reset it to zero.
    ///
    ///   [0] owner         — signer
    ///   [1] stake account — writable
    ClaimPoints,
}

impl ProgramInstruction for StakeInstruction {
    fn unpack(program_id: &Pubkey, data: &[u8]) -> Result<Self, InstructionError> {
        unpack_borsh(program_id, data)
    }

    fn account_roles(&self) -> &'static [AccountRole] {
        match self {
            StakeInstruction::Create | StakeInstruction::Stake { .. } => &[
                AccountRole::SIGNER_WRITABLE,
                AccountRole::WRITABLE,
                AccountRole::READONLY,
            ],
            StakeInstruction::Unstake { .. } => {
                &[AccountRole::SIGNER_WRITABLE, AccountRole::WRITABLE]
            }
            StakeInstruction::GetPoints | StakeInstruction::ClaimPoints => {
                &[AccountRole::SIGNER, AccountRole::WRITABLE]
            }
        }
    }
}

fn build(
    program_id: &Pubkey,
    owner: &Pubkey,
    instruction: StakeInstruction,
) -> Result<Instruction, InstructionError> {
    let (stake_address, _) = derive_stake_address(owner, program_id)?;
    let mut accounts = vec![
        AccountMeta::new(*owner, true),
        AccountMeta::new(stake_address, false),
    ];
    match instruction {
        StakeInstruction::Create | StakeInstruction::Stake { .. } => {
            accounts.push(AccountMeta::new_readonly(system::ID, false));
        }
        StakeInstruction::GetPoints | StakeInstruction::ClaimPoints => {
            accounts[0].is_writable = false;
        }
        StakeInstruction::Unstake { .. } => {}
    }
    Ok(Instruction::new_with_borsh(*program_id, &instruction, accounts))
}

pub fn create(program_id: &Pubkey, owner: &Pubkey) -> Result<Instruction, InstructionError> {
    build(program_id, owner, StakeInstruction::Create)
}

pub fn stake(
    program_id: &Pubkey,
    owner: &Pubkey,
    amount: u64,
) -> Result<Instruction, InstructionError> {
    build(program_id, owner, StakeInstruction::Stake { amount })
}

pub fn unstake(
    program_id: &Pubkey,
    owner: &Pubkey,
    amount: u64,
) -> Result<Instruction, InstructionError> {
    build(program_id, owner, StakeInstruction::Unstake { amount })
}

pub fn get_points(program_id: &Pubkey, owner: &Pubkey) -> Result<Instruction, InstructionError> {
    build(program_id, owner, StakeInstruction::GetPoints)
}

pub fn claim_points(program_id: &Pubkey, owner: &Pubkey) -> Result<Instruction, InstructionError> {
    build(program_id, owner, StakeInstruction::ClaimPoints)
}
