//! A u32 counter. Behaves identically whether reached directly or through
//! a nested call.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::error::InstructionError;
use crate::programs::{AccountRole, ProgramInstruction, dispatch, unpack_borsh};
use crate::runtime::invoke_context::InvokeContext;
use crate::types::account::Pubkey;
use crate::types::instruction::{AccountMeta, Instruction};

pub const ID: Pubkey = Pubkey::new(*b"Counter1111111111111111111111111");

#[derive(Clone, Copy, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub enum CounterInstruction {
    /// Add one to the counter.
    ///
    ///   [0] counter — writable, owned by this program
    Increment,
}

impl ProgramInstruction for CounterInstruction {
    fn unpack(program_id: &Pubkey, data: &[u8]) -> Result<Self, InstructionError> {
        unpack_borsh(program_id, data)
    }

    fn account_roles(&self) -> &'static [AccountRole] {
        match self {
            CounterInstruction::Increment => &[AccountRole::WRITABLE],
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct CounterAccount {
    pub count: u32,
}

impl CounterAccount {
    pub const LEN: usize = 4;

    pub fn unpack(key: &Pubkey, data: &[u8]) -> Result<Self, InstructionError> {
        if data.len() != Self::LEN {
            return Err(InstructionError::InvalidAccountData(*key));
        }
        CounterAccount::try_from_slice(data).map_err(|_| InstructionError::InvalidAccountData(*key))
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        self.count.to_le_bytes()
    }
}

pub fn increment(counter: &Pubkey) -> Instruction {
    Instruction::new_with_borsh(
        ID,
        &CounterInstruction::Increment,
        vec![AccountMeta::new(*counter, false)],
    )
}

pub fn process_instruction(ctx: &mut InvokeContext, data: &[u8]) -> Result<(), InstructionError> {
    let program_id = ctx.program_id()?;
    match dispatch::<CounterInstruction>(ctx, data)? {
        CounterInstruction::Increment => {
            let key = ctx.key(0)?;
            let account = ctx.account(0)?;
            if account.owner() != &program_id {
                return Err(InstructionError::IllegalOwner(key));
            }
            let mut counter = CounterAccount::unpack(&key, account.data())?;
            counter.count = counter
                .count
                .checked_add(1)
                .ok_or(InstructionError::Overflow("count"))?;

            ctx.account_mut(0)?
                .data_mut()
                .copy_from_slice(&counter.to_bytes());
            ctx.log(format!("Counter: {}", counter.count));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::programs::default_builtins;
    use crate::runtime::invoke_context::{ExecutionEnvironment, InstructionAccount};
    use crate::runtime::sysvar::{Clock, Rent};
    use crate::types::account::AccountSharedData;
    use test_case::test_case;

    fn run(account: AccountSharedData) -> (Result<(), InstructionError>, AccountSharedData) {
        let builtins = default_builtins();
        let environment = ExecutionEnvironment {
            clock: Clock::default(),
            rent: Rent::default(),
            max_instruction_stack_depth: 5,
        };
        let mut ctx =
            InvokeContext::new(vec![Pubkey::from_byte(1)], vec![account], &builtins, environment);
        let slot = InstructionAccount {
            index_in_transaction: 0,
            is_signer: false,
            is_writable: true,
        };
        let result = ctx.process_instruction(ID, vec![slot], &[0]);
        let (mut accounts, _, _) = ctx.finish();
        (result, accounts.remove(0))
    }

    #[test]
    fn increments_by_one() {
        let (result, account) = run(AccountSharedData::new_with_data(1, vec![41, 0, 0, 0], ID));
        result.unwrap();
        assert_eq!(CounterAccount::unpack(&Pubkey::default(), account.data()).unwrap().count, 42);
    }

    #[test]
    fn overflow_at_max() {
        let (result, account) = run(AccountSharedData::new_with_data(
            1,
            u32::MAX.to_le_bytes().to_vec(),
            ID,
        ));
        assert_eq!(result, Err(InstructionError::Overflow("count")));
        assert_eq!(account.data(), &u32::MAX.to_le_bytes());
    }

    #[test]
    fn foreign_owner_is_illegal() {
        let (result, _) = run(AccountSharedData::new(1, 4, Pubkey::from_byte(9)));
        assert_eq!(result, Err(InstructionError::IllegalOwner(Pubkey::from_byte(1))));
    }

    #[test_case(0 ; "empty")]
    #[test_case(3 ; "short")]
    #[test_case(5 ; "long")]
    fn wrong_length_is_invalid_data(len: usize) {
        let (result, _) = run(AccountSharedData::new(1, len, ID));
        assert_eq!(result, Err(InstructionError::InvalidAccountData(Pubkey::from_byte(1))));
    }

    #[test]
    fn payload_after_opcode_is_rejected() {
        assert!(matches!(
            CounterInstruction::unpack(&ID, &[0, 1]),
            Err(InstructionError::InvalidInstruction { .. })
        ));
    }
}
