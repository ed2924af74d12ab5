// ---------------------------------------------------------------------------
// Relay — forwards an increment to the counter program via a nested call.
//
// The counter program id is taken from the instruction's account list, so
// the relay cannot reach any program the transaction did not name. The
// forwarded meta asks for the counter as writable; if the relay itself only
// received it readonly the bridge rejects the call.
// ---------------------------------------------------------------------------

use borsh::{BorshDeserialize, BorshSerialize};

use crate::error::InstructionError;
use crate::programs::counter::CounterInstruction;
use crate::programs::{AccountRole, ProgramInstruction, dispatch, unpack_borsh};
use crate::runtime::invoke_context::InvokeContext;
use crate::types::account::Pubkey;
use crate::types::instruction::{AccountMeta, Instruction};

pub const ID: Pubkey = Pubkey::new(*b"CounterRelay11111111111111111111");

#[derive(Clone, Copy, Debug, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub enum RelayInstruction {
    /// Increment a counter through the counter program.
    ///
    ///   [0] counter         — must be writable for the nested call to pass
    ///   [1] counter program — readonly
    ForwardIncrement,
}

impl ProgramInstruction for RelayInstruction {
    fn unpack(program_id: &Pubkey, data: &[u8]) -> Result<Self, InstructionError> {
        unpack_borsh(program_id, data)
    }

    fn account_roles(&self) -> &'static [AccountRole] {
        match self {
            RelayInstruction::ForwardIncrement => &[AccountRole::READONLY, AccountRole::READONLY],
        }
    }
}

pub fn forward_increment(counter: &Pubkey, counter_program: &Pubkey) -> Instruction {
    Instruction::new_with_borsh(
        ID,
        &RelayInstruction::ForwardIncrement,
        vec![
            AccountMeta::new(*counter, false),
            AccountMeta::new_readonly(*counter_program, false),
        ],
    )
}

pub fn process_instruction(ctx: &mut InvokeContext, data: &[u8]) -> Result<(), InstructionError> {
    match dispatch::<RelayInstruction>(ctx, data)? {
        RelayInstruction::ForwardIncrement => {
            let counter = ctx.key(0)?;
            let counter_program = ctx.key(1)?;
            ctx.log(format!("Relay: forwarding increment of {counter}"));
            let forwarded = Instruction::new_with_borsh(
                counter_program,
                &CounterInstruction::Increment,
                vec![AccountMeta::new(counter, false)],
            );
            ctx.invoke(&forwarded)
        }
    }
}
