//! Builtin programs and the shared instruction dispatcher.
//!
//! Every program decodes its data into an exhaustive instruction enum once,
//! at the entrypoint, and declares the signer/writable role of each account
//! position. [`dispatch`] enforces those roles before any handler runs.

pub mod counter;
pub mod relay;
pub mod staking;
pub mod system;

use borsh::BorshDeserialize;

use crate::error::{InstructionError, Privilege};
use crate::runtime::invoke_context::{BuiltinPrograms, InvokeContext};
use crate::types::account::Pubkey;

/// Privileges an instruction requires at one account position.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AccountRole {
    pub signer: bool,
    pub writable: bool,
}

impl AccountRole {
    pub const SIGNER_WRITABLE: AccountRole = AccountRole {
        signer: true,
        writable: true,
    };
    pub const SIGNER: AccountRole = AccountRole {
        signer: true,
        writable: false,
    };
    pub const WRITABLE: AccountRole = AccountRole {
        signer: false,
        writable: true,
    };
    pub const READONLY: AccountRole = AccountRole {
        signer: false,
        writable: false,
    };
}

pub trait ProgramInstruction: Sized {
    /// Decode opcode + payload. Unknown opcodes, short payloads and trailing
    /// bytes are all `InvalidInstruction`.
    fn unpack(program_id: &Pubkey, data: &[u8]) -> Result<Self, InstructionError>;

    /// Required role of each leading account position.
    fn account_roles(&self) -> &'static [AccountRole];
}

/// Decode the running instruction and check its account roles.
pub fn dispatch<I: ProgramInstruction>(
    ctx: &InvokeContext,
    data: &[u8],
) -> Result<I, InstructionError> {
    let program_id = ctx.program_id()?;
    let instruction = I::unpack(&program_id, data)?;

    let roles = instruction.account_roles();
    if ctx.num_accounts() < roles.len() {
        return Err(InstructionError::NotEnoughAccountKeys {
            expected: roles.len(),
            got: ctx.num_accounts(),
        });
    }
    for (position, role) in roles.iter().enumerate() {
        let account = ctx.instruction_account(position)?;
        if role.signer && !account.is_signer {
            return Err(InstructionError::SignerMissing(ctx.key(position)?));
        }
        if role.writable && !account.is_writable {
            return Err(InstructionError::PrivilegeEscalation {
                account: ctx.key(position)?,
                privilege: Privilege::Writable,
            });
        }
    }
    Ok(instruction)
}

/// Borsh decoding for program instruction enums: u8 opcode, then fields.
pub(crate) fn unpack_borsh<T: BorshDeserialize>(
    program_id: &Pubkey,
    data: &[u8],
) -> Result<T, InstructionError> {
    T::try_from_slice(data).map_err(|_| InstructionError::InvalidInstruction {
        program: *program_id,
        reason: "malformed or truncated instruction data",
    })
}

/// The programs every bank starts with.
pub fn default_builtins() -> BuiltinPrograms {
    let mut builtins = BuiltinPrograms::default();
    builtins.add(system::ID, system::process_instruction);
    builtins.add(staking::ID, staking::process_instruction);
    builtins.add(counter::ID, counter::process_instruction);
    builtins.add(relay::ID, relay::process_instruction);
    builtins
}
