// ---------------------------------------------------------------------------
// Instruction — an uncompiled call into a program.
//
// Used by clients to build transactions and by programs to issue nested
// calls. Each AccountMeta is a capability: the address plus the signer and
// writable privileges the callee is asked to receive. The runtime only
// honours privileges the caller already holds.
// ---------------------------------------------------------------------------

use crate::types::account::Pubkey;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_signer: bool,
    pub is_writable: bool,
}

impl AccountMeta {
    /// A writable account.
    pub fn new(pubkey: Pubkey, is_signer: bool) -> Self {
        AccountMeta {
            pubkey,
            is_signer,
            is_writable: true,
        }
    }

    pub fn new_readonly(pubkey: Pubkey, is_signer: bool) -> Self {
        AccountMeta {
            pubkey,
            is_signer,
            is_writable: false,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    /// Opcode followed by the fixed-layout payload.
    pub data: Vec<u8>,
}

impl Instruction {
    pub fn new(program_id: Pubkey, data: Vec<u8>, accounts: Vec<AccountMeta>) -> Self {
        Instruction {
            program_id,
            accounts,
            data,
        }
    }

    /// Encode `data` with borsh.
    pub fn new_with_borsh<T: borsh::BorshSerialize>(
        program_id: Pubkey,
        data: &T,
        accounts: Vec<AccountMeta>,
    ) -> Self {
        let mut bytes = Vec::new();
        // Vec<u8> as a writer is infallible.
        let _ = data.serialize(&mut bytes);
        Instruction::new(program_id, bytes, accounts)
    }
}
