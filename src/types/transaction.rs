// ---------------------------------------------------------------------------
// Transaction types.
//
// A transaction has two top-level parts:
//   - A Message  : the payload (accounts and instructions)
//   - Signatures : one ed25519 signature per required signer
//
// The runtime only executes the Message. Signatures prove that the required
// accounts authorized it; they are checked by the Bank before execution.
// ---------------------------------------------------------------------------

use std::fmt;

use ed25519_dalek::{Signer, SigningKey};

use crate::error::TransactionError;
use crate::types::account::Pubkey;
use crate::types::instruction::Instruction;

/// Key and instruction counts, and per-instruction account lists, are one
/// byte on the wire.
pub const MAX_MESSAGE_ENTRIES: usize = u8::MAX as usize;
/// Instruction data length is a u16 on the wire.
pub const MAX_INSTRUCTION_DATA_LEN: usize = u16::MAX as usize;

fn check_len(field: &'static str, len: usize, max: usize) -> Result<(), TransactionError> {
    if len > max {
        return Err(TransactionError::MessageTooLarge { field, len, max });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Signature — a 64-byte ed25519 signature over Message::serialize().
// ---------------------------------------------------------------------------
#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Signature(pub [u8; 64]);

impl Default for Signature {
    fn default() -> Self {
        Signature([0u8; 64])
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sig({}..)", hex::encode(&self.0[..4]))
    }
}

// ---------------------------------------------------------------------------
// MessageHeader — describes the layout of Message.account_keys.
//
//   [writable signers | readonly signers | writable non-signers | readonly non-signers]
//    <--------- num_required_signatures -------->
//                      <-- num_readonly_signed -->
//                                                                <-- num_readonly_unsigned -->
// ---------------------------------------------------------------------------
#[derive(Clone, Copy, Default, Debug, Eq, PartialEq)]
pub struct MessageHeader {
    /// Number of accounts that must provide a signature.
    /// These are always the first N entries in account_keys.
    pub num_required_signatures: u8,

    /// Of those signers, how many are read-only. These are the last M of the signers.
    pub num_readonly_signed_accounts: u8,

    /// Number of non-signer accounts that are read-only.
    /// These are the last K entries in account_keys.
    pub num_readonly_unsigned_accounts: u8,
}

// ---------------------------------------------------------------------------
// CompiledInstruction — a single instruction inside a Message.
//
// Holds indexes into Message.account_keys instead of Pubkeys, so a key used
// by several instructions is listed (and privileged) once.
// ---------------------------------------------------------------------------
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct CompiledInstruction {
    /// Index into Message.account_keys identifying the program to invoke.
    pub program_id_index: u8,

    /// Ordered list of indexes into Message.account_keys.
    pub accounts: Vec<u8>,

    /// Opcode + payload, decoded by the program.
    pub data: Vec<u8>,
}

impl CompiledInstruction {
    pub fn new(program_id_index: u8, accounts: Vec<u8>, data: Vec<u8>) -> Self {
        CompiledInstruction {
            program_id_index,
            accounts,
            data,
        }
    }
}

// ---------------------------------------------------------------------------
// Message — the payload that signers authorize.
// ---------------------------------------------------------------------------
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Message {
    pub header: MessageHeader,

    /// Flat, deduplicated list of every account the transaction touches,
    /// in header order. Index 0 is the payer when one is given.
    pub account_keys: Vec<Pubkey>,

    pub instructions: Vec<CompiledInstruction>,
}

#[derive(Clone, Copy)]
struct KeyFlags {
    key: Pubkey,
    is_signer: bool,
    is_writable: bool,
}

impl Message {
    /// Compile instructions into a message.
    ///
    /// Privileges of a key used several times are merged (signer if any use
    /// signs, writable if any use writes). Program ids are readonly
    /// non-signers unless an instruction also lists them otherwise.
    ///
    /// Fails with `MessageTooLarge` when the result would not fit the wire
    /// format.
    pub fn new(
        instructions: &[Instruction],
        payer: Option<&Pubkey>,
    ) -> Result<Self, TransactionError> {
        let mut flags: Vec<KeyFlags> = Vec::new();
        let mut upsert = |key: Pubkey, is_signer: bool, is_writable: bool| {
            match flags.iter_mut().find(|entry| entry.key == key) {
                Some(entry) => {
                    entry.is_signer |= is_signer;
                    entry.is_writable |= is_writable;
                }
                None => flags.push(KeyFlags {
                    key,
                    is_signer,
                    is_writable,
                }),
            }
        };

        if let Some(payer) = payer {
            upsert(*payer, true, true);
        }
        for ix in instructions {
            for meta in &ix.accounts {
                upsert(meta.pubkey, meta.is_signer, meta.is_writable);
            }
            upsert(ix.program_id, false, false);
        }

        let group = |signer: bool, writable: bool| -> Vec<Pubkey> {
            flags
                .iter()
                .filter(|entry| entry.is_signer == signer && entry.is_writable == writable)
                .map(|entry| entry.key)
                .collect()
        };
        check_len("account_keys", flags.len(), MAX_MESSAGE_ENTRIES)?;
        let writable_signers = group(true, true);
        let readonly_signers = group(true, false);
        let writable_unsigned = group(false, true);
        let readonly_unsigned = group(false, false);

        let header = MessageHeader {
            num_required_signatures: (writable_signers.len() + readonly_signers.len()) as u8,
            num_readonly_signed_accounts: readonly_signers.len() as u8,
            num_readonly_unsigned_accounts: readonly_unsigned.len() as u8,
        };

        let account_keys: Vec<Pubkey> = writable_signers
            .into_iter()
            .chain(readonly_signers)
            .chain(writable_unsigned)
            .chain(readonly_unsigned)
            .collect();

        let position = |key: &Pubkey| -> u8 {
            // Every key was inserted above.
            account_keys.iter().position(|k| k == key).unwrap_or_default() as u8
        };
        let instructions = instructions
            .iter()
            .map(|ix| {
                CompiledInstruction::new(
                    position(&ix.program_id),
                    ix.accounts.iter().map(|meta| position(&meta.pubkey)).collect(),
                    ix.data.clone(),
                )
            })
            .collect();

        let message = Message {
            header,
            account_keys,
            instructions,
        };
        message.sanitize()?;
        Ok(message)
    }

    /// Check every count against the width it is encoded with. `serialize`
    /// assumes a sanitized message.
    pub fn sanitize(&self) -> Result<(), TransactionError> {
        check_len("account_keys", self.account_keys.len(), MAX_MESSAGE_ENTRIES)?;
        check_len("instructions", self.instructions.len(), MAX_MESSAGE_ENTRIES)?;
        for ix in &self.instructions {
            check_len("instruction accounts", ix.accounts.len(), MAX_MESSAGE_ENTRIES)?;
            check_len("instruction data", ix.data.len(), MAX_INSTRUCTION_DATA_LEN)?;
        }
        Ok(())
    }

    /// Returns true if the account at `index` is a signer.
    pub fn is_signer(&self, index: usize) -> bool {
        index < self.header.num_required_signatures as usize
    }

    /// Returns true if the account at `index` is writable, i.e. NOT in either
    /// readonly group.
    pub fn is_writable(&self, index: usize) -> bool {
        let num_signers = self.header.num_required_signatures as usize;
        let num_readonly_signed = self.header.num_readonly_signed_accounts as usize;
        let num_readonly_unsigned = self.header.num_readonly_unsigned_accounts as usize;
        let total = self.account_keys.len();

        if index < num_signers {
            index < num_signers.saturating_sub(num_readonly_signed)
        } else {
            index < total.saturating_sub(num_readonly_unsigned)
        }
    }

    pub fn signer_keys(&self) -> &[Pubkey] {
        let end = (self.header.num_required_signatures as usize).min(self.account_keys.len());
        &self.account_keys[..end]
    }

    // -----------------------------------------------------------------------
    // serialize — canonical byte encoding; this is what gets signed.
    //
    //   [num_required_signatures:        u8]
    //   [num_readonly_signed_accounts:   u8]
    //   [num_readonly_unsigned_accounts: u8]
    //   [num_account_keys:               u8]
    //   [account_key_i:                  32 bytes each]
    //   [num_instructions:               u8]
    //   for each instruction:
    //     [program_id_index:   u8]
    //     [num_accounts:       u8]
    //     [accounts:           num_accounts bytes]
    //     [data_len:           u16 LE]
    //     [data:               data_len bytes]
    // -----------------------------------------------------------------------
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.push(self.header.num_required_signatures);
        buf.push(self.header.num_readonly_signed_accounts);
        buf.push(self.header.num_readonly_unsigned_accounts);

        buf.push(self.account_keys.len() as u8);
        for key in &self.account_keys {
            buf.extend_from_slice(&key.0);
        }

        buf.push(self.instructions.len() as u8);
        for ix in &self.instructions {
            buf.push(ix.program_id_index);
            buf.push(ix.accounts.len() as u8);
            buf.extend_from_slice(&ix.accounts);
            buf.extend_from_slice(&(ix.data.len() as u16).to_le_bytes());
            buf.extend_from_slice(&ix.data);
        }

        buf
    }
}

// ---------------------------------------------------------------------------
// Transaction — the complete unit submitted to the Bank.
//
// signatures[i] is the signature from message.account_keys[i].
// ---------------------------------------------------------------------------
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Transaction {
    pub signatures: Vec<Signature>,
    pub message: Message,
}

impl Transaction {
    pub fn new(message: Message, signatures: Vec<Signature>) -> Self {
        Transaction {
            signatures,
            message,
        }
    }

    /// Sign `message` with every key whose public half is a required signer.
    /// Signer slots without a matching key keep a zeroed signature and will
    /// fail verification in the Bank.
    pub fn new_signed(message: Message, keys: &[&SigningKey]) -> Result<Self, TransactionError> {
        message.sanitize()?;
        let bytes = message.serialize();
        let signatures = message
            .signer_keys()
            .iter()
            .map(|signer| {
                keys.iter()
                    .find(|key| key.verifying_key().to_bytes() == signer.0)
                    .map(|key| Signature(key.sign(&bytes).to_bytes()))
                    .unwrap_or_default()
            })
            .collect();
        Ok(Transaction::new(message, signatures))
    }

    /// Compile and sign in one step; `keys[0]` pays.
    pub fn new_signed_with_payer(
        instructions: &[Instruction],
        keys: &[&SigningKey],
    ) -> Result<Self, TransactionError> {
        let payer = keys.first().map(|key| Pubkey(key.verifying_key().to_bytes()));
        let message = Message::new(instructions, payer.as_ref())?;
        Transaction::new_signed(message, keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::instruction::AccountMeta;

    fn key(b: u8) -> Pubkey {
        Pubkey::from_byte(b)
    }

    #[test]
    fn compile_orders_keys_by_privilege() {
        let program = key(9);
        let ix = Instruction::new(
            program,
            vec![1],
            vec![
                AccountMeta::new_readonly(key(4), false),
                AccountMeta::new(key(3), false),
                AccountMeta::new_readonly(key(2), true),
            ],
        );
        let message = Message::new(&[ix], Some(&key(1))).unwrap();

        assert_eq!(message.account_keys, vec![key(1), key(2), key(3), key(4), program]);
        assert_eq!(
            message.header,
            MessageHeader {
                num_required_signatures: 2,
                num_readonly_signed_accounts: 1,
                num_readonly_unsigned_accounts: 2,
            }
        );
        assert!(message.is_writable(0));
        assert!(!message.is_writable(1));
        assert!(message.is_writable(2));
        assert!(!message.is_writable(3));
        assert!(!message.is_writable(4));
        assert_eq!(message.instructions[0].program_id_index, 4);
        assert_eq!(message.instructions[0].accounts, vec![3, 2, 1]);
    }

    #[test]
    fn repeated_key_merges_privileges() {
        let program = key(9);
        let first =
            Instruction::new(program, vec![], vec![AccountMeta::new_readonly(key(5), false)]);
        let second = Instruction::new(program, vec![], vec![AccountMeta::new(key(5), false)]);
        let message = Message::new(&[first, second], None).unwrap();

        assert_eq!(message.account_keys, vec![key(5), program]);
        assert!(message.is_writable(0));
        assert_eq!(message.instructions[0].accounts, message.instructions[1].accounts);
    }

    #[test]
    fn signing_fills_one_slot_per_signer() {
        let alice = SigningKey::from_bytes(&[1; 32]);
        let alice_key = Pubkey(alice.verifying_key().to_bytes());
        let ix = Instruction::new(key(9), vec![], vec![AccountMeta::new(alice_key, true)]);

        let tx = Transaction::new_signed_with_payer(&[ix], &[&alice]).unwrap();
        assert_eq!(tx.signatures.len(), 1);
        assert_eq!(tx.message.account_keys[0], alice_key);
        assert_ne!(tx.signatures[0], Signature::default());
    }

    #[test]
    fn too_many_keys_do_not_compile() {
        // 255 distinct accounts plus the program id.
        let accounts = (0..=254u8)
            .map(|b| AccountMeta::new_readonly(Pubkey([b; 32]), false))
            .collect();
        let ix = Instruction::new(Pubkey([0xff; 32]), vec![], accounts);

        assert_eq!(
            Message::new(&[ix], None),
            Err(TransactionError::MessageTooLarge {
                field: "account_keys",
                len: 256,
                max: MAX_MESSAGE_ENTRIES,
            })
        );
    }

    #[test]
    fn oversized_instruction_data_does_not_compile() {
        let ix = Instruction::new(key(9), vec![0; MAX_INSTRUCTION_DATA_LEN + 1], vec![]);

        assert_eq!(
            Message::new(&[ix], None),
            Err(TransactionError::MessageTooLarge {
                field: "instruction data",
                len: MAX_INSTRUCTION_DATA_LEN + 1,
                max: MAX_INSTRUCTION_DATA_LEN,
            })
        );
    }

    #[test]
    fn hand_built_message_is_sanitized_before_signing() {
        let alice = SigningKey::from_bytes(&[1; 32]);
        let message = Message {
            account_keys: vec![key(9)],
            instructions: vec![CompiledInstruction::new(0, vec![0; 256], vec![])],
            ..Message::default()
        };

        assert!(matches!(
            Transaction::new_signed(message, &[&alice]),
            Err(TransactionError::MessageTooLarge { field: "instruction accounts", len: 256, .. })
        ));
    }
}
