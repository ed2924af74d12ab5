// ---------------------------------------------------------------------------
// InvokeContext — per-transaction execution state.
//
// Holds the transaction's working set of accounts and a stack of instruction
// frames. A frame records which program is running and which working-set
// accounts it received, each with the signer/writable privilege it was
// granted. Top-level instructions are pushed by the executor; nested calls
// are pushed by invoke()/invoke_signed(), which refuse to hand a callee any
// privilege its caller does not already hold.
//
// Every frame is checked after its program returns:
//   - readonly accounts are unchanged
//   - only the owning program changed data, owner, or debited lamports
//   - total lamports across the frame's accounts are conserved
// ---------------------------------------------------------------------------

use std::collections::HashMap;

use crate::address::create_program_address;
use crate::error::{InstructionError, Privilege};
use crate::runtime::sysvar::{Clock, Rent};
use crate::types::account::{AccountSharedData, Pubkey};
use crate::types::instruction::Instruction;

/// Entrypoint of a builtin program: the context plus the raw instruction data.
pub type BuiltinFunction = fn(&mut InvokeContext, &[u8]) -> Result<(), InstructionError>;

#[derive(Clone, Default)]
pub struct BuiltinPrograms {
    programs: HashMap<Pubkey, BuiltinFunction>,
}

impl BuiltinPrograms {
    pub fn add(&mut self, program_id: Pubkey, entrypoint: BuiltinFunction) {
        self.programs.insert(program_id, entrypoint);
    }

    pub fn get(&self, program_id: &Pubkey) -> Option<BuiltinFunction> {
        self.programs.get(program_id).copied()
    }

    pub fn contains(&self, program_id: &Pubkey) -> bool {
        self.programs.contains_key(program_id)
    }
}

/// Sysvars and limits shared by every instruction of a transaction.
#[derive(Clone, Copy, Debug)]
pub struct ExecutionEnvironment {
    pub clock: Clock,
    pub rent: Rent,
    pub max_instruction_stack_depth: usize,
}

/// One account slot of an instruction frame.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct InstructionAccount {
    pub index_in_transaction: usize,
    pub is_signer: bool,
    pub is_writable: bool,
}

#[derive(Debug)]
struct InstructionFrame {
    program_id: Pubkey,
    accounts: Vec<InstructionAccount>,
    /// State of each distinct account when the frame was entered, or when
    /// it last issued a nested call.
    pre_accounts: Vec<(usize, AccountSharedData)>,
}

pub struct InvokeContext<'a> {
    keys: Vec<Pubkey>,
    accounts: Vec<AccountSharedData>,
    builtins: &'a BuiltinPrograms,
    environment: ExecutionEnvironment,
    stack: Vec<InstructionFrame>,
    logs: Vec<String>,
    return_data: Option<(Pubkey, Vec<u8>)>,
    nested_failure: Option<InstructionError>,
}

impl<'a> InvokeContext<'a> {
    pub fn new(
        keys: Vec<Pubkey>,
        accounts: Vec<AccountSharedData>,
        builtins: &'a BuiltinPrograms,
        environment: ExecutionEnvironment,
    ) -> Self {
        InvokeContext {
            keys,
            accounts,
            builtins,
            environment,
            stack: Vec::new(),
            logs: Vec::new(),
            return_data: None,
            nested_failure: None,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors used by programs. Positions are relative to the running
    // instruction's account list.
    // -----------------------------------------------------------------------

    /// 1 while a top-level instruction runs, 2 inside its first nested call.
    pub fn stack_height(&self) -> usize {
        self.stack.len()
    }

    pub fn program_id(&self) -> Result<Pubkey, InstructionError> {
        Ok(self.frame()?.program_id)
    }

    pub fn clock(&self) -> Clock {
        self.environment.clock
    }

    pub fn rent(&self) -> Rent {
        self.environment.rent
    }

    pub fn num_accounts(&self) -> usize {
        self.stack.last().map(|f| f.accounts.len()).unwrap_or(0)
    }

    pub fn instruction_account(
        &self,
        position: usize,
    ) -> Result<InstructionAccount, InstructionError> {
        let frame = self.frame()?;
        frame
            .accounts
            .get(position)
            .copied()
            .ok_or(InstructionError::NotEnoughAccountKeys {
                expected: position + 1,
                got: frame.accounts.len(),
            })
    }

    pub fn key(&self, position: usize) -> Result<Pubkey, InstructionError> {
        let account = self.instruction_account(position)?;
        Ok(self.keys[account.index_in_transaction])
    }

    pub fn is_signer(&self, position: usize) -> Result<bool, InstructionError> {
        Ok(self.instruction_account(position)?.is_signer)
    }

    pub fn is_writable(&self, position: usize) -> Result<bool, InstructionError> {
        Ok(self.instruction_account(position)?.is_writable)
    }

    pub fn account(&self, position: usize) -> Result<&AccountSharedData, InstructionError> {
        let account = self.instruction_account(position)?;
        Ok(&self.accounts[account.index_in_transaction])
    }

    /// Mutable access; the slot must have been granted writable.
    pub fn account_mut(
        &mut self,
        position: usize,
    ) -> Result<&mut AccountSharedData, InstructionError> {
        let account = self.instruction_account(position)?;
        if !account.is_writable {
            return Err(InstructionError::ReadonlyAccountModified(
                self.keys[account.index_in_transaction],
            ));
        }
        Ok(&mut self.accounts[account.index_in_transaction])
    }

    /// Append a line to the transaction's program log.
    pub fn log(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::debug!("[program] {}", message);
        self.logs.push(message);
    }

    pub fn set_return_data(&mut self, data: Vec<u8>) -> Result<(), InstructionError> {
        let program_id = self.program_id()?;
        self.return_data = Some((program_id, data));
        Ok(())
    }

    /// Return data of the most recently finished instruction, nested or not.
    pub fn return_data(&self) -> Option<(&Pubkey, &[u8])> {
        self.return_data
            .as_ref()
            .map(|(program_id, data)| (program_id, data.as_slice()))
    }

    // -----------------------------------------------------------------------
    // Dispatch.
    // -----------------------------------------------------------------------

    /// Run `program_id` with the given account slots and data.
    ///
    /// Used by the executor for top-level instructions and by invoke_signed
    /// after privileges have been checked.
    pub fn process_instruction(
        &mut self,
        program_id: Pubkey,
        accounts: Vec<InstructionAccount>,
        data: &[u8],
    ) -> Result<(), InstructionError> {
        let max_depth = self.environment.max_instruction_stack_depth;
        if self.stack.len() >= max_depth {
            return Err(InstructionError::CallDepthExceeded { max_depth });
        }
        let entrypoint = self
            .builtins
            .get(&program_id)
            .ok_or(InstructionError::UnknownProgram(program_id))?;

        let pre_accounts = self.snapshot(&accounts);
        self.stack.push(InstructionFrame {
            program_id,
            accounts,
            pre_accounts,
        });
        let height = self.stack.len();
        self.log(format!("Program {program_id} invoke [{height}]"));
        self.return_data = None;

        let result = entrypoint(self, data);
        let result = match self.stack.pop() {
            Some(frame) => result
                .and_then(|()| self.verify(&frame))
                .map(|()| self.refresh_caller(&frame)),
            None => result,
        };
        // A caller that swallowed a failed nested call still holds baselines
        // from before it; report the nested cause, not the mismatch it left.
        let result = match (result, &self.nested_failure) {
            (Err(_), Some(nested)) => Err(nested.clone()),
            (result, _) => result,
        };

        match &result {
            Ok(()) => self.log(format!("Program {program_id} success")),
            Err(err) => self.log(format!("Program {program_id} failed: {err}")),
        }
        result
    }

    /// Call another program with privileges taken from the caller.
    pub fn invoke(&mut self, instruction: &Instruction) -> Result<(), InstructionError> {
        self.invoke_signed(instruction, &[])
    }

    /// Call another program, additionally signing for the calling program's
    /// derived addresses built from `signer_seeds` (each including its bump).
    ///
    /// Any failure, including a privilege rejection, is recorded and fails
    /// the whole transaction even if the caller carries on.
    pub fn invoke_signed(
        &mut self,
        instruction: &Instruction,
        signer_seeds: &[&[&[u8]]],
    ) -> Result<(), InstructionError> {
        let result = self
            .verify_and_update_caller()
            .and_then(|()| self.prepare_instruction(instruction, signer_seeds))
            .and_then(|accounts| {
                self.process_instruction(instruction.program_id, accounts, &instruction.data)
            });
        if let Err(err) = &result {
            if self.nested_failure.is_none() {
                self.nested_failure = Some(err.clone());
            }
        }
        result
    }

    /// First failed nested call of the transaction, if any.
    pub fn take_nested_failure(&mut self) -> Option<InstructionError> {
        self.nested_failure.take()
    }

    /// Consume the context, yielding the working set, log and return data.
    pub fn finish(self) -> (Vec<AccountSharedData>, Vec<String>, Option<(Pubkey, Vec<u8>)>) {
        (self.accounts, self.logs, self.return_data)
    }

    // -----------------------------------------------------------------------
    // Internals.
    // -----------------------------------------------------------------------

    fn frame(&self) -> Result<&InstructionFrame, InstructionError> {
        self.stack.last().ok_or(InstructionError::InvalidInstruction {
            program: Pubkey::default(),
            reason: "no instruction is executing",
        })
    }

    /// Map the callee's account metas onto caller slots, rejecting any
    /// writable or signer privilege the caller cannot pass on.
    fn prepare_instruction(
        &self,
        instruction: &Instruction,
        signer_seeds: &[&[&[u8]]],
    ) -> Result<Vec<InstructionAccount>, InstructionError> {
        let caller = self.frame()?;
        let signers = signer_seeds
            .iter()
            .map(|seeds| create_program_address(seeds, &caller.program_id))
            .collect::<Result<Vec<Pubkey>, InstructionError>>()?;

        let mut accounts = Vec::with_capacity(instruction.accounts.len());
        for meta in &instruction.accounts {
            // A key listed twice in the caller holds the union of its privileges.
            let mut index_in_transaction = None;
            let mut caller_signer = false;
            let mut caller_writable = false;
            for slot in &caller.accounts {
                if self.keys[slot.index_in_transaction] == meta.pubkey {
                    index_in_transaction = Some(slot.index_in_transaction);
                    caller_signer |= slot.is_signer;
                    caller_writable |= slot.is_writable;
                }
            }
            let index_in_transaction =
                index_in_transaction.ok_or(InstructionError::AccountNotFound(meta.pubkey))?;

            if meta.is_writable && !caller_writable {
                log::debug!("[invoke] {}'s writable privilege escalated", meta.pubkey);
                return Err(InstructionError::PrivilegeEscalation {
                    account: meta.pubkey,
                    privilege: Privilege::Writable,
                });
            }
            if meta.is_signer && !(caller_signer || signers.contains(&meta.pubkey)) {
                log::debug!("[invoke] {}'s signer privilege escalated", meta.pubkey);
                return Err(InstructionError::PrivilegeEscalation {
                    account: meta.pubkey,
                    privilege: Privilege::Signer,
                });
            }

            accounts.push(InstructionAccount {
                index_in_transaction,
                is_signer: meta.is_signer,
                is_writable: meta.is_writable,
            });
        }
        Ok(accounts)
    }

    /// Pre-execution copies of each distinct account (cheap: data is shared).
    fn snapshot(&self, accounts: &[InstructionAccount]) -> Vec<(usize, AccountSharedData)> {
        let mut seen: Vec<(usize, AccountSharedData)> = Vec::with_capacity(accounts.len());
        for slot in accounts {
            let index = slot.index_in_transaction;
            if index < self.accounts.len() && !seen.iter().any(|(i, _)| *i == index) {
                seen.push((index, self.accounts[index].clone()));
            }
        }
        seen
    }

    /// Check the running frame's own changes before a nested call, then
    /// take them as its new baseline.
    fn verify_and_update_caller(&mut self) -> Result<(), InstructionError> {
        self.verify(self.frame()?)?;
        let accounts = &self.accounts;
        if let Some(frame) = self.stack.last_mut() {
            for (index, pre) in frame.pre_accounts.iter_mut() {
                *pre = accounts[*index].clone();
            }
        }
        Ok(())
    }

    /// After a successful nested call the callee's changes are already
    /// verified; fold them into the caller's baseline.
    fn refresh_caller(&mut self, callee: &InstructionFrame) {
        let accounts = &self.accounts;
        if let Some(caller) = self.stack.last_mut() {
            for (index, pre) in caller.pre_accounts.iter_mut() {
                if callee.pre_accounts.iter().any(|(i, _)| i == index) {
                    *pre = accounts[*index].clone();
                }
            }
        }
    }

    fn verify(&self, frame: &InstructionFrame) -> Result<(), InstructionError> {
        let mut before: u128 = 0;
        let mut after: u128 = 0;

        for (index, pre) in &frame.pre_accounts {
            let post = &self.accounts[*index];
            let key = self.keys[*index];
            before += pre.lamports() as u128;
            after += post.lamports() as u128;

            let writable = frame
                .accounts
                .iter()
                .any(|slot| slot.index_in_transaction == *index && slot.is_writable);
            if !writable && post != pre {
                return Err(InstructionError::ReadonlyAccountModified(key));
            }

            let owned = pre.owner() == &frame.program_id;
            let data_changed = post.data() != pre.data();
            let owner_changed = post.owner() != pre.owner();
            let debited = post.lamports() < pre.lamports();
            if !owned && (data_changed || owner_changed || debited) {
                return Err(InstructionError::ExternalAccountModified(key));
            }
        }

        if before != after {
            return Err(InstructionError::UnbalancedInstruction { before, after });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::instruction::AccountMeta;

    const CALLER: Pubkey = Pubkey::new([0xc1; 32]);
    const CALLEE: Pubkey = Pubkey::new([0xc2; 32]);
    const RECURSIVE: Pubkey = Pubkey::new([0xc3; 32]);

    // Writes data[0] into the first byte of account 0.
    fn callee(ctx: &mut InvokeContext, data: &[u8]) -> Result<(), InstructionError> {
        let value = *data.first().ok_or(InstructionError::InvalidInstruction {
            program: CALLEE,
            reason: "empty",
        })?;
        ctx.account_mut(0)?.data_mut()[0] = value;
        ctx.set_return_data(vec![value])
    }

    // Forwards account 0 to the callee with the privileges named in data:
    // data[0] = writable, data[1] = signer, data[2] = swallow the error.
    fn caller(ctx: &mut InvokeContext, data: &[u8]) -> Result<(), InstructionError> {
        let key = ctx.key(0)?;
        let meta = AccountMeta {
            pubkey: key,
            is_signer: data[1] == 1,
            is_writable: data[0] == 1,
        };
        let result = ctx.invoke(&Instruction::new(CALLEE, vec![7], vec![meta]));
        if data[2] == 1 {
            return Ok(());
        }
        result
    }

    fn recursive(ctx: &mut InvokeContext, _data: &[u8]) -> Result<(), InstructionError> {
        ctx.invoke(&Instruction::new(RECURSIVE, vec![], vec![]))
    }

    fn builtins() -> BuiltinPrograms {
        let mut builtins = BuiltinPrograms::default();
        builtins.add(CALLER, caller);
        builtins.add(CALLEE, callee);
        builtins.add(RECURSIVE, recursive);
        builtins
    }

    fn environment() -> ExecutionEnvironment {
        ExecutionEnvironment {
            clock: Clock::default(),
            rent: Rent::default(),
            max_instruction_stack_depth: 5,
        }
    }

    fn context(builtins: &BuiltinPrograms) -> InvokeContext<'_> {
        let target = Pubkey::from_byte(1);
        InvokeContext::new(
            vec![target],
            vec![AccountSharedData::new(10, 1, CALLEE)],
            builtins,
            environment(),
        )
    }

    fn slot(is_signer: bool, is_writable: bool) -> Vec<InstructionAccount> {
        vec![InstructionAccount {
            index_in_transaction: 0,
            is_signer,
            is_writable,
        }]
    }

    #[test]
    fn nested_call_mutates_shared_working_set() {
        let builtins = builtins();
        let mut ctx = context(&builtins);
        ctx.process_instruction(CALLER, slot(false, true), &[1, 0, 0]).unwrap();

        assert!(ctx.take_nested_failure().is_none());
        let (accounts, logs, return_data) = ctx.finish();
        assert_eq!(accounts[0].data(), &[7]);
        assert_eq!(return_data, Some((CALLEE, vec![7])));
        assert!(logs.iter().any(|l| l.ends_with("invoke [2]")));
    }

    #[test]
    fn writable_escalation_is_rejected_before_the_call() {
        let builtins = builtins();
        let mut ctx = context(&builtins);
        let err = ctx
            .process_instruction(CALLER, slot(false, false), &[1, 0, 0])
            .unwrap_err();

        assert_eq!(
            err,
            InstructionError::PrivilegeEscalation {
                account: Pubkey::from_byte(1),
                privilege: Privilege::Writable,
            }
        );
        let (accounts, logs, _) = ctx.finish();
        assert_eq!(accounts[0].data(), &[0]);
        assert!(!logs.iter().any(|l| l.ends_with("invoke [2]")));
    }

    #[test]
    fn signer_escalation_is_rejected() {
        let builtins = builtins();
        let mut ctx = context(&builtins);
        let err = ctx
            .process_instruction(CALLER, slot(false, true), &[1, 1, 0])
            .unwrap_err();
        assert!(matches!(
            err,
            InstructionError::PrivilegeEscalation {
                privilege: Privilege::Signer,
                ..
            }
        ));
    }

    #[test]
    fn swallowed_nested_failure_is_still_recorded() {
        let builtins = builtins();
        let mut ctx = context(&builtins);
        ctx.process_instruction(CALLER, slot(false, false), &[1, 0, 1]).unwrap();
        assert!(matches!(
            ctx.take_nested_failure(),
            Some(InstructionError::PrivilegeEscalation { .. })
        ));
    }

    #[test]
    fn partial_effects_of_a_swallowed_failure_keep_the_original_error() {
        use crate::programs::system;

        // CreateAccount debits the funder before rejecting the size.
        fn oversized(ctx: &mut InvokeContext, _data: &[u8]) -> Result<(), InstructionError> {
            let funder = ctx.key(0)?;
            let new_account = ctx.key(1)?;
            let create = system::create_account(
                &funder,
                &new_account,
                5,
                system::MAX_PERMITTED_DATA_LENGTH + 1,
                &CALLEE,
            );
            let _ = ctx.invoke(&create);
            Ok(())
        }
        let mut builtins = builtins();
        builtins.add(system::ID, system::process_instruction);
        builtins.add(Pubkey::from_byte(0x58), oversized);

        let mut ctx = InvokeContext::new(
            vec![Pubkey::from_byte(1), Pubkey::from_byte(2)],
            vec![
                AccountSharedData::new(10, 0, system::ID),
                AccountSharedData::default(),
            ],
            &builtins,
            environment(),
        );
        let slots = (0..2)
            .map(|index_in_transaction| InstructionAccount {
                index_in_transaction,
                is_signer: true,
                is_writable: true,
            })
            .collect();
        let err = ctx
            .process_instruction(Pubkey::from_byte(0x58), slots, &[])
            .unwrap_err();

        let original = InstructionError::InvalidInstruction {
            program: system::ID,
            reason: "space exceeds maximum data length",
        };
        assert_eq!(err, original);
        assert_eq!(ctx.take_nested_failure(), Some(original));
    }

    #[test]
    fn unbounded_recursion_hits_the_depth_limit() {
        let builtins = builtins();
        let mut ctx = context(&builtins);
        let err = ctx.process_instruction(RECURSIVE, vec![], &[]).unwrap_err();
        assert_eq!(err, InstructionError::CallDepthExceeded { max_depth: 5 });
        assert_eq!(ctx.stack_height(), 0);
    }

    #[test]
    fn readonly_modification_is_caught_after_return() {
        fn sneaky(ctx: &mut InvokeContext, _data: &[u8]) -> Result<(), InstructionError> {
            let index = ctx.instruction_account(0)?.index_in_transaction;
            ctx.accounts[index].data_mut()[0] = 1;
            Ok(())
        }
        let mut builtins = builtins();
        builtins.add(Pubkey::from_byte(0x55), sneaky);
        let mut ctx = context(&builtins);
        let err = ctx
            .process_instruction(Pubkey::from_byte(0x55), slot(false, false), &[])
            .unwrap_err();
        assert_eq!(err, InstructionError::ReadonlyAccountModified(Pubkey::from_byte(1)));
    }

    #[test]
    fn foreign_data_modification_is_caught() {
        fn foreign(ctx: &mut InvokeContext, _data: &[u8]) -> Result<(), InstructionError> {
            ctx.account_mut(0)?.data_mut()[0] = 1;
            Ok(())
        }
        let mut builtins = builtins();
        builtins.add(Pubkey::from_byte(0x56), foreign);
        let mut ctx = context(&builtins);
        let err = ctx
            .process_instruction(Pubkey::from_byte(0x56), slot(false, true), &[])
            .unwrap_err();
        assert_eq!(err, InstructionError::ExternalAccountModified(Pubkey::from_byte(1)));
    }

    #[test]
    fn minting_lamports_is_unbalanced() {
        fn mint(ctx: &mut InvokeContext, _data: &[u8]) -> Result<(), InstructionError> {
            ctx.account_mut(0)?.set_lamports(11);
            Ok(())
        }
        let mut builtins = builtins();
        builtins.add(CALLEE, mint);
        let mut ctx = context(&builtins);
        let err = ctx.process_instruction(CALLEE, slot(false, true), &[]).unwrap_err();
        assert_eq!(err, InstructionError::UnbalancedInstruction { before: 10, after: 11 });
    }

    #[test]
    fn unknown_program_is_rejected() {
        let builtins = builtins();
        let mut ctx = context(&builtins);
        let err = ctx
            .process_instruction(Pubkey::from_byte(0x77), vec![], &[])
            .unwrap_err();
        assert_eq!(err, InstructionError::UnknownProgram(Pubkey::from_byte(0x77)));
    }

    #[test]
    fn account_outside_caller_list_is_not_found() {
        fn stranger(ctx: &mut InvokeContext, _data: &[u8]) -> Result<(), InstructionError> {
            let meta = AccountMeta::new(Pubkey::from_byte(0x99), false);
            ctx.invoke(&Instruction::new(CALLEE, vec![1], vec![meta]))
        }
        let mut builtins = builtins();
        builtins.add(Pubkey::from_byte(0x57), stranger);
        let mut ctx = context(&builtins);
        let err = ctx
            .process_instruction(Pubkey::from_byte(0x57), slot(false, true), &[])
            .unwrap_err();
        assert_eq!(err, InstructionError::AccountNotFound(Pubkey::from_byte(0x99)));
    }
}
