// ---------------------------------------------------------------------------
// Staking processor.
//
// Every handler re-derives the owner's stake address before touching it, and
// accrues points at the old balance before the balance moves. Lamports only
// ever enter the stake account through a nested system transfer signed by
// the owner; they leave it through a direct debit, which the runtime allows
// because this program owns the record.
// ---------------------------------------------------------------------------

use crate::address::{STAKE_SEED, create_program_address, derive_stake_address};
use crate::error::InstructionError;
use crate::programs::dispatch;
use crate::programs::staking::instruction::StakeInstruction;
use crate::programs::staking::state::{STAKE_ACCOUNT_LEN, StakeAccount};
use crate::programs::system;
use crate::runtime::invoke_context::InvokeContext;
use crate::types::account::Pubkey;

const OWNER: usize = 0;
const STAKE: usize = 1;
const SYSTEM_PROGRAM: usize = 2;

pub fn process_instruction(ctx: &mut InvokeContext, data: &[u8]) -> Result<(), InstructionError> {
    let program_id = ctx.program_id()?;
    match dispatch::<StakeInstruction>(ctx, data)? {
        StakeInstruction::Create => process_create(ctx, &program_id),
        StakeInstruction::Stake { amount } => process_stake(ctx, &program_id, amount),
        StakeInstruction::Unstake { amount } => process_unstake(ctx, &program_id, amount),
        StakeInstruction::GetPoints => process_get_points(ctx, &program_id),
        StakeInstruction::ClaimPoints => process_claim_points(ctx, &program_id),
    }
}

fn process_create(ctx: &mut InvokeContext, program_id: &Pubkey) -> Result<(), InstructionError> {
    check_system_program(ctx)?;
    let owner = ctx.key(OWNER)?;
    let (stake_key, bump) = checked_stake_address(ctx, program_id)?;

    let account = ctx.account(STAKE)?;
    if account.owner() == program_id || !account.data().is_empty() {
        ctx.log(format!("Create: stake account {stake_key} already initialized"));
        return Err(InstructionError::AlreadyInitialized(stake_key));
    }
    if account.owner() != &system::ID {
        return Err(InstructionError::IllegalOwner(stake_key));
    }
    let donated = account.lamports();

    let minimum = ctx.rent().minimum_balance(STAKE_ACCOUNT_LEN);
    let bump_seed = [bump];
    let signer_seeds: &[&[u8]] = &[STAKE_SEED, owner.as_ref(), &bump_seed];
    if donated == 0 {
        let create = system::create_account(
            &owner,
            &stake_key,
            minimum,
            STAKE_ACCOUNT_LEN as u64,
            program_id,
        );
        ctx.invoke_signed(&create, &[signer_seeds])?;
    } else {
        // Anyone can transfer to the derived address ahead of the owner.
        // CreateAccount refuses a funded account, so top up and build it
        // in steps instead.
        let shortfall = minimum.saturating_sub(donated);
        if shortfall > 0 {
            ctx.invoke(&system::transfer(&owner, &stake_key, shortfall))?;
        }
        ctx.invoke_signed(
            &system::allocate(&stake_key, STAKE_ACCOUNT_LEN as u64),
            &[signer_seeds],
        )?;
        ctx.invoke_signed(&system::assign(&stake_key, program_id), &[signer_seeds])?;
    }

    let now = ctx.clock().unix_timestamp;
    store_stake(ctx, &stake_key, &StakeAccount::new(owner, bump, now))?;
    ctx.log(format!("Create: stake account {stake_key} for {owner}"));
    Ok(())
}

fn process_stake(
    ctx: &mut InvokeContext,
    program_id: &Pubkey,
    amount: u64,
) -> Result<(), InstructionError> {
    if amount == 0 {
        return Err(InstructionError::InvalidAmount);
    }
    check_system_program(ctx)?;
    let (stake_key, mut record) = load_stake(ctx, program_id)?;

    record.accrue(ctx.clock().unix_timestamp)?;
    let staked_amount = record
        .staked_amount
        .checked_add(amount)
        .ok_or(InstructionError::Overflow("staked_amount"))?;

    let owner = ctx.key(OWNER)?;
    ctx.invoke(&system::transfer(&owner, &stake_key, amount))?;

    record.staked_amount = staked_amount;
    store_stake(ctx, &stake_key, &record)?;
    ctx.log(format!("Stake: {amount} lamports, {staked_amount} staked"));
    Ok(())
}

fn process_unstake(
    ctx: &mut InvokeContext,
    program_id: &Pubkey,
    amount: u64,
) -> Result<(), InstructionError> {
    if amount == 0 {
        return Err(InstructionError::InvalidAmount);
    }
    let (stake_key, mut record) = load_stake(ctx, program_id)?;
    if amount > record.staked_amount {
        return Err(InstructionError::InsufficientStake {
            staked: record.staked_amount,
            requested: amount,
        });
    }

    record.accrue(ctx.clock().unix_timestamp)?;
    record.staked_amount -= amount;

    let minimum = ctx.rent().minimum_balance(STAKE_ACCOUNT_LEN);
    let stake_balance = ctx.account(STAKE)?.lamports();
    let remaining = stake_balance
        .checked_sub(amount)
        .ok_or(InstructionError::InsufficientFunds {
            account: stake_key,
            balance: stake_balance,
            required: amount,
        })?;
    if remaining < minimum {
        return Err(InstructionError::BelowMinimumBalance {
            account: stake_key,
            remaining,
            minimum,
        });
    }
    let owner_balance = ctx
        .account(OWNER)?
        .lamports()
        .checked_add(amount)
        .ok_or(InstructionError::Overflow("lamports"))?;

    ctx.account_mut(STAKE)?.set_lamports(remaining);
    ctx.account_mut(OWNER)?.set_lamports(owner_balance);
    store_stake(ctx, &stake_key, &record)?;
    ctx.log(format!("Unstake: {amount} lamports, {} staked", record.staked_amount));
    Ok(())
}

fn process_get_points(
    ctx: &mut InvokeContext,
    program_id: &Pubkey,
) -> Result<(), InstructionError> {
    let (stake_key, mut record) = load_stake(ctx, program_id)?;
    record.accrue(ctx.clock().unix_timestamp)?;
    store_stake(ctx, &stake_key, &record)?;

    ctx.log(format!("Points: {}", record.total_points));
    ctx.set_return_data(record.total_points.to_le_bytes().to_vec())
}

fn process_claim_points(
    ctx: &mut InvokeContext,
    program_id: &Pubkey,
) -> Result<(), InstructionError> {
    let (stake_key, mut record) = load_stake(ctx, program_id)?;
    let claimed = record.claim(ctx.clock().unix_timestamp)?;
    store_stake(ctx, &stake_key, &record)?;

    ctx.log(format!("User claimed points: {claimed}"));
    ctx.set_return_data(claimed.to_le_bytes().to_vec())
}

/// Re-derive the signer's stake address and make sure the instruction
/// passed exactly that account.
fn checked_stake_address(
    ctx: &InvokeContext,
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), InstructionError> {
    let owner = ctx.key(OWNER)?;
    let actual = ctx.key(STAKE)?;
    let (expected, bump) = derive_stake_address(&owner, program_id)?;
    if actual != expected {
        return Err(InstructionError::AddressMismatch { expected, actual });
    }
    Ok((expected, bump))
}

fn load_stake(
    ctx: &InvokeContext,
    program_id: &Pubkey,
) -> Result<(Pubkey, StakeAccount), InstructionError> {
    let (stake_key, bump) = checked_stake_address(ctx, program_id)?;
    let owner = ctx.key(OWNER)?;
    let account = ctx.account(STAKE)?;

    if account.owner() != program_id {
        if account.is_in_use() {
            return Err(InstructionError::IllegalOwner(stake_key));
        }
        return Err(InstructionError::Uninitialized(stake_key));
    }
    let record = StakeAccount::unpack(&stake_key, account.data())?
        .ok_or(InstructionError::Uninitialized(stake_key))?;
    if record.owner != owner {
        return Err(InstructionError::IllegalOwner(stake_key));
    }
    if record.bump != bump {
        // A bump with no off-curve address is a corrupt record, not a
        // different address.
        let stored_bump = [record.bump];
        let seeds: &[&[u8]] = &[STAKE_SEED, owner.as_ref(), &stored_bump];
        return Err(match create_program_address(seeds, program_id) {
            Ok(actual) => InstructionError::AddressMismatch {
                expected: stake_key,
                actual,
            },
            Err(_) => InstructionError::InvalidAccountData(stake_key),
        });
    }
    Ok((stake_key, record))
}

fn store_stake(
    ctx: &mut InvokeContext,
    stake_key: &Pubkey,
    record: &StakeAccount,
) -> Result<(), InstructionError> {
    record.pack_into(stake_key, ctx.account_mut(STAKE)?.data_mut())
}

fn check_system_program(ctx: &InvokeContext) -> Result<(), InstructionError> {
    let actual = ctx.key(SYSTEM_PROGRAM)?;
    if actual != system::ID {
        return Err(InstructionError::IncorrectProgramId {
            expected: system::ID,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::programs::default_builtins;
    use crate::programs::staking::{self, ID};
    use crate::runtime::invoke_context::{ExecutionEnvironment, InstructionAccount};
    use crate::runtime::sysvar::{Clock, Rent};
    use crate::types::account::AccountSharedData;
    use crate::types::instruction::Instruction;
    use test_case::test_case;

    const FUNDS: u64 = 10_000_000_000;

    fn owner() -> Pubkey {
        Pubkey::from_byte(1)
    }

    fn environment(now: i64) -> ExecutionEnvironment {
        ExecutionEnvironment {
            clock: Clock {
                slot: 0,
                unix_timestamp: now,
            },
            rent: Rent::default(),
            max_instruction_stack_depth: 5,
        }
    }

    /// Runs one instruction against a working set built from its metas and
    /// hands back the resulting accounts.
    fn run(
        instruction: &Instruction,
        accounts: Vec<AccountSharedData>,
        now: i64,
    ) -> (Result<(), InstructionError>, Vec<AccountSharedData>, Option<Vec<u8>>) {
        let builtins = default_builtins();
        let keys: Vec<Pubkey> = instruction.accounts.iter().map(|m| m.pubkey).collect();
        let slots = instruction
            .accounts
            .iter()
            .enumerate()
            .map(|(index_in_transaction, m)| InstructionAccount {
                index_in_transaction,
                is_signer: m.is_signer,
                is_writable: m.is_writable,
            })
            .collect();
        let mut ctx = InvokeContext::new(keys, accounts, &builtins, environment(now));
        let result = ctx
            .process_instruction(instruction.program_id, slots, &instruction.data)
            .and_then(|()| ctx.take_nested_failure().map_or(Ok(()), Err));
        let (accounts, _, return_data) = ctx.finish();
        (result, accounts, return_data.map(|(_, data)| data))
    }

    fn created(now: i64) -> Vec<AccountSharedData> {
        let ix = staking::create(&ID, &owner()).unwrap();
        let accounts = vec![
            AccountSharedData::new(FUNDS, 0, system::ID),
            AccountSharedData::default(),
            AccountSharedData::new(1, 0, system::ID),
        ];
        let (result, accounts, _) = run(&ix, accounts, now);
        result.unwrap();
        accounts
    }

    fn record(accounts: &[AccountSharedData]) -> StakeAccount {
        StakeAccount::unpack(&Pubkey::default(), accounts[1].data())
            .unwrap()
            .unwrap()
    }

    #[test]
    fn create_funds_the_rent_minimum() {
        let accounts = created(100);
        let minimum = Rent::default().minimum_balance(STAKE_ACCOUNT_LEN);
        assert_eq!(accounts[0].lamports(), FUNDS - minimum);
        assert_eq!(accounts[1].lamports(), minimum);
        assert_eq!(accounts[1].owner(), &ID);

        let record = record(&accounts);
        assert_eq!(record.owner, owner());
        assert_eq!(record.staked_amount, 0);
        assert_eq!(record.last_update, 100);
    }

    #[test]
    fn create_twice_is_already_initialized() {
        let accounts = created(100);
        let ix = staking::create(&ID, &owner()).unwrap();
        let stake_key = ix.accounts[1].pubkey;
        let (result, _, _) = run(&ix, accounts, 101);
        assert_eq!(result, Err(InstructionError::AlreadyInitialized(stake_key)));
    }

    #[test]
    fn wrong_stake_address_is_mismatch() {
        let mut ix = staking::create(&ID, &owner()).unwrap();
        let expected = ix.accounts[1].pubkey;
        ix.accounts[1].pubkey = Pubkey::from_byte(9);
        let accounts = vec![
            AccountSharedData::new(FUNDS, 0, system::ID),
            AccountSharedData::default(),
            AccountSharedData::new(1, 0, system::ID),
        ];
        let (result, _, _) = run(&ix, accounts, 0);
        assert_eq!(
            result,
            Err(InstructionError::AddressMismatch {
                expected,
                actual: Pubkey::from_byte(9),
            })
        );
    }

    #[test]
    fn stake_then_get_points() {
        let accounts = created(0);
        let (result, accounts, _) =
            run(&staking::stake(&ID, &owner(), 1_000).unwrap(), accounts, 0);
        result.unwrap();
        assert_eq!(record(&accounts).staked_amount, 1_000);

        let ix = staking::get_points(&ID, &owner()).unwrap();
        let (result, accounts, return_data) = run(&ix, accounts[..2].to_vec(), 10);
        result.unwrap();
        assert_eq!(return_data, Some(10_000u128.to_le_bytes().to_vec()));
        assert_eq!(record(&accounts).last_update, 10);
    }

    #[test]
    fn unstake_more_than_staked_changes_nothing() {
        let accounts = created(0);
        let (result, accounts, _) = run(&staking::stake(&ID, &owner(), 500).unwrap(), accounts, 0);
        result.unwrap();

        let ix = staking::unstake(&ID, &owner(), 501).unwrap();
        let (result, after, _) = run(&ix, accounts[..2].to_vec(), 50);
        assert_eq!(
            result,
            Err(InstructionError::InsufficientStake {
                staked: 500,
                requested: 501,
            })
        );
        assert_eq!(after[1], accounts[1]);
    }

    #[test]
    fn zero_amounts_are_invalid() {
        let accounts = created(0);
        let ix = staking::stake(&ID, &owner(), 0).unwrap();
        assert_eq!(run(&ix, accounts.clone(), 0).0, Err(InstructionError::InvalidAmount));
        let ix = staking::unstake(&ID, &owner(), 0).unwrap();
        assert_eq!(run(&ix, accounts[..2].to_vec(), 0).0, Err(InstructionError::InvalidAmount));
    }

    #[test]
    fn uninitialized_record_is_rejected() {
        let ix = staking::get_points(&ID, &owner()).unwrap();
        let stake_key = ix.accounts[1].pubkey;
        let accounts = vec![
            AccountSharedData::new(FUNDS, 0, system::ID),
            AccountSharedData::default(),
        ];
        assert_eq!(
            run(&ix, accounts, 0).0,
            Err(InstructionError::Uninitialized(stake_key))
        );
    }

    #[test]
    fn wrong_system_program_is_rejected() {
        let accounts = created(0);
        let mut ix = staking::stake(&ID, &owner(), 5).unwrap();
        ix.accounts[2].pubkey = Pubkey::from_byte(0x42);
        let mut accounts = accounts;
        accounts[2] = AccountSharedData::default();
        assert_eq!(
            run(&ix, accounts, 0).0,
            Err(InstructionError::IncorrectProgramId {
                expected: system::ID,
                actual: Pubkey::from_byte(0x42),
            })
        );
    }

    #[test_case(1 ; "dust")]
    #[test_case(Rent::default().minimum_balance(STAKE_ACCOUNT_LEN) + 7 ; "more than the minimum")]
    fn create_adopts_a_prefunded_address(donated: u64) {
        let ix = staking::create(&ID, &owner()).unwrap();
        let minimum = Rent::default().minimum_balance(STAKE_ACCOUNT_LEN);
        let accounts = vec![
            AccountSharedData::new(FUNDS, 0, system::ID),
            AccountSharedData::new(donated, 0, system::ID),
            AccountSharedData::new(1, 0, system::ID),
        ];
        let (result, accounts, _) = run(&ix, accounts, 5);
        result.unwrap();

        let shortfall = minimum.saturating_sub(donated);
        assert_eq!(accounts[0].lamports(), FUNDS - shortfall);
        assert_eq!(accounts[1].lamports(), donated.max(minimum));
        assert_eq!(accounts[1].owner(), &ID);
        assert_eq!(record(&accounts).last_update, 5);
    }

    #[test]
    fn create_refuses_an_address_owned_elsewhere() {
        let ix = staking::create(&ID, &owner()).unwrap();
        let stake_key = ix.accounts[1].pubkey;
        let accounts = vec![
            AccountSharedData::new(FUNDS, 0, system::ID),
            AccountSharedData::new(10, 0, Pubkey::from_byte(0x66)),
            AccountSharedData::new(1, 0, system::ID),
        ];
        assert_eq!(run(&ix, accounts, 0).0, Err(InstructionError::IllegalOwner(stake_key)));
    }

    #[test]
    fn stored_bump_must_match_the_derived_one() {
        let accounts = created(0);
        let ix = staking::get_points(&ID, &owner()).unwrap();
        let stake_key = ix.accounts[1].pubkey;
        let canonical = record(&accounts).bump;
        let owner = owner();

        for bump in (0..=u8::MAX).filter(|b| *b != canonical) {
            let mut tampered = accounts[..2].to_vec();
            let forged = StakeAccount {
                bump,
                ..record(&accounts)
            };
            forged.pack_into(&stake_key, tampered[1].data_mut()).unwrap();

            let seeds: &[&[u8]] = &[STAKE_SEED, owner.as_ref(), &[bump]];
            let expected = match create_program_address(seeds, &ID) {
                Ok(actual) => InstructionError::AddressMismatch {
                    expected: stake_key,
                    actual,
                },
                Err(_) => InstructionError::InvalidAccountData(stake_key),
            };
            assert_eq!(run(&ix, tampered, 0).0, Err(expected));
        }
    }
}
