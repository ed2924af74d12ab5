//! On-ledger stake record and the accrual rule.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::error::InstructionError;
use crate::types::account::Pubkey;

/// 1 version byte + 32 owner + 8 staked + 16 points + 8 timestamp + 1 bump.
pub const STAKE_ACCOUNT_LEN: usize = 66;

const LAYOUT_UNINITIALIZED: u8 = 0;
const LAYOUT_V1: u8 = 1;

/// Time-weighted stake of one owner.
///
/// Points are kept in a u128 so that `staked_amount × elapsed` (both at most
/// 64 bits) can never overflow on its own; only the running total can, past
/// `u128::MAX`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct StakeAccount {
    pub owner: Pubkey,
    pub staked_amount: u64,
    pub total_points: u128,
    pub last_update: i64,
    pub bump: u8,
}

impl StakeAccount {
    pub fn new(owner: Pubkey, bump: u8, now: i64) -> Self {
        StakeAccount {
            owner,
            staked_amount: 0,
            total_points: 0,
            last_update: now,
            bump,
        }
    }

    /// Decode a record. `Ok(None)` for a zeroed (allocated but never
    /// initialized) buffer; any other layout problem is `InvalidAccountData`.
    pub fn unpack(key: &Pubkey, data: &[u8]) -> Result<Option<Self>, InstructionError> {
        if data.len() != STAKE_ACCOUNT_LEN {
            return Err(InstructionError::InvalidAccountData(*key));
        }
        match data[0] {
            LAYOUT_UNINITIALIZED if data.iter().all(|b| *b == 0) => Ok(None),
            LAYOUT_V1 => StakeAccount::try_from_slice(&data[1..])
                .map(Some)
                .map_err(|_| InstructionError::InvalidAccountData(*key)),
            _ => Err(InstructionError::InvalidAccountData(*key)),
        }
    }

    pub fn pack_into(&self, key: &Pubkey, dst: &mut [u8]) -> Result<(), InstructionError> {
        if dst.len() != STAKE_ACCOUNT_LEN {
            return Err(InstructionError::InvalidAccountData(*key));
        }
        dst[0] = LAYOUT_V1;
        let mut body: &mut [u8] = &mut dst[1..];
        self.serialize(&mut body)
            .map_err(|_| InstructionError::InvalidAccountData(*key))
    }

    /// Credit `staked_amount × (now − last_update)` points.
    ///
    /// Must run before any change to `staked_amount` so the interval is paid
    /// at the balance that was actually staked during it. A clock at or
    /// behind `last_update` accrues nothing and leaves the timestamp alone.
    pub fn accrue(&mut self, now: i64) -> Result<(), InstructionError> {
        if now <= self.last_update {
            return Ok(());
        }
        let elapsed = now
            .checked_sub(self.last_update)
            .ok_or(InstructionError::Overflow("elapsed"))?;
        let pending = (self.staked_amount as u128)
            .checked_mul(elapsed as u128)
            .ok_or(InstructionError::Overflow("pending_points"))?;
        self.total_points = self
            .total_points
            .checked_add(pending)
            .ok_or(InstructionError::Overflow("total_points"))?;
        self.last_update = now;
        Ok(())
    }

    /// Accrue, then reset the total. Returns the amount claimed.
    pub fn claim(&mut self, now: i64) -> Result<u128, InstructionError> {
        self.accrue(now)?;
        let claimed = self.total_points;
        self.total_points = 0;
        self.last_update = self.last_update.max(now);
        Ok(claimed)
    }
}
