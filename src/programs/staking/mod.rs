//! Time-weighted staking: owners lock lamports in a per-owner record at a
//! derived address and earn `staked × seconds` points.

pub mod instruction;
pub mod processor;
pub mod state;

use crate::types::account::Pubkey;

pub use instruction::{StakeInstruction, claim_points, create, get_points, stake, unstake};
pub use processor::process_instruction;
pub use state::{STAKE_ACCOUNT_LEN, StakeAccount};

pub const ID: Pubkey = Pubkey::new(*b"StakePoints111111111111111111111");
