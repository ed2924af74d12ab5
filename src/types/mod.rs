pub mod account;
pub mod instruction;
pub mod transaction;

pub use account::{AccountSharedData, Lamports, Pubkey};
pub use instruction::{AccountMeta, Instruction};
pub use transaction::{Message, Transaction};
