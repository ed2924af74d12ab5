// ---------------------------------------------------------------------------
// Sysvars — runtime-provided values programs read but never write.
//
//   Clock : the current unix timestamp, set by the embedder through the Bank
//   Rent  : the minimum balance an account must retain for its data size
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::types::account::Lamports;

/// Bytes of bookkeeping charged on top of every account's data.
pub const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Clock {
    pub slot: u64,
    pub unix_timestamp: i64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rent {
    pub lamports_per_byte_year: u64,
    pub exemption_threshold_years: u64,
}

impl Default for Rent {
    fn default() -> Self {
        Rent {
            lamports_per_byte_year: 3_480,
            exemption_threshold_years: 2,
        }
    }
}

impl Rent {
    /// Balance below which an account of `data_len` bytes may not drop.
    pub fn minimum_balance(&self, data_len: usize) -> Lamports {
        (ACCOUNT_STORAGE_OVERHEAD + data_len as u64)
            .saturating_mul(self.lamports_per_byte_year)
            .saturating_mul(self.exemption_threshold_years)
    }
}
