// ---------------------------------------------------------------------------
// AccountsDB — the committed account state.
//
// A map from Pubkey → AccountSharedData. Wallets, stake records and counters
// all live here, keyed by address; derived sub-accounts are just entries at
// their derived address. Transactions never write here directly: the
// executor works on a copy and stores it back only when every instruction
// succeeded.
// ---------------------------------------------------------------------------

use std::collections::HashMap;

use crate::types::account::{AccountSharedData, Lamports, Pubkey};

#[derive(Default)]
pub struct AccountsDB {
    accounts: HashMap<Pubkey, AccountSharedData>,
}

impl AccountsDB {
    pub fn new() -> Self {
        AccountsDB {
            accounts: HashMap::new(),
        }
    }

    /// Returns None if nothing was ever stored at `pubkey`.
    pub fn load(&self, pubkey: &Pubkey) -> Option<&AccountSharedData> {
        self.accounts.get(pubkey)
    }

    /// Store an account, replacing any existing state.
    pub fn store(&mut self, pubkey: Pubkey, account: AccountSharedData) {
        self.accounts.insert(pubkey, account);
    }

    pub fn contains(&self, pubkey: &Pubkey) -> bool {
        self.accounts.contains_key(pubkey)
    }

    /// Balance of `pubkey`, zero for a missing account.
    pub fn lamports(&self, pubkey: &Pubkey) -> Lamports {
        self.load(pubkey).map(|a| a.lamports()).unwrap_or(0)
    }

    /// Sum of every balance; constant across any committed transaction.
    pub fn capitalization(&self) -> u128 {
        self.accounts.values().map(|a| a.lamports() as u128).sum()
    }
}
