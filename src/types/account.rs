// ---------------------------------------------------------------------------
// Account types.
//
// Every piece of state the runtime knows about is an account: wallets, stake
// records, counters. Each account lives at a 32-byte address and is owned by
// a program. Only the owning program may change its data or debit it.
// ---------------------------------------------------------------------------

use std::fmt;
use std::sync::Arc;

use borsh::{BorshDeserialize, BorshSerialize};

// ---------------------------------------------------------------------------
// Pubkey — a 32-byte address.
//
// Either an ed25519 verifying key (a wallet that can sign) or a derived
// address (off-curve, no private key exists; only its program can sign).
// ---------------------------------------------------------------------------
#[derive(
    Clone, Copy, Default, Eq, PartialEq, Ord, PartialOrd, Hash, BorshSerialize, BorshDeserialize,
)]
pub struct Pubkey(pub [u8; 32]);

impl Pubkey {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Pubkey(bytes)
    }

    /// A convenience for creating test keys from a single byte.
    /// e.g. Pubkey::from_byte(1) → [1, 0, 0, ..., 0]
    pub fn from_byte(b: u8) -> Self {
        let mut bytes = [0u8; 32];
        bytes[0] = b;
        Pubkey(bytes)
    }
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for Pubkey {
    fn from(bytes: [u8; 32]) -> Self {
        Pubkey(bytes)
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pubkey({}..)", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Smallest unit of the native asset.
pub type Lamports = u64;

// ---------------------------------------------------------------------------
// AccountSharedData — the runtime's account record.
//
//   lamports:   native balance
//   data:       program-defined bytes (fixed-layout records)
//   owner:      the program allowed to modify data and debit lamports
//
// Data sits behind an Arc so cloning an account into a transaction working
// set is a pointer copy; the first write triggers copy-on-write.
// ---------------------------------------------------------------------------
#[derive(Clone, Default, Eq, PartialEq, Debug)]
pub struct AccountSharedData {
    lamports: Lamports,
    data: Arc<Vec<u8>>,
    owner: Pubkey,
}

impl AccountSharedData {
    pub fn new(lamports: Lamports, data_len: usize, owner: Pubkey) -> Self {
        AccountSharedData {
            lamports,
            data: Arc::new(vec![0; data_len]),
            owner,
        }
    }

    pub fn new_with_data(lamports: Lamports, data: Vec<u8>, owner: Pubkey) -> Self {
        AccountSharedData {
            lamports,
            data: Arc::new(data),
            owner,
        }
    }

    // --- Getters ---

    pub fn lamports(&self) -> Lamports {
        self.lamports
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn owner(&self) -> &Pubkey {
        &self.owner
    }

    /// An account with no lamports and no data is indistinguishable from a
    /// missing one.
    pub fn is_in_use(&self) -> bool {
        self.lamports > 0 || !self.data.is_empty()
    }

    // --- Setters ---

    pub fn set_lamports(&mut self, lamports: Lamports) {
        self.lamports = lamports;
    }

    /// Mutable access to the data; copies it first if other clones share it.
    pub fn data_mut(&mut self) -> &mut Vec<u8> {
        Arc::make_mut(&mut self.data)
    }

    pub fn set_owner(&mut self, owner: Pubkey) {
        self.owner = owner;
    }
}
