// ---------------------------------------------------------------------------
// Derived addresses.
//
// A derived address is a SHA-256 hash of caller-chosen seeds, a bump byte
// and the deriving program's id. Only hashes that are NOT valid ed25519
// points are accepted, so no private key can exist for the address and
// only the deriving program can sign for it (via invoke_signed).
//
//   address = SHA-256( seed_0 || .. || seed_n || [bump] || program_id || MARKER )
// ---------------------------------------------------------------------------

use curve25519_dalek::edwards::CompressedEdwardsY;
use sha2::{Digest, Sha256};

use crate::error::InstructionError;
use crate::types::account::Pubkey;

pub const MAX_SEED_LEN: usize = 32;
pub const MAX_SEEDS: usize = 16;

const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

/// Seed tag of every stake record: `["client1", owner]`.
pub const STAKE_SEED: &[u8] = b"client1";

/// Hash the seeds into an address, rejecting on-curve results.
///
/// `seeds` must already include the bump as its final element.
pub fn create_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<Pubkey, InstructionError> {
    // The bump is one extra seed on top of the caller's MAX_SEEDS - 1.
    if seeds.len() > MAX_SEEDS || seeds.iter().any(|seed| seed.len() > MAX_SEED_LEN) {
        return Err(InstructionError::MaxSeedLengthExceeded);
    }

    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(program_id.as_ref());
    hasher.update(PDA_MARKER);
    let hash: [u8; 32] = hasher.finalize().into();

    if is_on_curve(&hash) {
        return Err(InstructionError::InvalidSeeds);
    }
    Ok(Pubkey(hash))
}

/// Find the derived address for `seeds` and the smallest bump that yields an
/// off-curve hash. Pure: the same inputs always give the same pair.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), InstructionError> {
    if seeds.len() >= MAX_SEEDS {
        return Err(InstructionError::MaxSeedLengthExceeded);
    }

    for bump in 0u8..=255 {
        let bump_seed = [bump];
        let mut with_bump: Vec<&[u8]> = seeds.to_vec();
        with_bump.push(&bump_seed);
        match create_program_address(&with_bump, program_id) {
            Ok(address) => return Ok((address, bump)),
            Err(InstructionError::InvalidSeeds) => {}
            Err(err) => return Err(err),
        }
    }
    Err(InstructionError::InvalidSeeds)
}

/// Address of `owner`'s stake record under `program_id`.
pub fn derive_stake_address(
    owner: &Pubkey,
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), InstructionError> {
    find_program_address(&[STAKE_SEED, owner.as_ref()], program_id)
}

fn is_on_curve(bytes: &[u8; 32]) -> bool {
    CompressedEdwardsY(*bytes).decompress().is_some()
}
