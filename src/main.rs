// ---------------------------------------------------------------------------
// Demo — walks one owner through the staking lifecycle and shows a counter
// reached both directly and through the relay program.
//
//   RUST_LOG=debug cargo run -- --stake 1000000000 --elapsed 10
// ---------------------------------------------------------------------------

use std::error::Error;
use std::path::PathBuf;

use clap::Parser;
use ed25519_dalek::SigningKey;

use points_runtime::address::derive_stake_address;
use points_runtime::config::RuntimeConfig;
use points_runtime::programs::counter::{self, CounterAccount};
use points_runtime::programs::{relay, staking, system};
use points_runtime::programs::staking::StakeAccount;
use points_runtime::runtime::{Bank, TransactionReceipt};
use points_runtime::types::{Instruction, Pubkey, Transaction};

const GENESIS_LAMPORTS: u64 = 100_000_000_000;

#[derive(Parser, Debug)]
#[command(name = "points-runtime", about = "Staking points runtime demo")]
struct Args {
    /// JSON runtime config; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Lamports to stake.
    #[arg(long, default_value_t = 1_000_000_000)]
    stake: u64,

    /// Seconds between staking and reading points.
    #[arg(long, default_value_t = 10)]
    elapsed: u32,
}

fn keypair(seed: u8) -> (SigningKey, Pubkey) {
    let key = SigningKey::from_bytes(&[seed; 32]);
    let pubkey = Pubkey(key.verifying_key().to_bytes());
    (key, pubkey)
}

fn submit(
    bank: &mut Bank,
    instructions: &[Instruction],
    signers: &[&SigningKey],
) -> Result<TransactionReceipt, Box<dyn Error>> {
    let tx = Transaction::new_signed_with_payer(instructions, signers)?;
    Ok(bank.process_transaction(&tx)?)
}

fn stake_record(bank: &Bank, owner: &Pubkey) -> Result<StakeAccount, Box<dyn Error>> {
    let (address, _) = derive_stake_address(owner, &staking::ID)?;
    let data = bank.get_account(&address).map(|a| a.data()).unwrap_or_default();
    StakeAccount::unpack(&address, data)?
        .ok_or_else(|| format!("no stake record at {address}").into())
}

fn counter_value(bank: &Bank, address: &Pubkey) -> Result<u32, Box<dyn Error>> {
    let data = bank.get_account(address).map(|a| a.data()).unwrap_or_default();
    Ok(CounterAccount::unpack(address, data)?.count)
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };
    let mut bank = Bank::new(config);

    let (owner_key, owner) = keypair(1);
    let (counter_key, counter_address) = keypair(2);
    bank.deposit(&owner, GENESIS_LAMPORTS);
    println!("[genesis] owner {owner:?} → {GENESIS_LAMPORTS} lamports");

    println!("\n=== Staking ===\n");

    submit(&mut bank, &[staking::create(&staking::ID, &owner)?], &[&owner_key])?;
    let record = stake_record(&bank, &owner)?;
    println!("[1] create       staked={} points={}", record.staked_amount, record.total_points);

    submit(&mut bank, &[staking::stake(&staking::ID, &owner, args.stake)?], &[&owner_key])?;
    let record = stake_record(&bank, &owner)?;
    println!("[2] stake        staked={}", record.staked_amount);

    bank.advance_clock(args.elapsed);
    let receipt = submit(&mut bank, &[staking::get_points(&staking::ID, &owner)?], &[&owner_key])?;
    println!(
        "[3] get_points   after {}s points={}",
        args.elapsed,
        receipt.return_u128().unwrap_or_default()
    );

    bank.advance_clock(args.elapsed);
    submit(
        &mut bank,
        &[staking::unstake(&staking::ID, &owner, args.stake / 2)?],
        &[&owner_key],
    )?;
    let record = stake_record(&bank, &owner)?;
    println!(
        "[4] unstake      staked={} points={}",
        record.staked_amount, record.total_points
    );

    let receipt = submit(
        &mut bank,
        &[staking::claim_points(&staking::ID, &owner)?],
        &[&owner_key],
    )?;
    let record = stake_record(&bank, &owner)?;
    println!(
        "[5] claim        claimed={} points={}",
        receipt.return_u128().unwrap_or_default(),
        record.total_points
    );

    println!("\n=== Counter ===\n");

    let space = CounterAccount::LEN;
    let create_counter = system::create_account(
        &owner,
        &counter_address,
        bank.rent().minimum_balance(space),
        space as u64,
        &counter::ID,
    );
    submit(&mut bank, &[create_counter], &[&owner_key, &counter_key])?;
    println!("[6] counter      count={}", counter_value(&bank, &counter_address)?);

    submit(&mut bank, &[counter::increment(&counter_address)], &[&owner_key])?;
    println!("    direct       count={}", counter_value(&bank, &counter_address)?);

    let receipt = submit(
        &mut bank,
        &[relay::forward_increment(&counter_address, &counter::ID)],
        &[&owner_key],
    )?;
    println!("    via relay    count={}", counter_value(&bank, &counter_address)?);
    for line in &receipt.logs {
        println!("      {line}");
    }

    println!("\n[bank] capitalization {} lamports", bank.capitalization());
    Ok(())
}
