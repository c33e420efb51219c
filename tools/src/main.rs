//! ledger-runner: headless demo run of the bank ledger.
//!
//! Usage:
//!   ledger-runner --seed 12345 --db ledger.db
//!   ledger-runner --shards 0 --config data/ledger.json

use anyhow::Result;
use ledger_core::{
    clock::SystemClock,
    config::LedgerConfig,
    engine::LedgerEngine,
    error::LedgerError,
    model::{AccountHistoryEntry, AccrualSummary, BalanceCheck},
    rng::{LedgerRng, RngStream},
    seed::{SeedData, SeedReport},
    types::{AccountNumber, Cents, CustomerNumber},
};
use serde::Serialize;
use std::env;
use std::sync::Arc;

#[derive(Serialize)]
struct RunReport {
    seed: u64,
    db: String,
    aggregate_shards: u32,
    setup: SeedReport,
    customer_number: CustomerNumber,
    account_number: AccountNumber,
    postings: usize,
    rejected: Vec<String>,
    account_balance: Cents,
    customer_balance: Cents,
    last_transactions: Vec<AccountHistoryEntry>,
    interest: AccrualSummary,
    total_bank_balance: Cents,
    consistency: BalanceCheck,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");
    let config_path = args
        .windows(2)
        .find(|w| w[0] == "--config")
        .map(|w| w[1].as_str());

    let mut config = match config_path {
        Some(path) => LedgerConfig::load(path)?,
        None => LedgerConfig::default(),
    };
    config.aggregate_shards = parse_arg(&args, "--shards", config.aggregate_shards);

    let engine = if db == ":memory:" {
        LedgerEngine::in_memory(
            config,
            Arc::new(SystemClock),
            Box::new(LedgerRng::new(seed, RngStream::Shards)),
        )?
    } else {
        LedgerEngine::open(db, config, seed)?
    };

    let report = run_demo(&engine, seed, db)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_demo(engine: &LedgerEngine, seed: u64, db: &str) -> Result<RunReport> {
    let mut keys = LedgerRng::new(seed, RngStream::Keys);
    let data = SeedData::demo(&mut keys);
    let setup = engine.seed(&data)?;

    let first = data
        .accounts
        .first()
        .ok_or_else(|| anyhow::anyhow!("demo seed has no accounts"))?;
    let (customer_number, account_number) = (first.customer_number, first.account_number);

    let mut amounts: Vec<Cents> = vec![150, -5000, 75];
    amounts.extend((0..20).map(|i| i * 100));

    let mut postings = 0;
    let mut rejected = Vec::new();
    for cents in amounts {
        match engine
            .accounts
            .deposit(customer_number, account_number, cents, None)
        {
            Ok(_) => postings += 1,
            Err(e @ LedgerError::NegativeBalance { .. }) => rejected.push(e.to_string()),
            Err(e) => return Err(e.into()),
        }
    }

    let account_balance = engine.accounts.account_balance(account_number)?;
    let customer_balance = engine.accounts.customer_balance(customer_number)?;
    let last_transactions = engine.accounts.last_n_transactions(account_number, 10)?;
    let interest = engine.interest.compute_interest_for_all()?;
    let total_bank_balance = engine.verifier.total_bank_balance()?;
    let consistency = engine.verifier.verify_consistent_balances()?;
    if !consistency.consistent {
        log::warn!("ledger is inconsistent after the demo run");
    }

    Ok(RunReport {
        seed,
        db: db.to_string(),
        aggregate_shards: engine.counter.shard_count(),
        setup,
        customer_number,
        account_number,
        postings,
        rejected,
        account_balance,
        customer_balance,
        last_transactions,
        interest,
        total_bank_balance,
        consistency,
    })
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
