//! Integration tests for the consistency verifier.

use ledger_core::{
    clock::{test_epoch, ManualClock},
    config::LedgerConfig,
    engine::LedgerEngine,
    model::{AccountType, Customer},
    rng::CyclingShards,
    seed::{NewAccount, SeedData},
};
use std::sync::Arc;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn seed_data() -> SeedData {
    SeedData {
        customers: vec![
            Customer {
                customer_number: 10,
                first_name: "Marc".into(),
                last_name: "Richards".into(),
            },
            Customer {
                customer_number: 11,
                first_name: "David".into(),
                last_name: "Lomond".into(),
            },
        ],
        accounts: vec![
            NewAccount {
                customer_number: 10,
                account_number: 1,
                account_type: AccountType::Savings,
                opening_balance: 2_500,
            },
            NewAccount {
                customer_number: 11,
                account_number: 2,
                account_type: AccountType::Checking,
                opening_balance: 0,
            },
        ],
    }
}

fn build(shards: u32) -> LedgerEngine {
    let mut config = LedgerConfig::default_test();
    config.aggregate_shards = shards;
    let engine = LedgerEngine::in_memory(
        config,
        Arc::new(ManualClock::new(test_epoch())),
        Box::new(CyclingShards::default()),
    )
    .expect("engine");
    engine.seed(&seed_data()).expect("seed");
    engine
}

fn run_some_postings(engine: &LedgerEngine) {
    engine.accounts.deposit(10, 1, 1_000, None).unwrap();
    engine.accounts.deposit(11, 2, 4_000, None).unwrap();
    engine.accounts.withdraw(11, 2, 1_500, None).unwrap();
    assert!(engine.accounts.withdraw(10, 1, 1_000_000, None).is_err());
    engine.interest.compute_interest_for_all().unwrap();
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn freshly_seeded_ledger_is_consistent() {
    let engine = build(4);
    let check = engine.verifier.verify_consistent_balances().unwrap();
    assert!(check.consistent);
    assert_eq!(check.account_sum, 2_500);
    assert_eq!(check.history_sum, 2_500);
    assert_eq!(check.aggregate_sum, Some(2_500));
}

#[test]
fn ledger_stays_consistent_through_postings_and_interest() {
    let engine = build(4);
    run_some_postings(&engine);

    let check = engine.verifier.verify_consistent_balances().unwrap();
    assert!(check.consistent, "{check:?}");
    // 3500 + 1% and 2500 + 1%
    assert_eq!(check.account_sum, 3_535 + 2_525);
    assert_eq!(engine.verifier.total_bank_balance().unwrap(), check.account_sum);
}

#[test]
fn empty_ledger_is_consistent_at_zero() {
    let engine = build(4);
    engine.clear().unwrap();

    let check = engine.verifier.verify_consistent_balances().unwrap();
    assert!(check.consistent);
    assert_eq!(check.account_sum, 0);
    assert_eq!(check.aggregate_sum, Some(0));
}

#[test]
fn zero_shards_checks_accounts_against_history_only() {
    let engine = build(0);
    run_some_postings(&engine);

    let check = engine.verifier.verify_consistent_balances().unwrap();
    assert!(check.consistent);
    assert_eq!(check.aggregate_sum, None);
    assert_eq!(check.history_sum, check.account_sum);
    assert_eq!(engine.verifier.total_bank_balance().unwrap(), check.account_sum);
}

// ── Drift detection ──────────────────────────────────────────────────────────
// Writes below go around the engines on purpose to simulate corruption.

#[test]
fn balance_written_without_history_is_reported() {
    let engine = build(4);
    engine
        .store
        .run_transaction(|txn| txn.update_account_balance(10, 1, 9_999))
        .unwrap();

    let check = engine.verifier.verify_consistent_balances().unwrap();
    assert!(!check.consistent);
    assert_eq!(check.account_sum, 9_999);
    assert_eq!(check.history_sum, 2_500);
}

#[test]
fn shard_drift_is_reported() {
    let engine = build(4);
    engine
        .store
        .run_transaction(|txn| txn.update_shard_balance(3, 77))
        .unwrap();

    let check = engine.verifier.verify_consistent_balances().unwrap();
    assert!(!check.consistent);
    assert_eq!(check.account_sum, check.history_sum);
    assert_ne!(check.aggregate_sum, Some(check.account_sum));
}
