//! Integration tests for the account transaction engine.
//!
//! Covers:
//! 1. Deposits and withdrawals move the balance and append history
//! 2. A withdrawal that would overdraw is rejected and writes nothing
//! 3. Balance always equals the sum of the account's history
//! 4. Lookups by unknown (customer, account) pairs fail with NoResults
//! 5. Balance and history reads

use ledger_core::{
    engine::LedgerEngine,
    error::{LedgerError, LedgerResult},
    model::{AccountType, Customer},
    seed::{NewAccount, SeedData, OPENING_MEMO},
    store::LedgerRead,
};

const ALICE: i64 = 1;
const BOB: i64 = 2;
const ALICE_SAVINGS: i64 = 100;
const ALICE_CHECKING: i64 = 101;
const BOB_SAVINGS: i64 = 200;

fn seed_data() -> SeedData {
    let customer = |n: i64, first: &str, last: &str| Customer {
        customer_number: n,
        first_name: first.into(),
        last_name: last.into(),
    };
    let account = |c: i64, a: i64, t: AccountType| NewAccount {
        customer_number: c,
        account_number: a,
        account_type: t,
        opening_balance: 0,
    };
    SeedData {
        customers: vec![customer(ALICE, "Alice", "Trentor"), customer(BOB, "Bob", "Lomond")],
        accounts: vec![
            account(ALICE, ALICE_SAVINGS, AccountType::Savings),
            account(ALICE, ALICE_CHECKING, AccountType::Checking),
            account(BOB, BOB_SAVINGS, AccountType::Savings),
        ],
    }
}

/// Build a seeded test engine.
fn build(seed: u64) -> LedgerEngine {
    let (engine, _clock) = LedgerEngine::build_test(seed).expect("build_test failed");
    engine.seed(&seed_data()).expect("seed failed");
    engine
}

fn history_sum(engine: &LedgerEngine, account: i64) -> i64 {
    engine
        .store
        .read_snapshot(|snap| snap.history_sum(account))
        .unwrap()
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 1: deposit, withdraw, then an overdraft
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn deposit_withdraw_then_overdraft_is_rejected() {
    let engine = build(1);
    let accounts = &engine.accounts;

    let p = accounts.deposit(ALICE, ALICE_SAVINGS, 10_000, None).unwrap();
    assert_eq!(p.new_balance, 10_000);
    let p = accounts.deposit(ALICE, ALICE_SAVINGS, -3_000, None).unwrap();
    assert_eq!(p.new_balance, 7_000);

    let err = accounts.deposit(ALICE, ALICE_SAVINGS, -8_000, None).unwrap_err();
    match err {
        LedgerError::NegativeBalance {
            account_number,
            balance,
            requested,
        } => {
            assert_eq!(account_number, ALICE_SAVINGS);
            assert_eq!(balance, 7_000);
            assert_eq!(requested, 8_000);
        }
        other => panic!("expected NegativeBalance, got {other:?}"),
    }

    assert_eq!(accounts.account_balance(ALICE_SAVINGS).unwrap(), 7_000);

    let deltas: Vec<i64> = accounts
        .last_n_transactions(ALICE_SAVINGS, 10)
        .unwrap()
        .iter()
        .map(|e| e.change_amount)
        .collect();
    assert_eq!(deltas, vec![-3_000, 10_000, 0], "newest first, opening row last");
}

#[test]
fn withdraw_is_a_negated_deposit() {
    let engine = build(2);
    engine.accounts.deposit(BOB, BOB_SAVINGS, 500, None).unwrap();

    let p = engine.accounts.withdraw(BOB, BOB_SAVINGS, 200, Some("atm")).unwrap();
    assert_eq!(p.change_amount, -200);
    assert_eq!(p.new_balance, 300);

    let latest = &engine.accounts.last_n_transactions(BOB_SAVINGS, 1).unwrap()[0];
    assert_eq!(latest.change_amount, -200);
    assert_eq!(latest.memo.as_deref(), Some("atm"));
    assert_eq!(latest.timestamp, p.timestamp);
}

#[test]
fn withdrawing_the_exact_balance_leaves_zero() {
    let engine = build(3);
    engine.accounts.deposit(BOB, BOB_SAVINGS, 250, None).unwrap();
    let p = engine.accounts.withdraw(BOB, BOB_SAVINGS, 250, None).unwrap();
    assert_eq!(p.new_balance, 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 2: rejected withdrawal writes nothing
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn rejected_withdrawal_leaves_balance_history_and_shards_unchanged() {
    let engine = build(4);
    engine.accounts.deposit(ALICE, ALICE_CHECKING, 1_000, None).unwrap();

    let shards_before = engine.counter.shard_balances().unwrap();
    let history_before = engine.accounts.last_n_transactions(ALICE_CHECKING, 100).unwrap();

    let err = engine
        .accounts
        .withdraw(ALICE, ALICE_CHECKING, 1_001, None)
        .unwrap_err();
    assert!(matches!(err, LedgerError::NegativeBalance { .. }), "{err:?}");

    assert_eq!(engine.accounts.account_balance(ALICE_CHECKING).unwrap(), 1_000);
    assert_eq!(
        engine.accounts.last_n_transactions(ALICE_CHECKING, 100).unwrap(),
        history_before
    );
    let rows = engine
        .store
        .read_snapshot(|snap| snap.history_count(ALICE_CHECKING))
        .unwrap();
    assert_eq!(rows, 2);
    assert_eq!(engine.counter.shard_balances().unwrap(), shards_before);
}

#[test]
fn error_after_partial_writes_rolls_back_all_of_them() {
    let engine = build(11);
    engine.accounts.deposit(ALICE, ALICE_SAVINGS, 2_000, None).unwrap();
    let total_before = engine.counter.read_total().unwrap();

    let result = engine.store.run_transaction(|txn| -> LedgerResult<()> {
        txn.update_account_balance(ALICE, ALICE_SAVINGS, 2_500)?;
        txn.append_history(ALICE_SAVINGS, 500, Some("never committed"))?;
        engine.counter.apply_delta(txn, 500)?;
        Err(LedgerError::Unsupported("abandoned after writing".into()))
    });
    assert!(matches!(result, Err(LedgerError::Unsupported(_))), "{result:?}");

    assert_eq!(engine.accounts.account_balance(ALICE_SAVINGS).unwrap(), 2_000);
    let rows = engine
        .store
        .read_snapshot(|snap| snap.history_count(ALICE_SAVINGS))
        .unwrap();
    assert_eq!(rows, 2);
    assert_eq!(engine.counter.read_total().unwrap(), total_before);
    assert!(engine.verifier.verify_consistent_balances().unwrap().consistent);
}

#[test]
fn failed_shard_write_rolls_back_balance_and_history() {
    let engine = build(12);
    engine.accounts.deposit(BOB, BOB_SAVINGS, 800, None).unwrap();

    let err = engine
        .store
        .run_transaction(|txn| {
            txn.update_account_balance(BOB, BOB_SAVINGS, 900)?;
            txn.append_history(BOB_SAVINGS, 100, None)?;
            txn.update_shard_balance(99, 100)
        })
        .unwrap_err();
    assert!(matches!(err, LedgerError::NoResults { .. }), "{err:?}");

    assert_eq!(engine.accounts.account_balance(BOB_SAVINGS).unwrap(), 800);
    assert_eq!(history_sum(&engine, BOB_SAVINGS), 800);
    assert_eq!(engine.counter.read_total().unwrap(), 800);
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 3: balance == Σ history after every committed posting
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn balance_matches_history_after_every_posting() {
    let engine = build(5);
    let deltas = [700, -200, 1_250, -1_750, 40, -9_999, 3];

    for cents in deltas {
        // Some of these overdraw; that is expected and must not break the invariant.
        let _ = engine.accounts.deposit(ALICE, ALICE_SAVINGS, cents, None);
        let balance = engine.accounts.account_balance(ALICE_SAVINGS).unwrap();
        assert_eq!(balance, history_sum(&engine, ALICE_SAVINGS));
        assert!(balance >= 0);
    }
}

#[test]
fn every_posting_gets_a_distinct_increasing_timestamp() {
    let engine = build(6);
    let mut last = None;
    for _ in 0..5 {
        // The manual clock never moves, so uniqueness comes from the store.
        let p = engine.accounts.deposit(BOB, BOB_SAVINGS, 1, None).unwrap();
        if let Some(prev) = last {
            assert!(p.timestamp > prev, "{} should be after {}", p.timestamp, prev);
        }
        last = Some(p.timestamp);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 4: unknown accounts
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn deposit_to_another_customers_account_is_no_results() {
    let engine = build(7);
    let err = engine.accounts.deposit(BOB, ALICE_SAVINGS, 100, None).unwrap_err();
    assert!(matches!(err, LedgerError::NoResults { .. }), "{err:?}");
    assert_eq!(engine.accounts.account_balance(ALICE_SAVINGS).unwrap(), 0);
}

#[test]
fn unknown_account_and_customer_reads_are_no_results() {
    let engine = build(8);
    assert!(matches!(
        engine.accounts.account_balance(999),
        Err(LedgerError::NoResults { .. })
    ));
    assert!(matches!(
        engine.accounts.customer_balance(999),
        Err(LedgerError::NoResults { .. })
    ));
}

// ─────────────────────────────────────────────────────────────────────────────
// Test 5: reads
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn customer_balance_sums_all_their_accounts() {
    let engine = build(9);
    engine.accounts.deposit(ALICE, ALICE_SAVINGS, 1_500, None).unwrap();
    engine.accounts.deposit(ALICE, ALICE_CHECKING, 250, None).unwrap();
    engine.accounts.deposit(BOB, BOB_SAVINGS, 9_000, None).unwrap();

    assert_eq!(engine.accounts.customer_balance(ALICE).unwrap(), 1_750);
    assert_eq!(engine.accounts.customer_balance(BOB).unwrap(), 9_000);
}

#[test]
fn last_n_transactions_is_newest_first_and_limited() {
    let engine = build(10);
    for i in 1..=5 {
        engine.accounts.deposit(BOB, BOB_SAVINGS, i * 100, None).unwrap();
    }

    let recent = engine.accounts.last_n_transactions(BOB_SAVINGS, 3).unwrap();
    let deltas: Vec<i64> = recent.iter().map(|e| e.change_amount).collect();
    assert_eq!(deltas, vec![500, 400, 300]);
    assert!(recent.windows(2).all(|w| w[0].timestamp > w[1].timestamp));

    let all = engine.accounts.last_n_transactions(BOB_SAVINGS, 100).unwrap();
    assert_eq!(all.len(), 6);
    assert_eq!(all.last().unwrap().memo.as_deref(), Some(OPENING_MEMO));
}
