//! Setup data and bulk reset.
//!
//! Seed data is an explicit value handed to seed_ledger; nothing about it
//! outlives the call. Opening balances go through the same history and
//! aggregate paths as postings, so every invariant holds from the first
//! committed state.

use crate::{
    aggregate_counter::AggregateCounter,
    error::{LedgerError, LedgerResult},
    model::{Account, AccountType, Customer},
    rng::LedgerRng,
    store::LedgerStore,
    types::{AccountNumber, Cents, CustomerNumber},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const OPENING_MEMO: &str = "New Account Initial Deposit";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub customer_number: CustomerNumber,
    pub account_number: AccountNumber,
    pub account_type: AccountType,
    pub opening_balance: Cents,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedData {
    pub customers: Vec<Customer>,
    pub accounts: Vec<NewAccount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeedReport {
    pub customers: usize,
    pub accounts: usize,
    pub opening_total: Cents,
    pub seeded_at: DateTime<Utc>,
}

impl SeedData {
    /// Five customers with random 63-bit numbers and five empty accounts.
    /// The first customer holds two accounts, one of each type.
    pub fn demo(rng: &mut LedgerRng) -> Self {
        let names = [
            ("Marc", "Richards"),
            ("Catalina", "Smith"),
            ("Alice", "Trentor"),
            ("Lea", "Martin"),
            ("David", "Lomond"),
        ];
        let customers: Vec<Customer> = names
            .iter()
            .map(|(first, last)| Customer {
                customer_number: rng.next_key(),
                first_name: (*first).into(),
                last_name: (*last).into(),
            })
            .collect();

        let owners = [
            (0, AccountType::Savings),
            (0, AccountType::Checking),
            (1, AccountType::Savings),
            (2, AccountType::Checking),
            (3, AccountType::Savings),
        ];
        let accounts = owners
            .iter()
            .map(|(owner, account_type)| NewAccount {
                customer_number: customers[*owner].customer_number,
                account_number: rng.next_key(),
                account_type: *account_type,
                opening_balance: 0,
            })
            .collect();

        Self {
            customers,
            accounts,
        }
    }

    pub fn validate(&self) -> LedgerResult<()> {
        let mut customer_numbers = HashSet::new();
        for c in &self.customers {
            if c.customer_number < 0 {
                return Err(LedgerError::InvalidSeed(format!(
                    "customer number {} is negative",
                    c.customer_number
                )));
            }
            if !customer_numbers.insert(c.customer_number) {
                return Err(LedgerError::InvalidSeed(format!(
                    "customer number {} appears twice",
                    c.customer_number
                )));
            }
        }

        let mut account_numbers = HashSet::new();
        for a in &self.accounts {
            if a.account_number < 0 {
                return Err(LedgerError::InvalidSeed(format!(
                    "account number {} is negative",
                    a.account_number
                )));
            }
            if a.opening_balance < 0 {
                return Err(LedgerError::InvalidSeed(format!(
                    "account {} opens with negative balance {}",
                    a.account_number, a.opening_balance
                )));
            }
            if !customer_numbers.contains(&a.customer_number) {
                return Err(LedgerError::InvalidSeed(format!(
                    "account {} belongs to unknown customer {}",
                    a.account_number, a.customer_number
                )));
            }
            if !account_numbers.insert(a.account_number) {
                return Err(LedgerError::InvalidSeed(format!(
                    "account number {} appears twice",
                    a.account_number
                )));
            }
        }
        Ok(())
    }
}

/// Clear every ledger relation and load `data`, in one transaction.
pub fn seed_ledger(
    store: &LedgerStore,
    counter: &AggregateCounter,
    data: &SeedData,
) -> LedgerResult<SeedReport> {
    data.validate()?;

    let committed = store.run_transaction(|txn| {
        txn.clear_ledger_tables()?;
        counter.reset(txn)?;

        for customer in &data.customers {
            txn.insert_customer(customer)?;
        }

        let mut opening_total: Cents = 0;
        for new in &data.accounts {
            txn.insert_account(&Account {
                customer_number: new.customer_number,
                account_number: new.account_number,
                account_type: new.account_type,
                balance: new.opening_balance,
                creation_time: txn.timestamp(),
                last_interest_calculation: None,
            })?;
            txn.append_history(new.account_number, new.opening_balance, Some(OPENING_MEMO))?;
            if new.opening_balance != 0 {
                counter.apply_delta(txn, new.opening_balance)?;
            }
            opening_total = opening_total
                .checked_add(new.opening_balance)
                .ok_or(LedgerError::BalanceOverflow {
                    account_number: new.account_number,
                })?;
        }
        Ok(opening_total)
    })?;

    let report = SeedReport {
        customers: data.customers.len(),
        accounts: data.accounts.len(),
        opening_total: committed.value,
        seeded_at: committed.timestamp,
    };
    log::info!(
        "seeded {} customers, {} accounts, {} cents",
        report.customers,
        report.accounts,
        report.opening_total
    );
    Ok(report)
}

/// Bulk reset alone: every relation emptied, shards back to zero.
pub fn clear_ledger(store: &LedgerStore, counter: &AggregateCounter) -> LedgerResult<()> {
    store.run_transaction(|txn| {
        txn.clear_ledger_tables()?;
        counter.reset(txn)
    })?;
    log::info!("ledger cleared");
    Ok(())
}
