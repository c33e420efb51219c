//! Account transaction engine: deposits and withdrawals.
//!
//! A posting is one read-write transaction that:
//!   1. reads the account balance
//!   2. refuses a debit that would take it below zero
//!   3. writes the new balance
//!   4. appends a history entry stamped with the commit timestamp
//!   5. adds the same delta to one aggregate shard
//!
//! Steps 3–5 are visible together or not at all. Conflicting writers are
//! retried by the store; there is no retry loop here.

use crate::{
    aggregate_counter::AggregateCounter,
    error::{LedgerError, LedgerResult},
    model::{AccountHistoryEntry, Posting},
    store::{LedgerRead, LedgerStore, LedgerTxn},
    types::{AccountNumber, Cents, CustomerNumber, ShardId},
};
use std::sync::Arc;

pub struct AccountTransactionEngine {
    store: Arc<LedgerStore>,
    counter: Arc<AggregateCounter>,
}

impl AccountTransactionEngine {
    pub fn new(store: Arc<LedgerStore>, counter: Arc<AggregateCounter>) -> Self {
        Self { store, counter }
    }

    /// Apply a signed cent delta to one account. Negative `cents` is a
    /// withdrawal and fails with NegativeBalance rather than overdraw.
    pub fn deposit(
        &self,
        customer_number: CustomerNumber,
        account_number: AccountNumber,
        cents: Cents,
        memo: Option<&str>,
    ) -> LedgerResult<Posting> {
        let committed = self.store.run_transaction(|txn| {
            let old_balance = txn.balance_for(customer_number, account_number)?;
            let new_balance = old_balance
                .checked_add(cents)
                .ok_or(LedgerError::BalanceOverflow { account_number })?;
            if cents < 0 && new_balance < 0 {
                return Err(LedgerError::NegativeBalance {
                    account_number,
                    balance: old_balance,
                    requested: cents.saturating_neg(),
                });
            }
            let shard = post_change(
                txn,
                &self.counter,
                customer_number,
                account_number,
                cents,
                memo,
                new_balance,
            )?;
            Ok((new_balance, shard))
        });

        let committed = match committed {
            Ok(c) => c,
            Err(e @ LedgerError::NegativeBalance { .. }) => {
                log::info!("account {account_number}: rejected: {e}");
                return Err(e);
            }
            Err(e) => return Err(e),
        };
        let (new_balance, shard) = committed.value;
        log::info!(
            "account {account_number}: {cents:+} cents -> balance {new_balance} at {}",
            committed.timestamp
        );
        Ok(Posting {
            account_number,
            change_amount: cents,
            new_balance,
            timestamp: committed.timestamp,
            shard,
        })
    }

    /// A deposit of the negated amount.
    pub fn withdraw(
        &self,
        customer_number: CustomerNumber,
        account_number: AccountNumber,
        cents: Cents,
        memo: Option<&str>,
    ) -> LedgerResult<Posting> {
        let delta = cents
            .checked_neg()
            .ok_or(LedgerError::BalanceOverflow { account_number })?;
        self.deposit(customer_number, account_number, delta, memo)
    }

    // ── Reads ─────────────────────────────────────────────────────

    pub fn account_balance(&self, account_number: AccountNumber) -> LedgerResult<Cents> {
        let balance = self
            .store
            .read_snapshot(|snap| snap.account_balance(account_number))?;
        log::debug!("account {account_number}: balance {balance}");
        Ok(balance)
    }

    pub fn customer_balance(&self, customer_number: CustomerNumber) -> LedgerResult<Cents> {
        let balance = self
            .store
            .read_snapshot(|snap| snap.customer_balance(customer_number))?;
        log::debug!("customer {customer_number}: balance {balance}");
        Ok(balance)
    }

    /// The `n` most recent history entries, newest first.
    pub fn last_n_transactions(
        &self,
        account_number: AccountNumber,
        n: usize,
    ) -> LedgerResult<Vec<AccountHistoryEntry>> {
        self.store
            .read_snapshot(|snap| snap.recent_history(account_number, n))
    }
}

/// Write a precomputed balance change: account row, history entry and one
/// aggregate shard, all inside `txn`. Shared by deposits and interest.
pub(crate) fn post_change(
    txn: &LedgerTxn<'_>,
    counter: &AggregateCounter,
    customer_number: CustomerNumber,
    account_number: AccountNumber,
    cents: Cents,
    memo: Option<&str>,
    new_balance: Cents,
) -> LedgerResult<Option<ShardId>> {
    txn.update_account_balance(customer_number, account_number, new_balance)?;
    txn.append_history(account_number, cents, memo)?;
    counter.apply_delta(txn, cents)
}
