//! Read queries shared by snapshots and read-write transactions.
//!
//! Every read an engine needs is a provided method here, so the same
//! query runs unchanged inside a snapshot (auditing) or inside a
//! transaction (read-your-writes).

use super::{opt_ts_column, to_micros, ts_column};
use crate::{
    error::{LedgerError, LedgerResult},
    model::{Account, AccountHistoryEntry, Customer, InterestCandidate},
    types::{AccountNumber, Cents, CustomerNumber, ShardId},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

pub trait LedgerRead {
    fn conn(&self) -> &Connection;

    /// The store's notion of "now" for this read: the snapshot time, or the
    /// commit timestamp inside a transaction.
    fn now(&self) -> DateTime<Utc>;

    // ── Accounts ──────────────────────────────────────────────────

    /// Balance for the (customer, account) pair.
    fn balance_for(&self, customer_number: CustomerNumber, account_number: AccountNumber) -> LedgerResult<Cents> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT balance FROM accounts
             WHERE customer_number = ?1 AND account_number = ?2",
        )?;
        let rows = stmt.query_map(params![customer_number, account_number], |row| row.get::<_, Cents>(0))?;
        let balance = exactly_one(rows, || {
            format!("balance of account {account_number} for customer {customer_number}")
        })?;
        Ok(balance)
    }

    /// Balance looked up by the unique account number alone.
    fn account_balance(&self, account_number: AccountNumber) -> LedgerResult<Cents> {
        let mut stmt = self
            .conn()
            .prepare_cached("SELECT balance FROM accounts WHERE account_number = ?1")?;
        let rows = stmt.query_map(params![account_number], |row| row.get::<_, Cents>(0))?;
        let balance = exactly_one(rows, || format!("balance of account {account_number}"))?;
        Ok(balance)
    }

    fn account(&self, account_number: AccountNumber) -> LedgerResult<Account> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT customer_number, account_number, account_type, balance,
                    creation_time, last_interest_calculation
             FROM accounts WHERE account_number = ?1",
        )?;
        let rows = stmt.query_map(params![account_number], |row| {
            Ok(Account {
                customer_number: row.get(0)?,
                account_number: row.get(1)?,
                account_type: row.get(2)?,
                balance: row.get(3)?,
                creation_time: ts_column(row, 4)?,
                last_interest_calculation: opt_ts_column(row, 5)?,
            })
        })?;
        let account = exactly_one(rows, || format!("account {account_number}"))?;
        Ok(account)
    }

    fn account_exists(&self, customer_number: CustomerNumber, account_number: AccountNumber) -> LedgerResult<bool> {
        let found = self
            .conn()
            .query_row(
                "SELECT 1 FROM accounts WHERE customer_number = ?1 AND account_number = ?2",
                params![customer_number, account_number],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Balance, but only if the stored interest token still equals
    /// `expected` (NULL-safe). None means the token has moved on or the
    /// account is gone.
    fn balance_if_token(
        &self,
        customer_number: CustomerNumber,
        account_number: AccountNumber,
        expected: Option<DateTime<Utc>>,
    ) -> LedgerResult<Option<Cents>> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT balance FROM accounts
             WHERE customer_number = ?1 AND account_number = ?2
               AND last_interest_calculation IS ?3",
        )?;
        let rows = stmt.query_map(
            params![customer_number, account_number, expected.map(to_micros)],
            |row| row.get::<_, Cents>(0),
        )?;
        match exactly_one(rows, || format!("interest token of account {account_number}")) {
            Ok(balance) => Ok(Some(balance)),
            Err(LedgerError::NoResults { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Up to `limit` accounts whose last accrual happened before
    /// `period_start` (or never), in account-number order.
    fn accounts_due_for_interest(&self, period_start: DateTime<Utc>, limit: usize) -> LedgerResult<Vec<InterestCandidate>> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT customer_number, account_number, last_interest_calculation
             FROM accounts
             WHERE last_interest_calculation IS NULL
                OR last_interest_calculation < ?1
             ORDER BY account_number
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![to_micros(period_start), limit as i64], |row| {
            Ok(InterestCandidate {
                customer_number: row.get(0)?,
                account_number: row.get(1)?,
                last_interest_calculation: opt_ts_column(row, 2)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn account_count(&self) -> LedgerResult<i64> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get::<_, i64>(0))?;
        Ok(count)
    }

    fn sum_account_balances(&self) -> LedgerResult<Cents> {
        let total = self.conn().query_row(
            "SELECT COALESCE(SUM(balance), 0) FROM accounts",
            [],
            |row| row.get::<_, Cents>(0),
        )?;
        Ok(total)
    }

    // ── Customers ─────────────────────────────────────────────────

    fn customer(&self, customer_number: CustomerNumber) -> LedgerResult<Customer> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT customer_number, first_name, last_name
             FROM customers WHERE customer_number = ?1",
        )?;
        let rows = stmt.query_map(params![customer_number], |row| {
            Ok(Customer {
                customer_number: row.get(0)?,
                first_name: row.get(1)?,
                last_name: row.get(2)?,
            })
        })?;
        let customer = exactly_one(rows, || format!("customer {customer_number}"))?;
        Ok(customer)
    }

    /// Sum of every account the customer holds. Unknown customer is
    /// NoResults; a customer with no accounts has balance 0.
    fn customer_balance(&self, customer_number: CustomerNumber) -> LedgerResult<Cents> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT COALESCE(SUM(a.balance), 0)
             FROM customers c
             LEFT JOIN accounts a ON a.customer_number = c.customer_number
             WHERE c.customer_number = ?1
             GROUP BY c.customer_number",
        )?;
        let rows = stmt.query_map(params![customer_number], |row| row.get::<_, Cents>(0))?;
        let balance = exactly_one(rows, || format!("balance of customer {customer_number}"))?;
        Ok(balance)
    }

    // ── History ───────────────────────────────────────────────────

    /// Most recent `limit` entries, newest first.
    fn recent_history(&self, account_number: AccountNumber, limit: usize) -> LedgerResult<Vec<AccountHistoryEntry>> {
        let mut stmt = self.conn().prepare_cached(
            "SELECT account_number, ts, change_amount, memo
             FROM account_history
             WHERE account_number = ?1
             ORDER BY ts DESC
             LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![account_number, limit as i64], |row| {
            Ok(AccountHistoryEntry {
                account_number: row.get(0)?,
                timestamp: ts_column(row, 1)?,
                change_amount: row.get(2)?,
                memo: row.get(3)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn history_sum(&self, account_number: AccountNumber) -> LedgerResult<Cents> {
        let total = self.conn().query_row(
            "SELECT COALESCE(SUM(change_amount), 0) FROM account_history WHERE account_number = ?1",
            params![account_number],
            |row| row.get::<_, Cents>(0),
        )?;
        Ok(total)
    }

    fn history_count(&self, account_number: AccountNumber) -> LedgerResult<i64> {
        let count = self.conn().query_row(
            "SELECT COUNT(*) FROM account_history WHERE account_number = ?1",
            params![account_number],
            |row| row.get::<_, i64>(0),
        )?;
        Ok(count)
    }

    fn sum_history_changes(&self) -> LedgerResult<Cents> {
        let total = self.conn().query_row(
            "SELECT COALESCE(SUM(change_amount), 0) FROM account_history",
            [],
            |row| row.get::<_, Cents>(0),
        )?;
        Ok(total)
    }

    // ── Aggregate shards ──────────────────────────────────────────
    // Callers check the shard count first: with zero shards the table
    // does not exist.

    /// True when the aggregate table is in the schema. It is dropped while
    /// the ledger runs with zero shards.
    fn has_aggregate_table(&self) -> LedgerResult<bool> {
        let found = self.conn().query_row(
            "SELECT EXISTS (SELECT 1 FROM sqlite_master
                            WHERE type = 'table' AND name = 'aggregate_balance')",
            [],
            |row| row.get::<_, bool>(0),
        )?;
        Ok(found)
    }

    fn shard_row_count(&self) -> LedgerResult<i64> {
        let count = self
            .conn()
            .query_row("SELECT COUNT(*) FROM aggregate_balance", [], |row| row.get::<_, i64>(0))?;
        Ok(count)
    }

    fn shard_balance(&self, shard: ShardId) -> LedgerResult<Cents> {
        let mut stmt = self
            .conn()
            .prepare_cached("SELECT balance FROM aggregate_balance WHERE shard = ?1")?;
        let rows = stmt.query_map(params![shard], |row| row.get::<_, Cents>(0))?;
        let balance = exactly_one(rows, || format!("aggregate shard {shard}"))?;
        Ok(balance)
    }

    fn shard_balances(&self) -> LedgerResult<Vec<(ShardId, Cents)>> {
        let mut stmt = self
            .conn()
            .prepare_cached("SELECT shard, balance FROM aggregate_balance ORDER BY shard")?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, ShardId>(0)?, row.get::<_, Cents>(1)?)))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn sum_shard_balances(&self) -> LedgerResult<Cents> {
        let total = self.conn().query_row(
            "SELECT COALESCE(SUM(balance), 0) FROM aggregate_balance",
            [],
            |row| row.get::<_, Cents>(0),
        )?;
        Ok(total)
    }
}

/// Take the only row of a result set: none is NoResults, a second row is
/// TooManyResults.
pub(crate) fn exactly_one<T, I, W>(mut rows: I, what: W) -> LedgerResult<T>
where
    I: Iterator<Item = rusqlite::Result<T>>,
    W: FnOnce() -> String,
{
    let first = match rows.next() {
        Some(row) => row?,
        None => return Err(LedgerError::NoResults { what: what() }),
    };
    if rows.next().is_some() {
        return Err(LedgerError::TooManyResults { what: what() });
    }
    Ok(first)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_row_is_returned() {
        let rows = vec![Ok(42i64)].into_iter();
        assert_eq!(exactly_one(rows, || "x".into()).unwrap(), 42);
    }

    #[test]
    fn empty_result_is_no_results() {
        let rows = Vec::<rusqlite::Result<i64>>::new().into_iter();
        let err = exactly_one(rows, || "balance of account 9".into()).unwrap_err();
        match err {
            LedgerError::NoResults { what } => assert_eq!(what, "balance of account 9"),
            other => panic!("expected NoResults, got {other:?}"),
        }
    }

    #[test]
    fn second_row_is_too_many_results() {
        let rows = vec![Ok(1i64), Ok(2i64)].into_iter();
        let err = exactly_one(rows, || "dup".into()).unwrap_err();
        assert!(matches!(err, LedgerError::TooManyResults { .. }));
    }
}
