use super::{expect_one_updated, to_micros, LedgerTxn};
use crate::{
    error::LedgerResult,
    model::Account,
    store::LedgerRead,
    types::{AccountNumber, Cents, CustomerNumber},
};
use chrono::{DateTime, Utc};
use rusqlite::params;

impl LedgerTxn<'_> {
    // ── Account ───────────────────────────────────────────────────

    pub fn insert_account(&self, account: &Account) -> LedgerResult<()> {
        self.tx.execute(
            "INSERT INTO accounts (customer_number, account_number, account_type, balance,
                                   creation_time, last_interest_calculation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                account.customer_number,
                account.account_number,
                account.account_type,
                account.balance,
                to_micros(account.creation_time),
                account.last_interest_calculation.map(to_micros),
            ],
        )?;
        Ok(())
    }

    pub fn update_account_balance(
        &self,
        customer_number: CustomerNumber,
        account_number: AccountNumber,
        new_balance: Cents,
    ) -> LedgerResult<()> {
        let changed = self.tx.execute(
            "UPDATE accounts SET balance = ?1
             WHERE customer_number = ?2 AND account_number = ?3",
            params![new_balance, customer_number, account_number],
        )?;
        expect_one_updated(changed, || format!("balance of account {account_number}"))
    }

    /// Advance the monthly-interest idempotency token.
    pub fn update_interest_token(
        &self,
        customer_number: CustomerNumber,
        account_number: AccountNumber,
        calculated_at: DateTime<Utc>,
    ) -> LedgerResult<()> {
        let changed = self.tx.execute(
            "UPDATE accounts SET last_interest_calculation = ?1
             WHERE customer_number = ?2 AND account_number = ?3",
            params![to_micros(calculated_at), customer_number, account_number],
        )?;
        expect_one_updated(changed, || format!("interest token of account {account_number}"))
    }

    /// Bulk reset of every ledger relation, children first. Shard rows go
    /// too whenever the aggregate table exists, whatever the shard count.
    pub fn clear_ledger_tables(&self) -> LedgerResult<()> {
        self.tx.execute_batch(
            "DELETE FROM account_history;
             DELETE FROM accounts;
             DELETE FROM customers;",
        )?;
        if self.has_aggregate_table()? {
            self.tx.execute("DELETE FROM aggregate_balance", [])?;
        }
        Ok(())
    }
}
