use super::{to_micros, LedgerTxn};
use crate::{
    error::LedgerResult,
    types::{AccountNumber, Cents},
};
use rusqlite::params;

impl LedgerTxn<'_> {
    // ── Account history ───────────────────────────────────────────

    /// Append one entry stamped with this transaction's timestamp.
    /// History is append-only: nothing updates or deletes single entries.
    pub fn append_history(
        &self,
        account_number: AccountNumber,
        change_amount: Cents,
        memo: Option<&str>,
    ) -> LedgerResult<()> {
        self.tx.execute(
            "INSERT INTO account_history (account_number, ts, change_amount, memo)
             VALUES (?1, ?2, ?3, ?4)",
            params![account_number, to_micros(self.timestamp), change_amount, memo],
        )?;
        Ok(())
    }
}
