use super::LedgerTxn;
use crate::{error::LedgerResult, model::Customer};
use rusqlite::params;

impl LedgerTxn<'_> {
    // ── Customer ──────────────────────────────────────────────────

    pub fn insert_customer(&self, customer: &Customer) -> LedgerResult<()> {
        self.tx.execute(
            "INSERT INTO customers (customer_number, first_name, last_name)
             VALUES (?1, ?2, ?3)",
            params![
                customer.customer_number,
                &customer.first_name,
                &customer.last_name,
            ],
        )?;
        Ok(())
    }
}
