use super::{expect_one_updated, LedgerTxn};
use crate::{
    error::LedgerResult,
    store::LedgerRead,
    types::{Cents, ShardId},
};
use rusqlite::params;

impl LedgerTxn<'_> {
    // ── Aggregate balance shards ──────────────────────────────────

    pub fn update_shard_balance(&self, shard: ShardId, balance: Cents) -> LedgerResult<()> {
        let changed = self.tx.execute(
            "UPDATE aggregate_balance SET balance = ?1 WHERE shard = ?2",
            params![balance, shard],
        )?;
        expect_one_updated(changed, || format!("aggregate shard {shard}"))
    }

    /// Remove the aggregate table and every shard in it. Returns whether
    /// there was a table to drop.
    pub fn drop_aggregate_table(&self) -> LedgerResult<bool> {
        let existed = self.has_aggregate_table()?;
        if existed {
            self.tx.execute_batch("DROP TABLE aggregate_balance;")?;
        }
        Ok(existed)
    }

    /// Recreate shards 0..shard_count, all at zero.
    pub fn reset_shards(&self, shard_count: u32) -> LedgerResult<()> {
        self.tx.execute("DELETE FROM aggregate_balance", [])?;
        let mut stmt = self
            .tx
            .prepare_cached("INSERT INTO aggregate_balance (shard, balance) VALUES (?1, 0)")?;
        for shard in 0..shard_count {
            stmt.execute(params![shard])?;
        }
        Ok(())
    }

    /// Create any of shards 0..shard_count that do not exist yet, at zero.
    /// Existing shards keep their balances.
    pub fn ensure_shards(&self, shard_count: u32) -> LedgerResult<()> {
        let mut stmt = self.tx.prepare_cached(
            "INSERT OR IGNORE INTO aggregate_balance (shard, balance) VALUES (?1, 0)",
        )?;
        for shard in 0..shard_count {
            stmt.execute(params![shard])?;
        }
        Ok(())
    }
}
