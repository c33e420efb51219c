//! Aggregate counter: a sharded running total of all money in the bank.
//!
//! One global total row would serialize every deposit on a single hot row.
//! Instead the total is split across S shard rows: each posting adds its
//! delta to one shard picked at random, and reading the total sums S rows
//! rather than every account.
//!
//! The cost: each posting touches one extra row. Writes pay for fast reads.
//!
//! S = 0 turns tracking off. Writes become no-ops and reading the total is
//! Unsupported.

use crate::{
    error::{LedgerError, LedgerResult},
    rng::ShardChooser,
    store::{LedgerRead, LedgerStore, LedgerTxn},
    types::{Cents, ShardId},
};
use std::sync::{Arc, Mutex};

pub struct AggregateCounter {
    store: Arc<LedgerStore>,
    shard_count: u32,
    chooser: Mutex<Box<dyn ShardChooser>>,
}

impl AggregateCounter {
    pub fn new(store: Arc<LedgerStore>, shard_count: u32, chooser: Box<dyn ShardChooser>) -> Self {
        Self {
            store,
            shard_count,
            chooser: Mutex::new(chooser),
        }
    }

    pub fn shard_count(&self) -> u32 {
        self.shard_count
    }

    pub fn enabled(&self) -> bool {
        self.shard_count > 0
    }

    /// Sum of every shard, read from one snapshot.
    pub fn read_total(&self) -> LedgerResult<Cents> {
        self.require_enabled("read_total")?;
        self.store.read_snapshot(|snap| self.total_in(snap))
    }

    /// Sum of every shard as seen by an existing snapshot or transaction.
    pub fn total_in(&self, reader: &impl LedgerRead) -> LedgerResult<Cents> {
        self.require_enabled("read_total")?;
        reader.sum_shard_balances()
    }

    pub fn shard_balances(&self) -> LedgerResult<Vec<(ShardId, Cents)>> {
        self.require_enabled("shard_balances")?;
        self.store.read_snapshot(|snap| snap.shard_balances())
    }

    /// Add `cents` to one randomly chosen shard inside the caller's
    /// transaction. Returns the shard used, or None when tracking is off.
    pub fn apply_delta(&self, txn: &LedgerTxn<'_>, cents: Cents) -> LedgerResult<Option<ShardId>> {
        if !self.enabled() {
            return Ok(None);
        }
        let shard = self.choose_shard()?;
        let old_balance = txn.shard_balance(shard)?;
        let new_balance = old_balance
            .checked_add(cents)
            .ok_or_else(|| anyhow::anyhow!("aggregate shard {shard} overflowed"))?;
        txn.update_shard_balance(shard, new_balance)?;
        log::debug!("shard {shard}: {old_balance} -> {new_balance}");
        Ok(Some(shard))
    }

    /// Zero all S shards inside the caller's transaction.
    pub fn reset(&self, txn: &LedgerTxn<'_>) -> LedgerResult<()> {
        if self.enabled() {
            txn.reset_shards(self.shard_count)?;
        }
        Ok(())
    }

    /// Bring the stored shards in line with this counter's shard count,
    /// inside the caller's transaction.
    ///
    /// With S = 0 the aggregate table is dropped: nothing keeps it current
    /// while tracking is off. With S > 0 any missing shard rows are created
    /// at zero. If the table held no rows at all, tracking is starting on a
    /// ledger that may already hold money, so the current account total is
    /// booked to shard 0.
    pub fn prepare_shards(&self, txn: &LedgerTxn<'_>) -> LedgerResult<()> {
        if !self.enabled() {
            if txn.drop_aggregate_table()? {
                log::info!("aggregate tracking off: dropped shard table");
            }
            return Ok(());
        }

        let fresh = txn.shard_row_count()? == 0;
        txn.ensure_shards(self.shard_count)?;
        if fresh {
            let total = txn.sum_account_balances()?;
            if total != 0 {
                txn.update_shard_balance(0, total)?;
                log::info!("aggregate tracking on: booked existing {total} cents to shard 0");
            }
        }
        Ok(())
    }

    fn choose_shard(&self) -> LedgerResult<ShardId> {
        let mut chooser = self
            .chooser
            .lock()
            .map_err(|_| LedgerError::Unavailable("shard chooser mutex poisoned".into()))?;
        Ok(chooser.choose(self.shard_count))
    }

    fn require_enabled(&self, operation: &str) -> LedgerResult<()> {
        if self.enabled() {
            Ok(())
        } else {
            Err(LedgerError::Unsupported(format!(
                "{operation} needs aggregate tracking, but aggregate_shards = 0"
            )))
        }
    }
}
