//! Consistency verifier: read-only reconciliation of the ledger.
//!
//! Three views of the same money, read from one snapshot:
//!   - account_sum:   sum(accounts.balance), the ground truth
//!   - aggregate_sum: sum of the aggregate shards (absent when S = 0)
//!   - history_sum:   sum of every history delta ever appended
//!
//! Drift is reported, never raised. Callers decide how loud to be.

use crate::{
    aggregate_counter::AggregateCounter,
    error::LedgerResult,
    model::BalanceCheck,
    store::{LedgerRead, LedgerStore},
    types::Cents,
};
use std::sync::Arc;

pub struct ConsistencyVerifier {
    store: Arc<LedgerStore>,
    counter: Arc<AggregateCounter>,
}

impl ConsistencyVerifier {
    pub fn new(store: Arc<LedgerStore>, counter: Arc<AggregateCounter>) -> Self {
        Self { store, counter }
    }

    pub fn verify_consistent_balances(&self) -> LedgerResult<BalanceCheck> {
        let check = self.store.read_snapshot(|snap| {
            let account_sum = snap.sum_account_balances()?;
            let history_sum = snap.sum_history_changes()?;
            let aggregate_sum = if self.counter.enabled() {
                Some(self.counter.total_in(snap)?)
            } else {
                None
            };
            let consistent = account_sum == history_sum
                && aggregate_sum.map_or(true, |agg| agg == account_sum);
            Ok(BalanceCheck {
                consistent,
                account_sum,
                aggregate_sum,
                history_sum,
            })
        })?;

        if check.consistent {
            log::info!(
                "balances consistent: accounts={} aggregate={:?} history={}",
                check.account_sum,
                check.aggregate_sum,
                check.history_sum
            );
        } else {
            log::warn!(
                "balance drift: accounts={} aggregate={:?} history={}",
                check.account_sum,
                check.aggregate_sum,
                check.history_sum
            );
        }
        Ok(check)
    }

    /// Total money in the bank: the shard sum when tracking is on,
    /// otherwise a full scan of account balances.
    pub fn total_bank_balance(&self) -> LedgerResult<Cents> {
        if self.counter.enabled() {
            self.counter.read_total()
        } else {
            self.store.read_snapshot(|snap| snap.sum_account_balances())
        }
    }
}
