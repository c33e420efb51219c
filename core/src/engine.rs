//! The ledger engine: wires the store, the aggregate counter and the
//! three engines together from one LedgerConfig.
//!
//! Every component shares the same store handle and the same counter, so
//! a deposit, an interest accrual and a verification all see one database
//! and one shard layout.

use crate::{
    account_transactions::AccountTransactionEngine,
    aggregate_counter::AggregateCounter,
    clock::{LedgerClock, ManualClock, SystemClock},
    config::LedgerConfig,
    consistency::ConsistencyVerifier,
    error::LedgerResult,
    interest_accrual::InterestAccrualEngine,
    rng::{LedgerRng, RngStream, ShardChooser},
    seed::{self, SeedData, SeedReport},
    store::LedgerStore,
};
use std::sync::Arc;

pub struct LedgerEngine {
    pub config: LedgerConfig,
    pub store: Arc<LedgerStore>,
    pub counter: Arc<AggregateCounter>,
    pub accounts: AccountTransactionEngine,
    pub interest: InterestAccrualEngine,
    pub verifier: ConsistencyVerifier,
}

impl LedgerEngine {
    /// Migrate `store`, line the shard rows up with the configured shard
    /// count, and wire the engines. `chooser` decides which shard absorbs each delta.
    pub fn new(
        config: LedgerConfig,
        store: LedgerStore,
        chooser: Box<dyn ShardChooser>,
    ) -> LedgerResult<Self> {
        config.validate()?;
        store.migrate(config.aggregate_shards)?;

        let store = Arc::new(store);
        let counter = Arc::new(AggregateCounter::new(
            Arc::clone(&store),
            config.aggregate_shards,
            chooser,
        ));
        store.run_transaction(|txn| counter.prepare_shards(txn))?;

        Ok(Self {
            accounts: AccountTransactionEngine::new(Arc::clone(&store), Arc::clone(&counter)),
            interest: InterestAccrualEngine::new(
                Arc::clone(&store),
                Arc::clone(&counter),
                config.interest.clone(),
            ),
            verifier: ConsistencyVerifier::new(Arc::clone(&store), Arc::clone(&counter)),
            config,
            store,
            counter,
        })
    }

    /// File-backed engine on the system clock. Shard choice is seeded from
    /// `seed`, so two runs with the same seed pick the same shards.
    pub fn open(path: &str, config: LedgerConfig, seed: u64) -> LedgerResult<Self> {
        let store = LedgerStore::open(path, config.store.clone(), Arc::new(SystemClock))?;
        Self::new(config, store, Box::new(LedgerRng::new(seed, RngStream::Shards)))
    }

    /// In-memory engine with the given clock.
    pub fn in_memory(
        config: LedgerConfig,
        clock: Arc<dyn LedgerClock>,
        chooser: Box<dyn ShardChooser>,
    ) -> LedgerResult<Self> {
        let store = LedgerStore::in_memory(config.store.clone(), clock)?;
        Self::new(config, store, chooser)
    }

    /// Test config, in-memory store, manual clock, seeded shard choice.
    /// Returns the clock so tests can move time.
    pub fn build_test(seed: u64) -> LedgerResult<(Self, Arc<ManualClock>)> {
        let clock = Arc::new(ManualClock::new(crate::clock::test_epoch()));
        let engine = Self::in_memory(
            LedgerConfig::default_test(),
            clock.clone(),
            Box::new(LedgerRng::new(seed, RngStream::Shards)),
        )?;
        Ok((engine, clock))
    }

    /// Bulk reset, then load `data`.
    pub fn seed(&self, data: &SeedData) -> LedgerResult<SeedReport> {
        seed::seed_ledger(&self.store, &self.counter, data)
    }

    pub fn clear(&self) -> LedgerResult<()> {
        seed::clear_ledger(&self.store, &self.counter)
    }
}
