//! ledger-core: a bank ledger on a transactional store.
//!
//! Customers hold accounts; every balance change is one atomic
//! transaction that also appends account history and moves a sharded
//! aggregate total. Monthly interest is applied at most once per account
//! per month, guarded by an optimistic-concurrency token.

pub mod account_transactions;
pub mod aggregate_counter;
pub mod clock;
pub mod config;
pub mod consistency;
pub mod engine;
pub mod error;
pub mod interest_accrual;
pub mod model;
pub mod rng;
pub mod seed;
pub mod store;
pub mod types;

pub use engine::LedgerEngine;
pub use error::{LedgerError, LedgerResult};
