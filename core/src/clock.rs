//! Ledger clock: the store's source of "now".
//!
//! Commit timestamps and the current-month boundary used by interest
//! accrual both come from here, so tests can pin time to a known month.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Mutex;

/// 2026-03-15 12:00:00 UTC. Mid-month, so tests can move a day either way
/// without leaving March.
pub const TEST_EPOCH_SECS: i64 = 1_773_576_000;

pub fn test_epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(TEST_EPOCH_SECS, 0).single().unwrap_or_default()
}

pub trait LedgerClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock. Used by every non-test store.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl LedgerClock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(at) }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl LedgerClock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
