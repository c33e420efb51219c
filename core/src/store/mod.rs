//! SQLite persistence layer: the Ledger Store.
//!
//! RULE: Only the store talks to the database.
//! Engines call typed methods on a Snapshot or a LedgerTxn; they never
//! execute SQL directly.
//!
//! Two primitives:
//!   - read_snapshot:   a deferred read transaction. In WAL mode every
//!                      query inside it sees one point in time.
//!   - run_transaction: BEGIN IMMEDIATE (single writer, serializable),
//!                      re-running the whole unit of work when another
//!                      writer holds the database. Either every write of
//!                      the unit commits or none does.

mod account;
mod aggregate;
mod customer;
mod history;
mod query;

pub use query::LedgerRead;

use crate::{
    clock::LedgerClock,
    config::StoreConfig,
    error::{LedgerError, LedgerResult},
};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

pub struct LedgerStore {
    conn: Mutex<Connection>,
    path: Option<String>, // None for :memory:
    clock: Arc<dyn LedgerClock>,
    config: StoreConfig,
}

/// A read-write transaction handle. Every step of a unit of work receives
/// the same handle; nothing outside it can see its writes until commit.
pub struct LedgerTxn<'c> {
    tx: Transaction<'c>,
    timestamp: DateTime<Utc>,
}

/// A consistent point-in-time read.
pub struct Snapshot<'c> {
    tx: Transaction<'c>,
    read_at: DateTime<Utc>,
}

/// The value a unit of work returned, plus the timestamp it committed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed<T> {
    pub timestamp: DateTime<Utc>,
    pub value: T,
}

impl LedgerStore {
    /// Open (or create) the ledger database at `path`.
    pub fn open(path: &str, config: StoreConfig, clock: Arc<dyn LedgerClock>) -> LedgerResult<Self> {
        let conn = Connection::open(path)?;
        // WAL: readers keep their snapshot while a writer commits.
        let _mode: String = conn.query_row("PRAGMA journal_mode=WAL;", [], |row| row.get(0))?;
        Self::configure(conn, Some(path.to_string()), config, clock)
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory(config: StoreConfig, clock: Arc<dyn LedgerClock>) -> LedgerResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(conn, None, config, clock)
    }

    fn configure(
        conn: Connection,
        path: Option<String>,
        config: StoreConfig,
        clock: Arc<dyn LedgerClock>,
    ) -> LedgerResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        Ok(Self {
            conn: Mutex::new(conn),
            path,
            clock,
            config,
        })
    }

    /// Another handle on the same database file, sharing this store's clock.
    /// For in-memory stores this returns a new, isolated database.
    pub fn reopen(&self) -> LedgerResult<Self> {
        match &self.path {
            Some(p) => Self::open(p, self.config.clone(), Arc::clone(&self.clock)),
            None => Self::in_memory(self.config.clone(), Arc::clone(&self.clock)),
        }
    }

    /// Apply all schema migrations in order. The aggregate table is only
    /// created when there is at least one shard.
    pub fn migrate(&self, aggregate_shards: u32) -> LedgerResult<()> {
        let conn = self.lock()?;
        conn.execute_batch(include_str!("../../../migrations/001_ledger.sql"))?;
        if aggregate_shards > 0 {
            conn.execute_batch(include_str!("../../../migrations/002_aggregate_balance.sql"))?;
        }
        Ok(())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Run `read` against one consistent snapshot.
    pub fn read_snapshot<T, F>(&self, read: F) -> LedgerResult<T>
    where
        F: FnOnce(&Snapshot<'_>) -> LedgerResult<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Deferred)
            .map_err(|e| unavailable_if_contended(e.into(), "snapshot"))?;
        let snapshot = Snapshot {
            tx,
            read_at: self.clock.now(),
        };
        // Dropping the snapshot rolls back the (read-only) transaction.
        read(&snapshot).map_err(|e| unavailable_if_contended(e, "snapshot"))
    }

    /// Run `unit_of_work` as one atomic read-write transaction, retrying
    /// the whole unit when the database is held by another writer.
    pub fn run_transaction<T, F>(&self, mut unit_of_work: F) -> LedgerResult<Committed<T>>
    where
        F: FnMut(&LedgerTxn<'_>) -> LedgerResult<T>,
    {
        let mut conn = self.lock()?;
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match Self::attempt(&mut conn, self.clock.as_ref(), &mut unit_of_work) {
                Ok(committed) => return Ok(committed),
                Err(e) if e.is_contention() && attempt < self.config.max_commit_attempts => {
                    log::debug!("transaction attempt {attempt} contended, retrying: {e}");
                    let backoff = self.config.retry_backoff_ms.saturating_mul(attempt as u64);
                    std::thread::sleep(Duration::from_millis(backoff));
                }
                Err(e) if e.is_contention() => {
                    log::warn!("transaction gave up after {attempt} attempts: {e}");
                    return Err(LedgerError::Unavailable(format!(
                        "commit retries exhausted after {attempt} attempts: {e}"
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn attempt<T, F>(
        conn: &mut Connection,
        clock: &dyn LedgerClock,
        unit_of_work: &mut F,
    ) -> LedgerResult<Committed<T>>
    where
        F: FnMut(&LedgerTxn<'_>) -> LedgerResult<T>,
    {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let txn = LedgerTxn::begin(tx, clock)?;
        // An Err here drops txn, which rolls back every write of this attempt.
        let value = unit_of_work(&txn)?;
        let timestamp = txn.commit()?;
        Ok(Committed { timestamp, value })
    }

    fn lock(&self) -> LedgerResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| LedgerError::Unavailable("connection mutex poisoned".into()))
    }
}

impl<'c> LedgerTxn<'c> {
    /// Assign this transaction its timestamp. The write lock is already
    /// held, so reading the history high-water mark here makes timestamps
    /// strictly increasing across every committed transaction.
    fn begin(tx: Transaction<'c>, clock: &dyn LedgerClock) -> LedgerResult<Self> {
        let high_water: Option<i64> =
            tx.query_row("SELECT MAX(ts) FROM account_history", [], |row| row.get(0))?;
        let now = to_micros(clock.now());
        let micros = match high_water {
            Some(last) if last >= now => last + 1,
            _ => now,
        };
        Ok(Self {
            tx,
            timestamp: from_micros(micros)?,
        })
    }

    /// The commit timestamp this transaction's writes are stamped with.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn commit(self) -> LedgerResult<DateTime<Utc>> {
        self.tx.commit()?;
        Ok(self.timestamp)
    }
}

impl LedgerRead for LedgerTxn<'_> {
    fn conn(&self) -> &Connection {
        &self.tx
    }

    fn now(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl LedgerRead for Snapshot<'_> {
    fn conn(&self) -> &Connection {
        &self.tx
    }

    fn now(&self) -> DateTime<Utc> {
        self.read_at
    }
}

/// Exactly one row must have been written: none is NoResults, more than
/// one is TooManyResults.
fn expect_one_updated(changed: usize, what: impl FnOnce() -> String) -> LedgerResult<()> {
    match changed {
        1 => Ok(()),
        0 => Err(LedgerError::NoResults { what: what() }),
        _ => Err(LedgerError::TooManyResults { what: what() }),
    }
}

fn unavailable_if_contended(e: LedgerError, what: &str) -> LedgerError {
    if e.is_contention() {
        LedgerError::Unavailable(format!("{what}: {e}"))
    } else {
        e
    }
}

// ── Timestamp encoding ─────────────────────────────────────────────

pub(crate) fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp() * 1_000_000 + at.timestamp_subsec_micros() as i64
}

pub(crate) fn from_micros(micros: i64) -> LedgerResult<DateTime<Utc>> {
    let secs = micros.div_euclid(1_000_000);
    let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
    Utc.timestamp_opt(secs, nanos)
        .single()
        .ok_or_else(|| anyhow::anyhow!("timestamp {micros}us out of range").into())
}

/// Row accessor for a timestamp column.
pub(crate) fn ts_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let micros: i64 = row.get(idx)?;
    micros_to_datetime(idx, micros)
}

/// Row accessor for a nullable timestamp column.
pub(crate) fn opt_ts_column(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let micros: Option<i64> = row.get(idx)?;
    micros.map(|m| micros_to_datetime(idx, m)).transpose()
}

fn micros_to_datetime(idx: usize, micros: i64) -> rusqlite::Result<DateTime<Utc>> {
    from_micros(micros).map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Integer,
            Box::new(rusqlite::types::FromSqlError::OutOfRange(micros)),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn micros_round_trip_keeps_sub_second_precision() {
        let at = Utc.with_ymd_and_hms(2026, 3, 15, 12, 30, 45).unwrap()
            .with_nanosecond(123_456_000)
            .unwrap();
        assert_eq!(from_micros(to_micros(at)).unwrap(), at);
    }

    #[test]
    fn pre_epoch_micros_decode() {
        let at = from_micros(-1).unwrap();
        assert_eq!(to_micros(at), -1);
    }
}
