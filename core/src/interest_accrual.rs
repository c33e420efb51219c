//! Interest accrual engine: monthly interest, at most once per account
//! per calendar month.
//!
//! The batch scan runs on snapshots and takes no locks, so by the time an
//! account's own transaction starts another accrual may already have
//! handled it. Each per-account transaction therefore re-reads the account
//! filtered by the token value the scan saw (compare-and-swap expressed as
//! a query predicate). No match means someone else won: RowAlreadyUpdated,
//! which the batch loop logs and skips.
//!
//! Accounts opened mid-month accrue a full month; no pro-rating.

use crate::{
    account_transactions::post_change,
    aggregate_counter::AggregateCounter,
    config::InterestConfig,
    error::{LedgerError, LedgerResult},
    model::{AccrualSummary, InterestPosting},
    store::{LedgerRead, LedgerStore},
    types::{AccountNumber, Cents, CustomerNumber},
};
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};
use std::sync::Arc;

pub struct InterestAccrualEngine {
    store: Arc<LedgerStore>,
    counter: Arc<AggregateCounter>,
    config: InterestConfig,
}

impl InterestAccrualEngine {
    pub fn new(store: Arc<LedgerStore>, counter: Arc<AggregateCounter>, config: InterestConfig) -> Self {
        Self {
            store,
            counter,
            config,
        }
    }

    /// Accrue one month of interest on one account, provided its token
    /// still equals `expected_last_calculation`.
    pub fn compute_interest_for_account(
        &self,
        customer_number: CustomerNumber,
        account_number: AccountNumber,
        expected_last_calculation: Option<DateTime<Utc>>,
    ) -> LedgerResult<InterestPosting> {
        let committed = self.store.run_transaction(|txn| {
            let old_balance = match txn.balance_if_token(
                customer_number,
                account_number,
                expected_last_calculation,
            )? {
                Some(balance) => balance,
                None => {
                    if txn.account_exists(customer_number, account_number)? {
                        return Err(LedgerError::RowAlreadyUpdated { account_number });
                    }
                    return Err(LedgerError::NoResults {
                        what: format!("account {account_number} for customer {customer_number}"),
                    });
                }
            };

            let interest = monthly_interest(old_balance, self.config.rate_bps);
            let new_balance = old_balance
                .checked_add(interest)
                .ok_or(LedgerError::BalanceOverflow { account_number })?;
            let calculated_at = txn.timestamp();
            post_change(
                txn,
                &self.counter,
                customer_number,
                account_number,
                interest,
                Some(&self.config.memo),
                new_balance,
            )?;
            txn.update_interest_token(customer_number, account_number, calculated_at)?;
            Ok((interest, new_balance))
        })?;

        let (interest, new_balance) = committed.value;
        Ok(InterestPosting {
            account_number,
            interest,
            new_balance,
            calculated_at: committed.timestamp,
        })
    }

    /// Accrue interest on every account not yet accrued this month.
    ///
    /// Scans `batch_size` accounts at a time and gives each its own
    /// transaction, until a scan comes back empty. Accounts another
    /// accrual got to first are skipped; any other failure stops the run.
    pub fn compute_interest_for_all(&self) -> LedgerResult<AccrualSummary> {
        let mut summary = AccrualSummary::default();
        loop {
            let batch = self.store.read_snapshot(|snap| {
                let period_start = month_start(snap.now())?;
                snap.accounts_due_for_interest(period_start, self.config.batch_size)
            })?;
            if batch.is_empty() {
                break;
            }
            summary.batches += 1;

            for candidate in batch {
                match self.compute_interest_for_account(
                    candidate.customer_number,
                    candidate.account_number,
                    candidate.last_interest_calculation,
                ) {
                    Ok(posting) => {
                        log::info!(
                            "computed interest for account {}: {} cents",
                            posting.account_number,
                            posting.interest
                        );
                        summary.accrued += 1;
                        summary.total_interest += posting.interest;
                    }
                    Err(e) if e.is_already_updated() => {
                        log::info!("account {} already updated, skipping", candidate.account_number);
                        summary.skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        log::info!(
            "interest run: {} accounts accrued, {} skipped, {} cents in {} batches",
            summary.accrued,
            summary.skipped,
            summary.total_interest,
            summary.batches
        );
        Ok(summary)
    }
}

/// floor(balance * rate_bps / 10_000).
pub fn monthly_interest(balance: Cents, rate_bps: i64) -> Cents {
    let scaled = balance as i128 * rate_bps as i128;
    scaled.div_euclid(10_000) as Cents
}

/// Midnight UTC on the first day of `at`'s month.
///
/// The token is the commit timestamp, which can run up to a few
/// microseconds ahead of the clock. An accrual committed in the last
/// instant of a month may therefore carry a token in the next month and
/// count as that month's accrual.
pub fn month_start(at: DateTime<Utc>) -> LedgerResult<DateTime<Utc>> {
    let first = NaiveDate::from_ymd_opt(at.year(), at.month(), 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| anyhow::anyhow!("no month start for {at}"))?;
    Ok(Utc.from_utc_datetime(&first))
}
