//! Ledger records and operation results.

use crate::types::{AccountNumber, Cents, CustomerNumber, ShardId};
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_number: CustomerNumber,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Savings,
    Checking,
}

impl AccountType {
    /// Stored code: 0 savings, 1 checking.
    pub fn code(&self) -> i64 {
        match self {
            Self::Savings => 0,
            Self::Checking => 1,
        }
    }
}

impl ToSql for AccountType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for AccountType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_i64()? {
            0 => Ok(Self::Savings),
            1 => Ok(Self::Checking),
            other => Err(FromSqlError::OutOfRange(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub customer_number: CustomerNumber,
    pub account_number: AccountNumber,
    pub account_type: AccountType,
    pub balance: Cents,
    pub creation_time: DateTime<Utc>,
    /// Idempotency token for monthly interest. None until first accrual.
    pub last_interest_calculation: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountHistoryEntry {
    pub account_number: AccountNumber,
    pub timestamp: DateTime<Utc>,
    pub change_amount: Cents,
    pub memo: Option<String>,
}

/// Result of one committed deposit or withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Posting {
    pub account_number: AccountNumber,
    pub change_amount: Cents,
    pub new_balance: Cents,
    pub timestamp: DateTime<Utc>,
    /// Shard that absorbed the delta; None when aggregate tracking is off.
    pub shard: Option<ShardId>,
}

/// Result of one committed interest accrual.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterestPosting {
    pub account_number: AccountNumber,
    pub interest: Cents,
    pub new_balance: Cents,
    /// The new idempotency token; equal to the commit timestamp.
    pub calculated_at: DateTime<Utc>,
}

/// An account the batch scan found not yet accrued this month.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterestCandidate {
    pub customer_number: CustomerNumber,
    pub account_number: AccountNumber,
    pub last_interest_calculation: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AccrualSummary {
    pub batches: usize,
    pub accrued: usize,
    pub skipped: usize,
    pub total_interest: Cents,
}

/// Outcome of a reconciliation pass. A mismatch is data, not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceCheck {
    pub consistent: bool,
    pub account_sum: Cents,
    /// None when aggregate tracking is disabled.
    pub aggregate_sum: Option<Cents>,
    pub history_sum: Cents,
}
