use crate::types::{AccountNumber, Cents};
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Withdrawal of {requested} cents would overdraw account {account_number} (balance {balance})")]
    NegativeBalance {
        account_number: AccountNumber,
        balance: Cents,
        requested: Cents,
    },

    #[error("Account {account_number} already updated by a concurrent interest accrual")]
    RowAlreadyUpdated { account_number: AccountNumber },

    #[error("Expected exactly one row, found none: {what}")]
    NoResults { what: String },

    #[error("Expected exactly one row, found several: {what}")]
    TooManyResults { what: String },

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Ledger store unavailable: {0}")]
    Unavailable(String),

    #[error("Balance overflow on account {account_number}")]
    BalanceOverflow { account_number: AccountNumber },

    #[error("Invalid seed data: {0}")]
    InvalidSeed(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LedgerError {
    /// True when the store refused the operation because another writer
    /// holds the database. The whole unit of work may be re-run.
    pub fn is_contention(&self) -> bool {
        match self {
            Self::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    /// Expected outcome of racing accruals; callers skip rather than retry.
    pub fn is_already_updated(&self) -> bool {
        matches!(self, Self::RowAlreadyUpdated { .. })
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
