//! Shared primitive types used across the entire ledger.

/// Money, always in integer cents. Positive = credit, negative = debit.
pub type Cents = i64;

/// 63-bit non-negative customer identity.
pub type CustomerNumber = i64;

/// 63-bit non-negative account identity, unique across all customers.
pub type AccountNumber = i64;

/// Index of one aggregate balance shard, in [0, S).
pub type ShardId = u32;
