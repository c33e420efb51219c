//! Deterministic random number generation.
//!
//! RULE: Nothing in the ledger calls a platform RNG directly.
//! Every random draw flows through a LedgerRng derived from one master
//! seed, one independent stream per purpose:
//!   - shard selection for the aggregate counter
//!   - customer and account number generation at setup
//!
//! Shard selection is consumed through the ShardChooser trait so tests can
//! pin which shard absorbs a delta.

use crate::types::ShardId;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG for a single stream.
pub struct LedgerRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl LedgerRng {
    /// Create a stream RNG from the master seed. The stream index is
    /// mixed in so adding a stream never changes existing ones.
    pub fn new(master_seed: u64, stream: RngStream) -> Self {
        let derived_seed = master_seed ^ (stream as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15);
        Self {
            name: stream.name(),
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    /// Roll a u64 in [0, n).
    pub fn next_u64_below(&mut self, n: u64) -> u64 {
        assert!(n > 0, "n must be > 0");
        self.inner.gen_range(0..n)
    }

    /// Draw a customer or account number in [0, 2^63 - 1).
    /// Collisions are not expected before ~3 billion keys.
    pub fn next_key(&mut self) -> i64 {
        self.inner.gen_range(0..i64::MAX)
    }
}

/// Stable stream assignments.
/// NEVER reorder or remove entries; only append.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum RngStream {
    Shards = 0,
    Keys = 1,
}

impl RngStream {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Shards => "shards",
            Self::Keys => "keys",
        }
    }
}

/// Picks the shard that absorbs one delta.
pub trait ShardChooser: Send {
    /// Return a shard in [0, shard_count). Never called with 0.
    fn choose(&mut self, shard_count: u32) -> ShardId;
}

impl ShardChooser for LedgerRng {
    fn choose(&mut self, shard_count: u32) -> ShardId {
        self.next_u64_below(shard_count as u64) as ShardId
    }
}

/// Always the same shard (modulo the shard count).
#[derive(Debug, Clone, Copy)]
pub struct PinnedShard(pub ShardId);

impl ShardChooser for PinnedShard {
    fn choose(&mut self, shard_count: u32) -> ShardId {
        self.0 % shard_count
    }
}

/// 0, 1, 2, ... wrapping at the shard count.
#[derive(Debug, Default, Clone, Copy)]
pub struct CyclingShards {
    next: ShardId,
}

impl ShardChooser for CyclingShards {
    fn choose(&mut self, shard_count: u32) -> ShardId {
        let shard = self.next % shard_count;
        self.next = shard + 1;
        shard
    }
}
