use crate::error::{LedgerError, LedgerResult};
use serde::{Deserialize, Serialize};

/// Top-level ledger configuration, loaded from `data/ledger.json`.
/// Missing fields fall back to their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Number of aggregate balance shards. 0 disables the aggregate table.
    pub aggregate_shards: u32,
    pub interest: InterestConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterestConfig {
    /// Accounts fetched per accrual batch query.
    pub batch_size: usize,
    /// Monthly rate in basis points. 100 = 1%.
    pub rate_bps: i64,
    pub memo: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub busy_timeout_ms: u64,
    /// Attempts per read-write transaction before giving up as Unavailable.
    pub max_commit_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            aggregate_shards: 16,
            interest: InterestConfig::default(),
            store: StoreConfig::default(),
        }
    }
}

impl Default for InterestConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            rate_bps: 100,
            memo: "Monthly Interest".into(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            busy_timeout_ms: 5_000,
            max_commit_attempts: 10,
            retry_backoff_ms: 5,
        }
    }
}

impl LedgerConfig {
    /// Load from a JSON file.
    /// In tests, use LedgerConfig::default_test().
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: LedgerConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Small shard count and tiny batches so tests cross batch boundaries.
    pub fn default_test() -> Self {
        Self {
            aggregate_shards: 4,
            interest: InterestConfig {
                batch_size: 2,
                ..InterestConfig::default()
            },
            store: StoreConfig::default(),
        }
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.interest.batch_size == 0 {
            return Err(LedgerError::Unsupported(
                "interest batch_size must be at least 1".into(),
            ));
        }
        if self.store.max_commit_attempts == 0 {
            return Err(LedgerError::Unsupported(
                "max_commit_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: LedgerConfig =
            serde_json::from_str(r#"{ "aggregate_shards": 0, "interest": { "batch_size": 7 } }"#)
                .unwrap();
        assert_eq!(config.aggregate_shards, 0);
        assert_eq!(config.interest.batch_size, 7);
        assert_eq!(config.interest.rate_bps, 100);
        assert_eq!(config.store, StoreConfig::default());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let mut config = LedgerConfig::default_test();
        config.interest.batch_size = 0;
        assert!(matches!(config.validate(), Err(LedgerError::Unsupported(_))));
    }

    #[test]
    fn sample_config_file_parses() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/../data/ledger.json");
        let config = LedgerConfig::load(path).unwrap();
        assert_eq!(config.aggregate_shards, 16);
    }
}
