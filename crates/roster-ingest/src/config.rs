//! Pipeline configuration

use roster_common::{Result, RosterError};
use serde::{Deserialize, Serialize};

use crate::batch::DEFAULT_BATCH_SIZE;

/// Default number of rows between progress log lines.
pub const DEFAULT_PROGRESS_INTERVAL: u64 = 10_000;

/// Upper bound on `batch_size`: six bind parameters per record must stay
/// below the Postgres limit of 65 535 per statement.
pub const MAX_BATCH_SIZE: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Records per bulk insert
    pub batch_size: usize,
    /// Log progress every N rows; 0 disables progress lines
    pub progress_interval: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

impl IngestConfig {
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Read `INGEST_BATCH_SIZE` and `INGEST_PROGRESS_INTERVAL`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("INGEST_BATCH_SIZE") {
            config.batch_size = value
                .parse()
                .map_err(|_| RosterError::invalid_value("INGEST_BATCH_SIZE", &value))?;
        }

        if let Ok(value) = std::env::var("INGEST_PROGRESS_INTERVAL") {
            config.progress_interval = value
                .parse()
                .map_err(|_| RosterError::invalid_value("INGEST_PROGRESS_INTERVAL", &value))?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(RosterError::Config(format!(
                "batch_size must be between 1 and {MAX_BATCH_SIZE}, got {}",
                self.batch_size
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = IngestConfig::default();
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.progress_interval, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_batch_size_bounds() {
        assert!(IngestConfig::default().with_batch_size(0).validate().is_err());
        assert!(IngestConfig::default().with_batch_size(1).validate().is_ok());
        assert!(IngestConfig::default()
            .with_batch_size(MAX_BATCH_SIZE + 1)
            .validate()
            .is_err());
    }
}
