use serde::Deserialize;
use std::time::Duration;

use crate::error::{Error, Result};

/// Flush thresholds for a [`BatchCoordinator`](crate::BatchCoordinator).
///
/// An epoch is flushed as soon as it holds `max_batch_size` items, or once
/// `max_wait` has elapsed since its first item arrived, whichever comes first.
/// Fixed for the lifetime of the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawBatchConfig")]
pub struct BatchConfig {
    max_batch_size: usize,
    max_wait: Duration,
}

impl BatchConfig {
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] when `max_batch_size` is zero.
    pub fn new(max_batch_size: usize, max_wait: Duration) -> Result<Self> {
        let config = Self {
            max_batch_size,
            max_wait,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_batch_size == 0 {
            return Err(Error::InvalidConfig(
                "max_batch_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 4,
            max_wait: Duration::from_millis(50),
        }
    }
}

/// Wire form: durations are given in milliseconds.
#[derive(Deserialize)]
struct RawBatchConfig {
    max_batch_size: usize,
    #[serde(default)]
    max_wait_ms: u64,
}

impl TryFrom<RawBatchConfig> for BatchConfig {
    type Error = Error;

    fn try_from(raw: RawBatchConfig) -> Result<Self> {
        BatchConfig::new(raw.max_batch_size, Duration::from_millis(raw.max_wait_ms))
    }
}
