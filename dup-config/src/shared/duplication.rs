use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::Config;
use crate::shared::{RetryConfig, ValidationError};

/// Default interval between two persistence cycles.
const DEFAULT_PERSIST_INTERVAL_MS: u64 = 1_000;

/// Minimum time between two persisted progress updates of the same partition.
const DEFAULT_PROGRESS_UPDATE_PERIOD_MS: u64 = 5_000;

/// Minimum time between two progress reports of the same duplication.
const DEFAULT_PROGRESS_REPORT_PERIOD_MS: u64 = 5 * 60 * 1_000;

/// Configuration of the duplication metadata service.
///
/// Controls where duplication state lives in the metadata store and how often the persistence
/// worker flushes staged status and progress.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DuplicationConfig {
    /// Root path of the application tree in the metadata store, e.g. `/meta/apps`.
    pub meta_root: String,
    /// Number of ms between two persistence cycles.
    #[serde(default = "default_persist_interval_ms")]
    pub persist_interval_ms: u64,
    /// Number of ms that must pass before the progress of a partition is persisted again.
    #[serde(default = "default_progress_update_period_ms")]
    pub progress_update_period_ms: u64,
    /// Number of ms between two progress reports of a duplication.
    #[serde(default = "default_progress_report_period_ms")]
    pub progress_report_period_ms: u64,
    /// Retry policy applied to every write against the metadata store.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl DuplicationConfig {
    /// Validates the duplication configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.meta_root.starts_with('/') {
            return Err(ValidationError::InvalidMetaRoot(self.meta_root.clone()));
        }

        if self.persist_interval_ms == 0 {
            return Err(ValidationError::PersistIntervalZero);
        }

        if self.retry.max_attempts == 0 {
            return Err(ValidationError::RetryMaxAttemptsZero);
        }

        if self.retry.backoff_factor < 1.0 {
            return Err(ValidationError::InvalidBackoffFactor(
                self.retry.backoff_factor,
            ));
        }

        Ok(())
    }

    pub fn persist_interval(&self) -> Duration {
        Duration::from_millis(self.persist_interval_ms)
    }
}

impl Default for DuplicationConfig {
    fn default() -> Self {
        Self {
            meta_root: "/meta/apps".to_string(),
            persist_interval_ms: DEFAULT_PERSIST_INTERVAL_MS,
            progress_update_period_ms: DEFAULT_PROGRESS_UPDATE_PERIOD_MS,
            progress_report_period_ms: DEFAULT_PROGRESS_REPORT_PERIOD_MS,
            retry: RetryConfig::default(),
        }
    }
}

impl Config for DuplicationConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &[];
}

fn default_persist_interval_ms() -> u64 {
    DEFAULT_PERSIST_INTERVAL_MS
}

fn default_progress_update_period_ms() -> u64 {
    DEFAULT_PROGRESS_UPDATE_PERIOD_MS
}

fn default_progress_report_period_ms() -> u64 {
    DEFAULT_PROGRESS_REPORT_PERIOD_MS
}
