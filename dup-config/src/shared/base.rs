use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The persistence worker must tick at a non-zero interval.
    #[error("`persist_interval_ms` cannot be zero")]
    PersistIntervalZero,
    /// At least one write attempt is required per persistence cycle.
    #[error("`retry.max_attempts` cannot be zero")]
    RetryMaxAttemptsZero,
    /// The backoff multiplier must not shrink the delay.
    #[error("`retry.backoff_factor` must be at least 1.0, got {0}")]
    InvalidBackoffFactor(f32),
    /// The metadata root has to be an absolute store path.
    #[error("`meta_root` must start with '/', got `{0}`")]
    InvalidMetaRoot(String),
}
