//! Configuration types for the SearchIndexService.

use std::time::Duration;

/// Configuration for the SearchIndexService.
///
/// Controls batch limits and how transient cluster failures are retried.
#[derive(Debug, Clone)]
pub struct SearchIndexServiceConfig {
    /// Maximum number of documents allowed in a single bulk call.
    ///
    /// Set to `None` to disable the limit (not recommended for production).
    /// Defaults to 10000 if not specified.
    pub max_batch_size: Option<usize>,

    /// Total attempts for a bulk call, including the first one.
    pub max_attempts: usize,

    /// Multiplier, in milliseconds, applied to the exponential backoff between attempts.
    pub backoff_factor_ms: u64,

    /// Upper bound for a single backoff delay.
    pub max_backoff: Duration,
}

impl Default for SearchIndexServiceConfig {
    fn default() -> Self {
        Self {
            max_batch_size: Some(10_000),
            max_attempts: 5,
            backoff_factor_ms: 100,
            max_backoff: Duration::from_secs(10),
        }
    }
}

impl SearchIndexServiceConfig {
    /// Create a config with no batch size limit.
    ///
    /// # Warning
    ///
    /// Use with caution. Removing batch size limits can lead to memory issues
    /// and timeouts when processing very large batches.
    pub fn unlimited() -> Self {
        Self {
            max_batch_size: None,
            ..Self::default()
        }
    }

    /// Create a config with a custom batch size limit.
    pub fn with_max_batch_size(max_batch_size: usize) -> Self {
        Self {
            max_batch_size: Some(max_batch_size),
            ..Self::default()
        }
    }

    /// Set the retry policy. `max_attempts` of 1 disables retries.
    pub fn with_retry(mut self, max_attempts: usize, backoff_factor_ms: u64) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff_factor_ms = backoff_factor_ms;
        self
    }
}
