//! Retrying decorator for source stores.
//!
//! Every source call is bounded by a timeout and retried with jittered
//! exponential backoff while the error is transient.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use search_sync_shared::Record;
use tokio::time::timeout;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::warn;

use super::SourceStore;
use crate::errors::SourceError;

/// Retry policy for source-store calls.
#[derive(Debug, Clone)]
pub struct SourceRetryConfig {
    /// Total attempts per call, including the first one.
    pub max_attempts: usize,
    /// Multiplier, in milliseconds, applied to the exponential backoff between attempts.
    pub backoff_factor_ms: u64,
    /// Upper bound for a single backoff delay.
    pub max_backoff: Duration,
    /// Time allowed for one attempt before it counts as unavailable.
    pub call_timeout: Duration,
}

impl Default for SourceRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_factor_ms: 100,
            max_backoff: Duration::from_secs(10),
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl SourceRetryConfig {
    /// Set the retry policy. `max_attempts` of 1 disables retries.
    pub fn with_retry(mut self, max_attempts: usize, backoff_factor_ms: u64) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.backoff_factor_ms = backoff_factor_ms;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }
}

/// A [`SourceStore`] that retries transient failures of the store it wraps.
pub struct RetryingSource {
    inner: Arc<dyn SourceStore>,
    config: SourceRetryConfig,
}

impl RetryingSource {
    pub fn new(inner: Arc<dyn SourceStore>, config: SourceRetryConfig) -> Self {
        Self { inner, config }
    }

    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(2)
            .factor(self.config.backoff_factor_ms)
            .max_delay(self.config.max_backoff)
            .map(jitter)
            .take(self.config.max_attempts.saturating_sub(1))
    }

    async fn call<'a, T, F, Fut>(
        &'a self,
        operation: &'static str,
        entity: &'a str,
        action: F,
    ) -> Result<T, SourceError>
    where
        F: Fn() -> Fut + 'a,
        Fut: Future<Output = Result<T, SourceError>> + 'a,
    {
        let counter = AtomicUsize::new(0);
        let attempts = &counter;
        let call_timeout = self.config.call_timeout;
        let action = &action;
        RetryIf::spawn(
            self.retry_strategy(),
            move || async move {
                attempts.fetch_add(1, Ordering::Relaxed);
                timeout(call_timeout, action()).await.unwrap_or_else(|_| {
                    Err(SourceError::unavailable(format!(
                        "{} timed out after {:?}",
                        operation, call_timeout
                    )))
                })
            },
            move |e: &SourceError| {
                let retry = e.is_retryable();
                if retry {
                    warn!(
                        entity = %entity,
                        operation,
                        attempt = attempts.load(Ordering::Relaxed),
                        error = %e,
                        "Source call failed, retrying"
                    );
                }
                retry
            },
        )
        .await
    }
}

#[async_trait]
impl SourceStore for RetryingSource {
    async fn fetch_by_ids(
        &self,
        entity: &str,
        ids: &[String],
    ) -> Result<Vec<Record>, SourceError> {
        self.call("fetch_by_ids", entity, || self.inner.fetch_by_ids(entity, ids))
            .await
    }

    async fn fetch_page(
        &self,
        entity: &str,
        after_id: Option<&str>,
        page_size: usize,
    ) -> Result<Vec<Record>, SourceError> {
        self.call("fetch_page", entity, || {
            self.inner.fetch_page(entity, after_id, page_size)
        })
        .await
    }

    async fn fetch_referencing_ids(
        &self,
        entity: &str,
        field: &str,
        related_id: &str,
    ) -> Result<Vec<String>, SourceError> {
        self.call("fetch_referencing_ids", entity, || {
            self.inner.fetch_referencing_ids(entity, field, related_id)
        })
        .await
    }
}
