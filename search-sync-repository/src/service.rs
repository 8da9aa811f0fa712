//! Search index service implementation.
//!
//! This module provides the service the sync path uses for document writes.
//! It validates batches against the configured limits and retries transient
//! cluster failures with exponential backoff.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use search_sync_shared::Document;
use serde_json::Value;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, warn};

use crate::config::SearchIndexServiceConfig;
use crate::errors::SearchIndexError;
use crate::interfaces::SearchClusterProvider;
use crate::types::BatchOperationSummary;

/// The main service for writing documents to the search cluster.
///
/// This is the high-level API that the sync orchestrator uses. It provides input
/// validation and retries, and delegates to a `SearchClusterProvider` for the
/// actual backend operations.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
/// use search_sync_repository::{OpenSearchProvider, SearchIndexService};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let provider = OpenSearchProvider::new("http://localhost:9200", Duration::from_secs(30)).await?;
/// let service = SearchIndexService::new(Arc::new(provider));
///
/// let summary = service.delete_batch("search-company-write", &["42".to_string()]).await?;
/// assert_eq!(summary.failed, 0);
/// # Ok(())
/// # }
/// ```
pub struct SearchIndexService {
    provider: Arc<dyn SearchClusterProvider>,
    config: SearchIndexServiceConfig,
}

impl SearchIndexService {
    /// Create a new SearchIndexService with default configuration.
    pub fn new(provider: Arc<dyn SearchClusterProvider>) -> Self {
        Self {
            provider,
            config: SearchIndexServiceConfig::default(),
        }
    }

    /// Create a new SearchIndexService with custom configuration.
    pub fn with_config(
        provider: Arc<dyn SearchClusterProvider>,
        config: SearchIndexServiceConfig,
    ) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &SearchIndexServiceConfig {
        &self.config
    }

    /// Check if batch size exceeds the configured limit.
    fn validate_batch_size(&self, size: usize) -> Result<(), SearchIndexError> {
        if let Some(max) = self.config.max_batch_size {
            if size > max {
                return Err(SearchIndexError::batch_size_exceeded(size, max));
            }
        }
        Ok(())
    }

    fn validate_target(target: &str) -> Result<(), SearchIndexError> {
        if target.is_empty() {
            return Err(SearchIndexError::validation("target index or alias is required"));
        }
        Ok(())
    }

    fn validate_document_id(id: &str) -> Result<(), SearchIndexError> {
        if id.is_empty() {
            return Err(SearchIndexError::validation("document id is required"));
        }
        Ok(())
    }

    /// Delays between attempts: exponential, jittered, capped, and one fewer
    /// than the configured number of attempts.
    fn retry_strategy(&self) -> impl Iterator<Item = std::time::Duration> {
        ExponentialBackoff::from_millis(2)
            .factor(self.config.backoff_factor_ms)
            .max_delay(self.config.max_backoff)
            .map(jitter)
            .take(self.config.max_attempts.saturating_sub(1))
    }

    /// Upsert a batch of documents into `target`, retrying transient failures.
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - Per-document outcomes of the accepted attempt
    /// * `Err(SearchIndexError::BatchSizeExceeded)` - If the batch is too large
    /// * `Err(SearchIndexError)` - If the request failed on every attempt or with a
    ///   non-retryable error
    pub async fn upsert_batch(
        &self,
        target: &str,
        documents: &[Document],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        Self::validate_target(target)?;
        if documents.is_empty() {
            return Ok(BatchOperationSummary::default());
        }
        self.validate_batch_size(documents.len())?;
        for document in documents {
            Self::validate_document_id(&document.id)?;
        }

        let counter = AtomicUsize::new(0);
        let attempts = &counter;
        let provider = self.provider.as_ref();
        let summary = RetryIf::spawn(
            self.retry_strategy(),
            move || {
                attempts.fetch_add(1, Ordering::Relaxed);
                provider.bulk_upsert(target, documents)
            },
            move |e: &SearchIndexError| {
                let retry = e.is_retryable();
                if retry {
                    warn!(
                        target = %target,
                        attempt = attempts.load(Ordering::Relaxed),
                        error = %e,
                        "Bulk upsert failed, retrying"
                    );
                }
                retry
            },
        )
        .await?;

        debug!(
            target = %target,
            total = summary.total,
            failed = summary.failed,
            attempts = attempts.load(Ordering::Relaxed),
            "Bulk upsert completed"
        );
        Ok(summary)
    }

    /// Delete a batch of document ids from `target`, retrying transient failures.
    ///
    /// Ids that are not present count as successful deletions.
    pub async fn delete_batch(
        &self,
        target: &str,
        ids: &[String],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        Self::validate_target(target)?;
        if ids.is_empty() {
            return Ok(BatchOperationSummary::default());
        }
        self.validate_batch_size(ids.len())?;
        for id in ids {
            Self::validate_document_id(id)?;
        }

        let counter = AtomicUsize::new(0);
        let attempts = &counter;
        let provider = self.provider.as_ref();
        let summary = RetryIf::spawn(
            self.retry_strategy(),
            move || {
                attempts.fetch_add(1, Ordering::Relaxed);
                provider.bulk_delete(target, ids)
            },
            move |e: &SearchIndexError| {
                let retry = e.is_retryable();
                if retry {
                    warn!(
                        target = %target,
                        attempt = attempts.load(Ordering::Relaxed),
                        error = %e,
                        "Bulk delete failed, retrying"
                    );
                }
                retry
            },
        )
        .await?;

        debug!(target = %target, total = summary.total, "Bulk delete completed");
        Ok(summary)
    }

    /// Fetch a stored document body by id.
    pub async fn get(&self, target: &str, id: &str) -> Result<Option<Value>, SearchIndexError> {
        Self::validate_target(target)?;
        Self::validate_document_id(id)?;
        self.provider.get_document(target, id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AliasAction, BatchOperationResult, CreateIndexOutcome};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::BTreeSet;
    use tokio::sync::Mutex;

    /// Mock provider for testing
    struct MockProvider {
        upserts: Mutex<Vec<(String, Vec<String>)>>,
        deletes: Mutex<Vec<(String, Vec<String>)>>,
        failures_remaining: Mutex<usize>,
        failure: SearchIndexError,
    }

    impl MockProvider {
        fn new() -> Self {
            Self::failing(0, SearchIndexError::connection("unused"))
        }

        fn failing(times: usize, failure: SearchIndexError) -> Self {
            Self {
                upserts: Mutex::new(Vec::new()),
                deletes: Mutex::new(Vec::new()),
                failures_remaining: Mutex::new(times),
                failure,
            }
        }

        async fn maybe_fail(&self) -> Result<(), SearchIndexError> {
            let mut remaining = self.failures_remaining.lock().await;
            if *remaining > 0 {
                *remaining -= 1;
                return Err(self.failure.clone());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl SearchClusterProvider for MockProvider {
        async fn create_index(
            &self,
            _name: &str,
            _body: &Value,
        ) -> Result<CreateIndexOutcome, SearchIndexError> {
            Ok(CreateIndexOutcome::Created)
        }

        async fn index_exists(&self, _name: &str) -> Result<bool, SearchIndexError> {
            Ok(true)
        }

        async fn get_indices_for_alias(
            &self,
            _alias: &str,
        ) -> Result<BTreeSet<String>, SearchIndexError> {
            Ok(BTreeSet::new())
        }

        async fn update_aliases(&self, _actions: &[AliasAction]) -> Result<(), SearchIndexError> {
            Ok(())
        }

        async fn bulk_upsert(
            &self,
            target: &str,
            documents: &[Document],
        ) -> Result<BatchOperationSummary, SearchIndexError> {
            self.maybe_fail().await?;
            let ids: Vec<String> = documents.iter().map(|d| d.id.clone()).collect();
            self.upserts
                .lock()
                .await
                .push((target.to_string(), ids.clone()));
            Ok(BatchOperationSummary::from_results(
                ids.into_iter().map(BatchOperationResult::succeeded).collect(),
            ))
        }

        async fn bulk_delete(
            &self,
            target: &str,
            ids: &[String],
        ) -> Result<BatchOperationSummary, SearchIndexError> {
            self.maybe_fail().await?;
            self.deletes
                .lock()
                .await
                .push((target.to_string(), ids.to_vec()));
            Ok(BatchOperationSummary::from_results(
                ids.iter().map(BatchOperationResult::succeeded).collect(),
            ))
        }

        async fn get_document(
            &self,
            _target: &str,
            id: &str,
        ) -> Result<Option<Value>, SearchIndexError> {
            Ok(Some(json!({ "id": id })))
        }
    }

    fn documents(ids: &[&str]) -> Vec<Document> {
        ids.iter().map(|id| Document::new(*id)).collect()
    }

    fn fast_retry(attempts: usize) -> SearchIndexServiceConfig {
        SearchIndexServiceConfig::default().with_retry(attempts, 1)
    }

    #[tokio::test]
    async fn test_upsert_batch_success() {
        let provider = Arc::new(MockProvider::new());
        let service = SearchIndexService::new(provider.clone());

        let summary = service
            .upsert_batch("search-company-write", &documents(&["1", "2"]))
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 2);
        let upserts = provider.upserts.lock().await;
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0].0, "search-company-write");
        assert_eq!(upserts[0].1, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn test_empty_batch_does_not_reach_provider() {
        let provider = Arc::new(MockProvider::new());
        let service = SearchIndexService::new(provider.clone());

        let summary = service.upsert_batch("t", &[]).await.unwrap();
        assert_eq!(summary.total, 0);
        assert!(provider.upserts.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_batch_size_exceeded() {
        let provider = Arc::new(MockProvider::new());
        let service = SearchIndexService::with_config(
            provider,
            SearchIndexServiceConfig::with_max_batch_size(2),
        );

        let result = service.upsert_batch("t", &documents(&["1", "2", "3"])).await;
        assert!(matches!(
            result.unwrap_err(),
            SearchIndexError::BatchSizeExceeded { provided: 3, max: 2 }
        ));
    }

    #[tokio::test]
    async fn test_unlimited_batch_size() {
        let provider = Arc::new(MockProvider::new());
        let service =
            SearchIndexService::with_config(provider, SearchIndexServiceConfig::unlimited());

        let ids: Vec<String> = (0..20_000).map(|i| i.to_string()).collect();
        let summary = service.delete_batch("t", &ids).await.unwrap();
        assert_eq!(summary.succeeded, 20_000);
    }

    #[tokio::test]
    async fn test_empty_document_id_rejected() {
        let service = SearchIndexService::new(Arc::new(MockProvider::new()));

        let result = service.upsert_batch("t", &documents(&["1", ""])).await;
        assert!(matches!(
            result.unwrap_err(),
            SearchIndexError::ValidationError(_)
        ));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let provider = Arc::new(MockProvider::failing(
            2,
            SearchIndexError::connection("connection reset"),
        ));
        let service = SearchIndexService::with_config(provider.clone(), fast_retry(3));

        let summary = service
            .upsert_batch("t", &documents(&["1"]))
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(provider.upserts.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let provider = Arc::new(MockProvider::failing(
            3,
            SearchIndexError::bulk_index("503 Service Unavailable"),
        ));
        let service = SearchIndexService::with_config(provider.clone(), fast_retry(3));

        let result = service.delete_batch("t", &["1".to_string()]).await;

        assert!(matches!(result.unwrap_err(), SearchIndexError::BulkIndexError(_)));
        assert!(provider.deletes.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_non_retryable_failure_is_not_retried() {
        let provider = Arc::new(MockProvider::failing(
            1,
            SearchIndexError::alias_configuration("write alias resolves to 2 indices"),
        ));
        let service = SearchIndexService::with_config(provider.clone(), fast_retry(5));

        let result = service.upsert_batch("t", &documents(&["1"])).await;

        assert!(result.unwrap_err().is_fatal());
        // The single injected failure was consumed and nothing was sent afterwards.
        assert_eq!(*provider.failures_remaining.lock().await, 0);
        assert!(provider.upserts.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_get_document() {
        let service = SearchIndexService::new(Arc::new(MockProvider::new()));
        let document = service.get("t", "7").await.unwrap();
        assert_eq!(document, Some(json!({ "id": "7" })));
    }
}
