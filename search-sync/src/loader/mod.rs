//! Loader module for the search sync engine.
//!
//! Splits documents into per-entity batches and writes them through the
//! `SearchIndexService`. A batch that still fails after retries is counted and
//! skipped so the run can continue; alias configuration faults abort the run.

use std::sync::Arc;

use search_sync_repository::{BatchOperationSummary, SearchIndexError, SearchIndexService};
use search_sync_shared::Document;
use tracing::{debug, error, instrument, warn};

/// Counts from loading documents or deletions into one target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Items the cluster accepted.
    pub succeeded: usize,
    /// Items rejected by the cluster or lost with a failed batch.
    pub failed: usize,
    /// Batches that failed as a whole after all retries.
    pub failed_batches: usize,
}

impl LoadOutcome {
    fn record_summary(&mut self, summary: &BatchOperationSummary) {
        self.succeeded += summary.succeeded;
        self.failed += summary.failed;
    }

    fn record_failed_batch(&mut self, size: usize) {
        self.failed += size;
        self.failed_batches += 1;
    }
}

/// Loader that writes documents into the search cluster in bounded batches.
#[derive(Clone)]
pub struct SearchLoader {
    service: Arc<SearchIndexService>,
}

impl SearchLoader {
    /// Create a new search loader with the given service.
    pub fn new(service: Arc<SearchIndexService>) -> Self {
        Self { service }
    }

    /// Upsert documents into `target` in batches of `batch_size`.
    ///
    /// # Returns
    ///
    /// * `Ok(LoadOutcome)` - Counts, including batches that failed after retries
    /// * `Err(SearchIndexError)` - Only for alias configuration faults
    #[instrument(skip(self, documents), fields(document_count = documents.len()))]
    pub async fn upsert(
        &self,
        target: &str,
        documents: &[Document],
        batch_size: usize,
    ) -> Result<LoadOutcome, SearchIndexError> {
        let mut outcome = LoadOutcome::default();

        for batch in documents.chunks(batch_size.max(1)) {
            match self.service.upsert_batch(target, batch).await {
                Ok(summary) => {
                    if summary.failed > 0 {
                        warn!(
                            target = %target,
                            succeeded = summary.succeeded,
                            failed = summary.failed,
                            "Bulk upsert completed with some failures"
                        );
                        for result in summary.results.iter().filter(|r| !r.success) {
                            if let Some(ref err) = result.error {
                                error!(
                                    document_id = %result.document_id,
                                    error = %err,
                                    "Failed to upsert document"
                                );
                            }
                        }
                    } else {
                        debug!(target = %target, count = summary.succeeded, "Upserted batch");
                    }
                    outcome.record_summary(&summary);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(
                        target = %target,
                        batch_size = batch.len(),
                        error = %e,
                        "Bulk upsert failed permanently, continuing with next batch"
                    );
                    outcome.record_failed_batch(batch.len());
                }
            }
        }

        Ok(outcome)
    }

    /// Delete ids from `target` in batches of `batch_size`. Unknown ids succeed.
    #[instrument(skip(self, ids), fields(id_count = ids.len()))]
    pub async fn delete(
        &self,
        target: &str,
        ids: &[String],
        batch_size: usize,
    ) -> Result<LoadOutcome, SearchIndexError> {
        let mut outcome = LoadOutcome::default();

        for batch in ids.chunks(batch_size.max(1)) {
            match self.service.delete_batch(target, batch).await {
                Ok(summary) => {
                    for result in summary.results.iter().filter(|r| !r.success) {
                        if let Some(ref err) = result.error {
                            error!(
                                document_id = %result.document_id,
                                error = %err,
                                "Failed to delete document"
                            );
                        }
                    }
                    outcome.record_summary(&summary);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    error!(
                        target = %target,
                        batch_size = batch.len(),
                        error = %e,
                        "Bulk delete failed permanently, continuing with next batch"
                    );
                    outcome.record_failed_batch(batch.len());
                }
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use search_sync_repository::{
        AliasAction, BatchOperationResult, CreateIndexOutcome, SearchClusterProvider,
        SearchIndexServiceConfig,
    };
    use serde_json::Value;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Mock search provider that fails every call whose batch contains `poison_id`.
    struct MockSearchProvider {
        upserted_count: AtomicUsize,
        deleted_count: AtomicUsize,
        batch_sizes: std::sync::Mutex<Vec<usize>>,
        poison_id: Option<String>,
        poison_error: SearchIndexError,
    }

    impl MockSearchProvider {
        fn new() -> Self {
            Self {
                upserted_count: AtomicUsize::new(0),
                deleted_count: AtomicUsize::new(0),
                batch_sizes: std::sync::Mutex::new(Vec::new()),
                poison_id: None,
                poison_error: SearchIndexError::connection("unused"),
            }
        }

        fn poisoned(id: &str, error: SearchIndexError) -> Self {
            Self {
                poison_id: Some(id.to_string()),
                poison_error: error,
                ..Self::new()
            }
        }

        fn check(&self, ids: &[&str]) -> Result<(), SearchIndexError> {
            match &self.poison_id {
                Some(poison) if ids.contains(&poison.as_str()) => Err(self.poison_error.clone()),
                _ => Ok(()),
            }
        }
    }

    #[async_trait]
    impl SearchClusterProvider for MockSearchProvider {
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
            _target: &str,
            documents: &[Document],
        ) -> Result<BatchOperationSummary, SearchIndexError> {
            let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
            self.check(&ids)?;
            self.batch_sizes.lock().unwrap().push(documents.len());
            self.upserted_count.fetch_add(documents.len(), Ordering::SeqCst);
            Ok(BatchOperationSummary::from_results(
                ids.into_iter().map(BatchOperationResult::succeeded).collect(),
            ))
        }

        async fn bulk_delete(
            &self,
            _target: &str,
            ids: &[String],
        ) -> Result<BatchOperationSummary, SearchIndexError> {
            let refs: Vec<&str> = ids.iter().map(String::as_str).collect();
            self.check(&refs)?;
            self.deleted_count.fetch_add(ids.len(), Ordering::SeqCst);
            Ok(BatchOperationSummary::from_results(
                ids.iter().map(BatchOperationResult::succeeded).collect(),
            ))
        }

        async fn get_document(
            &self,
            _target: &str,
            _id: &str,
        ) -> Result<Option<Value>, SearchIndexError> {
            Ok(None)
        }
    }

    fn loader(provider: Arc<MockSearchProvider>) -> SearchLoader {
        let config = SearchIndexServiceConfig::default().with_retry(2, 1);
        SearchLoader::new(Arc::new(SearchIndexService::with_config(provider, config)))
    }

    fn documents(count: usize) -> Vec<Document> {
        (1..=count).map(|i| Document::new(i.to_string())).collect()
    }

    #[tokio::test]
    async fn test_upsert_splits_into_batches() {
        let provider = Arc::new(MockSearchProvider::new());
        let outcome = loader(provider.clone())
            .upsert("search-company-write", &documents(5), 2)
            .await
            .unwrap();

        assert_eq!(outcome.succeeded, 5);
        assert_eq!(outcome.failed_batches, 0);
        assert_eq!(*provider.batch_sizes.lock().unwrap(), vec![2, 2, 1]);
    }

    #[tokio::test]
    async fn test_failed_batch_does_not_stop_the_run() {
        let provider = Arc::new(MockSearchProvider::poisoned(
            "3",
            SearchIndexError::connection("timed out"),
        ));
        let outcome = loader(provider.clone())
            .upsert("t", &documents(5), 2)
            .await
            .unwrap();

        assert_eq!(outcome.succeeded, 3);
        assert_eq!(outcome.failed, 2);
        assert_eq!(outcome.failed_batches, 1);
        assert_eq!(provider.upserted_count.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_alias_fault_aborts() {
        let provider = Arc::new(MockSearchProvider::poisoned(
            "1",
            SearchIndexError::alias_configuration("write alias resolves to 2 indices"),
        ));
        let result = loader(provider).upsert("t", &documents(3), 10).await;
        assert!(result.unwrap_err().is_fatal());
    }

    #[tokio::test]
    async fn test_delete_processing() {
        let provider = Arc::new(MockSearchProvider::new());
        let ids = vec!["1".to_string(), "2".to_string()];

        let outcome = loader(provider.clone()).delete("t", &ids, 1).await.unwrap();

        assert_eq!(outcome.succeeded, 2);
        assert_eq!(provider.deleted_count.load(Ordering::SeqCst), 2);
    }
}
