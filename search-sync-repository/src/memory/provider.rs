//! In-memory search cluster.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use search_sync_shared::Document;
use serde_json::Value;
use tracing::debug;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchClusterProvider;
use crate::types::{AliasAction, BatchOperationResult, BatchOperationSummary, CreateIndexOutcome};

#[derive(Debug, Default)]
struct StoredIndex {
    body: Value,
    documents: BTreeMap<String, Value>,
}

#[derive(Debug, Default)]
struct ClusterState {
    indices: BTreeMap<String, StoredIndex>,
    aliases: BTreeMap<String, BTreeSet<String>>,
}

impl ClusterState {
    /// Resolve a write target to exactly one physical index.
    fn write_index(&self, target: &str) -> Result<String, SearchIndexError> {
        if self.indices.contains_key(target) {
            return Ok(target.to_string());
        }
        match self.aliases.get(target) {
            Some(indices) if indices.len() == 1 => {
                Ok(indices.iter().next().cloned().unwrap_or_default())
            }
            Some(indices) if indices.len() > 1 => Err(SearchIndexError::alias_configuration(
                format!("Alias {} resolves to {} indices", target, indices.len()),
            )),
            _ => Err(SearchIndexError::index_not_found(target)),
        }
    }

    /// Resolve a read target to the physical indices it covers.
    fn read_indices(&self, target: &str) -> Vec<String> {
        if self.indices.contains_key(target) {
            return vec![target.to_string()];
        }
        self.aliases
            .get(target)
            .map(|indices| indices.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct FailurePlan {
    bulk_upserts: usize,
    bulk_deletes: usize,
    alias_updates: usize,
    rejected_ids: BTreeSet<String>,
}

#[derive(Debug, Default)]
struct CallCounts {
    bulk_upserts: usize,
    bulk_deletes: usize,
    alias_updates: usize,
}

/// A search cluster held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryProvider {
    state: Mutex<ClusterState>,
    failures: Mutex<FailurePlan>,
    calls: Mutex<CallCounts>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` bulk upserts with a connection error.
    pub fn fail_next_bulk_upserts(&self, count: usize) {
        lock(&self.failures).bulk_upserts = count;
    }

    /// Fail the next `count` bulk deletes with a connection error.
    pub fn fail_next_bulk_deletes(&self, count: usize) {
        lock(&self.failures).bulk_deletes = count;
    }

    /// Fail the next `count` alias transactions with a connection error.
    pub fn fail_next_alias_updates(&self, count: usize) {
        lock(&self.failures).alias_updates = count;
    }

    /// Reject every future upsert of this document id as a per-item failure.
    pub fn reject_document(&self, id: impl Into<String>) {
        lock(&self.failures).rejected_ids.insert(id.into());
    }

    pub fn bulk_upsert_calls(&self) -> usize {
        lock(&self.calls).bulk_upserts
    }

    pub fn bulk_delete_calls(&self) -> usize {
        lock(&self.calls).bulk_deletes
    }

    pub fn alias_update_calls(&self) -> usize {
        lock(&self.calls).alias_updates
    }

    /// Names of all physical indices.
    pub fn indices(&self) -> Vec<String> {
        lock(&self.state).indices.keys().cloned().collect()
    }

    /// Indices an alias resolves to, empty when the alias does not exist.
    pub fn alias_targets(&self, alias: &str) -> BTreeSet<String> {
        lock(&self.state)
            .aliases
            .get(alias)
            .cloned()
            .unwrap_or_default()
    }

    /// The create-index body an index was created with.
    pub fn index_body(&self, index: &str) -> Option<Value> {
        lock(&self.state)
            .indices
            .get(index)
            .map(|stored| stored.body.clone())
    }

    /// All documents stored in a physical index.
    pub fn documents(&self, index: &str) -> BTreeMap<String, Value> {
        lock(&self.state)
            .indices
            .get(index)
            .map(|stored| stored.documents.clone())
            .unwrap_or_default()
    }

    /// Documents visible through a target (index or alias), merged across indices.
    pub fn visible_ids(&self, target: &str) -> BTreeSet<String> {
        let state = lock(&self.state);
        state
            .read_indices(target)
            .iter()
            .filter_map(|index| state.indices.get(index))
            .flat_map(|stored| stored.documents.keys().cloned())
            .collect()
    }

    /// Take one injected failure from a counter, if any remain.
    fn take_failure(counter: &mut usize) -> bool {
        if *counter > 0 {
            *counter -= 1;
            true
        } else {
            false
        }
    }
}

#[async_trait]
impl SearchClusterProvider for InMemoryProvider {
    async fn create_index(
        &self,
        name: &str,
        body: &Value,
    ) -> Result<CreateIndexOutcome, SearchIndexError> {
        let mut state = lock(&self.state);
        if state.indices.contains_key(name) {
            return Ok(CreateIndexOutcome::AlreadyExists);
        }
        if state.aliases.contains_key(name) {
            return Err(SearchIndexError::index_creation(format!(
                "{} already exists as an alias",
                name
            )));
        }
        state.indices.insert(
            name.to_string(),
            StoredIndex {
                body: body.clone(),
                documents: BTreeMap::new(),
            },
        );
        debug!(index = %name, "Created in-memory index");
        Ok(CreateIndexOutcome::Created)
    }

    async fn index_exists(&self, name: &str) -> Result<bool, SearchIndexError> {
        Ok(lock(&self.state).indices.contains_key(name))
    }

    async fn get_indices_for_alias(
        &self,
        alias: &str,
    ) -> Result<BTreeSet<String>, SearchIndexError> {
        Ok(self.alias_targets(alias))
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), SearchIndexError> {
        lock(&self.calls).alias_updates += 1;
        if Self::take_failure(&mut lock(&self.failures).alias_updates) {
            return Err(SearchIndexError::connection("injected alias update failure"));
        }

        let mut state = lock(&self.state);

        // Validate the whole transaction before applying any of it.
        for action in actions {
            if !state.indices.contains_key(action.index()) {
                return Err(SearchIndexError::index_not_found(action.index()));
            }
            if let AliasAction::Remove { index, alias } = action {
                let attached = state
                    .aliases
                    .get(alias)
                    .is_some_and(|indices| indices.contains(index));
                if !attached {
                    return Err(SearchIndexError::alias(format!(
                        "Alias {} is not attached to {}",
                        alias, index
                    )));
                }
            }
        }

        for action in actions {
            match action {
                AliasAction::Add { index, alias } => {
                    state
                        .aliases
                        .entry(alias.clone())
                        .or_default()
                        .insert(index.clone());
                }
                AliasAction::Remove { index, alias } => {
                    if let Some(indices) = state.aliases.get_mut(alias) {
                        indices.remove(index);
                        if indices.is_empty() {
                            state.aliases.remove(alias);
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn bulk_upsert(
        &self,
        target: &str,
        documents: &[Document],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        lock(&self.calls).bulk_upserts += 1;
        let rejected = {
            let mut failures = lock(&self.failures);
            if Self::take_failure(&mut failures.bulk_upserts) {
                return Err(SearchIndexError::connection("injected bulk upsert failure"));
            }
            failures.rejected_ids.clone()
        };

        let mut state = lock(&self.state);
        let index = state.write_index(target)?;
        let Some(stored) = state.indices.get_mut(&index) else {
            return Err(SearchIndexError::index_not_found(index));
        };

        let results = documents
            .iter()
            .map(|document| {
                if rejected.contains(&document.id) {
                    return BatchOperationResult::failed(
                        document.id.clone(),
                        SearchIndexError::bulk_index(format!(
                            "mapper_parsing_exception for {}",
                            document.id
                        )),
                    );
                }
                stored
                    .documents
                    .insert(document.id.clone(), document.source_value());
                BatchOperationResult::succeeded(document.id.clone())
            })
            .collect();
        Ok(BatchOperationSummary::from_results(results))
    }

    async fn bulk_delete(
        &self,
        target: &str,
        ids: &[String],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        lock(&self.calls).bulk_deletes += 1;
        if Self::take_failure(&mut lock(&self.failures).bulk_deletes) {
            return Err(SearchIndexError::connection("injected bulk delete failure"));
        }

        let mut state = lock(&self.state);
        let index = state.write_index(target)?;
        let Some(stored) = state.indices.get_mut(&index) else {
            return Err(SearchIndexError::index_not_found(index));
        };

        let results = ids
            .iter()
            .map(|id| {
                stored.documents.remove(id);
                BatchOperationResult::succeeded(id.clone())
            })
            .collect();
        Ok(BatchOperationSummary::from_results(results))
    }

    async fn get_document(
        &self,
        target: &str,
        id: &str,
    ) -> Result<Option<Value>, SearchIndexError> {
        let state = lock(&self.state);
        let indices = state.read_indices(target);
        if indices.is_empty() {
            return Err(SearchIndexError::index_not_found(target));
        }
        Ok(indices
            .iter()
            .filter_map(|index| state.indices.get(index))
            .find_map(|stored| stored.documents.get(id).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(id: &str, name: &str) -> Document {
        let mut document = Document::new(id);
        document.insert("name", json!(name));
        document
    }

    async fn provider_with_index(index: &str, alias: &str) -> InMemoryProvider {
        let provider = InMemoryProvider::new();
        provider.create_index(index, &json!({})).await.unwrap();
        provider
            .update_aliases(&[AliasAction::add(index, alias)])
            .await
            .unwrap();
        provider
    }

    #[tokio::test]
    async fn test_create_index_twice_reports_already_exists() {
        let provider = InMemoryProvider::new();
        assert_eq!(
            provider.create_index("idx", &json!({})).await.unwrap(),
            CreateIndexOutcome::Created
        );
        assert_eq!(
            provider.create_index("idx", &json!({})).await.unwrap(),
            CreateIndexOutcome::AlreadyExists
        );
    }

    #[tokio::test]
    async fn test_alias_transaction_is_all_or_nothing() {
        let provider = provider_with_index("a", "write").await;

        let result = provider
            .update_aliases(&[
                AliasAction::add("a", "read"),
                AliasAction::remove("missing", "write"),
            ])
            .await;

        assert!(result.is_err());
        assert!(provider.alias_targets("read").is_empty());
        assert_eq!(provider.alias_targets("write").len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_through_alias_and_read_back() {
        let provider = provider_with_index("a", "write").await;

        let summary = provider
            .bulk_upsert("write", &[document("1", "Acme"), document("2", "Globex")])
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(
            provider.get_document("write", "1").await.unwrap(),
            Some(json!({"name": "Acme"}))
        );
        assert_eq!(provider.documents("a").len(), 2);
    }

    #[tokio::test]
    async fn test_write_through_alias_with_two_indices_is_rejected() {
        let provider = provider_with_index("a", "write").await;
        provider.create_index("b", &json!({})).await.unwrap();
        provider
            .update_aliases(&[AliasAction::add("b", "write")])
            .await
            .unwrap();

        let err = provider
            .bulk_upsert("write", &[document("1", "Acme")])
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_delete_missing_document_succeeds() {
        let provider = provider_with_index("a", "write").await;

        let summary = provider
            .bulk_delete("write", &["404".to_string()])
            .await
            .unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 0);
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let provider = provider_with_index("a", "write").await;
        provider.fail_next_bulk_upserts(1);
        provider.reject_document("2");

        assert!(provider
            .bulk_upsert("write", &[document("1", "Acme")])
            .await
            .is_err());

        let summary = provider
            .bulk_upsert("write", &[document("1", "Acme"), document("2", "Globex")])
            .await
            .unwrap();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed_ids().collect::<Vec<_>>(), vec!["2"]);
        assert_eq!(provider.bulk_upsert_calls(), 2);
    }
}
