//! Search cluster provider trait definition.
//!
//! This module defines the abstract interface for the cluster operations the
//! sync engine needs: physical indices, aliases and bulk document writes.

use std::collections::BTreeSet;

use async_trait::async_trait;
use search_sync_shared::Document;
use serde_json::Value;

use crate::errors::SearchIndexError;
use crate::types::{AliasAction, BatchOperationSummary, CreateIndexOutcome};

/// Abstracts the underlying search cluster (OpenSearch, or an in-memory fake in tests).
///
/// Implementations are shared between the `SearchIndexService` and the
/// `IndexLifecycleManager`. Document operations accept either a physical index
/// name or an alias as `target`.
#[async_trait]
pub trait SearchClusterProvider: Send + Sync {
    /// Create a physical index with the given settings and mappings body.
    ///
    /// Returns `CreateIndexOutcome::AlreadyExists` instead of an error when the
    /// index is already present, so concurrent creators both succeed.
    async fn create_index(
        &self,
        name: &str,
        body: &Value,
    ) -> Result<CreateIndexOutcome, SearchIndexError>;

    /// Whether a physical index with this name exists.
    async fn index_exists(&self, name: &str) -> Result<bool, SearchIndexError>;

    /// The physical indices an alias resolves to. Empty when the alias does not exist.
    async fn get_indices_for_alias(&self, alias: &str)
        -> Result<BTreeSet<String>, SearchIndexError>;

    /// Apply all actions as one atomic alias transaction.
    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), SearchIndexError>;

    /// Insert or fully replace each document under its id.
    ///
    /// # Returns
    ///
    /// * `Ok(BatchOperationSummary)` - Per-document outcomes; item rejections are not errors
    /// * `Err(SearchIndexError)` - If the request as a whole failed
    async fn bulk_upsert(
        &self,
        target: &str,
        documents: &[Document],
    ) -> Result<BatchOperationSummary, SearchIndexError>;

    /// Delete each id. Ids that are not present count as successful deletions.
    async fn bulk_delete(
        &self,
        target: &str,
        ids: &[String],
    ) -> Result<BatchOperationSummary, SearchIndexError>;

    /// Fetch a stored document body, `None` when absent.
    async fn get_document(&self, target: &str, id: &str)
        -> Result<Option<Value>, SearchIndexError>;
}
