//! OpenSearch provider implementation.
//!
//! This module provides the concrete implementation of `SearchClusterProvider`
//! using the OpenSearch Rust crate.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use opensearch::{
    http::request::JsonBody,
    http::transport::{SingleNodeConnectionPool, TransportBuilder},
    http::StatusCode,
    indices::{IndicesCreateParts, IndicesExistsParts, IndicesGetAliasParts},
    BulkParts, GetParts, OpenSearch,
};
use search_sync_shared::Document;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use url::Url;

use crate::errors::SearchIndexError;
use crate::interfaces::SearchClusterProvider;
use crate::types::{AliasAction, BatchOperationResult, BatchOperationSummary, CreateIndexOutcome};

/// OpenSearch provider implementation.
///
/// # Example
///
/// ```ignore
/// use std::time::Duration;
/// use search_sync_repository::OpenSearchProvider;
///
/// let provider = OpenSearchProvider::new("http://localhost:9200", Duration::from_secs(30)).await?;
/// let indices = provider.get_indices_for_alias("search-company-read").await?;
/// ```
pub struct OpenSearchProvider {
    client: OpenSearch,
}

impl OpenSearchProvider {
    /// Create a new OpenSearch provider connected to the specified URL.
    ///
    /// # Arguments
    ///
    /// * `url` - The OpenSearch server URL (e.g., "http://localhost:9200")
    /// * `request_timeout` - Timeout applied to every request
    ///
    /// # Returns
    ///
    /// * `Ok(OpenSearchProvider)` - A new provider instance
    /// * `Err(SearchIndexError)` - If connection setup fails
    pub async fn new(url: &str, request_timeout: Duration) -> Result<Self, SearchIndexError> {
        let parsed_url =
            Url::parse(url).map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let conn_pool = SingleNodeConnectionPool::new(parsed_url);
        let transport = TransportBuilder::new(conn_pool)
            .disable_proxy()
            .timeout(request_timeout)
            .build()
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let client = OpenSearch::new(transport);

        info!(
            url = %url,
            timeout_secs = request_timeout.as_secs(),
            "Created OpenSearch provider"
        );

        Ok(Self { client })
    }

    /// Whole-request failures worth sending again: throttling and server-side errors.
    fn is_transient(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    /// Parse an alias listing (`GET /_alias/...`) into the set of index names it mentions.
    fn indices_from_alias_response(body: &Value) -> BTreeSet<String> {
        body.as_object()
            .map(|indices| indices.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Turn a `_bulk` response into per-document results.
    ///
    /// Items come back in request order. With `not_found_is_success`, a 404 item
    /// counts as a success, which makes repeated deletes idempotent.
    fn summarize_bulk_response(
        action: &str,
        ids: &[&str],
        body: &Value,
        not_found_is_success: bool,
    ) -> BatchOperationSummary {
        let items = body
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let results = ids
            .iter()
            .enumerate()
            .map(|(position, id)| {
                let Some(item) = items.get(position).and_then(|item| item.get(action)) else {
                    return BatchOperationResult::failed(
                        *id,
                        SearchIndexError::parse(format!("Missing bulk item for document {}", id)),
                    );
                };

                let status = item.get("status").and_then(Value::as_u64).unwrap_or(0);
                let ok = (200..300).contains(&status) || (not_found_is_success && status == 404);
                if ok {
                    return BatchOperationResult::succeeded(*id);
                }

                let reason = item
                    .get("error")
                    .map(|error| {
                        let kind = error.get("type").and_then(Value::as_str).unwrap_or("unknown");
                        let reason = error.get("reason").and_then(Value::as_str).unwrap_or("");
                        format!("{}: {}", kind, reason)
                    })
                    .unwrap_or_else(|| format!("status {}", status));
                BatchOperationResult::failed(
                    *id,
                    SearchIndexError::bulk_index(format!(
                        "{} failed for {}: {}",
                        action, id, reason
                    )),
                )
            })
            .collect();

        BatchOperationSummary::from_results(results)
    }
}

#[async_trait]
impl SearchClusterProvider for OpenSearchProvider {
    async fn create_index(
        &self,
        name: &str,
        body: &Value,
    ) -> Result<CreateIndexOutcome, SearchIndexError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(name))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if status.is_success() {
            info!(index = %name, "Created index");
            return Ok(CreateIndexOutcome::Created);
        }

        let error_body = response.text().await.unwrap_or_default();
        if status == StatusCode::BAD_REQUEST
            && error_body.contains("resource_already_exists_exception")
        {
            debug!(index = %name, "Index already exists");
            return Ok(CreateIndexOutcome::AlreadyExists);
        }

        error!(index = %name, status = %status, body = %error_body, "Create index failed");
        Err(SearchIndexError::index_creation(format!(
            "Creating {} failed with status {}: {}",
            name, status, error_body
        )))
    }

    async fn index_exists(&self, name: &str) -> Result<bool, SearchIndexError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[name]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if status.is_success() {
            Ok(true)
        } else if status == StatusCode::NOT_FOUND {
            Ok(false)
        } else {
            Err(SearchIndexError::unknown(format!(
                "Index exists check for {} returned status {}",
                name, status
            )))
        }
    }

    async fn get_indices_for_alias(
        &self,
        alias: &str,
    ) -> Result<BTreeSet<String>, SearchIndexError> {
        let response = self
            .client
            .indices()
            .get_alias(IndicesGetAliasParts::Name(&[alias]))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if status == StatusCode::NOT_FOUND {
            return Ok(BTreeSet::new());
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(SearchIndexError::alias(format!(
                "Resolving alias {} failed with status {}: {}",
                alias, status, error_body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        Ok(Self::indices_from_alias_response(&body))
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> Result<(), SearchIndexError> {
        if actions.is_empty() {
            return Ok(());
        }

        let body = json!({
            "actions": actions.iter().map(AliasAction::to_value).collect::<Vec<_>>()
        });

        let response = self
            .client
            .indices()
            .update_aliases()
            .body(body)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Alias update failed");
            return Err(SearchIndexError::alias(format!(
                "Alias update failed with status {}: {}",
                status, error_body
            )));
        }

        debug!(actions = ?actions, "Aliases updated");
        Ok(())
    }

    async fn bulk_upsert(
        &self,
        target: &str,
        documents: &[Document],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        if documents.is_empty() {
            return Ok(BatchOperationSummary::default());
        }

        let mut body: Vec<JsonBody<Value>> = Vec::with_capacity(documents.len() * 2);
        for document in documents {
            body.push(json!({ "index": { "_id": document.id } }).into());
            body.push(document.source_value().into());
        }

        let response = self
            .client
            .bulk(BulkParts::Index(target))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(target = %target, status = %status, body = %error_body, "Bulk upsert rejected");
            let message = format!(
                "Bulk upsert to {} failed with status {}: {}",
                target, status, error_body
            );
            return Err(if Self::is_transient(status) {
                SearchIndexError::bulk_index(message)
            } else {
                SearchIndexError::validation(message)
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
        let summary = Self::summarize_bulk_response("index", &ids, &json, false);
        if summary.failed > 0 {
            warn!(
                target = %target,
                failed = summary.failed,
                total = summary.total,
                "Bulk upsert had item failures"
            );
        }
        Ok(summary)
    }

    async fn bulk_delete(
        &self,
        target: &str,
        ids: &[String],
    ) -> Result<BatchOperationSummary, SearchIndexError> {
        if ids.is_empty() {
            return Ok(BatchOperationSummary::default());
        }

        let body: Vec<JsonBody<Value>> = ids
            .iter()
            .map(|id| json!({ "delete": { "_id": id } }).into())
            .collect();

        let response = self
            .client
            .bulk(BulkParts::Index(target))
            .body(body)
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(target = %target, status = %status, body = %error_body, "Bulk delete rejected");
            let message = format!(
                "Bulk delete on {} failed with status {}: {}",
                target, status, error_body
            );
            return Err(if Self::is_transient(status) {
                SearchIndexError::delete(message)
            } else {
                SearchIndexError::validation(message)
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;

        let ids: Vec<&str> = ids.iter().map(String::as_str).collect();
        Ok(Self::summarize_bulk_response("delete", &ids, &json, true))
    }

    async fn get_document(
        &self,
        target: &str,
        id: &str,
    ) -> Result<Option<Value>, SearchIndexError> {
        let response = self
            .client
            .get(GetParts::IndexId(target, id))
            .send()
            .await
            .map_err(|e| SearchIndexError::connection(e.to_string()))?;

        let status = response.status_code();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(SearchIndexError::unknown(format!(
                "Get {} from {} failed with status {}: {}",
                id, target, status, error_body
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| SearchIndexError::parse(e.to_string()))?;
        Ok(json.get("_source").cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_transient() {
        assert!(OpenSearchProvider::is_transient(StatusCode::TOO_MANY_REQUESTS));
        assert!(OpenSearchProvider::is_transient(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!OpenSearchProvider::is_transient(StatusCode::BAD_REQUEST));
    }

    #[test]
    fn test_indices_from_alias_response() {
        let body = json!({
            "search-company-aaa": { "aliases": { "search-company-read": {} } },
            "search-company-bbb": { "aliases": { "search-company-read": {} } }
        });

        let indices = OpenSearchProvider::indices_from_alias_response(&body);
        assert_eq!(
            indices.into_iter().collect::<Vec<_>>(),
            vec!["search-company-aaa", "search-company-bbb"]
        );
    }

    #[test]
    fn test_summarize_bulk_response_with_item_failure() {
        let body = json!({
            "errors": true,
            "items": [
                { "index": { "_id": "1", "status": 201 } },
                { "index": { "_id": "2", "status": 400, "error": {
                    "type": "mapper_parsing_exception",
                    "reason": "failed to parse field [employees]"
                } } },
                { "index": { "_id": "3", "status": 200 } }
            ]
        });

        let summary =
            OpenSearchProvider::summarize_bulk_response("index", &["1", "2", "3"], &body, false);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);

        let failure = &summary.results[1];
        assert_eq!(failure.document_id, "2");
        let message = failure.error.as_ref().unwrap().to_string();
        assert!(message.contains("mapper_parsing_exception"));
    }

    #[test]
    fn test_summarize_bulk_delete_treats_not_found_as_success() {
        let body = json!({
            "items": [
                { "delete": { "_id": "1", "status": 200 } },
                { "delete": { "_id": "2", "status": 404, "result": "not_found" } }
            ]
        });

        let summary =
            OpenSearchProvider::summarize_bulk_response("delete", &["1", "2"], &body, true);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 0);
    }

    #[test]
    fn test_summarize_bulk_response_missing_items() {
        let summary =
            OpenSearchProvider::summarize_bulk_response("index", &["1", "2"], &json!({}), false);
        assert_eq!(summary.failed, 2);
        assert!(matches!(
            summary.results[0].error,
            Some(SearchIndexError::ParseError(_))
        ));
    }
}
