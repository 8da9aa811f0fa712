//! Request and response types for search cluster operations.

use serde_json::{json, Value};

use crate::errors::SearchIndexError;

/// A single alias mutation. A slice of actions is applied by the cluster as one
/// atomic transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasAction {
    /// Point `alias` at `index` in addition to whatever it already resolves to.
    Add { index: String, alias: String },
    /// Stop `alias` from resolving to `index`.
    Remove { index: String, alias: String },
}

impl AliasAction {
    pub fn add(index: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Add {
            index: index.into(),
            alias: alias.into(),
        }
    }

    pub fn remove(index: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::Remove {
            index: index.into(),
            alias: alias.into(),
        }
    }

    pub fn index(&self) -> &str {
        match self {
            Self::Add { index, .. } | Self::Remove { index, .. } => index,
        }
    }

    pub fn alias(&self) -> &str {
        match self {
            Self::Add { alias, .. } | Self::Remove { alias, .. } => alias,
        }
    }

    /// The action in the `_aliases` request body format.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Add { index, alias } => json!({ "add": { "index": index, "alias": alias } }),
            Self::Remove { index, alias } => {
                json!({ "remove": { "index": index, "alias": alias } })
            }
        }
    }
}

/// Outcome of a create-index call. Losing a creation race is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateIndexOutcome {
    Created,
    AlreadyExists,
}

/// Result of a batch operation for a single document.
#[derive(Debug, Clone)]
pub struct BatchOperationResult {
    /// The document's identifier.
    pub document_id: String,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error if the operation failed.
    pub error: Option<SearchIndexError>,
}

impl BatchOperationResult {
    pub fn succeeded(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(document_id: impl Into<String>, error: SearchIndexError) -> Self {
        Self {
            document_id: document_id.into(),
            success: false,
            error: Some(error),
        }
    }
}

/// Summary of a batch operation containing aggregate statistics and individual results.
///
/// A bulk request can be accepted by the cluster while individual items are
/// rejected; those appear here as failed results rather than as an `Err`.
#[derive(Debug, Clone, Default)]
pub struct BatchOperationSummary {
    /// Total number of items in the batch.
    pub total: usize,
    /// Number of successful operations.
    pub succeeded: usize,
    /// Number of failed operations.
    pub failed: usize,
    /// Individual results for each item.
    pub results: Vec<BatchOperationResult>,
}

impl BatchOperationSummary {
    /// Build a summary from per-item results, deriving the counters.
    pub fn from_results(results: Vec<BatchOperationResult>) -> Self {
        let succeeded = results.iter().filter(|r| r.success).count();
        Self {
            total: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            results,
        }
    }

    pub fn failed_ids(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|r| !r.success)
            .map(|r| r.document_id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_action_body() {
        let add = AliasAction::add("search-company-abc", "search-company-read");
        assert_eq!(
            add.to_value(),
            json!({"add": {"index": "search-company-abc", "alias": "search-company-read"}})
        );

        let remove = AliasAction::remove("search-company-abc", "search-company-write");
        assert_eq!(remove.index(), "search-company-abc");
        assert_eq!(remove.alias(), "search-company-write");
        assert_eq!(
            remove.to_value()["remove"]["alias"],
            json!("search-company-write")
        );
    }

    #[test]
    fn test_summary_from_results() {
        let summary = BatchOperationSummary::from_results(vec![
            BatchOperationResult::succeeded("1"),
            BatchOperationResult::failed("2", SearchIndexError::bulk_index("mapper_parsing")),
            BatchOperationResult::succeeded("3"),
        ]);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.failed_ids().collect::<Vec<_>>(), vec!["2"]);
    }
}
