//! Search index error types.
//!
//! This module defines the unified error type for all search cluster operations,
//! including both low-level transport errors and alias-topology faults detected
//! by the lifecycle manager.

use thiserror::Error;

/// Unified errors from search cluster operations.
///
/// Used by the `SearchClusterProvider` trait, `SearchIndexService` and
/// `IndexLifecycleManager`. Transport-level failures are retryable; alias
/// configuration faults are not and must stop the affected entity.
#[derive(Debug, Clone, Error)]
pub enum SearchIndexError {
    /// Validation error (e.g., empty document id, empty target name).
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Failed to reach the search cluster or the request timed out.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The bulk request as a whole was rejected or could not be delivered.
    #[error("Bulk index error: {0}")]
    BulkIndexError(String),

    /// The bulk delete request as a whole was rejected or could not be delivered.
    #[error("Delete error: {0}")]
    DeleteError(String),

    /// Failed to create a physical index.
    #[error("Index creation error: {0}")]
    IndexCreationError(String),

    /// The addressed index or alias does not exist.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// An alias request was rejected by the cluster.
    #[error("Alias error: {0}")]
    AliasError(String),

    /// Aliases are in a state the engine cannot reason about, e.g. a write alias
    /// resolving to several indices. Never retried.
    #[error("Alias configuration error: {0}")]
    AliasConfiguration(String),

    /// Failed to parse response from the search cluster.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Failed to serialize data for the search cluster.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Batch size exceeds configured maximum.
    #[error("Batch size {provided} exceeds maximum {max}")]
    BatchSizeExceeded { provided: usize, max: usize },

    /// Unknown error.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SearchIndexError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::ConnectionError(msg.into())
    }

    /// Create a bulk index error.
    pub fn bulk_index(msg: impl Into<String>) -> Self {
        Self::BulkIndexError(msg.into())
    }

    /// Create a delete error.
    pub fn delete(msg: impl Into<String>) -> Self {
        Self::DeleteError(msg.into())
    }

    /// Create an index creation error.
    pub fn index_creation(msg: impl Into<String>) -> Self {
        Self::IndexCreationError(msg.into())
    }

    /// Create an index not found error.
    pub fn index_not_found(name: impl Into<String>) -> Self {
        Self::IndexNotFound(name.into())
    }

    /// Create an alias error.
    pub fn alias(msg: impl Into<String>) -> Self {
        Self::AliasError(msg.into())
    }

    /// Create an alias configuration error.
    pub fn alias_configuration(msg: impl Into<String>) -> Self {
        Self::AliasConfiguration(msg.into())
    }

    /// Create a parse error.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Create a batch size exceeded error.
    pub fn batch_size_exceeded(provided: usize, max: usize) -> Self {
        Self::BatchSizeExceeded { provided, max }
    }

    /// Create an unknown error.
    pub fn unknown(msg: impl Into<String>) -> Self {
        Self::Unknown(msg.into())
    }

    /// Whether the failed request may succeed if sent again unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ConnectionError(_) | Self::BulkIndexError(_) | Self::DeleteError(_)
        )
    }

    /// Whether the error describes a broken alias topology.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AliasConfiguration(_))
    }
}
