//! Error types for the search sync engine.

use std::path::PathBuf;

use search_sync_repository::SearchIndexError;
use search_sync_shared::RegistryError;
use thiserror::Error;

/// Errors raised by a source-record store.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The backing file or table could not be read.
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored record could not be decoded.
    #[error("Invalid {entity} record at line {line}: {reason}")]
    Parse {
        entity: String,
        line: usize,
        reason: String,
    },

    /// The store is temporarily unable to serve requests.
    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

impl SourceError {
    /// Create a parse error.
    pub fn parse(entity: impl Into<String>, line: usize, reason: impl Into<String>) -> Self {
        Self::Parse {
            entity: entity.into(),
            line,
            reason: reason.into(),
        }
    }

    /// Create an unavailable error.
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Whether another attempt may succeed. Malformed records stay malformed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::Unavailable(_))
    }
}

/// Errors that stop a sync, delete, backfill or migration run for one entity type.
///
/// Item-level mapping faults and batches that failed after retries are not
/// errors; they are counted in the `SyncReport`.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The entity type is not registered.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// The source store failed.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// The search cluster failed in a way that cannot be counted per batch,
    /// including alias configuration faults.
    #[error("Search index error: {0}")]
    Index(#[from] SearchIndexError),

    /// A migration backfill left batches unwritten, so the aliases were not switched.
    #[error("Backfill of {entity} into {index} incomplete: {failed_batches} batch(es) failed")]
    BackfillIncomplete {
        entity: String,
        index: String,
        failed_batches: usize,
    },
}

impl SyncError {
    /// Whether the error is an alias/configuration fault that needs an operator.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Index(e) if e.is_fatal())
    }
}
