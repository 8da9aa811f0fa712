//! # Search Sync
//!
//! Keeps search-cluster indices in step with a relational system-of-record:
//! maps source records into search documents, writes them through per-entity
//! aliases, and migrates entity types to a new physical index when their
//! document schema changes.
//!
//! ## Architecture
//!
//! The engine follows a Source-Processor-Loader pattern:
//!
//! 1. **Source**: Reads records by id, by relation or in keyset pages, retrying transient faults
//! 2. **Processor**: Maps records into search documents
//! 3. **Loader**: Writes documents in batches through the search index service
//! 4. **Orchestrator**: Coordinates the flow for one entity type
//! 5. **Migration**: Drives alias state transitions and backfills
//!
//! ## Modules
//!
//! - [`config`]: Settings and dependency initialization
//! - [`entities`]: Entity types registered by the binary
//! - [`source`]: Source-record collaborators
//! - [`processor`]: Transforms records into documents
//! - [`loader`]: Writes documents to the search cluster
//! - [`orchestrator`]: Sync, delete and backfill runs
//! - [`migration`]: Schema migrations
//! - [`errors`]: Error types for the engine

pub mod config;
pub mod entities;
pub mod errors;
pub mod loader;
pub mod migration;
pub mod orchestrator;
pub mod processor;
pub mod source;

pub use config::{Dependencies, Settings};
pub use errors::{SourceError, SyncError};
pub use migration::{MigrationCoordinator, MigrationOutcome};
pub use orchestrator::{SyncOrchestrator, SyncReport};

use thiserror::Error;

/// Errors that can occur during engine initialization or execution.
#[derive(Error, Debug)]
pub enum IndexingError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Sync error.
    #[error("Sync error: {0}")]
    SyncError(#[from] SyncError),
}

impl IndexingError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether the process should stop with the fatal exit code: bad
    /// configuration, an unknown entity type, or a broken alias topology.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::ConfigError(_) => true,
            Self::SyncError(SyncError::Registry(_)) => true,
            Self::SyncError(e) => e.is_fatal(),
        }
    }
}
