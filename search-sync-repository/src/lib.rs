//! # Search Sync Repository
//!
//! This crate provides the search cluster abstraction used by the sync engine:
//! the `SearchClusterProvider` trait with OpenSearch and in-memory
//! implementations, the retrying `SearchIndexService` for document writes, and
//! the `IndexLifecycleManager` that owns physical indices and aliases.

pub mod config;
pub mod errors;
pub mod index_config;
pub mod interfaces;
pub mod lifecycle;
pub mod memory;
pub mod naming;
pub mod opensearch;
pub mod service;
pub mod types;

pub use config::SearchIndexServiceConfig;
pub use errors::SearchIndexError;
pub use index_config::IndexConfig;
pub use interfaces::SearchClusterProvider;
pub use lifecycle::{IndexLifecycleManager, IndexState, MigrationPlan, SetupOutcome, WriteTarget};
pub use memory::InMemoryProvider;
pub use naming::{fingerprint_from_index_name, IndexNaming};
pub use opensearch::OpenSearchProvider;
pub use service::SearchIndexService;
pub use types::{AliasAction, BatchOperationResult, BatchOperationSummary, CreateIndexOutcome};
