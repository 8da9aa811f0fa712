//! In-memory implementation of the search cluster provider.
//!
//! Models the parts of cluster behavior the engine relies on (atomic alias
//! transactions, write-target resolution, idempotent deletes) and lets tests
//! inject transport failures and per-document rejections.

mod provider;

pub use provider::InMemoryProvider;
