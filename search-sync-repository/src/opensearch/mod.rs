//! OpenSearch implementation of the search cluster provider.
//!
//! This module provides a concrete implementation of `SearchClusterProvider`
//! using OpenSearch as the backend.

mod provider;

pub use provider::OpenSearchProvider;
