//! Physical index and alias naming.
//!
//! Every entity owns a read alias, a write alias and one physical index per
//! schema fingerprint it has ever been materialized with:
//!
//! ```text
//! {prefix}-{entity}-{fingerprint}   physical index
//! {prefix}-{entity}-read            alias used by queries
//! {prefix}-{entity}-write           alias used by the sync path
//! ```

use search_sync_shared::{EntityDescriptor, SchemaFingerprint};

use crate::errors::SearchIndexError;

pub const READ_ALIAS_SUFFIX: &str = "read";
pub const WRITE_ALIAS_SUFFIX: &str = "write";

/// Derives cluster names for entities under a deployment prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexNaming {
    prefix: String,
}

impl IndexNaming {
    /// Create a naming scheme for the given prefix.
    ///
    /// The prefix must be non-empty lowercase ASCII letters, digits, `_` or `-`,
    /// which is what the cluster accepts in index names.
    pub fn new(prefix: impl Into<String>) -> Result<Self, SearchIndexError> {
        let prefix = prefix.into();
        let valid = !prefix.is_empty()
            && !prefix.starts_with(['-', '_'])
            && prefix
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if !valid {
            return Err(SearchIndexError::validation(format!(
                "Invalid index prefix '{}'",
                prefix
            )));
        }
        Ok(Self { prefix })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The physical index name for an entity at a given schema fingerprint.
    pub fn index_name(&self, entity: &str, fingerprint: &SchemaFingerprint) -> String {
        format!("{}-{}-{}", self.prefix, entity, fingerprint)
    }

    /// The physical index name for the descriptor's current schema.
    pub fn current_index_name(&self, descriptor: &EntityDescriptor) -> String {
        self.index_name(descriptor.name(), descriptor.fingerprint())
    }

    pub fn read_alias(&self, entity: &str) -> String {
        format!("{}-{}-{}", self.prefix, entity, READ_ALIAS_SUFFIX)
    }

    pub fn write_alias(&self, entity: &str) -> String {
        format!("{}-{}-{}", self.prefix, entity, WRITE_ALIAS_SUFFIX)
    }
}

/// Recover the schema fingerprint encoded in a physical index name.
///
/// Returns `None` for names that were not produced by `IndexNaming::index_name`.
pub fn fingerprint_from_index_name(index: &str) -> Option<SchemaFingerprint> {
    let (_, suffix) = index.rsplit_once('-')?;
    SchemaFingerprint::parse(suffix)
}
