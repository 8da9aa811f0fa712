//! Index settings and the create-index request body.

use search_sync_shared::DocumentSchema;
use serde_json::{json, Value};

/// Cluster-level settings applied to every physical index the engine creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConfig {
    pub number_of_shards: u32,
    pub number_of_replicas: u32,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            number_of_shards: 1,
            number_of_replicas: 1,
        }
    }
}

impl IndexConfig {
    pub fn new(number_of_shards: u32, number_of_replicas: u32) -> Self {
        Self {
            number_of_shards,
            number_of_replicas,
        }
    }

    /// The create-index body: settings plus the schema's mappings.
    ///
    /// Settings are not part of the schema fingerprint, so changing shard or
    /// replica counts never triggers a migration.
    pub fn index_body(&self, schema: &DocumentSchema) -> Value {
        json!({
            "settings": {
                "number_of_shards": self.number_of_shards,
                "number_of_replicas": self.number_of_replicas
            },
            "mappings": schema.to_mapping()
        })
    }
}
