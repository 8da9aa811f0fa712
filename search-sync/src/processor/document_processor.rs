//! Document processor implementation.
//!
//! Maps a batch of source records through the entity's descriptor, isolating
//! per-record mapping faults so one bad record never aborts its batch.

use search_sync_shared::{Document, DocumentMapper, EntityDescriptor, MappingError, Record};
use tracing::{debug, error, instrument};

/// A record whose mapping failed.
#[derive(Debug, Clone, PartialEq)]
pub struct MappingFailure {
    pub record_id: String,
    pub error: MappingError,
}

/// Outcome of mapping a batch of records.
#[derive(Debug, Default)]
pub struct ProcessedBatch {
    /// Documents ready for loading, in record order.
    pub documents: Vec<Document>,
    /// Records skipped because their mapping failed.
    pub failures: Vec<MappingFailure>,
}

/// Processor that turns source records into search documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentProcessor;

impl DocumentProcessor {
    /// Create a new document processor.
    pub fn new() -> Self {
        Self
    }

    /// Map a batch of records.
    ///
    /// # Arguments
    ///
    /// * `descriptor` - The entity type the records belong to
    /// * `records` - The records to map
    ///
    /// # Returns
    ///
    /// The mapped documents plus one `MappingFailure` per record that could not be mapped.
    #[instrument(
        skip(self, descriptor, records),
        fields(entity = %descriptor.name(), record_count = records.len())
    )]
    pub fn process_batch(
        &self,
        descriptor: &EntityDescriptor,
        records: &[Record],
    ) -> ProcessedBatch {
        let mut batch = ProcessedBatch {
            documents: Vec::with_capacity(records.len()),
            failures: Vec::new(),
        };

        for record in records {
            match DocumentMapper::map(descriptor, record) {
                Ok(document) => batch.documents.push(document),
                Err(e) => {
                    error!(
                        entity = %descriptor.name(),
                        record_id = %record.id,
                        error = %e,
                        "Failed to map record, skipping"
                    );
                    batch.failures.push(MappingFailure {
                        record_id: record.id.clone(),
                        error: e,
                    });
                }
            }
        }

        debug!(
            mapped = batch.documents.len(),
            failed = batch.failures.len(),
            "Processed record batch"
        );
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_sync_shared::{DocumentSchema, EntityMapping, FieldType, DISCRIMINATOR_FIELD};
    use serde_json::json;

    fn descriptor() -> EntityDescriptor {
        let schema = DocumentSchema::new()
            .with_field("name", FieldType::Text)
            .with_field("name_length", FieldType::Integer);
        let mapping = EntityMapping::new().computed("name_length", |record| {
            let name = record
                .value("name")
                .and_then(|v| v.as_str())
                .ok_or_else(|| MappingError::computed("name_length", "name is missing"))?;
            Ok(json!(name.len()))
        });
        EntityDescriptor::new("widget", schema, mapping).unwrap()
    }

    #[test]
    fn test_process_batch_isolates_failures() {
        let records = vec![
            Record::new("1").with("name", json!("gear")),
            Record::new("2"),
            Record::new("3").with("name", json!("sprocket")),
        ];

        let batch = DocumentProcessor::new().process_batch(&descriptor(), &records);

        let ids: Vec<&str> = batch.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].record_id, "2");
        assert_eq!(batch.documents[1].get("name_length"), Some(&json!(8)));
        assert_eq!(
            batch.documents[0].get(DISCRIMINATOR_FIELD),
            Some(&json!("widget"))
        );
    }

    #[test]
    fn test_empty_batch() {
        let batch = DocumentProcessor::new().process_batch(&descriptor(), &[]);
        assert!(batch.documents.is_empty());
        assert!(batch.failures.is_empty());
    }
}
