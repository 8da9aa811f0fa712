//! Search document type.
//!
//! This module defines the flat document that is sent to the search cluster
//! for one source record.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// One fully-mapped source record, ready to be indexed.
///
/// Fields are kept in a `BTreeMap` so that the serialized body only depends
/// on the field values, never on the order they were produced in. The
/// document id is the source record id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    pub id: String,
    pub source: BTreeMap<String, Value>,
}

impl Document {
    /// Create a document with no fields.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: BTreeMap::new(),
        }
    }

    /// Set a field while building the document.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        self.source.insert(field.into(), value);
    }

    /// Read a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.source.get(field)
    }

    /// Returns `true` if the document carries the field (even an empty one).
    pub fn contains(&self, field: &str) -> bool {
        self.source.contains_key(field)
    }

    /// The document body as a JSON object.
    pub fn source_value(&self) -> Value {
        Value::Object(
            self.source
                .iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        )
    }

    /// The serialized document body.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_bytes_ignore_insertion_order() {
        let mut a = Document::new("1");
        a.insert("b", json!(2));
        a.insert("a", json!(1));

        let mut b = Document::new("1");
        b.insert("a", json!(1));
        b.insert("b", json!(2));

        assert_eq!(a.to_bytes().unwrap(), b.to_bytes().unwrap());
        assert_eq!(a.to_bytes().unwrap(), br#"{"a":1,"b":2}"#.to_vec());
    }

    #[test]
    fn test_source_value() {
        let mut doc = Document::new("42");
        doc.insert("name", json!("Acme"));
        assert_eq!(doc.source_value(), json!({"name": "Acme"}));
        assert!(doc.contains("name"));
        assert!(!doc.contains("missing"));
    }
}
