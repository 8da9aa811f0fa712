//! Document schema declarations.
//!
//! A [`DocumentSchema`] is the set of fields a searchable entity type exposes
//! in the search index, together with their index field types. It renders to
//! the `mappings` section of an index creation request and is the input of
//! the schema fingerprint.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

/// Index field type of one document field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Keyword,
    Text,
    /// Text with a `keyword` sub-field for sorting and exact matches.
    TextWithKeyword,
    Boolean,
    Integer,
    Long,
    Double,
    Date,
    /// An inner object with its own fields.
    Object(BTreeMap<String, FieldType>),
    /// A list of inner objects queried independently of each other.
    Nested(BTreeMap<String, FieldType>),
}

impl FieldType {
    /// Build an object field type from `(name, type)` pairs.
    pub fn object<'a>(fields: impl IntoIterator<Item = (&'a str, FieldType)>) -> Self {
        Self::Object(collect_fields(fields))
    }

    /// Build a nested field type from `(name, type)` pairs.
    pub fn nested<'a>(fields: impl IntoIterator<Item = (&'a str, FieldType)>) -> Self {
        Self::Nested(collect_fields(fields))
    }

    /// The `{id, name}` object produced by a reference transform.
    pub fn id_name() -> Self {
        Self::object([("id", Self::Keyword), ("name", Self::TextWithKeyword)])
    }

    /// Render this field type as an index mapping property.
    pub fn to_mapping(&self) -> Value {
        match self {
            Self::Keyword => json!({"type": "keyword"}),
            Self::Text => json!({"type": "text"}),
            Self::TextWithKeyword => json!({
                "type": "text",
                "fields": {"keyword": {"type": "keyword"}}
            }),
            Self::Boolean => json!({"type": "boolean"}),
            Self::Integer => json!({"type": "integer"}),
            Self::Long => json!({"type": "long"}),
            Self::Double => json!({"type": "double"}),
            Self::Date => json!({"type": "date"}),
            Self::Object(fields) => json!({
                "type": "object",
                "properties": properties(fields)
            }),
            Self::Nested(fields) => json!({
                "type": "nested",
                "properties": properties(fields)
            }),
        }
    }
}

fn collect_fields<'a>(
    fields: impl IntoIterator<Item = (&'a str, FieldType)>,
) -> BTreeMap<String, FieldType> {
    fields
        .into_iter()
        .map(|(name, field_type)| (name.to_string(), field_type))
        .collect()
}

fn properties(fields: &BTreeMap<String, FieldType>) -> Value {
    let mut object = Map::new();
    for (name, field_type) in fields {
        object.insert(name.clone(), field_type.to_mapping());
    }
    Value::Object(object)
}

/// The declared fields of one entity type's search documents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentSchema {
    fields: BTreeMap<String, FieldType>,
}

impl DocumentSchema {
    /// Create an empty schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field. Declaring the same name twice keeps the last type.
    pub fn with_field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.insert(name.into(), field_type);
        self
    }

    pub(crate) fn insert(&mut self, name: &str, field_type: FieldType) {
        self.fields.insert(name.to_string(), field_type);
    }

    /// Look up a declared field.
    pub fn field(&self, name: &str) -> Option<&FieldType> {
        self.fields.get(name)
    }

    /// Returns `true` if the field is declared.
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Declared field names in sorted order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Render the schema as the `mappings` section of an index.
    ///
    /// Undeclared fields are not indexed (`dynamic: false`).
    pub fn to_mapping(&self) -> Value {
        json!({
            "dynamic": "false",
            "properties": properties(&self.fields)
        })
    }
}
