//! Source record types.
//!
//! A [`Record`] is what the data layer hands to the engine for one row of an
//! entity table. Attributes are either plain JSON values or references to
//! related records. A reference transform only reads the related record's own
//! scalar fields, so a mapping can never walk further than one hop from the
//! source record. Copying a relation verbatim keeps the JSON it was read from.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// A related record as seen from the record that references it.
#[derive(Debug, Clone, PartialEq)]
pub struct RelatedObject {
    /// Identifier of the related record.
    pub id: String,
    /// Display name of the related record, if it has one.
    pub name: Option<String>,
    /// Any other scalar fields of the related record.
    pub fields: BTreeMap<String, Value>,
    /// The JSON object this relation was read from, nested values included.
    pub raw: Option<Value>,
}

impl RelatedObject {
    /// Create a related object with an id and a name.
    pub fn new(id: impl Into<String>, name: Option<&str>) -> Self {
        Self {
            id: id.into(),
            name: name.map(str::to_string),
            fields: BTreeMap::new(),
            raw: None,
        }
    }

    /// Add an extra scalar field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        if let Some(Value::Object(raw)) = self.raw.as_mut() {
            raw.insert(key.clone(), value.clone());
        }
        self.fields.insert(key, value);
        self
    }

    /// Look up a field by name; `id` and `name` are addressable too.
    pub fn field(&self, key: &str) -> Option<Value> {
        match key {
            "id" => Some(Value::String(self.id.clone())),
            "name" => self.name.clone().map(Value::String),
            _ => self.fields.get(key).cloned(),
        }
    }

    /// The related record as JSON: the object it was read from when there is
    /// one, otherwise `{id, name, ...fields}`.
    pub fn to_value(&self) -> Value {
        if let Some(raw) = &self.raw {
            return raw.clone();
        }
        let mut object = Map::new();
        object.insert("id".to_string(), Value::String(self.id.clone()));
        object.insert(
            "name".to_string(),
            self.name.clone().map(Value::String).unwrap_or(Value::Null),
        );
        for (key, value) in &self.fields {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }

    /// Build a related object from a JSON object carrying an `id`.
    ///
    /// Only scalars become addressable fields; the whole object is kept in `raw`.
    fn from_json(object: &Map<String, Value>) -> Option<Self> {
        let id = match object.get("id")? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let name = object.get("name").and_then(Value::as_str).map(str::to_string);
        let fields = object
            .iter()
            .filter(|(key, value)| {
                key.as_str() != "id"
                    && key.as_str() != "name"
                    && !value.is_object()
                    && !value.is_array()
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Some(Self {
            id,
            name,
            fields,
            raw: Some(Value::Object(object.clone())),
        })
    }
}

/// The value of one attribute of a source record.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// The attribute is null.
    Null,
    /// A plain value (string, number, boolean, list of scalars...).
    Value(Value),
    /// A to-one relation.
    Related(RelatedObject),
    /// A to-many relation.
    RelatedMany(Vec<RelatedObject>),
}

impl AttributeValue {
    /// Returns `true` for `Null` and for a wrapped JSON null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null | Self::Value(Value::Null))
    }

    /// The attribute as it would be copied verbatim into a document.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Value(value) => value.clone(),
            Self::Related(related) => related.to_value(),
            Self::RelatedMany(related) => {
                Value::Array(related.iter().map(RelatedObject::to_value).collect())
            }
        }
    }

    fn from_json(value: Value) -> Self {
        if value.is_null() {
            return Self::Null;
        }
        if let Some(related) = value.as_object().and_then(RelatedObject::from_json) {
            return Self::Related(related);
        }
        if let Some(items) = value.as_array().filter(|items| !items.is_empty()) {
            let related: Option<Vec<_>> = items
                .iter()
                .map(|item| item.as_object().and_then(RelatedObject::from_json))
                .collect();
            if let Some(related) = related {
                return Self::RelatedMany(related);
            }
        }
        Self::Value(value)
    }
}

impl From<Value> for AttributeValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<RelatedObject> for AttributeValue {
    fn from(related: RelatedObject) -> Self {
        Self::Related(related)
    }
}

impl From<Option<RelatedObject>> for AttributeValue {
    fn from(related: Option<RelatedObject>) -> Self {
        related.map(Self::Related).unwrap_or(Self::Null)
    }
}

impl From<Vec<RelatedObject>> for AttributeValue {
    fn from(related: Vec<RelatedObject>) -> Self {
        Self::RelatedMany(related)
    }
}

/// One source record of an entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// The record identifier; also used as the document id.
    pub id: String,
    /// Attributes keyed by name.
    pub attributes: BTreeMap<String, AttributeValue>,
}

impl Record {
    /// Create an empty record with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Set an attribute.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<AttributeValue>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Read an attribute. Missing attributes read as `None`.
    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }

    /// Read a plain attribute value, treating relations and nulls as absent.
    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.attributes.get(name) {
            Some(AttributeValue::Value(value)) if !value.is_null() => Some(value),
            _ => None,
        }
    }

    /// Read a boolean attribute.
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.value(name).and_then(Value::as_bool)
    }

    /// Whether the `field` relation points at the related record `related_id`.
    pub fn references(&self, field: &str, related_id: &str) -> bool {
        match self.attributes.get(field) {
            Some(AttributeValue::Related(related)) => related.id == related_id,
            Some(AttributeValue::RelatedMany(related)) => {
                related.iter().any(|related| related.id == related_id)
            }
            _ => false,
        }
    }

    /// Build a record from a JSON object.
    ///
    /// The object must contain an `id` (string or number). Nested objects with
    /// an `id` become to-one relations, arrays of such objects become to-many
    /// relations, everything else is kept as a plain value.
    pub fn from_json(value: Value) -> Option<Self> {
        let Value::Object(object) = value else {
            return None;
        };
        let id = match object.get("id")? {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        let attributes = object
            .into_iter()
            .filter(|(key, _)| key != "id")
            .map(|(key, value)| (key, AttributeValue::from_json(value)))
            .collect();
        Some(Self { id, attributes })
    }
}
