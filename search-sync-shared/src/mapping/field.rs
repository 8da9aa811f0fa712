//! Field transforms.
//!
//! Each document field declared in an entity mapping is produced by one
//! [`FieldTransform`]. The transforms are evaluated through a single
//! dispatcher, [`FieldTransform::apply`].

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::errors::MappingError;
use crate::types::{AttributeValue, Record, RelatedObject};

/// A function computing a field value from the whole source record.
///
/// Must be a pure function of the record.
pub type ComputeFn = Arc<dyn Fn(&Record) -> Result<Value, MappingError> + Send + Sync>;

/// How one document field is produced from a source record.
#[derive(Clone)]
pub enum FieldTransform {
    /// Copy the identically-named attribute unchanged.
    DirectCopy,
    /// Turn a related record into `{id, name, ...extra_fields}`.
    Reference { extra_fields: Vec<String> },
    /// Compute the value from the whole record.
    Computed(ComputeFn),
}

impl FieldTransform {
    /// A reference transform producing `{id, name}`.
    pub fn reference() -> Self {
        Self::Reference {
            extra_fields: Vec::new(),
        }
    }

    /// A reference transform producing `{id, name}` plus the given fields.
    pub fn reference_with(extra_fields: &[&str]) -> Self {
        Self::Reference {
            extra_fields: extra_fields.iter().map(|f| f.to_string()).collect(),
        }
    }

    /// A computed transform.
    pub fn computed<F>(compute: F) -> Self
    where
        F: Fn(&Record) -> Result<Value, MappingError> + Send + Sync + 'static,
    {
        Self::Computed(Arc::new(compute))
    }

    /// Short name of the transform kind, for logs and debug output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DirectCopy => "direct_copy",
            Self::Reference { .. } => "reference",
            Self::Computed(_) => "computed",
        }
    }

    /// Produce the value of `field` for `record`. A JSON null means "no value".
    pub fn apply(&self, field: &str, record: &Record) -> Result<Value, MappingError> {
        match self {
            Self::DirectCopy => Ok(direct_copy(record.attribute(field))),
            Self::Reference { extra_fields } => {
                reference(field, record.attribute(field), extra_fields)
            }
            Self::Computed(compute) => compute(record),
        }
    }
}

impl fmt::Debug for FieldTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reference { extra_fields } => f
                .debug_struct("Reference")
                .field("extra_fields", extra_fields)
                .finish(),
            other => f.write_str(other.kind()),
        }
    }
}

/// Return the attribute unchanged, or null when it is absent or null.
pub fn direct_copy(value: Option<&AttributeValue>) -> Value {
    value.map(AttributeValue::to_value).unwrap_or(Value::Null)
}

/// Turn a relation into `{id, name, ...}` objects.
///
/// Only the related record's own scalar fields are read. A null or absent
/// relation yields null; a to-many relation yields a list.
pub fn reference(
    field: &str,
    value: Option<&AttributeValue>,
    extra_fields: &[String],
) -> Result<Value, MappingError> {
    match value {
        None | Some(AttributeValue::Null) | Some(AttributeValue::Value(Value::Null)) => {
            Ok(Value::Null)
        }
        Some(AttributeValue::Related(related)) => Ok(reference_object(related, extra_fields)),
        Some(AttributeValue::RelatedMany(related)) => Ok(Value::Array(
            related
                .iter()
                .map(|r| reference_object(r, extra_fields))
                .collect(),
        )),
        Some(AttributeValue::Value(_)) => Err(MappingError::type_mismatch(field, "a relation")),
    }
}

fn reference_object(related: &RelatedObject, extra_fields: &[String]) -> Value {
    let mut object = Map::new();
    object.insert("id".to_string(), Value::String(related.id.clone()));
    object.insert(
        "name".to_string(),
        related.name.clone().map(Value::String).unwrap_or(Value::Null),
    );
    for extra in extra_fields {
        object.insert(extra.clone(), related.field(extra).unwrap_or(Value::Null));
    }
    Value::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_direct_copy() {
        assert_eq!(direct_copy(None), Value::Null);
        assert_eq!(direct_copy(Some(&AttributeValue::Null)), Value::Null);
        assert_eq!(
            direct_copy(Some(&AttributeValue::Value(json!("x")))),
            json!("x")
        );
        // relations are copied as their flat object form, never an error
        let related = AttributeValue::Related(RelatedObject::new("1", Some("One")));
        assert_eq!(
            direct_copy(Some(&related)),
            json!({"id": "1", "name": "One"})
        );
    }

    #[test]
    fn test_reference_null() {
        assert_eq!(reference("sector", None, &[]).unwrap(), Value::Null);
        assert_eq!(
            reference("sector", Some(&AttributeValue::Null), &[]).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_reference_object_shape() {
        let related = RelatedObject::new("9", Some("Aerospace"))
            .with_field("segment", "Air")
            .with_field("secret", "not copied");

        let value = reference(
            "sector",
            Some(&AttributeValue::Related(related)),
            &["segment".to_string(), "missing".to_string()],
        )
        .unwrap();

        assert_eq!(
            value,
            json!({"id": "9", "name": "Aerospace", "segment": "Air", "missing": null})
        );
    }

    #[test]
    fn test_reference_many() {
        let value = reference(
            "contacts",
            Some(&AttributeValue::RelatedMany(vec![
                RelatedObject::new("1", Some("Ann")),
                RelatedObject::new("2", None),
            ])),
            &[],
        )
        .unwrap();

        assert_eq!(
            value,
            json!([{"id": "1", "name": "Ann"}, {"id": "2", "name": null}])
        );
    }

    #[test]
    fn test_reference_on_scalar_is_type_mismatch() {
        let result = reference("sector", Some(&AttributeValue::Value(json!(3))), &[]);
        assert!(matches!(result, Err(MappingError::TypeMismatch { .. })));
    }

    #[test]
    fn test_computed_receives_whole_record() {
        let transform = FieldTransform::computed(|record| {
            let archived = record.bool("archived").unwrap_or(false);
            let disabled = record.bool("disabled").unwrap_or(false);
            Ok(json!(!archived && !disabled))
        });

        let record = Record::new("1")
            .with("archived", json!(false))
            .with("disabled", json!(true));

        assert_eq!(transform.apply("is_active", &record).unwrap(), json!(false));
        assert_eq!(transform.kind(), "computed");
    }
}
