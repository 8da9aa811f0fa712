//! Schema fingerprinting.
//!
//! Physical index names embed a fingerprint of the document schema they were
//! created for. Comparing that fingerprint with the one computed from the
//! schema declared in code tells whether the index is stale.
//!
//! Canonical form rules:
//! - the input is the schema's index mapping JSON
//! - object keys are sorted by byte order at every depth
//! - no whitespace is emitted
//! - strings are JSON-escaped by `serde_json`
//! - numbers use `serde_json`'s shortest round-trip form
//!
//! The canonical writer does not rely on the iteration order of
//! `serde_json::Map`, so enabling `preserve_order` anywhere in the build
//! cannot change a fingerprint.

use std::fmt;

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::types::DocumentSchema;

/// Number of digest bytes kept in a fingerprint.
const FINGERPRINT_BYTES: usize = 16;

/// Length of a fingerprint in hex characters.
pub const FINGERPRINT_HEX_LEN: usize = FINGERPRINT_BYTES * 2;

/// A fixed-length lowercase hex digest of a canonical schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaFingerprint(String);

impl SchemaFingerprint {
    /// Parse a fingerprint, accepting only `FINGERPRINT_HEX_LEN` lowercase hex characters.
    pub fn parse(value: &str) -> Option<Self> {
        let valid = value.len() == FINGERPRINT_HEX_LEN
            && value
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
        valid.then(|| Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SchemaFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Fingerprint a document schema.
pub fn fingerprint(schema: &DocumentSchema) -> SchemaFingerprint {
    fingerprint_value(&schema.to_mapping())
}

/// Fingerprint an arbitrary JSON value by its canonical form.
pub fn fingerprint_value(value: &Value) -> SchemaFingerprint {
    let digest = Sha256::digest(canonicalize(value));
    SchemaFingerprint(hex::encode(&digest[..FINGERPRINT_BYTES]))
}

/// Serialize a JSON value into its canonical byte form.
pub fn canonicalize(value: &Value) -> Vec<u8> {
    let mut out = Vec::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(number) => out.extend_from_slice(number.to_string().as_bytes()),
        Value::String(string) => write_string(string, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out);
            }
            out.push(b']');
        }
        Value::Object(object) => {
            let mut entries: Vec<_> = object.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.as_bytes().cmp(b.as_bytes()));
            out.push(b'{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(key, out);
                out.push(b':');
                write_canonical(item, out);
            }
            out.push(b'}');
        }
    }
}

fn write_string(string: &str, out: &mut Vec<u8>) {
    // Serializing a &str cannot fail.
    let escaped = serde_json::to_string(string).unwrap_or_default();
    out.extend_from_slice(escaped.as_bytes());
}
