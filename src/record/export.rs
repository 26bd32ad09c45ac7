//! Flat key-value export at the classification → storage boundary
//!
//! The graph store accepts only scalar (or homogeneous list) property values,
//! so nested structures cross this boundary as JSON-encoded strings.

use super::types::{FieldValue, FileRecord};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Flat property map ready for a graph store
pub type ExportMap = BTreeMap<String, Value>;

/// Legacy spellings mapped onto their canonical property names
fn canonical_key(key: &str) -> &str {
    match key {
        "context_notes" => "context_note",
        other => other,
    }
}

/// Flatten arbitrary properties: objects and arrays become JSON strings and
/// blank strings become null.
pub fn flatten_properties(properties: &Map<String, Value>) -> ExportMap {
    let mut flat = ExportMap::new();
    for (key, value) in properties {
        let key = canonical_key(key.trim()).to_string();
        let value = match value {
            Value::Object(_) | Value::Array(_) => Value::String(value.to_string()),
            Value::String(s) if s.trim().is_empty() => Value::Null,
            other => other.clone(),
        };
        flat.insert(key, value);
    }
    flat
}

/// Export a record as a flat property map. Envelope keys win over
/// schema fields of the same name.
pub fn to_export_map(record: &FileRecord) -> ExportMap {
    let fields: Map<String, Value> = record
        .fields
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::to_value(v).unwrap_or(Value::Null)))
        .collect();
    let mut flat = flatten_properties(&fields);

    flat.insert("identifier".into(), Value::String(record.identifier.clone()));
    flat.insert("file_path".into(), Value::String(record.file_path.clone()));
    flat.insert("schema_name".into(), Value::String(record.schema_name.clone()));
    flat.insert("confidence".into(), Value::from(record.confidence));
    flat.insert("matched_pattern".into(), Value::String(record.matched_pattern.clone()));
    flat.insert("review_state".into(), Value::String(record.review_state.to_string()));
    flat.insert("created_at".into(), Value::String(record.created_at.to_rfc3339()));
    if let Some(modified) = record.modified_at {
        flat.insert("modified_at".into(), Value::String(modified.to_rfc3339()));
    }
    flat
}

/// Searchable text of every exported property.
///
/// Strings are kept as written and other scalars take their JSON text
/// (`true`, `0.95`); nulls are left out. Every store matches property
/// filters against this map, so a filter means the same thing on each.
pub fn search_document(record: &FileRecord) -> BTreeMap<String, String> {
    to_export_map(record)
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(text) => Some((key, text)),
            other => Some((key, other.to_string())),
        })
        .collect()
}

const ENVELOPE_KEYS: &[&str] = &[
    "identifier",
    "file_path",
    "filepath",
    "schema_name",
    "confidence",
    "matched_pattern",
    "review_state",
    "created_at",
    "modified_at",
];

/// Build a record from an imported property map.
///
/// `file_path` (or the older `filepath`) fills the envelope; other non-null
/// scalars become fields.
pub fn record_from_properties(
    identifier: &str,
    schema_name: &str,
    properties: &Map<String, Value>,
) -> FileRecord {
    let flat = flatten_properties(properties);
    let file_path = flat
        .get("file_path")
        .or_else(|| flat.get("filepath"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let mut record = FileRecord::new(identifier, file_path, schema_name);
    if let Some(confidence) = flat.get("confidence").and_then(Value::as_f64) {
        record.confidence = confidence;
    }
    if let Some(pattern) = flat.get("matched_pattern").and_then(Value::as_str) {
        record.matched_pattern = pattern.to_string();
    }
    if let Some(state) = flat
        .get("review_state")
        .and_then(Value::as_str)
        .and_then(|s| s.parse().ok())
    {
        record.review_state = state;
    }
    if let Some(created) = flat
        .get("created_at")
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
    {
        record.created_at = created.with_timezone(&Utc);
    }

    for (key, value) in &flat {
        if ENVELOPE_KEYS.contains(&key.as_str()) {
            continue;
        }
        if let Some(field) = FieldValue::from_json(value) {
            record.fields.insert(key.clone(), field);
        }
    }
    record
}
