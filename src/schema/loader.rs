//! Schema document parsing and validation
//!
//! A schema document is YAML with required `name` and `path` fields. The
//! `patterns` field is either a sequence of `{pattern_type, pattern_value,
//! confidence}` mappings or a string holding the same sequence as JSON.

use super::types::{CategoryRule, CategorySchema, MatchPattern, PatternKind};
use crate::query::PropertyKey;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Default `review_priority` when a document omits it
pub const DEFAULT_PRIORITY: i64 = 5;

/// Errors raised while loading schemas
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("Invalid schema '{schema}': {reason}")]
    InvalidSchema { schema: String, reason: String },

    #[error("Duplicate schema name: {0}")]
    DuplicateName(String),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Pattern JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SchemaError {
    fn invalid(schema: &str, reason: impl Into<String>) -> Self {
        let schema = if schema.is_empty() { "<unnamed>" } else { schema };
        Self::InvalidSchema {
            schema: schema.to_string(),
            reason: reason.into(),
        }
    }
}

pub type SchemaResult<T> = Result<T, SchemaError>;

fn default_true() -> bool {
    true
}

fn default_priority() -> i64 {
    DEFAULT_PRIORITY
}

#[derive(Debug, Deserialize)]
struct RawSchema {
    #[serde(rename = "META-FILE-NODE", default)]
    meta_file_node: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    purpose: Option<String>,
    #[serde(default)]
    core_properties: Option<Vec<String>>,
    #[serde(default)]
    optional_properties: Option<Vec<String>>,
    #[serde(default)]
    property_descriptions: Option<BTreeMap<String, String>>,
    #[serde(default)]
    patterns: Option<RawPatterns>,
    #[serde(default)]
    category_inference: Option<serde_yaml::Mapping>,
    #[serde(default = "default_true")]
    user_review_required: bool,
    #[serde(default = "default_true")]
    relocatable: bool,
    #[serde(default = "default_priority")]
    review_priority: i64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPatterns {
    List(Vec<RawPattern>),
    Encoded(String),
}

#[derive(Debug, Deserialize)]
struct RawPattern {
    pattern_type: String,
    pattern_value: String,
    confidence: f64,
}

/// Parse and validate a schema document.
pub fn parse_schema(yaml: &str) -> SchemaResult<CategorySchema> {
    let raw: RawSchema = serde_yaml::from_str(yaml)?;

    let name = raw.name.unwrap_or_default().trim().to_string();
    if name.is_empty() {
        return Err(SchemaError::invalid("", "missing required field 'name'"));
    }
    let storage_path = raw.path.unwrap_or_default().trim().to_string();
    if storage_path.is_empty() {
        return Err(SchemaError::invalid(&name, "missing required field 'path'"));
    }

    let raw_patterns = match raw.patterns {
        None => Vec::new(),
        Some(RawPatterns::List(list)) => list,
        Some(RawPatterns::Encoded(text)) if text.trim().is_empty() => Vec::new(),
        Some(RawPatterns::Encoded(text)) => serde_json::from_str(&text)?,
    };
    let patterns = raw_patterns
        .into_iter()
        .map(|p| convert_pattern(&name, p))
        .collect::<SchemaResult<Vec<_>>>()?;

    let category_inference = match raw.category_inference {
        Some(mapping) => convert_inference(&name, mapping)?,
        None => Vec::new(),
    };

    let schema = CategorySchema {
        schema_id: raw.meta_file_node.unwrap_or_else(|| name.clone()),
        name,
        storage_path,
        description: raw.description.unwrap_or_default(),
        purpose: raw.purpose.unwrap_or_default(),
        core_properties: raw.core_properties.unwrap_or_default(),
        optional_properties: raw.optional_properties.unwrap_or_default(),
        property_descriptions: raw.property_descriptions.unwrap_or_default(),
        patterns,
        category_inference,
        user_review_required: raw.user_review_required,
        priority: raw.review_priority,
        relocatable: raw.relocatable,
    };

    validate_property_names(&schema)?;

    let unsupported = schema.unsupported_kinds();
    if !unsupported.is_empty() {
        warn!(
            schema = %schema.name,
            kinds = ?unsupported.iter().map(PatternKind::as_str).collect::<Vec<_>>(),
            "schema declares pattern kinds that classification cannot evaluate"
        );
    }
    debug!(schema = %schema.name, patterns = schema.patterns.len(), "schema parsed");

    Ok(schema)
}

/// Read and parse a schema document from disk.
pub fn read_schema_file(path: impl AsRef<Path>) -> SchemaResult<CategorySchema> {
    let text = std::fs::read_to_string(path.as_ref())?;
    parse_schema(&text)
}

fn convert_pattern(schema: &str, raw: RawPattern) -> SchemaResult<MatchPattern> {
    let kind = PatternKind::parse(&raw.pattern_type).ok_or_else(|| {
        SchemaError::invalid(schema, format!("unknown pattern_type '{}'", raw.pattern_type))
    })?;
    if !(0.0..=1.0).contains(&raw.confidence) {
        return Err(SchemaError::invalid(
            schema,
            format!(
                "confidence {} for pattern '{}' is outside [0, 1]",
                raw.confidence, raw.pattern_value
            ),
        ));
    }
    Ok(MatchPattern::new(kind, raw.pattern_value, raw.confidence))
}

fn convert_inference(schema: &str, mapping: serde_yaml::Mapping) -> SchemaResult<Vec<CategoryRule>> {
    let mut rules = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let category = match key {
            serde_yaml::Value::String(s) => s,
            other => {
                return Err(SchemaError::invalid(
                    schema,
                    format!("category_inference key {:?} is not a string", other),
                ))
            }
        };
        let keywords = match value {
            serde_yaml::Value::Sequence(items) => items
                .into_iter()
                .map(|item| match item {
                    serde_yaml::Value::String(s) => Ok(s),
                    other => Err(SchemaError::invalid(
                        schema,
                        format!("keyword {:?} for category '{}' is not a string", other, category),
                    )),
                })
                .collect::<SchemaResult<Vec<_>>>()?,
            serde_yaml::Value::String(s) => vec![s],
            serde_yaml::Value::Null => Vec::new(),
            _ => {
                return Err(SchemaError::invalid(
                    schema,
                    format!("keywords for category '{}' must be a sequence", category),
                ))
            }
        };
        rules.push(CategoryRule { category, keywords });
    }
    Ok(rules)
}

/// Property names are interpolated into search filters, so only
/// `[A-Za-z0-9_]` is accepted.
fn validate_property_names(schema: &CategorySchema) -> SchemaResult<()> {
    let described = schema.property_descriptions.keys().map(String::as_str);
    for name in schema.property_names().chain(described) {
        if !PropertyKey::is_valid(name) {
            return Err(SchemaError::invalid(
                &schema.name,
                format!("property name '{}' must be alphanumeric or underscore", name),
            ));
        }
    }
    Ok(())
}
