//! File record representation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Scalar value of a schema-defined field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    /// Convert a JSON scalar. Null, arrays and objects yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) => write!(f, "{}", x),
            Self::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for FieldValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Schema-defined fields, ordered by name
pub type ExtractedFields = BTreeMap<String, FieldValue>;

/// Where a record is in the user review workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    #[default]
    Unreviewed,
    Reviewed,
    NeedsReview,
    Archived,
}

impl ReviewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unreviewed => "unreviewed",
            Self::Reviewed => "reviewed",
            Self::NeedsReview => "needs_review",
            Self::Archived => "archived",
        }
    }
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ReviewState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "unreviewed" => Ok(Self::Unreviewed),
            "reviewed" => Ok(Self::Reviewed),
            "needs_review" => Ok(Self::NeedsReview),
            "archived" => Ok(Self::Archived),
            other => Err(format!("unknown review state: {}", other)),
        }
    }
}

/// The catalogued representation of one physical file
///
/// `identifier` is assigned once at creation. Changing it is a separate
/// re-identify operation in the store, never a field update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub identifier: String,
    /// Absolute path of the file
    pub file_path: String,
    /// Name of the schema that classified the file
    pub schema_name: String,
    pub fields: ExtractedFields,
    pub confidence: f64,
    /// Label of the pattern that decided the match (diagnostic)
    pub matched_pattern: String,
    pub review_state: ReviewState,
    pub created_at: DateTime<Utc>,
    pub modified_at: Option<DateTime<Utc>>,
}

impl FileRecord {
    /// Create an unreviewed record
    pub fn new(
        identifier: impl Into<String>,
        file_path: impl Into<String>,
        schema_name: impl Into<String>,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            file_path: file_path.into(),
            schema_name: schema_name.into(),
            fields: ExtractedFields::new(),
            confidence: 0.0,
            matched_pattern: String::new(),
            review_state: ReviewState::Unreviewed,
            created_at: Utc::now(),
            modified_at: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_fields(mut self, fields: ExtractedFields) -> Self {
        self.fields.extend(fields);
        self
    }

    pub fn with_match(mut self, confidence: f64, matched_pattern: impl Into<String>) -> Self {
        self.confidence = confidence;
        self.matched_pattern = matched_pattern.into();
        self
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_records_are_unreviewed() {
        let record = FileRecord::new("card_20260101", "/cards/card_20260101.pdf", "Business Card")
            .with_field("company", "Home Depot")
            .with_match(0.95, "busCard");

        assert_eq!(record.review_state, ReviewState::Unreviewed);
        assert_eq!(record.field("company"), Some(&FieldValue::Text("Home Depot".into())));
        assert!(record.modified_at.is_none());
    }

    #[test]
    fn review_state_string_forms() {
        assert_eq!("needs-review".parse::<ReviewState>(), Ok(ReviewState::NeedsReview));
        assert_eq!("Archived".parse::<ReviewState>(), Ok(ReviewState::Archived));
        assert!("lost".parse::<ReviewState>().is_err());
        assert_eq!(ReviewState::NeedsReview.to_string(), "needs_review");
    }

    #[test]
    fn field_values_serialize_untagged() {
        let mut fields = ExtractedFields::new();
        fields.insert("count".into(), FieldValue::Int(3));
        fields.insert("name".into(), FieldValue::from("Acme"));
        fields.insert("paid".into(), FieldValue::Bool(true));

        let json = serde_json::to_string(&fields).unwrap();
        assert_eq!(json, r#"{"count":3,"name":"Acme","paid":true}"#);

        let back: ExtractedFields = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fields);
    }
}
