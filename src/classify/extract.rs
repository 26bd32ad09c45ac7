//! Field extraction from hyphen-delimited filename stems
//!
//! `plumber-drip_fixers-busCard-2023_1015` yields category `plumber` (via the
//! schema's category inference) and company `Drip Fixers`, plus the review
//! texts derived from them.

use crate::identity::{find_compact_date, is_date_token};
use crate::record::{ExtractedFields, FieldValue};
use crate::schema::CategorySchema;

pub const FIELD_CATEGORY: &str = "category";
pub const FIELD_COMPANY: &str = "company";
pub const FIELD_DATE: &str = "date";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_CONTEXT_NOTE: &str = "context_note";
pub const FIELD_NEEDS_REVIEW: &str = "needs_review";

/// Which filename segments are markers rather than data
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionRules {
    pub delimiter: char,
    /// Segments containing any of these (case-insensitive) are dropped
    pub marker_tokens: Vec<String>,
    /// Segments equal to one of these (case-insensitive) are kept even if
    /// they contain a marker token
    pub allowed_aliases: Vec<String>,
    /// Appended to the title-cased category to form the description
    pub description_suffix: String,
    /// Prepended to the company to form the context note
    pub context_note_prefix: String,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            delimiter: '-',
            marker_tokens: vec!["buscard".to_string()],
            allowed_aliases: vec!["buscardish".to_string()],
            description_suffix: " services".to_string(),
            context_note_prefix: "Card received - ".to_string(),
        }
    }
}

impl ExtractionRules {
    fn is_marker(&self, segment: &str) -> bool {
        let lower = segment.to_lowercase();
        let contains_marker = self
            .marker_tokens
            .iter()
            .any(|token| lower.contains(&token.to_lowercase()));
        contains_marker
            && !self
                .allowed_aliases
                .iter()
                .any(|alias| lower == alias.to_lowercase())
    }

    /// Segments of `stem` that carry data, in order
    pub fn data_segments<'a>(&self, stem: &'a str) -> Vec<&'a str> {
        stem.split(self.delimiter)
            .filter(|segment| !is_date_token(segment))
            .filter(|segment| !self.is_marker(segment))
            .collect()
    }

    /// Extract candidate fields from a filename stem.
    ///
    /// `needs_review` carries the schema's review flag and is always set.
    pub fn extract(&self, schema: &CategorySchema, stem: &str) -> ExtractedFields {
        let mut fields = ExtractedFields::new();
        fields.insert(
            FIELD_NEEDS_REVIEW.to_string(),
            FieldValue::Bool(schema.user_review_required),
        );
        let segments = self.data_segments(stem);

        if let Some(keyword) = segments.first().filter(|s| !s.is_empty()) {
            let category = schema
                .infer_category(keyword)
                .map(str::to_string)
                .unwrap_or_else(|| keyword.to_lowercase());
            fields.insert(
                FIELD_DESCRIPTION.to_string(),
                FieldValue::Text(format!("{}{}", title_case(&category), self.description_suffix)),
            );
            fields.insert(FIELD_CATEGORY.to_string(), FieldValue::Text(category));
        }

        if let Some(entity) = segments.get(1).filter(|s| !s.is_empty()) {
            let company = title_case(&entity.replace('_', " "));
            fields.insert(
                FIELD_CONTEXT_NOTE.to_string(),
                FieldValue::Text(format!("{}{}", self.context_note_prefix, company)),
            );
            fields.insert(FIELD_COMPANY.to_string(), FieldValue::Text(company));
        }

        if let Some(found) = find_compact_date(stem) {
            fields.insert(
                FIELD_DATE.to_string(),
                FieldValue::Text(found.date.format("%Y-%m-%d").to_string()),
            );
        }

        fields
    }
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest.
pub fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut previous_alpha = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if previous_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_alpha = true;
        } else {
            out.push(c);
            previous_alpha = false;
        }
    }
    out
}
