//! Category schema and match pattern types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Kind of rule a match pattern applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Substring test against the full filename
    FilenameContains,
    /// Case-insensitive equality against the file extension (with leading dot)
    FileExtension,
    /// Declared in the schema vocabulary; matching is not implemented
    DateRange,
    /// Declared in the schema vocabulary; matching is not implemented
    Keyword,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FilenameContains => "filename_contains",
            Self::FileExtension => "file_extension",
            Self::DateRange => "date_range",
            Self::Keyword => "keyword",
        }
    }

    /// Parse a schema `pattern_type` string. Hyphenated spellings are accepted.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().replace('-', "_").as_str() {
            "filename_contains" => Some(Self::FilenameContains),
            "file_extension" => Some(Self::FileExtension),
            "date_range" => Some(Self::DateRange),
            "keyword" => Some(Self::Keyword),
            _ => None,
        }
    }

    /// Whether the classifier can evaluate this kind
    pub fn is_supported(&self) -> bool {
        matches!(self, Self::FilenameContains | Self::FileExtension)
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A single weighted recognition rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchPattern {
    pub kind: PatternKind,
    pub value: String,
    /// Probability in [0, 1]; enforced at load time
    pub confidence: f64,
}

impl MatchPattern {
    pub fn new(kind: PatternKind, value: impl Into<String>, confidence: f64) -> Self {
        Self {
            kind,
            value: value.into(),
            confidence,
        }
    }

    pub fn filename_contains(value: impl Into<String>, confidence: f64) -> Self {
        Self::new(PatternKind::FilenameContains, value, confidence)
    }

    pub fn file_extension(value: impl Into<String>, confidence: f64) -> Self {
        Self::new(PatternKind::FileExtension, value, confidence)
    }
}

/// Keywords that map a filename segment onto a category name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub category: String,
    pub keywords: Vec<String>,
}

/// User-authored definition of a file category
///
/// Loaded once into the [`SchemaRegistry`](super::SchemaRegistry) and
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySchema {
    /// Stable schema identifier (the document's `META-FILE-NODE` key, or the name)
    pub schema_id: String,
    pub name: String,
    /// Physical folder the category lives in
    pub storage_path: String,
    pub description: String,
    pub purpose: String,
    pub core_properties: Vec<String>,
    pub optional_properties: Vec<String>,
    pub property_descriptions: BTreeMap<String, String>,
    pub patterns: Vec<MatchPattern>,
    /// Evaluated in authored order; first category with a keyword hit wins
    pub category_inference: Vec<CategoryRule>,
    pub user_review_required: bool,
    /// Cross-schema tie-break; higher wins
    pub priority: i64,
    pub relocatable: bool,
}

impl CategorySchema {
    /// Create a schema with loader defaults and no patterns
    pub fn new(name: impl Into<String>, storage_path: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            schema_id: name.clone(),
            name,
            storage_path: storage_path.into(),
            description: String::new(),
            purpose: String::new(),
            core_properties: Vec::new(),
            optional_properties: Vec::new(),
            property_descriptions: BTreeMap::new(),
            patterns: Vec::new(),
            category_inference: Vec::new(),
            user_review_required: true,
            priority: super::loader::DEFAULT_PRIORITY,
            relocatable: true,
        }
    }

    pub fn with_pattern(mut self, pattern: MatchPattern) -> Self {
        self.patterns.push(pattern);
        self
    }

    pub fn with_category<I, S>(mut self, category: impl Into<String>, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.category_inference.push(CategoryRule {
            category: category.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = priority;
        self
    }

    /// Pattern kinds this schema declares but the classifier cannot evaluate
    pub fn unsupported_kinds(&self) -> Vec<PatternKind> {
        let mut kinds: Vec<PatternKind> = Vec::new();
        for pattern in &self.patterns {
            if !pattern.kind.is_supported() && !kinds.contains(&pattern.kind) {
                kinds.push(pattern.kind);
            }
        }
        kinds
    }

    /// Resolve a filename keyword to a category through `category_inference`.
    ///
    /// A category matches when any of its keywords occurs (case-insensitively)
    /// inside the given keyword.
    pub fn infer_category(&self, keyword: &str) -> Option<&str> {
        let keyword = keyword.to_lowercase();
        self.category_inference
            .iter()
            .find(|rule| {
                rule.keywords
                    .iter()
                    .any(|kw| !kw.is_empty() && keyword.contains(&kw.to_lowercase()))
            })
            .map(|rule| rule.category.as_str())
    }

    /// Core then optional property names
    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.core_properties
            .iter()
            .chain(self.optional_properties.iter())
            .map(String::as_str)
    }
}
