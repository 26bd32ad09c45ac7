//! Weighted pattern matching of a file against one category schema

use super::extract::ExtractionRules;
use crate::record::ExtractedFields;
use crate::schema::{CategorySchema, PatternKind};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, trace};

/// Errors raised during classification
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The schema declares a pattern kind the classifier cannot evaluate.
    /// Reported rather than treated as a non-match so configuration mistakes
    /// stay visible.
    #[error("Schema '{schema}' uses unsupported pattern kind '{kind}'")]
    UnsupportedPatternKind { schema: String, kind: PatternKind },

    #[error("Directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type ClassifyResult<T> = Result<T, ClassifyError>;

/// Outcome of matching one file against one schema
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub schema_name: String,
    pub is_match: bool,
    /// Highest confidence among matching patterns; 0 when nothing matched
    pub confidence: f64,
    /// Label of the pattern that achieved `confidence`
    pub matched_pattern: String,
    /// Candidate fields; empty unless matched
    pub fields: ExtractedFields,
}

impl Classification {
    fn no_match(schema: &CategorySchema) -> Self {
        Self {
            schema_name: schema.name.clone(),
            is_match: false,
            confidence: 0.0,
            matched_pattern: String::new(),
            fields: ExtractedFields::new(),
        }
    }
}

/// Stateless classifier; identical inputs always give identical output
#[derive(Debug, Clone, Default)]
pub struct PatternClassifier {
    rules: ExtractionRules,
}

impl PatternClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: ExtractionRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &ExtractionRules {
        &self.rules
    }

    /// Match `path` against every pattern of `schema`.
    ///
    /// `filename_contains` is a case-sensitive substring test on the full
    /// filename; `file_extension` compares the dotted extension
    /// case-insensitively. The strongest match wins and, on equal
    /// confidence, the pattern listed first keeps the label. A pattern only
    /// counts when its confidence exceeds zero.
    pub fn classify(
        &self,
        schema: &CategorySchema,
        path: impl AsRef<Path>,
    ) -> ClassifyResult<Classification> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = path
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut result = Classification::no_match(schema);

        for pattern in &schema.patterns {
            let label = match pattern.kind {
                PatternKind::FilenameContains => {
                    if !filename.contains(pattern.value.as_str()) {
                        continue;
                    }
                    pattern.value.clone()
                }
                PatternKind::FileExtension => {
                    if extension.to_lowercase() != pattern.value.to_lowercase() {
                        continue;
                    }
                    format!("extension:{}", extension)
                }
                kind @ (PatternKind::DateRange | PatternKind::Keyword) => {
                    return Err(ClassifyError::UnsupportedPatternKind {
                        schema: schema.name.clone(),
                        kind,
                    });
                }
            };

            trace!(schema = %schema.name, label = %label, confidence = pattern.confidence, "pattern hit");
            if pattern.confidence > result.confidence {
                result.is_match = true;
                result.confidence = pattern.confidence;
                result.matched_pattern = label;
            }
        }

        if result.is_match {
            let stem = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            result.fields = self.rules.extract(schema, &stem);
            debug!(
                schema = %schema.name,
                file = %filename,
                confidence = result.confidence,
                pattern = %result.matched_pattern,
                "file matched schema"
            );
        }

        Ok(result)
    }
}
