//! Cross-schema resolution
//!
//! When several schemas match one file the strongest confidence wins, then
//! the higher schema priority, then registration order. The runners-up are
//! kept as similar categories for the user to check.

use super::pattern::{Classification, ClassifyError, PatternClassifier};
use crate::schema::SchemaRegistry;
use std::cmp::Ordering;
use std::path::Path;
use tracing::warn;

/// A matching classification together with its schema's priority
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub classification: Classification,
    pub priority: i64,
}

/// The chosen match and the other schemas that also matched
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub chosen: Candidate,
    /// Remaining matches, best first
    pub similar: Vec<Candidate>,
}

impl Resolution {
    pub fn similar_names(&self) -> Vec<&str> {
        self.similar
            .iter()
            .map(|c| c.classification.schema_name.as_str())
            .collect()
    }
}

fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.classification
        .confidence
        .total_cmp(&a.classification.confidence)
        .then_with(|| b.priority.cmp(&a.priority))
}

/// Pick the best candidate. Non-matching classifications are ignored; input
/// order is the final tie-break. `None` when nothing matched.
pub fn resolve(candidates: Vec<Candidate>) -> Option<Resolution> {
    let mut matched: Vec<Candidate> = candidates
        .into_iter()
        .filter(|c| c.classification.is_match)
        .collect();
    // stable sort keeps registry order among equals
    matched.sort_by(rank);

    let mut ranked = matched.into_iter();
    let chosen = ranked.next()?;
    Some(Resolution {
        chosen,
        similar: ranked.collect(),
    })
}

/// Result of classifying one file against a whole registry
#[derive(Debug, Default)]
pub struct RegistryClassification {
    pub resolution: Option<Resolution>,
    /// Schemas that could not be evaluated for this file
    pub failures: Vec<ClassifyError>,
}

impl RegistryClassification {
    pub fn is_match(&self) -> bool {
        self.resolution.is_some()
    }

    pub fn confidence(&self) -> f64 {
        self.resolution
            .as_ref()
            .map(|r| r.chosen.classification.confidence)
            .unwrap_or(0.0)
    }
}

impl PatternClassifier {
    /// Classify `path` against every schema in `registry` and resolve the
    /// matches. A schema that fails to evaluate is recorded in `failures` and
    /// does not stop the others.
    pub fn classify_registry(
        &self,
        registry: &SchemaRegistry,
        path: impl AsRef<Path>,
    ) -> RegistryClassification {
        let path = path.as_ref();
        let mut candidates = Vec::with_capacity(registry.len());
        let mut failures = Vec::new();

        for schema in registry.iter() {
            match self.classify(schema, path) {
                Ok(classification) => candidates.push(Candidate {
                    classification,
                    priority: schema.priority,
                }),
                Err(e) => {
                    warn!(schema = %schema.name, file = %path.display(), error = %e, "schema skipped");
                    failures.push(e);
                }
            }
        }

        RegistryClassification {
            resolution: resolve(candidates),
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ExtractedFields;
    use crate::schema::{CategorySchema, MatchPattern, PatternKind};

    fn candidate(name: &str, confidence: f64, priority: i64) -> Candidate {
        Candidate {
            classification: Classification {
                schema_name: name.to_string(),
                is_match: confidence > 0.0,
                confidence,
                matched_pattern: String::new(),
                fields: ExtractedFields::new(),
            },
            priority,
        }
    }

    #[test]
    fn highest_confidence_wins() {
        let resolution = resolve(vec![
            candidate("Receipt", 0.4, 9),
            candidate("Business Card", 0.95, 1),
        ])
        .unwrap();
        assert_eq!(resolution.chosen.classification.schema_name, "Business Card");
        assert_eq!(resolution.similar_names(), vec!["Receipt"]);
    }

    #[test]
    fn priority_breaks_confidence_ties() {
        let resolution = resolve(vec![
            candidate("Low", 0.8, 1),
            candidate("High", 0.8, 7),
            candidate("Also Low", 0.8, 1),
        ])
        .unwrap();
        assert_eq!(resolution.chosen.classification.schema_name, "High");
        assert_eq!(resolution.similar_names(), vec!["Low", "Also Low"]);
    }

    #[test]
    fn nothing_matched_resolves_to_none() {
        assert!(resolve(vec![candidate("A", 0.0, 5)]).is_none());
        assert!(resolve(Vec::new()).is_none());
    }

    #[test]
    fn registry_classification_reports_broken_schemas() {
        let registry: SchemaRegistry = vec![
            CategorySchema::new("Business Card", "/cards")
                .with_pattern(MatchPattern::filename_contains("busCard", 0.95)),
            CategorySchema::new("Dated", "/dated")
                .with_pattern(MatchPattern::new(PatternKind::DateRange, "2020/2021", 0.5)),
            CategorySchema::new("Documents", "/docs")
                .with_pattern(MatchPattern::file_extension(".pdf", 0.3)),
        ]
        .into_iter()
        .collect();

        let outcome = PatternClassifier::new().classify_registry(&registry, "busCard_x.pdf");
        let resolution = outcome.resolution.as_ref().unwrap();
        assert_eq!(resolution.chosen.classification.schema_name, "Business Card");
        assert_eq!(resolution.similar_names(), vec!["Documents"]);
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.confidence(), 0.95);
    }
}
