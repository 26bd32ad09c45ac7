//! Schema-driven classification of files
//!
//! A [`PatternClassifier`] matches a file against one schema at a time;
//! [`resolve`] picks among several matching schemas, and
//! [`PatternClassifier::scan`] runs the whole registry over a directory.

mod extract;
mod pattern;
mod resolve;
mod scan;

pub use extract::{
    title_case, ExtractionRules, FIELD_CATEGORY, FIELD_COMPANY, FIELD_CONTEXT_NOTE, FIELD_DATE,
    FIELD_DESCRIPTION, FIELD_NEEDS_REVIEW,
};
pub use pattern::{Classification, ClassifyError, ClassifyResult, PatternClassifier};
pub use resolve::{resolve, Candidate, RegistryClassification, Resolution};
pub use scan::{ScanEntry, ScanOptions, ScanReport, DEFAULT_MIN_CONFIDENCE};
