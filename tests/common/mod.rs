//! Shared fixtures for the integration tests

use filenode::SchemaRegistry;
use std::fs;
use std::path::{Path, PathBuf};

pub const BUSINESS_CARD: &str = r#"
META-FILE-NODE: BusinessCard_20260121
name: Business Card
path: /reference/cards
user_review_required: true
core_properties:
  - company
patterns: '[
  {"pattern_type": "filename_contains", "pattern_value": "busCard", "confidence": 0.95},
  {"pattern_type": "file_extension", "pattern_value": ".pdf", "confidence": 0.3}
]'
category_inference:
  plumber: [plumb, plumbing]
  electrician: [electric]
review_priority: 7
"#;

pub const RECEIPT: &str = r#"
name: Receipt
path: /reference/receipts
patterns:
  - pattern_type: filename_contains
    pattern_value: receipt
    confidence: 0.8
  - pattern_type: file_extension
    pattern_value: .pdf
    confidence: 0.3
"#;

/// A schema directory holding both fixture schemas
pub fn schema_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("business-card.yaml"), BUSINESS_CARD).unwrap();
    fs::write(dir.path().join("receipt.yaml"), RECEIPT).unwrap();
    dir
}

pub fn registry() -> SchemaRegistry {
    let dir = schema_dir();
    SchemaRegistry::load_dir(dir.path()).unwrap()
}

/// Create an empty file and return its canonical path
pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"%PDF-1.4").unwrap();
    fs::canonicalize(path).unwrap()
}
