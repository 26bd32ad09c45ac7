//! Filenode: schema-driven file cataloguing
//!
//! Files are matched against user-authored category schemas, given stable
//! human-legible identifiers, and stored as records that can later be found
//! through path and property filters.
//!
//! # Core Concepts
//!
//! - **Schemas**: category definitions with weighted match patterns
//! - **Records**: one catalogued file, its identifier and extracted fields
//! - **Filters**: path prefixes plus case-insensitive property matches
//!
//! # Example
//!
//! ```
//! use filenode::{CategorySchema, MatchPattern, PatternClassifier};
//!
//! let schema = CategorySchema::new("Business Card", "/cards")
//!     .with_pattern(MatchPattern::filename_contains("busCard", 0.95))
//!     .with_pattern(MatchPattern::file_extension(".pdf", 0.3));
//!
//! let result = PatternClassifier::new().classify(&schema, "busCard_x.pdf").unwrap();
//! assert_eq!(result.matched_pattern, "busCard");
//! ```

pub mod catalog;
pub mod classify;
pub mod config;
pub mod identity;
pub mod query;
pub mod record;
pub mod schema;
pub mod storage;

pub use catalog::{CatalogError, CatalogResult, CatalogueOutcome, Cataloguer, ImportReport};
pub use classify::{Classification, ClassifyError, PatternClassifier, Resolution, ScanOptions, ScanReport};
pub use config::{CatalogConfig, ConfigError, ConfigOverrides};
pub use identity::{IdentityError, IdentitySynthesizer, UniquenessOracle};
pub use query::{FilterQuery, PropertyKey, QueryBuilder, QueryError, SearchFilter};
pub use record::{FieldValue, FileRecord, ReviewState};
pub use schema::{CategorySchema, MatchPattern, PatternKind, SchemaError, SchemaRegistry};
pub use storage::{MemoryStore, RecordStore, SqliteStore, StorageError, StorageResult, StoreOracle};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
