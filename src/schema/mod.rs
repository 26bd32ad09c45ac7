//! Category schemas: what a file category is and how to recognise it

mod loader;
mod registry;
mod types;

pub use loader::{parse_schema, read_schema_file, SchemaError, SchemaResult, DEFAULT_PRIORITY};
pub use registry::SchemaRegistry;
pub use types::{CategoryRule, CategorySchema, MatchPattern, PatternKind};
