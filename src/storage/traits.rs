//! Record store contract and its errors

use crate::query::SearchFilter;
use crate::record::FileRecord;
use crate::schema::CategorySchema;
use std::path::PathBuf;
use thiserror::Error;

/// Failures of a record store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite store failed: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Cannot encode or decode stored record data: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Identifier '{0}' is already taken by another record")]
    DuplicateIdentifier(String),

    #[error("No record with identifier '{0}'")]
    RecordNotFound(String),

    #[error("Cannot create store directory {}: {source}", .path.display())]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored row that no longer decodes into a record
    #[error("Stored record '{identifier}' is corrupt: {reason}")]
    CorruptRecord { identifier: String, reason: String },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence for catalogued records and the schemas that classified them
///
/// The store is the authority on identifier uniqueness: `save_record` must
/// fail with [`StorageError::DuplicateIdentifier`] rather than overwrite,
/// whatever a uniqueness oracle said earlier. Stores are shared across
/// threads.
pub trait RecordStore: Send + Sync {
    // === Schema Operations ===

    /// Create or replace a schema definition, keyed by name
    fn save_schema(&self, schema: &CategorySchema) -> StorageResult<()>;

    /// All stored schema definitions, ordered by name
    fn load_schemas(&self) -> StorageResult<Vec<CategorySchema>>;

    // === Record Operations ===

    /// Insert a new record
    fn save_record(&self, record: &FileRecord) -> StorageResult<()>;

    fn load_record(&self, identifier: &str) -> StorageResult<Option<FileRecord>>;

    /// Whether a record already uses `identifier`
    fn contains_identifier(&self, identifier: &str) -> StorageResult<bool>;

    /// Overwrite an existing record's fields, envelope and review state.
    /// The identifier selects the record and is never changed here.
    fn update_record(&self, record: &FileRecord) -> StorageResult<()>;

    /// Move a record to a new identifier, returning the moved record
    fn replace_identifier(&self, old: &str, new: &str) -> StorageResult<FileRecord>;

    /// Delete records by identifier, returning how many existed
    fn delete_records(&self, identifiers: &[String]) -> StorageResult<usize>;

    /// All records, ordered by identifier
    fn list_records(&self) -> StorageResult<Vec<FileRecord>>;

    /// Records matching `filter`, ordered by identifier. Schema definitions
    /// are never returned.
    fn search(&self, filter: &SearchFilter) -> StorageResult<Vec<FileRecord>>;
}
