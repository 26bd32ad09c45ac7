//! SQLite storage backend
//!
//! Records and schema definitions share one `file_nodes` table, told apart by
//! the `is_schema_definition` marker. Each row carries the record's typed
//! fields (`fields_json`), its flat export (`properties_json`) and its search
//! document (`search_json`), which is what property filters match against.
//! Case folding goes through a registered `fold_case` function so that
//! non-ASCII text folds the same way it does in memory.

use super::traits::{RecordStore, StorageError, StorageResult};
use crate::query::{QueryBuilder, SearchFilter, SqliteDialect, FOLD_CASE_FUNCTION};
use crate::record::{search_document, to_export_map, FileRecord, ReviewState};
use crate::schema::CategorySchema;
use chrono::{DateTime, Utc};
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, ToSql};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// Columns read back into a [`FileRecord`], in `row_to_record` order
const RECORD_COLUMNS: &str = "identifier, file_path, schema_name, confidence, matched_pattern, \
     review_state, fields_json, created_at, modified_at";

/// Identifier prefix for schema rows; record identifiers never contain ':'
const SCHEMA_ROW_PREFIX: &str = "schema:";

type RecordRow = (String, String, String, f64, String, String, String, String, Option<String>);

/// SQLite-backed record store
///
/// Thread-safe via internal mutex on the connection. Identifier uniqueness
/// is enforced by a UNIQUE constraint.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    query_builder: QueryBuilder<SqliteDialect>,
}

impl SqliteStore {
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS file_nodes (
                identifier TEXT NOT NULL UNIQUE,
                file_path TEXT NOT NULL,
                schema_name TEXT NOT NULL,
                confidence REAL NOT NULL DEFAULT 0,
                matched_pattern TEXT NOT NULL DEFAULT '',
                review_state TEXT NOT NULL DEFAULT 'unreviewed',
                fields_json TEXT NOT NULL,
                properties_json TEXT NOT NULL,
                search_json TEXT NOT NULL DEFAULT '{}',
                created_at TEXT NOT NULL,
                modified_at TEXT,
                is_schema_definition INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_file_nodes_path
                ON file_nodes(file_path);
            CREATE INDEX IF NOT EXISTS idx_file_nodes_schema
                ON file_nodes(is_schema_definition, schema_name);

            -- Enable WAL mode for concurrent reads during writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    /// Unicode lowercase; non-text values fold to their text form
    fn fold_case(ctx: &Context<'_>) -> rusqlite::Result<Option<String>> {
        Ok(match ctx.get_raw(0) {
            ValueRef::Null => None,
            ValueRef::Integer(i) => Some(i.to_string()),
            ValueRef::Real(x) => Some(x.to_string()),
            ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
                Some(String::from_utf8_lossy(bytes).to_lowercase())
            }
        })
    }

    /// Open or create the database at `path`, creating its directory
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirectory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        conn.create_scalar_function(
            FOLD_CASE_FUNCTION,
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            Self::fold_case,
        )?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            query_builder: QueryBuilder::new(SqliteDialect::default().with_columns(RECORD_COLUMNS)),
        })
    }

    /// Map a UNIQUE violation on insert/update to `DuplicateIdentifier`
    fn map_conflict(err: rusqlite::Error, identifier: &str) -> StorageError {
        if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
            StorageError::DuplicateIdentifier(identifier.to_string())
        } else {
            StorageError::Database(err)
        }
    }

    fn read_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordRow> {
        Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
            row.get(6)?,
            row.get(7)?,
            row.get(8)?,
        ))
    }

    fn parse_time(identifier: &str, raw: &str) -> StorageResult<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| StorageError::CorruptRecord {
                identifier: identifier.to_string(),
                reason: format!("timestamp '{}': {}", raw, e),
            })
    }

    /// Deserialize a record from database columns
    fn row_to_record(row: RecordRow) -> StorageResult<FileRecord> {
        let (identifier, file_path, schema_name, confidence, matched_pattern, review_state, fields, created, modified) =
            row;
        let review_state = review_state
            .parse::<ReviewState>()
            .map_err(|reason| StorageError::CorruptRecord {
                identifier: identifier.clone(),
                reason,
            })?;
        let created_at = Self::parse_time(&identifier, &created)?;
        let modified_at = modified
            .as_deref()
            .map(|raw| Self::parse_time(&identifier, raw))
            .transpose()?;
        Ok(FileRecord {
            fields: serde_json::from_str(&fields)?,
            identifier,
            file_path,
            schema_name,
            confidence,
            matched_pattern,
            review_state,
            created_at,
            modified_at,
        })
    }

    fn collect_records(rows: impl Iterator<Item = rusqlite::Result<RecordRow>>) -> StorageResult<Vec<FileRecord>> {
        let mut records = Vec::new();
        for row in rows {
            records.push(Self::row_to_record(row?)?);
        }
        Ok(records)
    }

    fn load_record_with(conn: &Connection, identifier: &str) -> StorageResult<Option<FileRecord>> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM file_nodes WHERE identifier = ?1 AND is_schema_definition = 0",
                    RECORD_COLUMNS
                ),
                params![identifier],
                Self::read_row,
            )
            .optional()?;
        row.map(Self::row_to_record).transpose()
    }

    fn write_record(conn: &Connection, old_identifier: &str, record: &FileRecord) -> StorageResult<usize> {
        let fields = serde_json::to_string(&record.fields)?;
        let properties = serde_json::to_string(&to_export_map(record))?;
        let search = serde_json::to_string(&search_document(record))?;
        conn.execute(
            r#"
            UPDATE file_nodes SET
                identifier = ?1,
                file_path = ?2,
                schema_name = ?3,
                confidence = ?4,
                matched_pattern = ?5,
                review_state = ?6,
                fields_json = ?7,
                properties_json = ?8,
                search_json = ?9,
                modified_at = ?10
            WHERE identifier = ?11 AND is_schema_definition = 0
            "#,
            params![
                record.identifier,
                record.file_path,
                record.schema_name,
                record.confidence,
                record.matched_pattern,
                record.review_state.as_str(),
                fields,
                properties,
                search,
                record.modified_at.map(|t| t.to_rfc3339()),
                old_identifier,
            ],
        )
        .map_err(|e| Self::map_conflict(e, &record.identifier))
    }
}

impl RecordStore for SqliteStore {
    // === Schema Operations ===

    fn save_schema(&self, schema: &CategorySchema) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let definition = serde_json::to_string(schema)?;

        conn.execute(
            r#"
            INSERT INTO file_nodes (identifier, file_path, schema_name, fields_json, properties_json,
                                    created_at, is_schema_definition)
            VALUES (?1, ?2, ?3, '{}', ?4, ?5, 1)
            ON CONFLICT(identifier) DO UPDATE SET
                file_path = excluded.file_path,
                properties_json = excluded.properties_json,
                modified_at = excluded.created_at
            "#,
            params![
                format!("{}{}", SCHEMA_ROW_PREFIX, schema.name),
                schema.storage_path,
                schema.name,
                definition,
                Utc::now().to_rfc3339(),
            ],
        )?;
        debug!(schema = %schema.name, "schema saved");
        Ok(())
    }

    fn load_schemas(&self) -> StorageResult<Vec<CategorySchema>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT properties_json FROM file_nodes WHERE is_schema_definition = 1 ORDER BY schema_name",
        )?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

        let mut schemas = Vec::new();
        for row in rows {
            schemas.push(serde_json::from_str(&row?)?);
        }
        Ok(schemas)
    }

    // === Record Operations ===

    fn save_record(&self, record: &FileRecord) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let fields = serde_json::to_string(&record.fields)?;
        let properties = serde_json::to_string(&to_export_map(record))?;
        let search = serde_json::to_string(&search_document(record))?;

        conn.execute(
            r#"
            INSERT INTO file_nodes (identifier, file_path, schema_name, confidence, matched_pattern,
                                    review_state, fields_json, properties_json, search_json,
                                    created_at, modified_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                record.identifier,
                record.file_path,
                record.schema_name,
                record.confidence,
                record.matched_pattern,
                record.review_state.as_str(),
                fields,
                properties,
                search,
                record.created_at.to_rfc3339(),
                record.modified_at.map(|t| t.to_rfc3339()),
            ],
        )
        .map_err(|e| Self::map_conflict(e, &record.identifier))?;
        Ok(())
    }

    fn load_record(&self, identifier: &str) -> StorageResult<Option<FileRecord>> {
        let conn = self.conn.lock().unwrap();
        Self::load_record_with(&conn, identifier)
    }

    fn contains_identifier(&self, identifier: &str) -> StorageResult<bool> {
        let conn = self.conn.lock().unwrap();
        let found: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM file_nodes WHERE identifier = ?1",
            params![identifier],
            |row| row.get(0),
        )?;
        Ok(found)
    }

    fn update_record(&self, record: &FileRecord) -> StorageResult<()> {
        let conn = self.conn.lock().unwrap();
        let rows = Self::write_record(&conn, &record.identifier, record)?;
        if rows == 0 {
            return Err(StorageError::RecordNotFound(record.identifier.clone()));
        }
        Ok(())
    }

    fn replace_identifier(&self, old: &str, new: &str) -> StorageResult<FileRecord> {
        let conn = self.conn.lock().unwrap();
        let mut record = Self::load_record_with(&conn, old)?
            .ok_or_else(|| StorageError::RecordNotFound(old.to_string()))?;
        if old == new {
            return Ok(record);
        }

        record.identifier = new.to_string();
        record.modified_at = Some(Utc::now());
        Self::write_record(&conn, old, &record)?;
        debug!(old, new, "record re-identified");
        Ok(record)
    }

    fn delete_records(&self, identifiers: &[String]) -> StorageResult<usize> {
        let conn = self.conn.lock().unwrap();
        let mut deleted = 0;
        for identifier in identifiers {
            deleted += conn.execute(
                "DELETE FROM file_nodes WHERE identifier = ?1 AND is_schema_definition = 0",
                params![identifier],
            )?;
        }
        Ok(deleted)
    }

    fn list_records(&self) -> StorageResult<Vec<FileRecord>> {
        self.search(&SearchFilter::new())
    }

    fn search(&self, filter: &SearchFilter) -> StorageResult<Vec<FileRecord>> {
        let query = self.query_builder.build(filter);
        let conn = self.conn.lock().unwrap();

        let names: Vec<String> = query.params.keys().map(|name| format!("${}", name)).collect();
        let bound: Vec<(&str, &dyn ToSql)> = names
            .iter()
            .zip(query.params.values())
            .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
            .collect();

        let mut stmt = conn.prepare(&query.template)?;
        let rows = stmt.query_map(bound.as_slice(), Self::read_row)?;
        Self::collect_records(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::MatchPattern;

    fn create_test_store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn card(identifier: &str, path: &str, company: &str) -> FileRecord {
        FileRecord::new(identifier, path, "Business Card")
            .with_field("company", company)
            .with_match(0.95, "busCard")
    }

    #[test]
    fn test_save_and_load_record() {
        let store = create_test_store();
        let record = card("card_20260101", "/cards/busCard-acme.pdf", "Acme").with_field("rating", 4i64);
        store.save_record(&record).unwrap();

        let loaded = store.load_record("card_20260101").unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(store.load_record("missing").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_identifier_rejected() {
        let store = create_test_store();
        store.save_record(&card("card_1", "/a.pdf", "A")).unwrap();

        let err = store.save_record(&card("card_1", "/b.pdf", "B")).unwrap_err();
        assert!(matches!(err, StorageError::DuplicateIdentifier(id) if id == "card_1"));
        assert_eq!(store.load_record("card_1").unwrap().unwrap().file_path, "/a.pdf");
    }

    #[test]
    fn test_update_record_keeps_identifier() {
        let store = create_test_store();
        store.save_record(&card("card_1", "/a.pdf", "A")).unwrap();

        let mut record = store.load_record("card_1").unwrap().unwrap();
        record = record.with_field("company", "Acme Ltd");
        record.review_state = ReviewState::Reviewed;
        record.modified_at = Some(Utc::now());
        store.update_record(&record).unwrap();

        let loaded = store.load_record("card_1").unwrap().unwrap();
        assert_eq!(loaded.field("company").and_then(|v| v.as_str()), Some("Acme Ltd"));
        assert_eq!(loaded.review_state, ReviewState::Reviewed);

        let ghost = card("ghost", "/g.pdf", "G");
        assert!(matches!(store.update_record(&ghost), Err(StorageError::RecordNotFound(_))));
    }

    #[test]
    fn test_replace_identifier() {
        let store = create_test_store();
        store.save_record(&card("old_1", "/a.pdf", "A")).unwrap();
        store.save_record(&card("taken", "/b.pdf", "B")).unwrap();

        let moved = store.replace_identifier("old_1", "new_1").unwrap();
        assert_eq!(moved.identifier, "new_1");
        assert!(!store.contains_identifier("old_1").unwrap());
        assert!(store.contains_identifier("new_1").unwrap());

        let err = store.replace_identifier("new_1", "taken").unwrap_err();
        assert!(matches!(err, StorageError::DuplicateIdentifier(_)));
        assert!(matches!(
            store.replace_identifier("absent", "x"),
            Err(StorageError::RecordNotFound(_))
        ));
    }

    #[test]
    fn test_search_by_path_and_property() {
        let store = create_test_store();
        store.save_record(&card("a", "C:\\Users\\x\\cards\\toyota.pdf", "Toyota Motors")).unwrap();
        store.save_record(&card("b", "C:\\Users\\y\\cards\\honda.pdf", "Honda")).unwrap();
        store.save_record(&card("c", "c:\\users\\X\\misc\\ford.pdf", "Ford")).unwrap();

        let filter = SearchFilter::new()
            .with_path("C:\\Users\\x\\")
            .with_property("company", "TOYOTA")
            .unwrap();
        let found = store.search(&filter).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].identifier, "a");

        let by_path = store.search(&SearchFilter::new().with_path("C:\\USERS\\X\\")).unwrap();
        let ids: Vec<_> = by_path.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_corrupt_row_names_the_record() {
        let store = create_test_store();
        store.save_record(&card("a", "/a.pdf", "Acme")).unwrap();
        store
            .conn
            .lock()
            .unwrap()
            .execute("UPDATE file_nodes SET review_state = 'shredded' WHERE identifier = 'a'", [])
            .unwrap();

        let err = store.load_record("a").unwrap_err();
        assert!(matches!(err, StorageError::CorruptRecord { identifier, .. } if identifier == "a"));
    }

    #[test]
    fn test_open_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("catalog.db");
        SqliteStore::open(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_search_folds_non_ascii_case() {
        let store = create_test_store();
        store.save_record(&card("a", "/Éte/card.pdf", "ÉCOLE Müller")).unwrap();

        let by_company = SearchFilter::new().with_property("company", "école").unwrap();
        assert_eq!(store.search(&by_company).unwrap().len(), 1);
        let by_path = SearchFilter::new().with_path("/éte/");
        assert_eq!(store.search(&by_path).unwrap().len(), 1);
        let umlaut = SearchFilter::new().with_property("company", "MÜLLER").unwrap();
        assert_eq!(store.search(&umlaut).unwrap().len(), 1);
    }

    #[test]
    fn test_search_matches_boolean_fields_as_text() {
        let store = create_test_store();
        store.save_record(&card("a", "/a.pdf", "Acme").with_field("paid", true)).unwrap();
        store.save_record(&card("b", "/b.pdf", "Bolt").with_field("paid", false)).unwrap();

        let paid = SearchFilter::new().with_property("paid", "TRUE").unwrap();
        let ids: Vec<_> = store.search(&paid).unwrap().into_iter().map(|r| r.identifier).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[test]
    fn test_search_never_returns_schemas() {
        let store = create_test_store();
        let schema = CategorySchema::new("Business Card", "/cards")
            .with_pattern(MatchPattern::filename_contains("busCard", 0.95));
        store.save_schema(&schema).unwrap();
        store.save_record(&card("a", "/cards/a.pdf", "Acme")).unwrap();

        let all = store.search(&SearchFilter::new()).unwrap();
        assert_eq!(all.len(), 1);
        let by_path = store.search(&SearchFilter::new().with_path("/cards")).unwrap();
        assert_eq!(by_path.len(), 1);
        assert_eq!(store.load_schemas().unwrap(), vec![schema]);
    }

    #[test]
    fn test_save_schema_replaces_by_name() {
        let store = create_test_store();
        store.save_schema(&CategorySchema::new("Receipt", "/old")).unwrap();
        store.save_schema(&CategorySchema::new("Receipt", "/new")).unwrap();

        let schemas = store.load_schemas().unwrap();
        assert_eq!(schemas.len(), 1);
        assert_eq!(schemas[0].storage_path, "/new");
    }

    #[test]
    fn test_delete_records() {
        let store = create_test_store();
        store.save_record(&card("a", "/a.pdf", "A")).unwrap();
        store.save_record(&card("b", "/b.pdf", "B")).unwrap();

        let deleted = store
            .delete_records(&["a".to_string(), "missing".to_string()])
            .unwrap();
        assert_eq!(deleted, 1);
        assert_eq!(store.list_records().unwrap().len(), 1);
    }

    #[test]
    fn test_wal_mode_enabled_at_connection() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("nested").join("test-wal.db")).unwrap();

        let journal_mode: String = store
            .conn
            .lock()
            .unwrap()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(journal_mode, "wal");
    }

    #[test]
    fn test_records_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("filenode.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.save_record(&card("a", "/a.pdf", "A")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.contains_identifier("a").unwrap());
    }
}
