//! In-memory storage backend
//!
//! Evaluates searches with [`SearchFilter::matches`], the in-memory
//! counterpart of the SQLite query.

use super::traits::{RecordStore, StorageError, StorageResult};
use crate::query::SearchFilter;
use crate::record::FileRecord;
use crate::schema::CategorySchema;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Concurrent map-backed record store
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, FileRecord>,
    schemas: DashMap<String, CategorySchema>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn sorted(mut records: Vec<FileRecord>) -> Vec<FileRecord> {
        records.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        records
    }
}

impl RecordStore for MemoryStore {
    fn save_schema(&self, schema: &CategorySchema) -> StorageResult<()> {
        self.schemas.insert(schema.name.clone(), schema.clone());
        Ok(())
    }

    fn load_schemas(&self) -> StorageResult<Vec<CategorySchema>> {
        let mut schemas: Vec<CategorySchema> =
            self.schemas.iter().map(|entry| entry.value().clone()).collect();
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(schemas)
    }

    fn save_record(&self, record: &FileRecord) -> StorageResult<()> {
        match self.records.entry(record.identifier.clone()) {
            Entry::Occupied(_) => Err(StorageError::DuplicateIdentifier(record.identifier.clone())),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    fn load_record(&self, identifier: &str) -> StorageResult<Option<FileRecord>> {
        Ok(self.records.get(identifier).map(|r| r.value().clone()))
    }

    fn contains_identifier(&self, identifier: &str) -> StorageResult<bool> {
        Ok(self.records.contains_key(identifier))
    }

    fn update_record(&self, record: &FileRecord) -> StorageResult<()> {
        match self.records.get_mut(&record.identifier) {
            Some(mut existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StorageError::RecordNotFound(record.identifier.clone())),
        }
    }

    fn replace_identifier(&self, old: &str, new: &str) -> StorageResult<FileRecord> {
        if old == new {
            return self
                .load_record(old)?
                .ok_or_else(|| StorageError::RecordNotFound(old.to_string()));
        }
        let Some((_, mut record)) = self.records.remove(old) else {
            return Err(StorageError::RecordNotFound(old.to_string()));
        };
        let previous_modified = record.modified_at;
        record.identifier = new.to_string();
        record.modified_at = Some(Utc::now());

        // The entry guard must be dropped before touching another key
        let claimed = match self.records.entry(new.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                true
            }
        };
        if !claimed {
            record.identifier = old.to_string();
            record.modified_at = previous_modified;
            self.records.insert(old.to_string(), record);
            return Err(StorageError::DuplicateIdentifier(new.to_string()));
        }
        Ok(record)
    }

    fn delete_records(&self, identifiers: &[String]) -> StorageResult<usize> {
        Ok(identifiers
            .iter()
            .filter(|id| self.records.remove(id.as_str()).is_some())
            .count())
    }

    fn list_records(&self) -> StorageResult<Vec<FileRecord>> {
        Ok(Self::sorted(
            self.records.iter().map(|entry| entry.value().clone()).collect(),
        ))
    }

    fn search(&self, filter: &SearchFilter) -> StorageResult<Vec<FileRecord>> {
        Ok(Self::sorted(
            self.records
                .iter()
                .filter(|entry| filter.matches(entry.value()))
                .map(|entry| entry.value().clone())
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ReviewState;

    fn card(identifier: &str, path: &str, company: &str) -> FileRecord {
        FileRecord::new(identifier, path, "Business Card").with_field("company", company)
    }

    #[test]
    fn save_rejects_duplicates() {
        let store = MemoryStore::new();
        store.save_record(&card("a", "/a.pdf", "A")).unwrap();
        assert!(matches!(
            store.save_record(&card("a", "/other.pdf", "B")),
            Err(StorageError::DuplicateIdentifier(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_requires_existing_record() {
        let store = MemoryStore::new();
        store.save_record(&card("a", "/a.pdf", "A")).unwrap();

        let mut record = store.load_record("a").unwrap().unwrap();
        record.review_state = ReviewState::Archived;
        store.update_record(&record).unwrap();
        assert_eq!(store.load_record("a").unwrap().unwrap().review_state, ReviewState::Archived);

        assert!(matches!(
            store.update_record(&card("b", "/b.pdf", "B")),
            Err(StorageError::RecordNotFound(_))
        ));
    }

    #[test]
    fn replace_identifier_restores_on_clash() {
        let store = MemoryStore::new();
        store.save_record(&card("a", "/a.pdf", "A")).unwrap();
        store.save_record(&card("b", "/b.pdf", "B")).unwrap();

        assert!(matches!(
            store.replace_identifier("a", "b"),
            Err(StorageError::DuplicateIdentifier(_))
        ));
        assert_eq!(store.load_record("a").unwrap().unwrap().file_path, "/a.pdf");

        let moved = store.replace_identifier("a", "c").unwrap();
        assert_eq!(moved.identifier, "c");
        assert!(moved.modified_at.is_some());
        assert!(!store.contains_identifier("a").unwrap());
    }

    #[test]
    fn search_matches_sqlite_semantics() {
        let store = MemoryStore::new();
        store.save_record(&card("b", "C:\\Users\\x\\toyota.pdf", "Toyota Motors")).unwrap();
        store.save_record(&card("a", "C:\\Users\\x\\ford.pdf", "Ford")).unwrap();
        store.save_schema(&CategorySchema::new("Business Card", "C:\\Users\\x\\")).unwrap();

        let everything = store.search(&SearchFilter::new().with_path("c:\\users\\X\\")).unwrap();
        let ids: Vec<_> = everything.iter().map(|r| r.identifier.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);

        let toyota = SearchFilter::new().with_property("company", "toyota").unwrap();
        assert_eq!(store.search(&toyota).unwrap().len(), 1);
    }
}
