//! Bulk import of group files into the store

use super::{CatalogError, CatalogResult, Cataloguer};
use crate::record::{parse_group_file, record_from_properties};
use crate::storage::{RecordStore, StorageError};
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: Vec<String>,
    /// Entries whose identifier is already stored
    pub duplicates: Vec<String>,
}

impl<S: RecordStore> Cataloguer<S> {
    /// Store every entry of a group file as a record of `schema_name`.
    ///
    /// Entries keep the identifier written in the file. Identifiers that are
    /// already in use are skipped and reported; any other storage failure
    /// stops the import.
    pub fn import_group(&self, text: &str, schema_name: &str) -> CatalogResult<ImportReport> {
        if self.registry().get(schema_name).is_none() {
            return Err(CatalogError::UnknownSchema(schema_name.to_string()));
        }

        let mut report = ImportReport::default();
        for entry in parse_group_file(text) {
            let record = record_from_properties(&entry.identifier, schema_name, &entry.properties);
            match self.store().save_record(&record) {
                Ok(()) => report.imported.push(entry.identifier),
                Err(StorageError::DuplicateIdentifier(id)) => {
                    warn!(identifier = %id, "identifier already stored, entry skipped");
                    report.duplicates.push(id);
                }
                Err(e) => return Err(e.into()),
            }
        }

        info!(
            schema = schema_name,
            imported = report.imported.len(),
            duplicates = report.duplicates.len(),
            "group file imported"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{FieldValue, ReviewState};
    use crate::schema::{CategorySchema, SchemaRegistry};
    use crate::storage::MemoryStore;

    const GROUP: &str = "\
FILE-NODE: buscard-plumber_20231015
filepath: /cards/busCard-plumber-2023_1015.pdf
company: Drip Fixers
context_notes: met at the home show

FILE-NODE: buscard-plumber_20231015
company: Duplicate Entry
";

    #[test]
    fn imports_entries_and_reports_duplicates() {
        let registry: SchemaRegistry = vec![CategorySchema::new("Business Card", "/cards")]
            .into_iter()
            .collect();
        let cat = Cataloguer::new(MemoryStore::new(), registry);

        let report = cat.import_group(GROUP, "Business Card").unwrap();
        assert_eq!(report.imported, vec!["buscard-plumber_20231015"]);
        assert_eq!(report.duplicates, vec!["buscard-plumber_20231015"]);

        let record = cat.store().load_record("buscard-plumber_20231015").unwrap().unwrap();
        assert_eq!(record.file_path, "/cards/busCard-plumber-2023_1015.pdf");
        assert_eq!(record.field("company"), Some(&FieldValue::from("Drip Fixers")));
        assert_eq!(record.field("context_note"), Some(&FieldValue::from("met at the home show")));
        assert_eq!(record.review_state, ReviewState::Unreviewed);
    }

    #[test]
    fn unknown_schema_is_rejected() {
        let cat = Cataloguer::new(MemoryStore::new(), SchemaRegistry::new());
        assert!(matches!(
            cat.import_group(GROUP, "Receipts"),
            Err(CatalogError::UnknownSchema(_))
        ));
    }
}
