//! Schema registry: the loaded, read-only set of category schemas

use super::loader::{parse_schema, read_schema_file, SchemaError, SchemaResult};
use super::types::CategorySchema;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Ordered collection of schemas, keyed by unique name.
///
/// Registration order is the final tie-break during cross-schema resolution.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: Vec<CategorySchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every `*.yaml` / `*.yml` document in `dir`, in filename order.
    pub fn load_dir(dir: impl AsRef<Path>) -> SchemaResult<Self> {
        let dir = dir.as_ref();
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.is_file()
                    && matches!(
                        path.extension().and_then(|e| e.to_str()),
                        Some("yaml") | Some("yml")
                    )
            })
            .collect();
        files.sort();

        let mut registry = Self::new();
        for file in &files {
            registry.insert(read_schema_file(file)?)?;
        }
        info!(dir = %dir.display(), schemas = registry.len(), "schemas loaded");
        Ok(registry)
    }

    /// Read one schema file and register it
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> SchemaResult<&CategorySchema> {
        let schema = read_schema_file(path)?;
        self.insert(schema)
    }

    /// Parse a document and register it
    pub fn load_str(&mut self, yaml: &str) -> SchemaResult<&CategorySchema> {
        let schema = parse_schema(yaml)?;
        self.insert(schema)
    }

    /// Register a schema. Names must be unique.
    pub fn insert(&mut self, schema: CategorySchema) -> SchemaResult<&CategorySchema> {
        if self.get(&schema.name).is_some() {
            return Err(SchemaError::DuplicateName(schema.name));
        }
        self.schemas.push(schema);
        Ok(&self.schemas[self.schemas.len() - 1])
    }

    /// Register a schema, replacing one of the same name in place
    pub fn upsert(&mut self, schema: CategorySchema) -> &CategorySchema {
        let index = match self.schemas.iter().position(|s| s.name == schema.name) {
            Some(index) => {
                self.schemas[index] = schema;
                index
            }
            None => {
                self.schemas.push(schema);
                self.schemas.len() - 1
            }
        };
        &self.schemas[index]
    }

    pub fn get(&self, name: &str) -> Option<&CategorySchema> {
        self.schemas.iter().find(|s| s.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategorySchema> {
        self.schemas.iter()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl FromIterator<CategorySchema> for SchemaRegistry {
    /// Later duplicates of a name are dropped with a warning.
    fn from_iter<T: IntoIterator<Item = CategorySchema>>(iter: T) -> Self {
        let mut registry = Self::new();
        for schema in iter {
            if let Err(e) = registry.insert(schema) {
                warn!(error = %e, "schema left out of registry");
            }
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_duplicate_names() {
        let mut registry = SchemaRegistry::new();
        registry.load_str("name: Cards\npath: /cards").unwrap();
        let err = registry.load_str("name: Cards\npath: /other").unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateName(name) if name == "Cards"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn loads_directory_in_filename_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b-receipts.yaml"), "name: Receipts\npath: /r").unwrap();
        std::fs::write(dir.path().join("a-cards.yml"), "name: Cards\npath: /c").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a schema").unwrap();

        let registry = SchemaRegistry::load_dir(dir.path()).unwrap();
        let names: Vec<&str> = registry.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Cards", "Receipts"]);
    }

    #[test]
    fn directory_load_surfaces_invalid_documents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.yaml"), "path: /nowhere").unwrap();
        assert!(SchemaRegistry::load_dir(dir.path()).is_err());
    }

    #[test]
    fn collecting_keeps_first_of_duplicate_names() {
        let registry: SchemaRegistry = vec![
            CategorySchema::new("Cards", "/first"),
            CategorySchema::new("Receipts", "/r"),
            CategorySchema::new("Cards", "/second"),
        ]
        .into_iter()
        .collect();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("Cards").unwrap().storage_path, "/first");
    }

    #[test]
    fn upsert_replaces_in_place() {
        let mut registry = SchemaRegistry::new();
        registry.load_str("name: Cards\npath: /cards").unwrap();
        registry.load_str("name: Receipts\npath: /r").unwrap();
        registry.upsert(CategorySchema::new("Cards", "/moved"));

        let names: Vec<&str> = registry.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Cards", "Receipts"]);
        assert_eq!(registry.get("Cards").unwrap().storage_path, "/moved");
    }
}
