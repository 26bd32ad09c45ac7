//! Catalogue service
//!
//! [`Cataloguer`] composes the schema registry, the classifier, the
//! identifier synthesizer and a record store. It owns the store handle;
//! nothing in the crate reaches a store through global state.

mod import;

pub use import::ImportReport;

use crate::classify::{ClassifyError, ClassifyResult, PatternClassifier, RegistryClassification, ScanOptions, ScanReport};
use crate::identity::{IdentityError, IdentityResult, IdentitySynthesizer, UniquenessOracle};
use crate::query::{PropertyKey, QueryError, SearchFilter};
use crate::record::{ExtractedFields, FileRecord, ReviewState};
use crate::schema::{CategorySchema, SchemaError, SchemaRegistry};
use crate::storage::{RecordStore, StorageError, StoreOracle};
use chrono::Utc;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::{debug, info};

/// Errors surfaced at the service boundary
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Classify(#[from] ClassifyError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("No schema matched {}", .0.display())]
    NoMatch(PathBuf),

    #[error("Unknown schema: {0}")]
    UnknownSchema(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// A newly catalogued file
#[derive(Debug)]
pub struct CatalogueOutcome {
    pub record: FileRecord,
    /// The chosen schema asks for the user to confirm extracted fields
    pub review_required: bool,
    /// Other schemas that also matched, best first
    pub similar: Vec<String>,
    /// Schemas that could not be evaluated against the file
    pub failures: Vec<ClassifyError>,
}

/// Oracle for re-identification: the record's current identifier counts as
/// free so an unchanged proposal keeps it.
struct ReidentifyOracle<'a, S: RecordStore> {
    store: StoreOracle<'a, S>,
    current: &'a str,
}

impl<S: RecordStore> UniquenessOracle for ReidentifyOracle<'_, S> {
    fn is_available(&self, candidate: &str) -> IdentityResult<bool> {
        if candidate == self.current {
            return Ok(true);
        }
        self.store.is_available(candidate)
    }
}

pub struct Cataloguer<S: RecordStore> {
    store: S,
    registry: SchemaRegistry,
    classifier: PatternClassifier,
    synthesizer: IdentitySynthesizer,
    /// Prefixes used when a search names none
    default_paths: Vec<String>,
    /// Serializes identifier synthesis with the write that claims it
    allocation: Mutex<()>,
}

impl<S: RecordStore> Cataloguer<S> {
    pub fn new(store: S, registry: SchemaRegistry) -> Self {
        Self {
            store,
            registry,
            classifier: PatternClassifier::new(),
            synthesizer: IdentitySynthesizer::new(),
            default_paths: Vec::new(),
            allocation: Mutex::new(()),
        }
    }

    /// Build a cataloguer whose registry is the store's saved schemas
    pub fn from_store(store: S) -> CatalogResult<Self> {
        let registry: SchemaRegistry = store.load_schemas()?.into_iter().collect();
        debug!(schemas = registry.len(), "schemas loaded from store");
        Ok(Self::new(store, registry))
    }

    pub fn with_classifier(mut self, classifier: PatternClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: IdentitySynthesizer) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn with_search_paths(mut self, paths: Vec<String>) -> Self {
        self.default_paths = paths;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Add a schema to the registry and persist it. A schema with the same
    /// name is replaced.
    pub fn register_schema(&mut self, schema: CategorySchema) -> CatalogResult<&CategorySchema> {
        let registered = self.registry.upsert(schema);
        self.store.save_schema(registered)?;
        info!(schema = %registered.name, "schema registered");
        Ok(registered)
    }

    pub fn classify_file(&self, path: impl AsRef<Path>) -> RegistryClassification {
        self.classifier.classify_registry(&self.registry, path)
    }

    pub fn scan(&self, dir: impl AsRef<Path>, options: ScanOptions) -> ClassifyResult<ScanReport> {
        self.classifier.scan(&self.registry, dir, options)
    }

    /// The identifier `catalogue_file` would assign right now
    pub fn suggest_identifier(&self, path: impl AsRef<Path>) -> CatalogResult<String> {
        Ok(self
            .synthesizer
            .synthesize(path, &StoreOracle::new(&self.store))?)
    }

    /// Classify a file, give it an identifier and store it as unreviewed.
    ///
    /// Fails with [`CatalogError::NoMatch`] when no schema matches, or with
    /// the first evaluation failure if there was one. When a schema does
    /// match, evaluation failures of the others are returned on the outcome.
    pub fn catalogue_file(&self, path: impl AsRef<Path>) -> CatalogResult<CatalogueOutcome> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(IdentityError::NotFound(path.to_path_buf()).into());
        }
        let absolute = std::fs::canonicalize(path).map_err(IdentityError::Io)?;

        let classified = self.classify_file(&absolute);
        let failures = classified.failures;
        let Some(resolution) = classified.resolution else {
            return Err(match failures.into_iter().next() {
                Some(failure) => failure.into(),
                None => CatalogError::NoMatch(path.to_path_buf()),
            });
        };
        let similar = resolution
            .similar_names()
            .into_iter()
            .map(str::to_string)
            .collect();
        let chosen = resolution.chosen.classification;
        let review_required = self
            .registry
            .get(&chosen.schema_name)
            .map(|schema| schema.user_review_required)
            .unwrap_or(true);

        let record = {
            let _guard = self.allocation.lock().unwrap_or_else(PoisonError::into_inner);
            let identifier = self
                .synthesizer
                .synthesize(&absolute, &StoreOracle::new(&self.store))?;
            let record = FileRecord::new(
                identifier,
                absolute.to_string_lossy(),
                chosen.schema_name.clone(),
            )
            .with_fields(chosen.fields)
            .with_match(chosen.confidence, chosen.matched_pattern);
            self.store.save_record(&record)?;
            record
        };

        info!(
            identifier = %record.identifier,
            schema = %record.schema_name,
            confidence = record.confidence,
            "file catalogued"
        );
        Ok(CatalogueOutcome {
            record,
            review_required,
            similar,
            failures,
        })
    }

    /// Records matching `filter`; the configured search paths apply when
    /// the filter names no path.
    pub fn search(&self, filter: &SearchFilter) -> CatalogResult<Vec<FileRecord>> {
        let records = if filter.paths.is_empty() && !self.default_paths.is_empty() {
            let mut scoped = filter.clone();
            scoped.paths = self.default_paths.clone();
            self.store.search(&scoped)?
        } else {
            self.store.search(filter)?
        };
        debug!(results = records.len(), "search complete");
        Ok(records)
    }

    fn load(&self, identifier: &str) -> CatalogResult<FileRecord> {
        self.store
            .load_record(identifier)?
            .ok_or_else(|| StorageError::RecordNotFound(identifier.to_string()).into())
    }

    /// Apply user-confirmed field values and mark the record reviewed
    pub fn confirm_fields(&self, identifier: &str, updates: ExtractedFields) -> CatalogResult<FileRecord> {
        for key in updates.keys() {
            PropertyKey::parse(key)?;
        }
        let mut record = self.load(identifier)?;
        record.fields.extend(updates);
        record.review_state = ReviewState::Reviewed;
        record.modified_at = Some(Utc::now());
        self.store.update_record(&record)?;
        info!(identifier, "fields confirmed");
        Ok(record)
    }

    pub fn set_review_state(&self, identifier: &str, state: ReviewState) -> CatalogResult<FileRecord> {
        let mut record = self.load(identifier)?;
        record.review_state = state;
        record.modified_at = Some(Utc::now());
        self.store.update_record(&record)?;
        Ok(record)
    }

    /// Derive the identifier again from the record's file and move the
    /// record to it. An unchanged proposal leaves the record as it is.
    pub fn reidentify(&self, identifier: &str) -> CatalogResult<FileRecord> {
        let _guard = self.allocation.lock().unwrap_or_else(PoisonError::into_inner);
        let record = self.load(identifier)?;
        let oracle = ReidentifyOracle {
            store: StoreOracle::new(&self.store),
            current: identifier,
        };
        let fresh = self.synthesizer.synthesize(&record.file_path, &oracle)?;
        if fresh == identifier {
            return Ok(record);
        }
        let moved = self.store.replace_identifier(identifier, &fresh)?;
        info!(old = identifier, new = %fresh, "record re-identified");
        Ok(moved)
    }

    pub fn delete(&self, identifiers: &[String]) -> CatalogResult<usize> {
        let deleted = self.store.delete_records(identifiers)?;
        info!(requested = identifiers.len(), deleted, "records deleted");
        Ok(deleted)
    }
}
