//! Uniqueness oracle backed by a record store

use super::traits::RecordStore;
use crate::identity::{IdentityError, IdentityResult, UniquenessOracle};

/// Treats every identifier not yet stored as available.
///
/// Advisory only: the store's own uniqueness check on save is what
/// prevents duplicates.
pub struct StoreOracle<'a, S: RecordStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: RecordStore + ?Sized> StoreOracle<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }
}

impl<S: RecordStore + ?Sized> UniquenessOracle for StoreOracle<'_, S> {
    fn is_available(&self, candidate: &str) -> IdentityResult<bool> {
        self.store
            .contains_identifier(candidate)
            .map(|taken| !taken)
            .map_err(|e| IdentityError::Oracle(e.to_string()))
    }
}
