//! The session's package registry.
//!
//! Append-only: records are added once and never removed or replaced. Ids
//! are unique across the session regardless of whether a record came from a
//! feed or is a host pseudo-package.

use crate::package::LoadedPackage;
use modloom_schema::{PackageId, PackageIdentity};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// A second record was offered for an id that is already registered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Package '{id}' is already registered as {existing}")]
pub struct DuplicateIdError {
    pub id: PackageId,
    pub existing: PackageIdentity,
}

#[derive(Debug, Default)]
struct Inner {
    by_key: HashMap<String, Arc<LoadedPackage>>,
    order: Vec<Arc<LoadedPackage>>,
}

impl Inner {
    fn conflict(&self, id: &PackageId) -> Option<DuplicateIdError> {
        self.by_key.get(id.key()).map(|existing| DuplicateIdError {
            id: id.clone(),
            existing: existing.identity().clone(),
        })
    }

    fn push(&mut self, record: Arc<LoadedPackage>) {
        self.by_key
            .insert(record.id().key().to_string(), Arc::clone(&record));
        self.order.push(record);
    }
}

/// Registry of loaded package records keyed by case-insensitive id.
#[derive(Debug, Default)]
pub struct PackageRegistry {
    inner: RwLock<Inner>,
}

impl PackageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateIdError`] if the id is taken; the registry is left
    /// untouched.
    pub fn register(&self, record: Arc<LoadedPackage>) -> Result<(), DuplicateIdError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(err) = inner.conflict(record.id()) {
            return Err(err);
        }
        tracing::debug!(package = %record.identity(), origin = %record.origin(), "registered package");
        inner.push(record);
        Ok(())
    }

    /// Add records one by one, stopping at the first conflict.
    ///
    /// Records registered before the conflict stay registered.
    ///
    /// # Errors
    ///
    /// Returns the first [`DuplicateIdError`] encountered.
    pub fn register_all(
        &self,
        records: impl IntoIterator<Item = Arc<LoadedPackage>>,
    ) -> Result<(), DuplicateIdError> {
        for record in records {
            self.register(record)?;
        }
        Ok(())
    }

    /// Add records all-or-nothing.
    ///
    /// The batch is checked against the registry and against itself under a
    /// single write lock before anything is inserted.
    ///
    /// # Errors
    ///
    /// Returns the first [`DuplicateIdError`]; nothing is registered.
    pub fn register_batch(&self, records: Vec<Arc<LoadedPackage>>) -> Result<(), DuplicateIdError> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        let mut batch: HashMap<&str, &Arc<LoadedPackage>> = HashMap::new();
        for record in &records {
            if let Some(err) = inner.conflict(record.id()) {
                return Err(err);
            }
            if let Some(existing) = batch.insert(record.id().key(), record) {
                return Err(DuplicateIdError {
                    id: record.id().clone(),
                    existing: existing.identity().clone(),
                });
            }
        }
        drop(batch);

        for record in records {
            inner.push(record);
        }
        Ok(())
    }

    /// Insert `record` unless its id is already present, returning whichever
    /// record ends up registered under that id.
    pub fn get_or_insert(&self, record: Arc<LoadedPackage>) -> Arc<LoadedPackage> {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = inner.by_key.get(record.id().key()) {
            return Arc::clone(existing);
        }
        tracing::debug!(package = %record.identity(), origin = %record.origin(), "registered package");
        inner.push(Arc::clone(&record));
        record
    }

    pub fn get(&self, id: &PackageId) -> Option<Arc<LoadedPackage>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .by_key
            .get(id.key())
            .cloned()
    }

    pub fn contains(&self, id: &PackageId) -> bool {
        self.get(id).is_some()
    }

    /// All records in registration order.
    pub fn packages(&self) -> Vec<Arc<LoadedPackage>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .clone()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
