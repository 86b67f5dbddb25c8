//! The module pool.
//!
//! Holds the current version of every loaded module plus at most one
//! outstanding snapshot per module. Mutual exclusion between patch jobs is a
//! separate lock table keyed by module id, so the module value itself can be
//! swapped freely while the lock is held.

use crate::module::{CodecError, Module, ModuleCodec, ModuleId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Module '{0}' is not loaded")]
    UnknownModule(ModuleId),

    #[error("Module '{0}' is already loaded")]
    DuplicateModule(ModuleId),

    #[error("Module '{0}' already has an outstanding snapshot")]
    SnapshotExists(ModuleId),

    #[error("Module '{0}' has no snapshot to restore")]
    NoSnapshot(ModuleId),

    #[error("Failed to serialize module '{module}': {source}")]
    Codec {
        module: ModuleId,
        #[source]
        source: CodecError,
    },
}

#[derive(Debug)]
struct PoolEntry {
    current: Module,
    snapshot: Option<Module>,
}

/// Exclusive access to one module. Released on drop.
#[derive(Debug)]
pub struct ModuleLock {
    module: ModuleId,
    _guard: OwnedMutexGuard<()>,
}

impl ModuleLock {
    pub fn module(&self) -> &ModuleId {
        &self.module
    }
}

#[derive(Debug, Default)]
pub struct ModulePool {
    entries: RwLock<HashMap<ModuleId, PoolEntry>>,
    locks: Mutex<HashMap<ModuleId, Arc<tokio::sync::Mutex<()>>>>,
}

impl ModulePool {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<ModuleId, PoolEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<ModuleId, PoolEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn with_entry<T>(
        &self,
        id: &ModuleId,
        f: impl FnOnce(&mut PoolEntry) -> Result<T, PoolError>,
    ) -> Result<T, PoolError> {
        let mut entries = self.write();
        let entry = entries
            .get_mut(id)
            .ok_or_else(|| PoolError::UnknownModule(id.clone()))?;
        f(entry)
    }

    /// Add a module.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::DuplicateModule`] if `id` is already present.
    pub fn insert(&self, id: ModuleId, module: Module) -> Result<(), PoolError> {
        let mut entries = self.write();
        if entries.contains_key(&id) {
            return Err(PoolError::DuplicateModule(id));
        }
        tracing::debug!(module = %id, types = module.type_count(), "module added to pool");
        entries.insert(
            id,
            PoolEntry {
                current: module,
                snapshot: None,
            },
        );
        Ok(())
    }

    /// The current version of a module. Cloning shares storage.
    pub fn get(&self, id: &ModuleId) -> Option<Module> {
        self.read().get(id).map(|e| e.current.clone())
    }

    /// Replace the current version of a module, leaving any snapshot alone.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::UnknownModule`] if `id` is not loaded.
    pub fn set(&self, id: &ModuleId, module: Module) -> Result<(), PoolError> {
        self.with_entry(id, |entry| {
            entry.current = module;
            Ok(())
        })
    }

    pub fn contains(&self, id: &ModuleId) -> bool {
        self.read().contains_key(id)
    }

    /// Loaded module ids, sorted.
    pub fn ids(&self) -> Vec<ModuleId> {
        let mut ids: Vec<_> = self.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn has_snapshot(&self, id: &ModuleId) -> bool {
        self.read().get(id).is_some_and(|e| e.snapshot.is_some())
    }

    /// Serialize the current version of a module.
    ///
    /// # Errors
    ///
    /// Fails if the module is unknown or the codec rejects it.
    pub fn serialize(&self, id: &ModuleId, codec: &dyn ModuleCodec) -> Result<Vec<u8>, PoolError> {
        let module = self
            .get(id)
            .ok_or_else(|| PoolError::UnknownModule(id.clone()))?;
        codec.serialize(&module).map_err(|source| PoolError::Codec {
            module: id.clone(),
            source,
        })
    }

    /// Record the current version as the restore point.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::SnapshotExists`] if a snapshot is outstanding.
    pub fn snapshot(&self, id: &ModuleId) -> Result<Module, PoolError> {
        self.with_entry(id, |entry| {
            if entry.snapshot.is_some() {
                return Err(PoolError::SnapshotExists(id.clone()));
            }
            entry.snapshot = Some(entry.current.clone());
            Ok(entry.current.clone())
        })
    }

    /// Put the snapshot back as the current version and clear it.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::NoSnapshot`] if there is nothing to restore; the
    /// entry is left as it was.
    pub fn restore(&self, id: &ModuleId) -> Result<(), PoolError> {
        self.with_entry(id, |entry| {
            let snapshot = entry
                .snapshot
                .take()
                .ok_or_else(|| PoolError::NoSnapshot(id.clone()))?;
            entry.current = snapshot;
            Ok(())
        })
    }

    /// Install `module` as the current version and drop the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::UnknownModule`] if `id` is not loaded.
    pub fn commit(&self, id: &ModuleId, module: Module) -> Result<(), PoolError> {
        self.with_entry(id, |entry| {
            entry.current = module;
            entry.snapshot = None;
            Ok(())
        })
    }

    /// Block until the module's lock is free and take it.
    ///
    /// Must not be called from inside an async task; patch jobs run on
    /// blocking threads.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::UnknownModule`] if `id` is not loaded.
    pub fn lock(&self, id: &ModuleId) -> Result<ModuleLock, PoolError> {
        if !self.contains(id) {
            return Err(PoolError::UnknownModule(id.clone()));
        }
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        Ok(ModuleLock {
            module: id.clone(),
            _guard: mutex.blocking_lock_owned(),
        })
    }

    /// Take the module's lock if it is free.
    pub fn try_lock(&self, id: &ModuleId) -> Option<ModuleLock> {
        if !self.contains(id) {
            return None;
        }
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(id.clone()).or_default())
        };
        let guard = mutex.try_lock_owned().ok()?;
        Some(ModuleLock {
            module: id.clone(),
            _guard: guard,
        })
    }
}
