//! Patch targets and the patcher contract.

use crate::module::{Module, ModuleId, TypeDef};
use std::collections::BTreeSet;

/// What a patcher wants to edit: one module and, optionally, named types in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PatchTarget {
    module: ModuleId,
    types: BTreeSet<String>,
}

impl PatchTarget {
    pub fn new<I, S>(module: impl Into<ModuleId>, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            module: module.into(),
            types: types.into_iter().map(Into::into).collect(),
        }
    }

    /// Target a module without naming any type; only `patch_module` runs.
    pub fn whole_module(module: impl Into<ModuleId>) -> Self {
        Self {
            module: module.into(),
            types: BTreeSet::new(),
        }
    }

    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    /// Fully-qualified type names, in sorted order.
    pub fn types(&self) -> &BTreeSet<String> {
        &self.types
    }

    pub fn is_whole_module(&self) -> bool {
        self.types.is_empty()
    }
}

/// A pre-patcher.
///
/// Every step has a default body, so an implementation only overrides the
/// steps it needs. A step that returns `Err` or panics fails the job and
/// rolls the module back.
pub trait Patcher: Send + Sync {
    fn name(&self) -> &str;

    /// Lower runs first. Ties keep registration order.
    fn priority(&self) -> i32 {
        0
    }

    fn targets(&self) -> Vec<PatchTarget>;

    /// Return `false` to skip the target without touching it.
    fn prepare(&self, _module: &ModuleId) -> anyhow::Result<bool> {
        Ok(true)
    }

    /// Edit the whole module. May replace `*module` outright. Returns whether
    /// anything changed.
    fn patch_module(&self, _module: &mut Module, _id: &ModuleId) -> anyhow::Result<bool> {
        Ok(false)
    }

    /// Edit one declared type. Returns whether anything changed.
    fn patch_type(&self, _ty: &mut TypeDef, _module: &ModuleId) -> anyhow::Result<bool> {
        Ok(false)
    }

    /// Return `false` to discard this job's edits.
    fn cleanup(&self, _module: &ModuleId) -> anyhow::Result<bool> {
        Ok(true)
    }
}

impl std::fmt::Debug for dyn Patcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Patcher")
            .field("name", &self.name())
            .field("priority", &self.priority())
            .finish()
    }
}
