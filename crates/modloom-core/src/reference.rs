//! Lazy dependency references.
//!
//! A [`DependencyReference`] points from a requiring package to whatever
//! package ends up satisfying one of its dependencies. It resolves at most
//! once; the resolving is done by [`PackageManager::resolve`], which is
//! handed the reference explicitly.
//!
//! Searches for one reference are serialised by a per-reference gate, and
//! a search that found nothing in the sources is remembered, so the sources
//! are queried at most once per reference.
//!
//! [`PackageManager::resolve`]: crate::PackageManager::resolve

use crate::package::LoadedPackage;
use modloom_schema::PackageDependency;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, MutexGuard, OnceCell};

#[derive(Debug)]
pub struct DependencyReference {
    dependency: PackageDependency,
    resolved: OnceCell<Arc<LoadedPackage>>,
    // Held across check-then-search.
    search: Mutex<()>,
    // Set under `search` once the sources came back empty.
    sources_exhausted: AtomicBool,
    // Monotonic: set once the whole reachable subgraph is resolved.
    fully_loaded: AtomicBool,
}

impl DependencyReference {
    pub fn new(dependency: PackageDependency) -> Self {
        Self {
            dependency,
            resolved: OnceCell::new(),
            search: Mutex::new(()),
            sources_exhausted: AtomicBool::new(false),
            fully_loaded: AtomicBool::new(false),
        }
    }

    pub fn dependency(&self) -> &PackageDependency {
        &self.dependency
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.initialized()
    }

    /// The record this reference resolved to, if any.
    pub fn resolved(&self) -> Option<&Arc<LoadedPackage>> {
        self.resolved.get()
    }

    /// The resolved slot. Written by the manager while holding the search
    /// gate.
    pub(crate) fn cell(&self) -> &OnceCell<Arc<LoadedPackage>> {
        &self.resolved
    }

    pub(crate) async fn search_gate(&self) -> MutexGuard<'_, ()> {
        self.search.lock().await
    }

    /// Whether a finished search found nothing in the configured sources.
    pub fn sources_exhausted(&self) -> bool {
        self.sources_exhausted.load(Ordering::Acquire)
    }

    pub(crate) fn mark_sources_exhausted(&self) {
        self.sources_exhausted.store(true, Ordering::Release);
    }

    /// Whether this reference and everything reachable from it is resolved.
    ///
    /// The walk keeps a visited set, so dependency cycles terminate; a cycle
    /// whose members are all resolved counts as loaded as a unit. The answer
    /// is cached once it becomes true.
    pub fn all_dependencies_loaded(&self) -> bool {
        if self.fully_loaded.load(Ordering::Acquire) {
            return true;
        }
        let loaded = self.walk(true).is_empty();
        if loaded {
            self.fully_loaded.store(true, Ordering::Release);
        }
        loaded
    }

    /// Every unresolved reference reachable from this one, this one included.
    pub fn unresolved_dependencies(&self) -> Vec<PackageDependency> {
        self.walk(false)
    }

    fn walk(&self, stop_at_first: bool) -> Vec<PackageDependency> {
        let mut unresolved = Vec::new();
        let mut visited: HashSet<*const Self> = HashSet::new();
        let mut stack: Vec<&Self> = vec![self];

        while let Some(reference) = stack.pop() {
            if !visited.insert(std::ptr::from_ref(reference)) {
                continue;
            }
            if reference.fully_loaded.load(Ordering::Acquire) {
                continue;
            }
            let Some(package) = reference.resolved() else {
                unresolved.push(reference.dependency.clone());
                if stop_at_first {
                    break;
                }
                continue;
            };
            stack.extend(package.dependencies().iter().map(|r| &**r));
        }

        unresolved
    }
}

impl std::fmt::Display for DependencyReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.resolved() {
            Some(pkg) => write!(f, "{} -> {}", self.dependency, pkg.identity()),
            None => write!(f, "{} -> (unresolved)", self.dependency),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageOrigin;
    use modloom_schema::{PackageId, PackageIdentity, PlatformTarget};
    use semver::Version;

    fn pkg(id: &str, deps: &[&str]) -> Arc<LoadedPackage> {
        Arc::new(LoadedPackage::new(
            PackageIdentity::new(PackageId::new(id).unwrap(), Version::new(1, 0, 0)),
            PlatformTarget::any(),
            deps.iter()
                .map(|d| PackageDependency::parse(d, "*").unwrap())
                .collect(),
            PackageOrigin::Host,
        ))
    }

    fn reference(id: &str) -> DependencyReference {
        DependencyReference::new(PackageDependency::parse(id, "*").unwrap())
    }

    #[test]
    fn test_unresolved_reference_is_not_loaded() {
        let r = reference("a");
        assert!(!r.is_resolved());
        assert!(!r.all_dependencies_loaded());
        assert_eq!(r.unresolved_dependencies().len(), 1);
    }

    #[test]
    fn test_transitive_loading() {
        let a = pkg("a", &["b"]);
        let b = pkg("b", &[]);
        let root = reference("a");
        root.cell().set(a.clone()).unwrap();

        assert!(!root.all_dependencies_loaded());
        let missing = root.unresolved_dependencies();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].id, "b");

        a.dependencies()[0].cell().set(b).unwrap();
        assert!(root.all_dependencies_loaded());
        assert!(a.all_dependencies_loaded());
    }

    #[test]
    fn test_cycle_terminates_and_loads_as_unit() {
        let a = pkg("a", &["b"]);
        let b = pkg("b", &["a"]);
        a.dependencies()[0].cell().set(b.clone()).unwrap();
        let root = reference("a");
        root.cell().set(a.clone()).unwrap();

        // b -> a still unresolved
        assert!(!root.all_dependencies_loaded());

        b.dependencies()[0].cell().set(a).unwrap();
        assert!(root.all_dependencies_loaded());
        assert!(root.unresolved_dependencies().is_empty());
    }
}
