//! Loaded package records.

use crate::feed::PackageBuild;
use crate::reference::DependencyReference;
use modloom_schema::{HostModuleSpec, PackageDependency, PackageId, PackageIdentity, PlatformTarget};
use semver::Version;
use std::collections::HashSet;
use std::sync::Arc;

/// Where a [`LoadedPackage`] came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PackageOrigin {
    /// A pseudo-package synthesized for a module the host already loaded.
    Host,
    /// A package found in the named source.
    Feed {
        /// Name of the [`PackageSource`](modloom_schema::PackageSource).
        source: String,
    },
}

impl std::fmt::Display for PackageOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Feed { source } => write!(f, "{source}"),
        }
    }
}

/// "Package X at version Y, targeting Z, depends on {...}".
///
/// Records are immutable once created; only the dependency references they
/// own transition from unresolved to resolved.
#[derive(Debug)]
pub struct LoadedPackage {
    identity: PackageIdentity,
    target: PlatformTarget,
    dependencies: Vec<Arc<DependencyReference>>,
    origin: PackageOrigin,
}

impl LoadedPackage {
    /// Build a record. Repeated dependency ids keep the first declaration.
    pub fn new(
        identity: PackageIdentity,
        target: PlatformTarget,
        dependencies: Vec<PackageDependency>,
        origin: PackageOrigin,
    ) -> Self {
        let mut seen = HashSet::new();
        let dependencies = dependencies
            .into_iter()
            .filter(|dep| {
                let fresh = seen.insert(dep.id.clone());
                if !fresh {
                    tracing::warn!(package = %identity, dependency = %dep.id, "ignoring repeated dependency declaration");
                }
                fresh
            })
            .map(|dep| Arc::new(DependencyReference::new(dep)))
            .collect();

        Self {
            identity,
            target,
            dependencies,
            origin,
        }
    }

    /// Synthesize a pseudo-package for a host-provided module.
    pub fn host(spec: &HostModuleSpec) -> Self {
        Self::new(
            spec.identity(),
            spec.target.clone(),
            spec.dependencies.clone(),
            PackageOrigin::Host,
        )
    }

    /// Record a package build found in `source`.
    pub fn from_feed(identity: PackageIdentity, build: PackageBuild, source: &str) -> Self {
        Self::new(
            identity,
            build.target,
            build.dependencies,
            PackageOrigin::Feed {
                source: source.to_string(),
            },
        )
    }

    pub fn identity(&self) -> &PackageIdentity {
        &self.identity
    }

    pub fn id(&self) -> &PackageId {
        &self.identity.id
    }

    pub fn version(&self) -> &Version {
        &self.identity.version
    }

    pub fn target(&self) -> &PlatformTarget {
        &self.target
    }

    pub fn origin(&self) -> &PackageOrigin {
        &self.origin
    }

    pub fn is_host(&self) -> bool {
        self.origin == PackageOrigin::Host
    }

    /// Dependency references in declaration order.
    pub fn dependencies(&self) -> &[Arc<DependencyReference>] {
        &self.dependencies
    }

    /// Look up the reference for a dependency id.
    pub fn dependency(&self, id: &PackageId) -> Option<&Arc<DependencyReference>> {
        self.dependencies.iter().find(|r| &r.dependency().id == id)
    }

    /// True when every dependency, transitively, is resolved.
    pub fn all_dependencies_loaded(&self) -> bool {
        self.dependencies.iter().all(|r| r.all_dependencies_loaded())
    }
}

impl std::fmt::Display for LoadedPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.identity, self.target)
    }
}
