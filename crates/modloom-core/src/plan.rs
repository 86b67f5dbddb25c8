//! Load ordering of resolved packages.

use crate::package::LoadedPackage;
use modloom_schema::PackageIdentity;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use thiserror::Error;

/// The packages left over after every acyclic layer was peeled off.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Circular dependency among: {}", format_members(.members))]
pub struct CycleError {
    pub members: Vec<PackageIdentity>,
}

fn format_members(members: &[PackageIdentity]) -> String {
    members
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Compute load layers for `packages`, dependencies first.
///
/// Uses Kahn's algorithm. Each layer contains packages whose resolved
/// dependencies were all placed in earlier layers, sorted by id for
/// deterministic output. Edges to unresolved references or to packages
/// outside `packages` are ignored.
///
/// # Errors
///
/// Returns [`CycleError`] naming every package that sits on or behind a cycle.
pub fn load_order(packages: &[Arc<LoadedPackage>]) -> Result<Vec<Vec<PackageIdentity>>, CycleError> {
    let by_key: HashMap<&str, &Arc<LoadedPackage>> =
        packages.iter().map(|p| (p.id().key(), p)).collect();

    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, usize> = by_key.keys().map(|k| (*k, 0)).collect();

    for package in by_key.values() {
        let key = package.id().key();
        for reference in package.dependencies() {
            let Some(dep) = reference.resolved() else {
                continue;
            };
            let dep_key = dep.id().key();
            if dep_key == key || !by_key.contains_key(dep_key) {
                continue;
            }
            dependents.entry(dep_key).or_default().push(key);
            if let Some(degree) = in_degree.get_mut(key) {
                *degree += 1;
            }
        }
    }

    let mut ready: Vec<&str> = in_degree
        .iter()
        .filter(|(_, degree)| **degree == 0)
        .map(|(k, _)| *k)
        .collect();
    ready.sort_unstable();
    let mut queue = VecDeque::from(ready);

    let mut layers = Vec::new();
    let mut placed = 0;
    while !queue.is_empty() {
        let mut layer = Vec::new();
        let mut next = Vec::new();

        while let Some(key) = queue.pop_front() {
            layer.push(key);
            for dependent in dependents.get(key).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        next.push(*dependent);
                    }
                }
            }
        }

        placed += layer.len();
        layers.push(
            layer
                .into_iter()
                .map(|k| by_key[k].identity().clone())
                .collect::<Vec<_>>(),
        );

        next.sort_unstable();
        queue = VecDeque::from(next);
    }

    if placed < by_key.len() {
        let mut members: Vec<PackageIdentity> = in_degree
            .iter()
            .filter(|(_, degree)| **degree > 0)
            .map(|(k, _)| by_key[k].identity().clone())
            .collect();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        return Err(CycleError { members });
    }

    Ok(layers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::PackageOrigin;
    use modloom_schema::{PackageDependency, PackageId, PlatformTarget};
    use semver::Version;

    fn package(id: &str, deps: &[&str]) -> Arc<LoadedPackage> {
        Arc::new(LoadedPackage::new(
            PackageIdentity::new(PackageId::new(id).unwrap(), Version::new(1, 0, 0)),
            PlatformTarget::any(),
            deps.iter()
                .map(|d| PackageDependency::parse(d, "*").unwrap())
                .collect(),
            PackageOrigin::Host,
        ))
    }

    /// Resolve every reference of every package against the set by id.
    fn link(packages: &[Arc<LoadedPackage>]) {
        for package in packages {
            for reference in package.dependencies() {
                if let Some(target) = packages.iter().find(|p| p.id() == &reference.dependency().id) {
                    reference.cell().set(Arc::clone(target)).unwrap();
                }
            }
        }
    }

    fn ids(layer: &[PackageIdentity]) -> Vec<&str> {
        layer.iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_layers() {
        let packages = vec![
            package("a", &["b", "c"]),
            package("b", &["d"]),
            package("c", &[]),
            package("d", &[]),
        ];
        link(&packages);

        let layers = load_order(&packages).unwrap();
        assert_eq!(layers.len(), 3);
        assert_eq!(ids(&layers[0]), vec!["c", "d"]);
        assert_eq!(ids(&layers[1]), vec!["b"]);
        assert_eq!(ids(&layers[2]), vec!["a"]);
    }

    #[test]
    fn test_unresolved_and_external_edges_are_ignored() {
        let packages = vec![package("a", &["missing"]), package("b", &["a"])];
        link(&packages);
        let layers = load_order(&packages[1..]).unwrap();
        assert_eq!(layers, vec![vec![packages[1].identity().clone()]]);

        let layers = load_order(&packages).unwrap();
        assert_eq!(layers.len(), 2);
    }

    #[test]
    fn test_cycle_is_rejected() {
        let packages = vec![
            package("a", &["b"]),
            package("b", &["a"]),
            package("free", &[]),
        ];
        link(&packages);

        let err = load_order(&packages).unwrap_err();
        let members: Vec<&str> = err.members.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(members, vec!["a", "b"]);
        assert!(err.to_string().contains("Circular dependency"));
    }
}
