//! Package ids, identities and dependency declarations.

use crate::error::SchemaError;
use crate::range::VersionRange;
use semver::Version;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::hash::{Hash, Hasher};

/// A package id, unique within a resolution session.
///
/// Ids compare and hash case-insensitively but keep the spelling they were
/// declared with for display.
///
/// # Example
///
/// ```
/// use modloom_schema::PackageId;
///
/// let a = PackageId::new("Harmony.Lib").unwrap();
/// let b = PackageId::new("harmony.lib").unwrap();
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "Harmony.Lib");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageId {
    display: String,
    key: String,
}

impl PackageId {
    /// Create a package id, rejecting empty ids and ids containing whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::InvalidId`] if `id` is empty or has whitespace.
    pub fn new(id: &str) -> Result<Self, SchemaError> {
        let trimmed = id.trim();
        if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
            return Err(SchemaError::InvalidId(id.to_string()));
        }
        Ok(Self {
            display: trimmed.to_string(),
            key: trimmed.to_lowercase(),
        })
    }

    /// The normalized (lower-case) key used for registry lookups.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The id as originally spelled.
    pub fn as_str(&self) -> &str {
        &self.display
    }
}

impl PartialEq for PackageId {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PackageId {}

impl Hash for PackageId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for PackageId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PackageId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl Borrow<str> for PackageId {
    fn borrow(&self) -> &str {
        &self.key
    }
}

impl PartialEq<str> for PackageId {
    fn eq(&self, other: &str) -> bool {
        self.key == other.to_lowercase()
    }
}

impl PartialEq<&str> for PackageId {
    fn eq(&self, other: &&str) -> bool {
        self.key == other.to_lowercase()
    }
}

impl TryFrom<String> for PackageId {
    type Error = SchemaError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(&s)
    }
}

impl From<PackageId> for String {
    fn from(id: PackageId) -> Self {
        id.display
    }
}

impl std::str::FromStr for PackageId {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for PackageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display)
    }
}

/// A package id pinned to one concrete version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageIdentity {
    /// The package id.
    pub id: PackageId,
    /// The exact version.
    pub version: Version,
}

impl PackageIdentity {
    /// Pair an id with a version.
    pub fn new(id: PackageId, version: Version) -> Self {
        Self { id, version }
    }
}

impl std::fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.id, self.version)
    }
}

/// Which class of feeds may satisfy a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// A plain library, resolved from library feeds (default).
    #[default]
    Library,
    /// Another mod, resolved from mod feeds.
    Mod,
}

impl std::fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Library => write!(f, "library"),
            Self::Mod => write!(f, "mod"),
        }
    }
}

/// A dependency declared by a package: an id plus an acceptable version range.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageDependency {
    /// Id of the required package.
    pub id: PackageId,
    /// Versions that satisfy the requirement.
    pub range: VersionRange,
    /// Feed class the dependency is resolved from.
    #[serde(default)]
    pub kind: DependencyKind,
}

impl PackageDependency {
    /// Create a library dependency.
    pub fn new(id: PackageId, range: VersionRange) -> Self {
        Self {
            id,
            range,
            kind: DependencyKind::Library,
        }
    }

    /// Change the feed class this dependency is resolved from.
    pub fn with_kind(mut self, kind: DependencyKind) -> Self {
        self.kind = kind;
        self
    }

    /// Parse a dependency from an id and range text.
    ///
    /// # Errors
    ///
    /// Returns an error if either the id or the range is invalid.
    pub fn parse(id: &str, range: &str) -> Result<Self, SchemaError> {
        Ok(Self::new(PackageId::new(id)?, VersionRange::parse(range)?))
    }

    /// Whether `version` satisfies this dependency's range.
    pub fn accepts(&self, version: &Version) -> bool {
        self.range.matches(version)
    }
}

impl std::fmt::Display for PackageDependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.id, self.range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_id_is_case_insensitive() {
        let a = PackageId::new("MonoMod.Core").unwrap();
        let b = PackageId::new("monomod.core").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.key(), "monomod.core");
        assert_eq!(a.as_str(), "MonoMod.Core");

        let set: HashSet<PackageId> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_id_rejects_blank_and_whitespace() {
        assert!(PackageId::new("").is_err());
        assert!(PackageId::new("   ").is_err());
        assert!(PackageId::new("two words").is_err());
    }

    #[test]
    fn test_dependency_accepts() {
        let dep = PackageDependency::parse("Lib", ">=1.0, <2.0").unwrap();
        assert!(dep.accepts(&Version::new(1, 5, 0)));
        assert!(!dep.accepts(&Version::new(2, 0, 0)));
        assert_eq!(dep.kind, DependencyKind::Library);
    }

    #[test]
    fn test_dependency_deserializes_kind() {
        let dep: PackageDependency =
            serde_json::from_str(r#"{"id":"Other","range":"^1","kind":"mod"}"#).unwrap();
        assert_eq!(dep.kind, DependencyKind::Mod);
        assert_eq!(dep.id, "other");
    }

    #[test]
    fn test_identity_display() {
        let ident = PackageIdentity::new(PackageId::new("App").unwrap(), Version::new(1, 2, 3));
        assert_eq!(ident.to_string(), "App@1.2.3");
    }
}
