//! Package feed descriptors.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A package feed descriptor: where to look for packages and how to log in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageSource {
    /// Display name, unique within a configuration.
    pub name: String,
    /// Feed location: an `http(s)://` URL, a `file://` URL or a bare path.
    #[serde(alias = "url")]
    pub location: String,
    /// Optional user name for authenticated feeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Optional password or token for authenticated feeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Where a [`PackageSource`] points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// A directory on the local filesystem.
    Local(PathBuf),
    /// A remote HTTP(S) feed.
    Remote(String),
}

impl PackageSource {
    /// Create an anonymous source.
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
            username: None,
            password: None,
        }
    }

    /// Attach credentials to the source.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// True when both credential fields are present and non-empty.
    pub fn is_authenticated(&self) -> bool {
        matches!(
            (&self.username, &self.password),
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty()
        )
    }

    /// Classify the location as local or remote.
    pub fn location_kind(&self) -> SourceLocation {
        let loc = self.location.trim();
        if loc.starts_with("http://") || loc.starts_with("https://") {
            SourceLocation::Remote(loc.trim_end_matches('/').to_string())
        } else if let Some(path) = loc.strip_prefix("file://") {
            SourceLocation::Local(PathBuf::from(path))
        } else {
            SourceLocation::Local(PathBuf::from(loc))
        }
    }
}

impl std::fmt::Display for PackageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authenticated_requires_both_fields() {
        let anon = PackageSource::new("a", "https://feed.example.com");
        assert!(!anon.is_authenticated());

        let half = PackageSource {
            username: Some("me".into()),
            ..anon.clone()
        };
        assert!(!half.is_authenticated());

        let empty_pw = anon.clone().with_credentials("me", "");
        assert!(!empty_pw.is_authenticated());

        assert!(anon.with_credentials("me", "token").is_authenticated());
    }

    #[test]
    fn test_location_kind() {
        assert_eq!(
            PackageSource::new("r", "https://feed.example.com/v3/").location_kind(),
            SourceLocation::Remote("https://feed.example.com/v3".into())
        );
        assert_eq!(
            PackageSource::new("f", "file:///srv/mods").location_kind(),
            SourceLocation::Local(PathBuf::from("/srv/mods"))
        );
        assert_eq!(
            PackageSource::new("p", "./mods").location_kind(),
            SourceLocation::Local(PathBuf::from("./mods"))
        );
    }
}
