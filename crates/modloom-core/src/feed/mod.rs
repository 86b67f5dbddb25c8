//! Package feeds.
//!
//! A feed answers three questions about a [`PackageSource`]: which versions
//! of a package exist, which target-specific builds (with their
//! dependencies) a version has, and what the binary payload of a build is.
//! The wire format is the feed implementation's business.

mod directory;
#[cfg(feature = "network")]
mod http;

pub use directory::DirectoryFeed;
#[cfg(feature = "network")]
pub use http::HttpFeed;

use async_trait::async_trait;
use bytes::Bytes;
use modloom_schema::{
    PackageDependency, PackageId, PackageIdentity, PackageSource, PlatformTarget, SourceLocation,
};
use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// One target-specific build of a package version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageBuild {
    /// Target the build was compiled for.
    pub target: PlatformTarget,
    /// Dependencies of this build.
    #[serde(default)]
    pub dependencies: Vec<PackageDependency>,
}

/// Build metadata document shared by the directory and HTTP layouts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildsDocument {
    #[serde(default)]
    pub builds: Vec<PackageBuild>,
}

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "network")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("Malformed feed data for {what}: {reason}")]
    Decode { what: String, reason: String },

    #[error("{0} not found in feed")]
    NotFound(String),

    #[error("Unsupported source location: {0}")]
    Unsupported(String),
}

impl FeedError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode(what: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Decode {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

/// A queryable package source.
#[async_trait]
pub trait PackageFeed: Send + Sync + std::fmt::Debug {
    /// The descriptor this feed was opened from.
    fn source(&self) -> &PackageSource;

    /// All versions the feed offers for `id`; empty if the id is unknown.
    async fn list_versions(&self, id: &PackageId) -> Result<Vec<Version>, FeedError>;

    /// Target-specific builds of one version.
    async fn fetch_builds(&self, identity: &PackageIdentity) -> Result<Vec<PackageBuild>, FeedError>;

    /// Binary payload of one build.
    async fn fetch_payload(
        &self,
        identity: &PackageIdentity,
        target: &PlatformTarget,
    ) -> Result<Bytes, FeedError>;
}

/// Open the feed implementation matching the source's location.
///
/// # Errors
///
/// Returns [`FeedError::Unsupported`] for remote sources when the crate is
/// built without the `network` feature.
pub fn open_feed(source: &PackageSource) -> Result<Arc<dyn PackageFeed>, FeedError> {
    match source.location_kind() {
        SourceLocation::Local(path) => Ok(Arc::new(DirectoryFeed::new(source.clone(), path))),
        #[cfg(feature = "network")]
        SourceLocation::Remote(url) => Ok(Arc::new(HttpFeed::new(source.clone(), url)?)),
        #[cfg(not(feature = "network"))]
        SourceLocation::Remote(url) => Err(FeedError::Unsupported(url)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_feed_picks_directory_for_paths() {
        let feed = open_feed(&PackageSource::new("local", "/tmp/does-not-matter")).unwrap();
        assert_eq!(feed.source().name, "local");
    }

    #[test]
    fn test_builds_document_parses() {
        let doc: BuildsDocument = serde_json::from_str(
            r#"{"builds":[{"target":"net6.0","dependencies":[{"id":"Lib","range":"^1"}]},{"target":"any"}]}"#,
        )
        .unwrap();
        assert_eq!(doc.builds.len(), 2);
        assert!(doc.builds[1].dependencies.is_empty());
    }
}
