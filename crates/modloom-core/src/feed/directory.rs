//! A feed backed by a local directory.
//!
//! ```text
//! <root>/
//! └── <id, lower-case>/
//!     └── <version>/
//!         ├── package.toml      # [[builds]] target = "...", dependencies = [...]
//!         └── <target>.module   # payload of each build
//! ```

use super::{BuildsDocument, FeedError, PackageBuild, PackageFeed};
use async_trait::async_trait;
use bytes::Bytes;
use modloom_schema::{PackageId, PackageIdentity, PackageSource, PlatformTarget};
use semver::Version;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Metadata file name inside each version directory.
pub const METADATA_FILE: &str = "package.toml";

/// Payload file extension.
pub const PAYLOAD_EXTENSION: &str = "module";

#[derive(Debug)]
pub struct DirectoryFeed {
    source: PackageSource,
    root: PathBuf,
}

impl DirectoryFeed {
    pub fn new(source: PackageSource, root: impl Into<PathBuf>) -> Self {
        Self {
            source,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn version_dir(&self, identity: &PackageIdentity) -> PathBuf {
        self.root
            .join(identity.id.key())
            .join(identity.version.to_string())
    }
}

#[async_trait]
impl PackageFeed for DirectoryFeed {
    fn source(&self) -> &PackageSource {
        &self.source
    }

    async fn list_versions(&self, id: &PackageId) -> Result<Vec<Version>, FeedError> {
        // A missing root means the source itself is unreachable.
        fs::metadata(&self.root)
            .await
            .map_err(|e| FeedError::io(&self.root, e))?;

        let package_dir = self.root.join(id.key());
        let mut entries = match fs::read_dir(&package_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(FeedError::io(&package_dir, e)),
        };

        let mut versions = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FeedError::io(&package_dir, e))?
        {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            match Version::parse(&name) {
                Ok(version) => versions.push(version),
                Err(_) => tracing::debug!(path = %entry.path().display(), "skipping non-version entry"),
            }
        }
        versions.sort();
        Ok(versions)
    }

    async fn fetch_builds(&self, identity: &PackageIdentity) -> Result<Vec<PackageBuild>, FeedError> {
        let path = self.version_dir(identity).join(METADATA_FILE);
        let text = match fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FeedError::NotFound(identity.to_string()));
            }
            Err(e) => return Err(FeedError::io(&path, e)),
        };
        let doc: BuildsDocument =
            toml::from_str(&text).map_err(|e| FeedError::decode(path.display().to_string(), e))?;
        Ok(doc.builds)
    }

    async fn fetch_payload(
        &self,
        identity: &PackageIdentity,
        target: &PlatformTarget,
    ) -> Result<Bytes, FeedError> {
        let path = self
            .version_dir(identity)
            .join(format!("{target}.{PAYLOAD_EXTENSION}"));
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(FeedError::NotFound(format!("{identity} [{target}]")))
            }
            Err(e) => Err(FeedError::io(&path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_version(root: &Path, id: &str, version: &str, metadata: &str) {
        let dir = root.join(id).join(version);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(METADATA_FILE), metadata).unwrap();
    }

    fn identity(id: &str, version: &str) -> PackageIdentity {
        PackageIdentity::new(PackageId::new(id).unwrap(), Version::parse(version).unwrap())
    }

    #[tokio::test]
    async fn test_lists_versions_case_insensitively() {
        let temp = TempDir::new().unwrap();
        write_version(temp.path(), "lib", "1.5.0", "");
        write_version(temp.path(), "lib", "2.0.0", "");
        std::fs::create_dir_all(temp.path().join("lib").join("not-a-version")).unwrap();

        let feed = DirectoryFeed::new(PackageSource::new("local", "unused"), temp.path());
        let versions = feed.list_versions(&PackageId::new("LIB").unwrap()).await.unwrap();
        assert_eq!(versions, vec![Version::new(1, 5, 0), Version::new(2, 0, 0)]);
    }

    #[tokio::test]
    async fn test_unknown_package_is_empty_but_missing_root_fails() {
        let temp = TempDir::new().unwrap();
        let feed = DirectoryFeed::new(PackageSource::new("local", "unused"), temp.path());
        let id = PackageId::new("nothing").unwrap();
        assert!(feed.list_versions(&id).await.unwrap().is_empty());

        let gone = DirectoryFeed::new(
            PackageSource::new("gone", "unused"),
            temp.path().join("missing"),
        );
        assert!(matches!(
            gone.list_versions(&id).await,
            Err(FeedError::Io { .. })
        ));
    }

    #[tokio::test]
    async fn test_builds_and_payload() {
        let temp = TempDir::new().unwrap();
        write_version(
            temp.path(),
            "lib",
            "1.0.0",
            r#"
            [[builds]]
            target = "net6.0"
            dependencies = [{ id = "Core", range = ">=2.0" }]

            [[builds]]
            target = "netstandard2.0"
            "#,
        );
        std::fs::write(
            temp.path().join("lib").join("1.0.0").join("net6.0.module"),
            b"payload",
        )
        .unwrap();

        let feed = DirectoryFeed::new(PackageSource::new("local", "unused"), temp.path());
        let ident = identity("Lib", "1.0.0");
        let builds = feed.fetch_builds(&ident).await.unwrap();
        assert_eq!(builds.len(), 2);
        assert_eq!(builds[0].dependencies[0].id, "core");

        let target = PlatformTarget::new("net6.0").unwrap();
        let payload = feed.fetch_payload(&ident, &target).await.unwrap();
        assert_eq!(&payload[..], b"payload");

        let other = PlatformTarget::new("netstandard2.0").unwrap();
        assert!(matches!(
            feed.fetch_payload(&ident, &other).await,
            Err(FeedError::NotFound(_))
        ));
    }
}
