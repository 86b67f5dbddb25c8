//! A feed served over HTTP(S).
//!
//! Layout relative to the source URL:
//!
//! - `GET {url}/{id}/index.json` → `{"versions": ["1.0.0", ...]}` (404 = no versions)
//! - `GET {url}/{id}/{version}/builds.json` → `{"builds": [...]}`
//! - `GET {url}/{id}/{version}/{target}.module` → payload bytes
//!
//! Authenticated sources send HTTP basic auth on every request.

use super::{BuildsDocument, FeedError, PackageBuild, PackageFeed};
use async_trait::async_trait;
use bytes::Bytes;
use modloom_schema::{PackageId, PackageIdentity, PackageSource, PlatformTarget};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use semver::Version;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct VersionIndex {
    #[serde(default)]
    versions: Vec<String>,
}

#[derive(Debug)]
pub struct HttpFeed {
    source: PackageSource,
    base_url: String,
    client: Client,
}

impl HttpFeed {
    /// Create a feed for `base_url` with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::Http`] if the HTTP client cannot be built.
    pub fn new(source: PackageSource, base_url: impl Into<String>) -> Result<Self, FeedError> {
        let client = Client::builder().user_agent(crate::USER_AGENT).build()?;
        Ok(Self::with_client(source, base_url, client))
    }

    /// Create a feed sharing an existing client.
    pub fn with_client(source: PackageSource, base_url: impl Into<String>, client: Client) -> Self {
        Self {
            source,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let request = self.client.get(url);
        if self.source.is_authenticated() {
            request.basic_auth(
                self.source.username.as_deref().unwrap_or_default(),
                self.source.password.as_deref(),
            )
        } else {
            request
        }
    }

    async fn send(&self, url: &str) -> Result<Option<Response>, FeedError> {
        tracing::debug!(source = %self.source.name, %url, "feed request");
        let response = self.get(url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response)),
            status => Err(FeedError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    fn version_url(&self, identity: &PackageIdentity) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            identity.id.key(),
            identity.version
        )
    }
}

#[async_trait]
impl PackageFeed for HttpFeed {
    fn source(&self) -> &PackageSource {
        &self.source
    }

    async fn list_versions(&self, id: &PackageId) -> Result<Vec<Version>, FeedError> {
        let url = format!("{}/{}/index.json", self.base_url, id.key());
        let Some(response) = self.send(&url).await? else {
            return Ok(Vec::new());
        };
        let index: VersionIndex = response
            .json()
            .await
            .map_err(|e| FeedError::decode(&url, e))?;

        let mut versions: Vec<Version> = index
            .versions
            .iter()
            .filter_map(|v| match Version::parse(v) {
                Ok(version) => Some(version),
                Err(e) => {
                    tracing::debug!(source = %self.source.name, version = %v, error = %e, "skipping unparsable version");
                    None
                }
            })
            .collect();
        versions.sort();
        Ok(versions)
    }

    async fn fetch_builds(&self, identity: &PackageIdentity) -> Result<Vec<PackageBuild>, FeedError> {
        let url = format!("{}/builds.json", self.version_url(identity));
        let response = self
            .send(&url)
            .await?
            .ok_or_else(|| FeedError::NotFound(identity.to_string()))?;
        let doc: BuildsDocument = response
            .json()
            .await
            .map_err(|e| FeedError::decode(&url, e))?;
        Ok(doc.builds)
    }

    async fn fetch_payload(
        &self,
        identity: &PackageIdentity,
        target: &PlatformTarget,
    ) -> Result<Bytes, FeedError> {
        let url = format!("{}/{target}.module", self.version_url(identity));
        let response = self
            .send(&url)
            .await?
            .ok_or_else(|| FeedError::NotFound(format!("{identity} [{target}]")))?;
        Ok(response.bytes().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn identity(id: &str, version: &str) -> PackageIdentity {
        PackageIdentity::new(PackageId::new(id).unwrap(), Version::parse(version).unwrap())
    }

    #[tokio::test]
    async fn test_list_versions() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/lib/index.json")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"versions":["2.0.0","1.5.0","garbage"]}"#)
            .create_async()
            .await;

        let feed = HttpFeed::new(PackageSource::new("remote", server.url()), server.url()).unwrap();
        let versions = feed.list_versions(&PackageId::new("Lib").unwrap()).await.unwrap();
        assert_eq!(versions, vec![Version::new(1, 5, 0), Version::new(2, 0, 0)]);
    }

    #[tokio::test]
    async fn test_missing_package_is_empty() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/nope/index.json")
            .with_status(404)
            .create_async()
            .await;

        let feed = HttpFeed::new(PackageSource::new("remote", server.url()), server.url()).unwrap();
        let versions = feed.list_versions(&PackageId::new("nope").unwrap()).await.unwrap();
        assert!(versions.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/lib/index.json")
            .with_status(500)
            .create_async()
            .await;

        let feed = HttpFeed::new(PackageSource::new("remote", server.url()), server.url()).unwrap();
        let result = feed.list_versions(&PackageId::new("lib").unwrap()).await;
        assert!(matches!(result, Err(FeedError::Status { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_builds_and_payload_with_basic_auth() {
        let mut server = Server::new_async().await;
        // "ci:token" base64-encoded
        let auth = || Matcher::Exact("Basic Y2k6dG9rZW4=".to_string());
        let _builds = server
            .mock("GET", "/lib/1.0.0/builds.json")
            .match_header("authorization", auth())
            .with_status(200)
            .with_body(r#"{"builds":[{"target":"net6.0","dependencies":[{"id":"Core","range":"^2"}]}]}"#)
            .create_async()
            .await;
        let _payload = server
            .mock("GET", "/lib/1.0.0/net6.0.module")
            .match_header("authorization", auth())
            .with_status(200)
            .with_body(b"MODULE".as_slice())
            .create_async()
            .await;

        let source = PackageSource::new("private", server.url()).with_credentials("ci", "token");
        let feed = HttpFeed::new(source, server.url()).unwrap();
        let ident = identity("lib", "1.0.0");

        let builds = feed.fetch_builds(&ident).await.unwrap();
        assert_eq!(builds.len(), 1);
        assert_eq!(builds[0].target.as_str(), "net6.0");

        let payload = feed
            .fetch_payload(&ident, &PlatformTarget::new("net6.0").unwrap())
            .await
            .unwrap();
        assert_eq!(&payload[..], b"MODULE");
    }
}
