//! The package manager: registry, feeds and the resolution algorithm.

use crate::compat::{CompatibilityGraph, PlatformCompatibility};
use crate::error::{LoaderError, ResolveError};
use crate::feed::{FeedError, PackageBuild, PackageFeed, open_feed};
use crate::package::{LoadedPackage, PackageOrigin};
use crate::reference::DependencyReference;
use crate::registry::{DuplicateIdError, PackageRegistry};
use crate::reporter::{NullReporter, Reporter};
use bytes::Bytes;
use modloom_schema::{
    DependencyKind, HostModuleSpec, ModloomConfig, PackageDependency, PackageId, PackageIdentity,
};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Which feed classes may be consulted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManagerSettings {
    pub allow_libraries: bool,
    pub allow_mods: bool,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            allow_libraries: true,
            allow_mods: true,
        }
    }
}

/// A dependency no enabled source could satisfy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedDependency {
    /// The package declaring the dependency; `None` for a root reference.
    pub required_by: Option<PackageIdentity>,
    pub dependency: PackageDependency,
}

impl std::fmt::Display for UnresolvedDependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.required_by {
            Some(parent) => write!(f, "{} (required by {parent})", self.dependency),
            None => write!(f, "{}", self.dependency),
        }
    }
}

/// Outcome of walking a dependency graph.
#[derive(Debug, Default)]
pub struct ResolutionReport {
    /// Every package reached, in discovery order, each once.
    pub resolved: Vec<Arc<LoadedPackage>>,
    pub unresolved: Vec<UnresolvedDependency>,
}

impl ResolutionReport {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

// Internal outcome of one resolution attempt.
enum Miss {
    NotFound,
    Cancelled,
}

// Why a single source stopped answering.
enum Interrupt {
    Cancelled,
    Feed(FeedError),
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T, FeedError>>,
) -> Result<T, Interrupt> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Interrupt::Cancelled),
        result = fut => result.map_err(Interrupt::Feed),
    }
}

pub struct PackageManager {
    registry: PackageRegistry,
    compat: Arc<PlatformCompatibility>,
    library_feeds: Vec<Arc<dyn PackageFeed>>,
    mod_feeds: Vec<Arc<dyn PackageFeed>>,
    settings: ManagerSettings,
    reporter: Arc<dyn Reporter>,
}

impl std::fmt::Debug for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageManager")
            .field("host", self.compat.host())
            .field("packages", &self.registry.len())
            .field("library_feeds", &self.library_feeds)
            .field("mod_feeds", &self.mod_feeds)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl PackageManager {
    /// An empty manager with no feeds.
    pub fn new(compat: Arc<PlatformCompatibility>) -> Self {
        Self {
            registry: PackageRegistry::new(),
            compat,
            library_feeds: Vec::new(),
            mod_feeds: Vec::new(),
            settings: ManagerSettings::default(),
            reporter: Arc::new(NullReporter),
        }
    }

    /// Build a manager from configuration, opening every configured source.
    ///
    /// # Errors
    ///
    /// Returns a [`FeedError`] if a source cannot be opened.
    pub fn from_config(config: &ModloomConfig) -> Result<Self, FeedError> {
        let graph = CompatibilityGraph::builtin().with_edges(&config.compatibility);
        let compat = PlatformCompatibility::new(config.resolved_host_target(), &graph);

        let mut manager = Self::new(Arc::new(compat)).with_settings(ManagerSettings {
            allow_libraries: config.libraries.enabled,
            allow_mods: config.mods.enabled,
        });
        for source in &config.libraries.sources {
            manager.library_feeds.push(open_feed(source)?);
        }
        for source in &config.mods.sources {
            manager.mod_feeds.push(open_feed(source)?);
        }
        Ok(manager)
    }

    #[must_use]
    pub fn with_library_feed(mut self, feed: Arc<dyn PackageFeed>) -> Self {
        self.library_feeds.push(feed);
        self
    }

    #[must_use]
    pub fn with_mod_feed(mut self, feed: Arc<dyn PackageFeed>) -> Self {
        self.mod_feeds.push(feed);
        self
    }

    #[must_use]
    pub fn with_settings(mut self, settings: ManagerSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn settings(&self) -> ManagerSettings {
        self.settings
    }

    pub fn compatibility(&self) -> &PlatformCompatibility {
        &self.compat
    }

    pub fn reporter(&self) -> &Arc<dyn Reporter> {
        &self.reporter
    }

    /// Register a record.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateIdError`] if a record with the same id exists,
    /// whatever its origin.
    pub fn register(&self, record: Arc<LoadedPackage>) -> Result<(), DuplicateIdError> {
        self.registry.register(record)
    }

    /// Register records in order; earlier successes are kept on failure.
    ///
    /// # Errors
    ///
    /// Returns the first [`DuplicateIdError`].
    pub fn register_all(
        &self,
        records: impl IntoIterator<Item = Arc<LoadedPackage>>,
    ) -> Result<(), DuplicateIdError> {
        self.registry.register_all(records)
    }

    /// Turn host-provided modules into pseudo-packages and register them.
    ///
    /// All or nothing: duplicates within `specs` or against the registry fail
    /// the whole call before anything is registered.
    ///
    /// # Errors
    ///
    /// Returns [`DuplicateIdError`] naming the first conflicting id.
    pub fn register_host_modules(
        &self,
        specs: &[HostModuleSpec],
    ) -> Result<Vec<Arc<LoadedPackage>>, DuplicateIdError> {
        let records: Vec<_> = specs
            .iter()
            .map(|spec| Arc::new(LoadedPackage::host(spec)))
            .collect();
        self.registry.register_batch(records.clone())?;
        tracing::info!(count = records.len(), "registered host modules");
        Ok(records)
    }

    pub fn get(&self, id: &PackageId) -> Option<Arc<LoadedPackage>> {
        self.registry.get(id)
    }

    /// All registered records in registration order.
    pub fn packages(&self) -> Vec<Arc<LoadedPackage>> {
        self.registry.packages()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Resolve a single reference.
    ///
    /// Returns the cached record if the reference is already resolved. A
    /// registered package with the same id is reused when its version is in
    /// range and blocks resolution when it is not. Otherwise the enabled
    /// sources for the dependency's kind are searched in order; the highest
    /// in-range version with a build compatible with the host wins.
    ///
    /// Calls for the same reference are serialised: a caller that waited on
    /// an in-flight search observes its outcome. Once the sources have come
    /// back empty for a reference they are not queried for it again; later
    /// calls only look at the registry. The dependencies of the resolved
    /// package are not resolved.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Cancelled`] if `cancel` fires first. The
    /// reference then stays unresolved and nothing is registered.
    pub async fn resolve(
        &self,
        reference: &DependencyReference,
        cancel: &CancellationToken,
    ) -> Result<Option<Arc<LoadedPackage>>, ResolveError> {
        if let Some(record) = reference.resolved() {
            return Ok(Some(Arc::clone(record)));
        }

        let dependency = reference.dependency();
        let cancelled = || ResolveError::Cancelled {
            dependency: dependency.clone(),
        };
        let _gate = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(cancelled()),
            gate = reference.search_gate() => gate,
        };
        if let Some(record) = reference.resolved() {
            return Ok(Some(Arc::clone(record)));
        }

        let exhausted = reference.sources_exhausted();
        match self.find(dependency, cancel, !exhausted).await {
            Ok(record) => {
                let stored = reference.cell().get_or_init(|| async move { record }).await;
                Ok(Some(Arc::clone(stored)))
            }
            Err(Miss::NotFound) => {
                if !exhausted {
                    reference.mark_sources_exhausted();
                    tracing::debug!(dependency = %dependency, "dependency unresolved");
                    self.reporter.unresolved(dependency);
                }
                Ok(None)
            }
            Err(Miss::Cancelled) => Err(cancelled()),
        }
    }

    async fn find(
        &self,
        dependency: &PackageDependency,
        cancel: &CancellationToken,
        query_sources: bool,
    ) -> Result<Arc<LoadedPackage>, Miss> {
        if cancel.is_cancelled() {
            return Err(Miss::Cancelled);
        }

        if let Some(existing) = self.registry.get(&dependency.id) {
            self.reporter.resolving(dependency);
            return self.accept(dependency, existing);
        }
        if !query_sources {
            return Err(Miss::NotFound);
        }
        self.reporter.resolving(dependency);

        let feeds = match dependency.kind {
            DependencyKind::Library if self.settings.allow_libraries => &self.library_feeds,
            DependencyKind::Mod if self.settings.allow_mods => &self.mod_feeds,
            kind => {
                tracing::debug!(dependency = %dependency, %kind, "feed class disabled");
                return Err(Miss::NotFound);
            }
        };

        for feed in feeds {
            let source = &feed.source().name;
            match self.search(feed.as_ref(), dependency, cancel).await {
                Ok(Some((identity, build))) => {
                    if cancel.is_cancelled() {
                        return Err(Miss::Cancelled);
                    }
                    let record = Arc::new(LoadedPackage::from_feed(identity, build, source));
                    // Another reference may have registered the id meanwhile.
                    let stored = self.registry.get_or_insert(record);
                    return self.accept(dependency, stored);
                }
                Ok(None) => {
                    tracing::debug!(dependency = %dependency, %source, "no match in source");
                }
                Err(Interrupt::Cancelled) => return Err(Miss::Cancelled),
                Err(Interrupt::Feed(e)) => {
                    tracing::warn!(dependency = %dependency, %source, error = %e, "source failed, skipping");
                    self.reporter.source_failed(source, &e.to_string());
                }
            }
        }
        Err(Miss::NotFound)
    }

    fn accept(
        &self,
        dependency: &PackageDependency,
        record: Arc<LoadedPackage>,
    ) -> Result<Arc<LoadedPackage>, Miss> {
        if !dependency.accepts(record.version()) {
            tracing::debug!(
                dependency = %dependency,
                registered = %record.identity(),
                "registered version is out of range"
            );
            return Err(Miss::NotFound);
        }
        tracing::info!(dependency = %dependency, package = %record, origin = %record.origin(), "resolved");
        self.reporter
            .resolved(dependency, record.identity(), &record.origin().to_string());
        Ok(record)
    }

    async fn search(
        &self,
        feed: &dyn PackageFeed,
        dependency: &PackageDependency,
        cancel: &CancellationToken,
    ) -> Result<Option<(PackageIdentity, PackageBuild)>, Interrupt> {
        let mut versions = cancellable(cancel, feed.list_versions(&dependency.id)).await?;
        versions.retain(|v| dependency.accepts(v));
        versions.sort_unstable_by(|a, b| b.cmp(a));

        for version in versions {
            let identity = PackageIdentity::new(dependency.id.clone(), version);
            let builds = match cancellable(cancel, feed.fetch_builds(&identity)).await {
                Ok(builds) => builds,
                Err(Interrupt::Feed(FeedError::NotFound(_))) => continue,
                Err(e) => return Err(e),
            };
            if let Some(build) = self.compat.nearest_compatible(builds, |b| &b.target) {
                return Ok(Some((identity, build)));
            }
            tracing::debug!(package = %identity, host = %self.compat.host(), "no compatible build");
        }
        Ok(None)
    }

    /// Resolve every reference reachable from `roots`, layer by layer.
    ///
    /// References within a layer are resolved concurrently. Each reference
    /// and each package is visited once, so cycles terminate.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::Cancelled`] if `cancel` fires.
    pub async fn resolve_graph(
        &self,
        roots: &[Arc<DependencyReference>],
        cancel: &CancellationToken,
    ) -> Result<ResolutionReport, ResolveError> {
        let mut report = ResolutionReport::default();
        let mut seen_refs: HashSet<*const DependencyReference> = HashSet::new();
        let mut seen_packages: HashSet<String> = HashSet::new();

        let mut frontier: Vec<(Option<PackageIdentity>, Arc<DependencyReference>)> = roots
            .iter()
            .filter(|r| seen_refs.insert(Arc::as_ptr(*r)))
            .map(|r| (None, Arc::clone(r)))
            .collect();

        while !frontier.is_empty() {
            let results =
                futures::future::join_all(frontier.iter().map(|(_, r)| self.resolve(r, cancel))).await;

            let mut next = Vec::new();
            for ((required_by, reference), result) in frontier.into_iter().zip(results) {
                let Some(package) = result? else {
                    report.unresolved.push(UnresolvedDependency {
                        required_by,
                        dependency: reference.dependency().clone(),
                    });
                    continue;
                };
                if !seen_packages.insert(package.id().key().to_string()) {
                    continue;
                }
                for child in package.dependencies() {
                    if seen_refs.insert(Arc::as_ptr(child)) {
                        next.push((Some(package.identity().clone()), Arc::clone(child)));
                    }
                }
                report.resolved.push(package);
            }
            frontier = next;
        }

        Ok(report)
    }

    /// Fetch the binary payload of a feed-loaded package from its source.
    ///
    /// # Errors
    ///
    /// Fails for host pseudo-packages, for sources that are no longer
    /// configured, on feed errors and on cancellation.
    pub async fn fetch_payload(
        &self,
        package: &LoadedPackage,
        cancel: &CancellationToken,
    ) -> Result<Bytes, LoaderError> {
        let source_name = match package.origin() {
            PackageOrigin::Host => return Err(LoaderError::HostPackage(package.identity().clone())),
            PackageOrigin::Feed { source } => source,
        };
        let feed = self
            .library_feeds
            .iter()
            .chain(&self.mod_feeds)
            .find(|f| &f.source().name == source_name)
            .ok_or_else(|| LoaderError::UnknownSource {
                package: package.identity().clone(),
                source_name: source_name.clone(),
            })?;

        match cancellable(cancel, feed.fetch_payload(package.identity(), package.target())).await {
            Ok(bytes) => Ok(bytes),
            Err(Interrupt::Cancelled) => Err(LoaderError::Cancelled),
            Err(Interrupt::Feed(source)) => Err(LoaderError::Feed {
                package: package.identity().clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use modloom_schema::{PackageSource, PlatformTarget};
    use semver::Version;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory feed: id key -> versions -> builds.
    #[derive(Debug)]
    struct StaticFeed {
        source: PackageSource,
        packages: HashMap<String, Vec<(Version, Vec<PackageBuild>)>>,
        queries: AtomicUsize,
        broken: bool,
        hang: bool,
        slow: bool,
    }

    impl StaticFeed {
        fn new(name: &str) -> Self {
            Self {
                source: PackageSource::new(name, format!("/feeds/{name}")),
                packages: HashMap::new(),
                queries: AtomicUsize::new(0),
                broken: false,
                hang: false,
                slow: false,
            }
        }

        fn with(mut self, id: &str, version: &str, targets: &[&str], deps: &[(&str, &str)]) -> Self {
            let builds = targets
                .iter()
                .map(|t| PackageBuild {
                    target: PlatformTarget::new(t).unwrap(),
                    dependencies: deps
                        .iter()
                        .map(|(id, range)| PackageDependency::parse(id, range).unwrap())
                        .collect(),
                })
                .collect();
            self.packages
                .entry(id.to_lowercase())
                .or_default()
                .push((Version::parse(version).unwrap(), builds));
            self
        }

        fn broken(mut self) -> Self {
            self.broken = true;
            self
        }

        fn hanging(mut self) -> Self {
            self.hang = true;
            self
        }

        fn slow(mut self) -> Self {
            self.slow = true;
            self
        }

        fn queries(&self) -> usize {
            self.queries.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PackageFeed for StaticFeed {
        fn source(&self) -> &PackageSource {
            &self.source
        }

        async fn list_versions(&self, id: &PackageId) -> Result<Vec<Version>, FeedError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            if self.slow {
                tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            }
            if self.broken {
                return Err(FeedError::Status {
                    url: self.source.location.clone(),
                    status: 503,
                });
            }
            Ok(self
                .packages
                .get(id.key())
                .map(|vs| vs.iter().map(|(v, _)| v.clone()).collect())
                .unwrap_or_default())
        }

        async fn fetch_builds(&self, identity: &PackageIdentity) -> Result<Vec<PackageBuild>, FeedError> {
            self.packages
                .get(identity.id.key())
                .and_then(|vs| vs.iter().find(|(v, _)| v == &identity.version))
                .map(|(_, builds)| builds.clone())
                .ok_or_else(|| FeedError::NotFound(identity.to_string()))
        }

        async fn fetch_payload(
            &self,
            identity: &PackageIdentity,
            target: &PlatformTarget,
        ) -> Result<Bytes, FeedError> {
            Ok(Bytes::from(format!("{identity}/{target}")))
        }
    }

    fn compat(host: &str) -> Arc<PlatformCompatibility> {
        Arc::new(PlatformCompatibility::new(
            PlatformTarget::new(host).unwrap(),
            &CompatibilityGraph::builtin(),
        ))
    }

    fn reference(id: &str, range: &str) -> DependencyReference {
        DependencyReference::new(PackageDependency::parse(id, range).unwrap())
    }

    fn host_spec(id: &str, version: &str) -> HostModuleSpec {
        HostModuleSpec {
            id: PackageId::new(id).unwrap(),
            version: Version::parse(version).unwrap(),
            target: PlatformTarget::new("net6.0").unwrap(),
            dependencies: vec![],
        }
    }

    #[tokio::test]
    async fn test_picks_highest_version_in_range() {
        let feed = StaticFeed::new("main")
            .with("Lib", "1.0.0", &["net6.0"], &[])
            .with("Lib", "1.5.0", &["netstandard2.0"], &[])
            .with("Lib", "2.0.0", &["net6.0"], &[]);
        let manager = PackageManager::new(compat("net6.0")).with_library_feed(Arc::new(feed));

        let r = reference("Lib", ">=1.0, <2.0");
        let pkg = manager
            .resolve(&r, &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pkg.version(), &Version::new(1, 5, 0));
        assert_eq!(pkg.target().as_str(), "netstandard2.0");
        assert!(r.is_resolved());
        assert_eq!(manager.len(), 1);
    }

    #[tokio::test]
    async fn test_skips_versions_without_compatible_build() {
        let feed = StaticFeed::new("main")
            .with("lib", "1.0.0", &["net6.0"], &[])
            .with("lib", "1.1.0", &["net8.0"], &[]);
        let manager = PackageManager::new(compat("net6.0")).with_library_feed(Arc::new(feed));

        let pkg = manager
            .resolve(&reference("lib", "^1"), &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pkg.version(), &Version::new(1, 0, 0));
    }

    #[tokio::test]
    async fn test_disabled_mod_class_is_not_queried() {
        let mods = Arc::new(StaticFeed::new("mods").with("Other", "1.0.0", &["any"], &[]));
        let manager = PackageManager::new(compat("net8.0"))
            .with_mod_feed(mods.clone())
            .with_settings(ManagerSettings {
                allow_libraries: true,
                allow_mods: false,
            });

        let r = DependencyReference::new(
            PackageDependency::parse("Other", "*")
                .unwrap()
                .with_kind(DependencyKind::Mod),
        );
        let result = manager.resolve(&r, &CancellationToken::new()).await.unwrap();
        assert!(result.is_none());
        assert!(!r.is_resolved());
        assert_eq!(mods.queries(), 0);
    }

    #[tokio::test]
    async fn test_resolution_is_idempotent() {
        let feed = Arc::new(StaticFeed::new("main").with("lib", "1.0.0", &["any"], &[]));
        let manager = PackageManager::new(compat("net8.0")).with_library_feed(feed.clone());
        let r = reference("lib", "*");
        let cancel = CancellationToken::new();

        let (a, b) = tokio::join!(manager.resolve(&r, &cancel), manager.resolve(&r, &cancel));
        let a = a.unwrap().unwrap();
        let b = b.unwrap().unwrap();
        let c = manager.resolve(&r, &cancel).await.unwrap().unwrap();

        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &c));
        assert_eq!(feed.queries(), 1);
    }

    #[derive(Default)]
    struct CountingReporter {
        unresolved: AtomicUsize,
    }

    impl Reporter for CountingReporter {
        fn resolving(&self, _: &PackageDependency) {}
        fn resolved(&self, _: &PackageDependency, _: &PackageIdentity, _: &str) {}
        fn unresolved(&self, _: &PackageDependency) {
            self.unresolved.fetch_add(1, Ordering::SeqCst);
        }
        fn source_failed(&self, _: &str, _: &str) {}
        fn job_finished(&self, _: &crate::JobReport) {}
        fn summary(&self, _: usize, _: &str, _: f64) {}
    }

    #[tokio::test]
    async fn test_concurrent_misses_share_one_query() {
        let feed = Arc::new(StaticFeed::new("main").with("lib", "1.0.0", &["any"], &[]).slow());
        let reporter = Arc::new(CountingReporter::default());
        let manager = PackageManager::new(compat("net8.0"))
            .with_library_feed(feed.clone())
            .with_reporter(reporter.clone());
        let r = reference("lib", ">=5.0");
        let cancel = CancellationToken::new();

        let (a, b) = tokio::join!(manager.resolve(&r, &cancel), manager.resolve(&r, &cancel));
        assert!(a.unwrap().is_none());
        assert!(b.unwrap().is_none());
        assert_eq!(feed.queries(), 1);
        assert_eq!(reporter.unresolved.load(Ordering::SeqCst), 1);
        assert!(r.sources_exhausted());

        // Sources are not asked again, but the registry still is.
        assert!(manager.resolve(&r, &cancel).await.unwrap().is_none());
        assert_eq!(feed.queries(), 1);

        manager.register_host_modules(&[host_spec("lib", "5.1.0")]).unwrap();
        let pkg = manager.resolve(&r, &cancel).await.unwrap().unwrap();
        assert!(pkg.is_host());
        assert_eq!(feed.queries(), 1);
    }

    #[tokio::test]
    async fn test_waiter_observes_in_flight_resolution() {
        let feed = Arc::new(StaticFeed::new("main").with("lib", "1.0.0", &["any"], &[]).slow());
        let manager = PackageManager::new(compat("net8.0")).with_library_feed(feed.clone());
        let r = reference("lib", "*");
        let cancel = CancellationToken::new();

        let (a, b) = tokio::join!(manager.resolve(&r, &cancel), manager.resolve(&r, &cancel));
        assert!(Arc::ptr_eq(&a.unwrap().unwrap(), &b.unwrap().unwrap()));
        assert_eq!(feed.queries(), 1);
    }

    #[tokio::test]
    async fn test_registered_package_is_reused_without_query() {
        let feed = Arc::new(StaticFeed::new("main").with("Game.Core", "9.0.0", &["any"], &[]));
        let manager = PackageManager::new(compat("net6.0")).with_library_feed(feed.clone());
        manager
            .register_host_modules(&[host_spec("Game.Core", "1.2.0")])
            .unwrap();
        let cancel = CancellationToken::new();

        let pkg = manager
            .resolve(&reference("game.core", "^1.0"), &cancel)
            .await
            .unwrap()
            .unwrap();
        assert!(pkg.is_host());

        // Ids are unique per session: an out-of-range registered version blocks resolution.
        let miss = manager
            .resolve(&reference("Game.Core", ">=2.0"), &cancel)
            .await
            .unwrap();
        assert!(miss.is_none());
        assert_eq!(feed.queries(), 0);
    }

    #[tokio::test]
    async fn test_failing_source_is_skipped() {
        let broken = Arc::new(StaticFeed::new("down").broken());
        let healthy = Arc::new(StaticFeed::new("up").with("lib", "1.0.0", &["any"], &[]));
        let manager = PackageManager::new(compat("net8.0"))
            .with_library_feed(broken.clone())
            .with_library_feed(healthy);

        let pkg = manager
            .resolve(&reference("lib", "*"), &CancellationToken::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            pkg.origin(),
            &PackageOrigin::Feed {
                source: "up".into()
            }
        );
        assert_eq!(broken.queries(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_leaves_reference_unresolved() {
        let feed = Arc::new(StaticFeed::new("slow").hanging());
        let manager = PackageManager::new(compat("net8.0")).with_library_feed(feed);
        let r = reference("lib", "*");
        let cancel = CancellationToken::new();

        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let err = manager.resolve(&r, &cancel).await.unwrap_err();
        assert!(matches!(err, ResolveError::Cancelled { .. }));
        assert!(!r.is_resolved());
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_host_modules_are_atomic() {
        let manager = PackageManager::new(compat("net8.0"));
        manager.register_host_modules(&[host_spec("a", "1.0.0")]).unwrap();

        let err = manager
            .register_host_modules(&[host_spec("b", "1.0.0"), host_spec("A", "2.0.0")])
            .unwrap_err();
        assert_eq!(err.id, "a");
        assert_eq!(manager.len(), 1);
        assert!(manager.get(&PackageId::new("b").unwrap()).is_none());
    }

    #[tokio::test]
    async fn test_resolve_graph_walks_transitively() {
        let feed = StaticFeed::new("main")
            .with("app", "1.0.0", &["any"], &[("core", "^1"), ("util", "^1")])
            .with("core", "1.0.0", &["any"], &[("util", "^1"), ("ghost", "*")])
            .with("util", "1.2.0", &["any"], &[("core", "^1")]);
        let manager = PackageManager::new(compat("net8.0")).with_library_feed(Arc::new(feed));

        let roots = vec![Arc::new(reference("app", "*"))];
        let report = manager
            .resolve_graph(&roots, &CancellationToken::new())
            .await
            .unwrap();

        let mut ids: Vec<&str> = report.resolved.iter().map(|p| p.id().as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["app", "core", "util"]);
        assert_eq!(report.unresolved.len(), 1);
        assert_eq!(report.unresolved[0].dependency.id, "ghost");
        assert_eq!(
            report.unresolved[0].required_by.as_ref().map(|p| p.id.as_str()),
            Some("core")
        );
        assert!(!roots[0].all_dependencies_loaded());
    }

    #[tokio::test]
    async fn test_fetch_payload_uses_origin_source() {
        let feed = StaticFeed::new("main").with("lib", "1.0.0", &["net6.0"], &[]);
        let manager = PackageManager::new(compat("net8.0")).with_library_feed(Arc::new(feed));
        let cancel = CancellationToken::new();
        let pkg = manager
            .resolve(&reference("lib", "*"), &cancel)
            .await
            .unwrap()
            .unwrap();

        let bytes = manager.fetch_payload(&pkg, &cancel).await.unwrap();
        assert_eq!(&bytes[..], b"lib@1.0.0/net6.0");

        let host = manager.register_host_modules(&[host_spec("game", "1.0.0")]).unwrap();
        assert!(matches!(
            manager.fetch_payload(&host[0], &cancel).await,
            Err(LoaderError::HostPackage(_))
        ));
    }
}
