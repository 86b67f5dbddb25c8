//! The loader session.
//!
//! A [`LoaderContext`] owns everything one loading session needs: the
//! package manager (registry, feeds, compatibility), the module pool and the
//! module codec. Typical flow:
//!
//! 1. [`ingest_host_modules`](LoaderContext::ingest_host_modules) and
//!    [`insert_host_module`](LoaderContext::insert_host_module)
//! 2. [`resolve`](LoaderContext::resolve) the mods' dependency references
//! 3. [`load_modules`](LoaderContext::load_modules) for what was resolved
//! 4. [`run_patchers`](LoaderContext::run_patchers)
//! 5. [`emit`](LoaderContext::emit) the patched images

use crate::error::LoaderError;
use crate::manager::{PackageManager, ResolutionReport};
use crate::module::{Module, ModuleCodec, ModuleId, PostcardCodec};
use crate::package::LoadedPackage;
use crate::patch::Patcher;
use crate::pipeline::{PatchPipeline, PipelineReport};
use crate::plan;
use crate::pool::ModulePool;
use crate::reference::DependencyReference;
use crate::reporter::Reporter;
use modloom_schema::{HostModuleSpec, ModloomConfig, PackageIdentity};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct LoaderContext {
    manager: PackageManager,
    pool: Arc<ModulePool>,
    codec: Arc<dyn ModuleCodec>,
}

impl LoaderContext {
    pub fn new(manager: PackageManager) -> Self {
        Self {
            manager,
            pool: Arc::new(ModulePool::new()),
            codec: Arc::new(PostcardCodec),
        }
    }

    /// Open every configured source and set up an empty session.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Source`] if a source cannot be opened.
    pub fn from_config(config: &ModloomConfig) -> Result<Self, LoaderError> {
        Ok(Self::new(PackageManager::from_config(config)?))
    }

    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn ModuleCodec>) -> Self {
        self.codec = codec;
        self
    }

    #[must_use]
    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.manager = self.manager.with_reporter(reporter);
        self
    }

    pub fn manager(&self) -> &PackageManager {
        &self.manager
    }

    pub fn pool(&self) -> &Arc<ModulePool> {
        &self.pool
    }

    /// Register host-provided modules as pseudo-packages.
    ///
    /// # Errors
    ///
    /// Any duplicate identity is fatal and nothing is registered.
    pub fn ingest_host_modules(
        &self,
        specs: &[HostModuleSpec],
    ) -> Result<Vec<Arc<LoadedPackage>>, LoaderError> {
        Ok(self.manager.register_host_modules(specs)?)
    }

    /// Place an already-parsed host module in the pool.
    ///
    /// # Errors
    ///
    /// Fails if a module with the same id is already loaded.
    pub fn insert_host_module(&self, id: ModuleId, module: Module) -> Result<(), LoaderError> {
        Ok(self.pool.insert(id, module)?)
    }

    /// Resolve everything reachable from `roots`.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Resolve`] on cancellation.
    pub async fn resolve(
        &self,
        roots: &[Arc<DependencyReference>],
        cancel: &CancellationToken,
    ) -> Result<ResolutionReport, LoaderError> {
        Ok(self.manager.resolve_graph(roots, cancel).await?)
    }

    /// Load layers for `packages`, dependencies first.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Cycle`] if the packages form a cycle.
    pub fn load_order(
        &self,
        packages: &[Arc<LoadedPackage>],
    ) -> Result<Vec<Vec<PackageIdentity>>, LoaderError> {
        Ok(plan::load_order(packages)?)
    }

    /// Fetch, parse and pool the modules of feed-loaded packages.
    ///
    /// Host pseudo-packages and packages whose module is already in the pool
    /// are skipped. Payloads are fetched concurrently. Returns the ids of the
    /// modules added.
    ///
    /// # Errors
    ///
    /// Fails on the first fetch, parse or insert error.
    pub async fn load_modules(
        &self,
        packages: &[Arc<LoadedPackage>],
        cancel: &CancellationToken,
    ) -> Result<Vec<ModuleId>, LoaderError> {
        let pending: Vec<&Arc<LoadedPackage>> = packages
            .iter()
            .filter(|p| !p.is_host() && !self.pool.contains(&ModuleId::from(p.id())))
            .collect();

        let payloads = futures::future::try_join_all(pending.iter().map(|package| async move {
            let bytes = self.manager.fetch_payload(package, cancel).await?;
            Ok::<_, LoaderError>((*package, bytes))
        }))
        .await?;

        let mut loaded = Vec::with_capacity(payloads.len());
        for (package, bytes) in payloads {
            let id = ModuleId::from(package.id());
            let module = self
                .codec
                .parse(&bytes)
                .map_err(|source| LoaderError::Codec {
                    module: id.clone(),
                    source,
                })?;
            self.pool.insert(id.clone(), module)?;
            tracing::info!(package = %package, module = %id, "module loaded");
            loaded.push(id);
        }
        Ok(loaded)
    }

    /// Run `patchers` over the pool.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::Pipeline`] on structural pool violations.
    pub async fn run_patchers(
        &self,
        patchers: impl IntoIterator<Item = Arc<dyn Patcher>>,
    ) -> Result<PipelineReport, LoaderError> {
        let mut pipeline = PatchPipeline::new(Arc::clone(&self.pool));
        for patcher in patchers {
            pipeline.add(patcher);
        }
        Ok(pipeline.run(self.manager.reporter().as_ref()).await?)
    }

    /// Serialize the current version of a module.
    ///
    /// # Errors
    ///
    /// Fails if the module is not loaded or cannot be encoded.
    pub fn emit(&self, id: &ModuleId) -> Result<Vec<u8>, LoaderError> {
        Ok(self.pool.serialize(id, self.codec.as_ref())?)
    }
}
