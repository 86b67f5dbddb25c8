//! modloom core.
//!
//! Two coupled subsystems live here:
//!
//! - **Dependency resolution**: [`PackageManager`] resolves
//!   [`DependencyReference`]s against configured [`feed::PackageFeed`]s,
//!   choosing the nearest compatible platform build through
//!   [`PlatformCompatibility`].
//! - **Pre-patch pipeline**: resolved packages' modules are parsed into the
//!   [`ModulePool`], and every [`Patcher`] target becomes a [`PatchJob`] run
//!   under that module's lock with snapshot/rollback.
//!
//! [`LoaderContext`] ties both together as an explicit session object.

pub mod compat;
pub mod config;
pub mod context;
pub mod error;
pub mod feed;
pub mod job;
pub mod manager;
pub mod module;
pub mod package;
pub mod patch;
pub mod pipeline;
pub mod plan;
pub mod pool;
pub mod reference;
pub mod registry;
pub mod reporter;

pub use compat::{CompatibilityGraph, PlatformCompatibility};
pub use context::LoaderContext;
pub use error::{LoaderError, ResolveError};
pub use job::{JobOutcome, JobReport, PatchJob};
pub use manager::{ManagerSettings, PackageManager, ResolutionReport, UnresolvedDependency};
pub use module::{
    CodecError, Member, MemberKind, Module, ModuleCodec, ModuleId, PostcardCodec, TypeDef, TypeId,
};
pub use package::{LoadedPackage, PackageOrigin};
pub use patch::{PatchTarget, Patcher};
pub use pipeline::{PatchPipeline, PipelineError, PipelineReport};
pub use pool::{ModulePool, PoolError};
pub use reference::DependencyReference;
pub use registry::{DuplicateIdError, PackageRegistry};
pub use reporter::{NullReporter, Reporter};

pub use modloom_schema as schema;
pub use tokio_util::sync::CancellationToken;

/// User Agent string for feed requests
pub const USER_AGENT: &str = concat!("modloom-core/", env!("CARGO_PKG_VERSION"));
