use crate::feed::FeedError;
use crate::module::{CodecError, ModuleId};
use crate::pipeline::PipelineError;
use crate::plan::CycleError;
use crate::pool::PoolError;
use crate::registry::DuplicateIdError;
use modloom_schema::{PackageDependency, PackageIdentity, SchemaError};
use thiserror::Error;

/// Failure of a single resolution.
///
/// Not finding a satisfying package is not an error; `resolve` returns
/// `Ok(None)` for that.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Resolution of {dependency} was cancelled")]
    Cancelled { dependency: PackageDependency },
}

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Duplicate(#[from] DuplicateIdError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Cycle(#[from] CycleError),

    #[error("Failed to open source: {0}")]
    Source(#[from] FeedError),

    #[error("Failed to fetch {package}: {source}")]
    Feed {
        package: PackageIdentity,
        #[source]
        source: FeedError,
    },

    #[error("{package} came from source '{source_name}', which is not configured")]
    UnknownSource {
        package: PackageIdentity,
        source_name: String,
    },

    #[error("{0} is provided by the host and has no payload to fetch")]
    HostPackage(PackageIdentity),

    #[error("Failed to parse module {module}: {source}")]
    Codec {
        module: ModuleId,
        #[source]
        source: CodecError,
    },

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("Operation cancelled")]
    Cancelled,
}
