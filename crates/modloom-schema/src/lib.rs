//! Shared value types for modloom.
//!
//! Everything in this crate is an immutable value: package identities,
//! version ranges, dependency declarations, platform targets, package
//! sources and the on-disk configuration / manifest schemas. The stateful
//! machinery (registry, feeds, module pool, patch pipeline) lives in
//! `modloom-core`.

pub mod config;
pub mod error;
pub mod manifest;
pub mod platform;
pub mod range;
pub mod source;
pub mod types;

// Re-exports
pub use config::{CompatibilityEdge, FeedConfig, ModloomConfig};
pub use error::SchemaError;
pub use manifest::{HostManifest, HostModuleSpec, ModManifest};
pub use platform::PlatformTarget;
pub use range::VersionRange;
pub use semver::Version;
pub use source::{PackageSource, SourceLocation};
pub use types::{DependencyKind, PackageDependency, PackageId, PackageIdentity};

/// Environment variable that overrides the detected host platform target.
pub const HOST_TARGET_ENV: &str = "MODLOOM_HOST_TARGET";
