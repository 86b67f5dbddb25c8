//! Reporter trait for dependency injection
//!
//! This trait allows the core to report resolution and patching progress
//! without being coupled to a specific console or GUI implementation.
//! Structured diagnostics still go through `tracing`; the reporter carries
//! the user-facing events.

use crate::job::JobReport;
use modloom_schema::{PackageDependency, PackageIdentity};

pub trait Reporter: Send + Sync {
    /// A dependency is about to be resolved.
    fn resolving(&self, dependency: &PackageDependency);

    /// A dependency was satisfied by `package`, found in `origin`.
    fn resolved(&self, dependency: &PackageDependency, package: &PackageIdentity, origin: &str);

    /// No enabled source could satisfy the dependency.
    fn unresolved(&self, dependency: &PackageDependency);

    /// A source failed and was skipped.
    fn source_failed(&self, source: &str, error: &str);

    /// A patch job reached its terminal outcome.
    fn job_finished(&self, report: &JobReport);

    /// Display a final summary of a batch of operations.
    fn summary(&self, count: usize, action: &str, elapsed_secs: f64);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn resolving(&self, dependency: &PackageDependency) {
        (**self).resolving(dependency);
    }
    fn resolved(&self, dependency: &PackageDependency, package: &PackageIdentity, origin: &str) {
        (**self).resolved(dependency, package, origin);
    }
    fn unresolved(&self, dependency: &PackageDependency) {
        (**self).unresolved(dependency);
    }
    fn source_failed(&self, source: &str, error: &str) {
        (**self).source_failed(source, error);
    }
    fn job_finished(&self, report: &JobReport) {
        (**self).job_finished(report);
    }
    fn summary(&self, count: usize, action: &str, elapsed_secs: f64) {
        (**self).summary(count, action, elapsed_secs);
    }
}

/// A no-op reporter for silent operations (e.g., testing).
#[derive(Debug, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn resolving(&self, _: &PackageDependency) {}
    fn resolved(&self, _: &PackageDependency, _: &PackageIdentity, _: &str) {}
    fn unresolved(&self, _: &PackageDependency) {}
    fn source_failed(&self, _: &str, _: &str) {}
    fn job_finished(&self, _: &JobReport) {}
    fn summary(&self, _: usize, _: &str, _: f64) {}
}
