//! Console implementation of the core `Reporter`.
//!
//! Progress goes to stderr so stdout only carries command results.

use crossterm::style::Stylize;
use modloom_core::job::{JobOutcome, JobReport};
use modloom_core::Reporter;
use modloom_schema::{PackageDependency, PackageIdentity};

/// Prints resolution and patch events to stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleReporter {
    /// Also print `resolving` events.
    pub verbose: bool,
}

impl ConsoleReporter {
    /// Create a reporter.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl Reporter for ConsoleReporter {
    fn resolving(&self, dependency: &PackageDependency) {
        if self.verbose {
            eprintln!("  {} {dependency}", "resolving".dark_grey());
        }
    }

    fn resolved(&self, dependency: &PackageDependency, package: &PackageIdentity, origin: &str) {
        eprintln!(
            "  {} {} -> {} {}",
            "✓".green(),
            dependency.id,
            package.to_string().bold(),
            format!("({origin})").dark_grey()
        );
    }

    fn unresolved(&self, dependency: &PackageDependency) {
        eprintln!("  {} {dependency}", "✗".red());
    }

    fn source_failed(&self, source: &str, error: &str) {
        eprintln!("  {} source '{source}' skipped: {error}", "!".yellow());
    }

    fn job_finished(&self, report: &JobReport) {
        let mark = match report.outcome {
            JobOutcome::Committed => "✓".green(),
            JobOutcome::Unchanged | JobOutcome::Skipped => "-".dark_grey(),
            JobOutcome::RolledBack => "↺".yellow(),
            JobOutcome::Failed { .. } => "✗".red(),
        };
        eprintln!("  {mark} {} on {}: {}", report.patcher, report.module, report.outcome);
    }

    fn summary(&self, count: usize, action: &str, elapsed_secs: f64) {
        eprintln!(
            "{}",
            format!("{count} {action} in {elapsed_secs:.2}s").dark_grey()
        );
    }
}
