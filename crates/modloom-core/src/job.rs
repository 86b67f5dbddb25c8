//! A single patcher applied to a single module.

use crate::module::{Module, ModuleId};
use crate::patch::{PatchTarget, Patcher};
use crate::pool::{ModulePool, PoolError};
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Created,
    Preparing,
    Patching,
    CleaningUp,
    Finished,
}

/// Terminal result of a patch job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Edits were kept.
    Committed,
    /// The patcher ran but reported no change; the module is untouched.
    Unchanged,
    /// `prepare` declined the target.
    Skipped,
    /// `cleanup` asked for the edits to be discarded.
    RolledBack,
    /// A step failed or panicked; the module was restored.
    Failed { reason: String },
}

impl JobOutcome {
    /// Completed without modifying the module.
    pub fn is_no_op(&self) -> bool {
        matches!(self, Self::Unchanged | Self::Skipped)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl std::fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Committed => write!(f, "committed"),
            Self::Unchanged => write!(f, "unchanged"),
            Self::Skipped => write!(f, "skipped"),
            Self::RolledBack => write!(f, "rolled back"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobReport {
    pub patcher: String,
    pub module: ModuleId,
    pub outcome: JobOutcome,
}

pub struct PatchJob {
    patcher: Arc<dyn Patcher>,
    target: PatchTarget,
    state: JobState,
}

impl std::fmt::Debug for PatchJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PatchJob")
            .field("patcher", &self.patcher.name())
            .field("target", &self.target)
            .field("state", &self.state)
            .finish()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

/// Run one patcher step, turning errors and panics into a reason string.
fn guarded<T>(step: impl FnOnce() -> anyhow::Result<T>) -> Result<T, String> {
    match catch_unwind(AssertUnwindSafe(step)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(format!("{e:#}")),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

impl PatchJob {
    pub fn new(patcher: Arc<dyn Patcher>, target: PatchTarget) -> Self {
        Self {
            patcher,
            target,
            state: JobState::Created,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn target(&self) -> &PatchTarget {
        &self.target
    }

    pub fn patcher_name(&self) -> &str {
        self.patcher.name()
    }

    /// Run the job to completion under the module's lock.
    ///
    /// Blocks while another job holds the module. Patcher failures are
    /// contained in the returned outcome; the lock is released before
    /// returning.
    ///
    /// # Errors
    ///
    /// Returns a [`PoolError`] if the module is not loaded or already has an
    /// outstanding snapshot.
    pub fn run(mut self, pool: &ModulePool) -> Result<JobReport, PoolError> {
        let id = self.target.module().clone();
        let lock = pool.lock(&id)?;

        self.state = JobState::Preparing;
        let outcome = match guarded(|| self.patcher.prepare(&id)) {
            Ok(true) => self.apply(pool, &id)?,
            Ok(false) => JobOutcome::Skipped,
            Err(reason) => JobOutcome::Failed { reason },
        };
        drop(lock);
        self.state = JobState::Finished;

        match &outcome {
            JobOutcome::Failed { reason } => {
                tracing::warn!(patcher = self.patcher.name(), module = %id, %reason, "patch job failed");
            }
            outcome => {
                tracing::debug!(patcher = self.patcher.name(), module = %id, %outcome, "patch job finished");
            }
        }

        Ok(JobReport {
            patcher: self.patcher.name().to_string(),
            module: id,
            outcome,
        })
    }

    fn apply(&mut self, pool: &ModulePool, id: &ModuleId) -> Result<JobOutcome, PoolError> {
        let mut working = pool.snapshot(id)?;

        self.state = JobState::Patching;
        let changed = match guarded(|| self.patch(&mut working, id)) {
            Ok(changed) => changed,
            Err(reason) => {
                pool.restore(id)?;
                return Ok(JobOutcome::Failed { reason });
            }
        };

        self.state = JobState::CleaningUp;
        let outcome = match guarded(|| self.patcher.cleanup(id)) {
            Ok(true) if changed => {
                pool.commit(id, working)?;
                return Ok(JobOutcome::Committed);
            }
            Ok(true) => JobOutcome::Unchanged,
            Ok(false) => JobOutcome::RolledBack,
            Err(reason) => JobOutcome::Failed { reason },
        };
        pool.restore(id)?;
        Ok(outcome)
    }

    fn patch(&self, module: &mut Module, id: &ModuleId) -> anyhow::Result<bool> {
        let mut changed = self.patcher.patch_module(module, id)?;

        // Look types up after patch_module, which may have replaced the module.
        for name in self.target.types() {
            let Some(ty) = module.type_by_name_mut(name) else {
                tracing::debug!(patcher = self.patcher.name(), module = %id, type_name = %name, "declared type not present");
                continue;
            };
            changed |= self.patcher.patch_type(ty, id)?;
        }
        Ok(changed)
    }
}
