//! Runs every registered patcher over the module pool.
//!
//! Jobs are ordered by patcher priority, then registration order. Jobs for
//! the same module run one after another on a blocking task, so each sees
//! the previous job's committed result; different modules proceed in
//! parallel.

use crate::job::{JobOutcome, JobReport, PatchJob};
use crate::module::ModuleId;
use crate::patch::Patcher;
use crate::pool::{ModulePool, PoolError};
use crate::reporter::Reporter;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::task::JoinSet;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error("Patch task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[derive(Debug, Default, Clone)]
pub struct PipelineReport {
    /// Grouped by module id; within a module, in execution order.
    pub jobs: Vec<JobReport>,
}

impl PipelineReport {
    pub fn failures(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs.iter().filter(|r| r.outcome.is_failure())
    }

    pub fn committed(&self) -> impl Iterator<Item = &JobReport> {
        self.jobs
            .iter()
            .filter(|r| r.outcome == JobOutcome::Committed)
    }

    pub fn for_module<'a>(&'a self, module: &'a ModuleId) -> impl Iterator<Item = &'a JobReport> {
        self.jobs.iter().filter(move |r| &r.module == module)
    }
}

#[derive(Debug)]
pub struct PatchPipeline {
    pool: Arc<ModulePool>,
    patchers: Vec<Arc<dyn Patcher>>,
}

impl PatchPipeline {
    pub fn new(pool: Arc<ModulePool>) -> Self {
        Self {
            pool,
            patchers: Vec::new(),
        }
    }

    pub fn add(&mut self, patcher: Arc<dyn Patcher>) -> &mut Self {
        self.patchers.push(patcher);
        self
    }

    pub fn len(&self) -> usize {
        self.patchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patchers.is_empty()
    }

    /// Jobs grouped by module, each group in execution order.
    fn plan(&self) -> BTreeMap<ModuleId, Vec<PatchJob>> {
        let mut ordered: Vec<&Arc<dyn Patcher>> = self.patchers.iter().collect();
        // Stable: equal priorities keep registration order.
        ordered.sort_by_key(|p| p.priority());

        let mut groups: BTreeMap<ModuleId, Vec<PatchJob>> = BTreeMap::new();
        for patcher in ordered {
            for target in patcher.targets() {
                groups
                    .entry(target.module().clone())
                    .or_default()
                    .push(PatchJob::new(Arc::clone(patcher), target));
            }
        }
        groups
    }

    /// Run all jobs.
    ///
    /// Jobs targeting a module that is not in the pool are reported as
    /// failed. Patcher errors never abort the run.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] on a structural pool violation or if a
    /// patch task could not be joined.
    pub async fn run(&self, reporter: &dyn Reporter) -> Result<PipelineReport, PipelineError> {
        let started = Instant::now();
        let mut finished: BTreeMap<ModuleId, Vec<JobReport>> = BTreeMap::new();
        let mut tasks = JoinSet::new();

        for (module, jobs) in self.plan() {
            if !self.pool.contains(&module) {
                tracing::warn!(module = %module, jobs = jobs.len(), "patch target not loaded");
                let reports = jobs
                    .iter()
                    .map(|job| JobReport {
                        patcher: job.patcher_name().to_string(),
                        module: module.clone(),
                        outcome: JobOutcome::Failed {
                            reason: "module not loaded".to_string(),
                        },
                    })
                    .collect::<Vec<_>>();
                for report in &reports {
                    reporter.job_finished(report);
                }
                finished.insert(module, reports);
                continue;
            }

            let pool = Arc::clone(&self.pool);
            tasks.spawn_blocking(move || {
                let reports = jobs
                    .into_iter()
                    .map(|job| job.run(&pool))
                    .collect::<Result<Vec<_>, PoolError>>()?;
                Ok::<_, PoolError>((module, reports))
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (module, reports) = joined??;
            for report in &reports {
                reporter.job_finished(report);
            }
            finished.insert(module, reports);
        }

        let report = PipelineReport {
            jobs: finished.into_values().flatten().collect(),
        };
        tracing::info!(
            jobs = report.jobs.len(),
            failed = report.failures().count(),
            "patch pipeline finished"
        );
        reporter.summary(report.jobs.len(), "patched", started.elapsed().as_secs_f64());
        Ok(report)
    }
}
