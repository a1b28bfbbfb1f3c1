//! The shrink cascade: ordered, recoverable deletions that free disk space.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use peerdex_config::components::ShrinkStep;
use peerdex_core::{NodeEvent, ServiceResult, Switchboard};
use tracing::{debug, info, warn};

use crate::sampler::ResourceSampler;

/// What one cascade step did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepResult {
    /// The step deleted data
    Executed,
    /// Nothing to do, e.g. no citation index or small crawl queues
    NotApplicable,
    /// The step failed; the cascade went on with the next one
    Failed(String),
}

/// Outcome of one cascade pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShrinkReport {
    pub steps: Vec<(ShrinkStep, StepResult)>,
    /// Both disk axes were AMPLE when the cascade stopped
    pub recovered: bool,
}

impl ShrinkReport {
    pub fn ran(&self, step: ShrinkStep) -> bool {
        self.steps.iter().any(|(s, _)| *s == step)
    }
}

/// Clears `running` when the pass ends, even if it unwinds.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs the configured steps in order, one pass at a time.
pub struct ShrinkCascade {
    switchboard: Arc<Switchboard>,
    running: AtomicBool,
}

impl ShrinkCascade {
    pub fn new(switchboard: Arc<Switchboard>) -> Self {
        Self {
            switchboard,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Run one pass. Returns `None` if another pass is in progress.
    ///
    /// After every step the disk axes are read again and the pass stops as
    /// soon as both are AMPLE. The pass never starts over; a node still short
    /// on disk after the last step waits for the next tick.
    pub async fn run(&self, sampler: &ResourceSampler) -> Option<ShrinkReport> {
        let Some(_guard) = RunGuard::acquire(&self.running) else {
            debug!("shrink cascade already running");
            return None;
        };

        let mut report = ShrinkReport::default();
        for step in sampler.config().shrink_steps.clone() {
            let result = match self.execute(step, sampler).await {
                Ok(true) => StepResult::Executed,
                Ok(false) => StepResult::NotApplicable,
                Err(e) => StepResult::Failed(e.to_string()),
            };

            match &result {
                StepResult::Executed => info!(step = %step, "shrink step executed"),
                StepResult::NotApplicable => debug!(step = %step, "shrink step not applicable"),
                StepResult::Failed(error) => warn!(step = %step, error = %error, "shrink step failed"),
            }
            if result != StepResult::NotApplicable {
                self.switchboard.emit(NodeEvent::ShrinkStepExecuted {
                    step: step.name().to_string(),
                    success: result == StepResult::Executed,
                });
            }
            report.steps.push((step, result));

            sampler.invalidate_disk_used();
            let disk_free = sampler.disk_free().await;
            let disk_used = sampler.disk_used().await;
            if disk_free.state.is_ample() && disk_used.state.is_ample() {
                info!(
                    step = %step,
                    disk_free = %disk_free.describe(),
                    disk_used = %disk_used.describe(),
                    "disk recovered, shrink cascade stopped"
                );
                report.recovered = true;
                break;
            }
        }

        if !report.recovered {
            warn!(steps = report.steps.len(), "shrink cascade finished without recovering disk");
        }
        Some(report)
    }

    async fn execute(&self, step: ShrinkStep, sampler: &ResourceSampler) -> ServiceResult<bool> {
        let services = &self.switchboard.services;
        let config = sampler.config();
        match step {
            ShrinkStep::ClearSearchFailures => {
                services.maintenance.clear_search_failures().await?;
                Ok(true)
            }
            ShrinkStep::ClearHttpCache => {
                services.cache.clear().await?;
                Ok(true)
            }
            ShrinkStep::ClearRobotsCache => {
                services.maintenance.clear_robots_cache().await?;
                Ok(true)
            }
            ShrinkStep::ClearNews => {
                services.maintenance.clear_news().await?;
                Ok(true)
            }
            ShrinkStep::ClearCitationIndex => services.maintenance.clear_citation_index().await,
            ShrinkStep::ClearCrawlQueues => {
                let size = services.crawl_queues.size();
                if size <= config.crawl_queue_clear_threshold {
                    return Ok(false);
                }
                let removed = services.crawl_queues.clear().await?;
                info!(removed, "crawl queues cleared");
                Ok(true)
            }
            ShrinkStep::TrimReferenceIndex => {
                let removed = services
                    .index
                    .trim_references(config.reference_trim_limit)
                    .await?;
                debug!(removed, limit = config.reference_trim_limit, "reference lists trimmed");
                Ok(true)
            }
            ShrinkStep::OptimizeFulltext => {
                services.index.commit().await?;
                services.index.optimize(config.optimize_max_segments).await?;
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_allows_one_holder() {
        let flag = AtomicBool::new(false);
        let guard = RunGuard::acquire(&flag);
        assert!(guard.is_some());
        assert!(RunGuard::acquire(&flag).is_none());

        drop(guard);
        assert!(!flag.load(Ordering::SeqCst));
        assert!(RunGuard::acquire(&flag).is_some());
    }
}
