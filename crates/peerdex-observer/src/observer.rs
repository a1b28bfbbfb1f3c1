//! The periodic resource control loop.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use peerdex_core::jobs::{LOCAL_CRAWL, REMOTE_TRIGGERED_CRAWL};
use peerdex_core::{spawn_periodic, PeriodicTask, Switchboard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::sampler::ResourceSampler;
use crate::shrink::{ShrinkCascade, ShrinkReport};
use crate::state::{ResourceSnapshot, ResourceState};

/// Job types the observer pauses under resource pressure.
pub const THROTTLED_JOBS: [&str; 2] = [LOCAL_CRAWL, REMOTE_TRIGGERED_CRAWL];

/// What one tick saw and did.
#[derive(Debug, Clone)]
pub struct ObserverReport {
    pub snapshot: ResourceSnapshot,
    /// Soft caches were dropped because memory was short
    pub soft_caches_cleared: bool,
    /// Jobs paused by this tick
    pub paused: Vec<String>,
    /// Jobs resumed by this tick
    pub resumed: Vec<String>,
    /// Set when the shrink cascade ran
    pub shrink: Option<ShrinkReport>,
}

/// Watches disk and memory and throttles the node before it runs out.
///
/// The observer only acts through the crawl job controller, the remote
/// index gate and the shrink cascade. It remembers which jobs it paused so
/// that a job an operator paused stays paused after recovery.
pub struct ResourceObserver {
    switchboard: Arc<Switchboard>,
    sampler: ResourceSampler,
    cascade: ShrinkCascade,
    self_paused: Mutex<HashSet<String>>,
}

impl ResourceObserver {
    pub fn new(switchboard: Arc<Switchboard>) -> Self {
        let config = switchboard.config.resources.clone();
        info!(
            data_dir = %config.data_dir.display(),
            disk_free_autoregulate = config.disk_free.autoregulate,
            disk_used_autoregulate = config.disk_used.autoregulate,
            "resource observer created"
        );
        Self {
            sampler: ResourceSampler::new(Arc::clone(&switchboard.services.probe), config),
            cascade: ShrinkCascade::new(Arc::clone(&switchboard)),
            switchboard,
            self_paused: Mutex::new(HashSet::new()),
        }
    }

    /// Jobs that are paused because of this observer.
    pub fn self_paused_jobs(&self) -> Vec<String> {
        let mut jobs: Vec<String> = self.self_paused.lock().iter().cloned().collect();
        jobs.sort();
        jobs
    }

    /// Sample, classify and react once.
    pub async fn tick(&self) -> ObserverReport {
        let mut memory = self.sampler.memory().await;
        let mut soft_caches_cleared = false;
        if !memory.state.is_ample() {
            self.clear_soft_caches();
            soft_caches_cleared = true;
            memory = self.sampler.memory().await;
        }

        let snapshot = ResourceSnapshot {
            disk_free: self.sampler.disk_free().await,
            disk_used: self.sampler.disk_used().await,
            memory,
        };
        debug!(
            disk_free = %snapshot.disk_free.state,
            disk_used = %snapshot.disk_used.state,
            memory = %snapshot.memory.state,
            "resources sampled"
        );

        let mut report = ObserverReport {
            snapshot,
            soft_caches_cleared,
            paused: Vec::new(),
            resumed: Vec::new(),
            shrink: None,
        };

        if let Some(cause) = snapshot.pressure_cause() {
            report.paused = self.pause_jobs(&cause);
            let protect_index = snapshot.disk_free.state == ResourceState::Exhausted
                || !snapshot.memory.state.is_ample();
            if protect_index && self.switchboard.auto_disable_remote_index() {
                warn!(cause = %cause, "remote index receipt disabled");
            }
        }

        let config = self.sampler.config();
        let shrink_for_free = snapshot.disk_free.state == ResourceState::Exhausted
            && config.disk_free.autoregulate;
        let shrink_for_used = snapshot.disk_used.state == ResourceState::Exhausted
            && config.disk_used.autoregulate;
        if shrink_for_free || shrink_for_used {
            warn!(
                disk_free = %snapshot.disk_free.describe(),
                disk_used = %snapshot.disk_used.describe(),
                "disk exhausted, running shrink cascade"
            );
            report.shrink = self.cascade.run(&self.sampler).await;
        }

        if snapshot.all_ample() {
            if self.switchboard.auto_enable_remote_index() {
                info!("remote index receipt re-enabled");
            }
            report.resumed = self.resume_jobs();
        }

        report
    }

    fn clear_soft_caches(&self) {
        let caches = &self.switchboard.services.soft_caches;
        caches.clear_search_events();
        caches.clear_result_trail();
        caches.clear_blacklist_cache();
        caches.clear_common_words();
        caches.clear_host_cache();
        info!("soft caches cleared on low memory");
    }

    fn pause_jobs(&self, cause: &str) -> Vec<String> {
        let mut paused = Vec::new();
        let mut self_paused = self.self_paused.lock();
        for job in THROTTLED_JOBS {
            if self.switchboard.jobs.pause(job, cause) {
                warn!(job, cause, "crawl job paused on resource pressure");
                self_paused.insert(job.to_string());
                paused.push(job.to_string());
            }
        }
        paused
    }

    fn resume_jobs(&self) -> Vec<String> {
        let jobs: Vec<String> = self.self_paused.lock().drain().collect();
        let mut resumed = Vec::new();
        for job in jobs {
            if self.switchboard.jobs.resume(&job) {
                info!(job = %job, "crawl job resumed, resources ample");
                resumed.push(job);
            }
        }
        resumed.sort();
        resumed
    }

    /// Run [`tick`](Self::tick) on the configured cadence until cancelled.
    pub fn spawn(self: Arc<Self>, token: CancellationToken) -> JoinHandle<()> {
        let interval = Duration::from_secs(self.sampler.config().interval_secs.max(1));
        spawn_periodic("resource-observer", interval, token, self)
    }
}

#[async_trait]
impl PeriodicTask for ResourceObserver {
    async fn run_once(&self) {
        self.tick().await;
    }
}
