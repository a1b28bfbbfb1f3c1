//! Pause and resume of crawl job types.
//!
//! Each job type has one slot holding its paused flag and the last pause
//! cause, guarded by a mutex. Waiters subscribe to a `watch` channel that is
//! updated under the same lock, so a loader waiting in
//! [`CrawlJobController::wait_while_paused`] wakes as soon as the job resumes.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

use crate::events::NodeEvent;

/// Crawls started by this peer.
pub const LOCAL_CRAWL: &str = "local-crawl";
/// Crawls other peers asked this peer to run.
pub const REMOTE_TRIGGERED_CRAWL: &str = "remote-triggered-crawl";
/// Loader fetching remote crawl requests.
pub const REMOTE_CRAWL_LOADER: &str = "remote-crawl-loader";

/// The job types known at startup.
pub const DEFAULT_JOBS: [&str; 3] = [LOCAL_CRAWL, REMOTE_TRIGGERED_CRAWL, REMOTE_CRAWL_LOADER];

/// Diagnostic view of one job type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrawlJobStatus {
    pub job: String,
    pub paused: bool,
    pub cause: Option<String>,
    pub paused_since: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct PauseState {
    cause: Option<String>,
    since: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct JobSlot {
    state: Mutex<PauseState>,
    paused: watch::Sender<bool>,
}

impl JobSlot {
    fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            state: Mutex::new(PauseState::default()),
            paused,
        }
    }
}

/// Registry of pause flags, one per job type.
#[derive(Debug)]
pub struct CrawlJobController {
    jobs: DashMap<String, Arc<JobSlot>>,
    events: broadcast::Sender<NodeEvent>,
}

impl CrawlJobController {
    pub fn new(events: broadcast::Sender<NodeEvent>) -> Self {
        let jobs = DashMap::new();
        for job in DEFAULT_JOBS {
            jobs.insert(job.to_string(), Arc::new(JobSlot::new()));
        }
        Self { jobs, events }
    }

    fn slot(&self, job: &str) -> Arc<JobSlot> {
        if let Some(slot) = self.jobs.get(job) {
            return Arc::clone(slot.value());
        }
        let slot = self
            .jobs
            .entry(job.to_string())
            .or_insert_with(|| Arc::new(JobSlot::new()));
        Arc::clone(slot.value())
    }

    /// Pause a job type. Returns `true` if it was running before.
    ///
    /// Pausing an already paused job keeps the first cause.
    pub fn pause(&self, job: &str, cause: &str) -> bool {
        let slot = self.slot(job);
        let mut state = slot.state.lock();
        if *slot.paused.borrow() {
            debug!(job, cause, "crawl job already paused");
            return false;
        }
        state.cause = Some(cause.to_string());
        state.since = Some(Utc::now());
        slot.paused.send_replace(true);
        drop(state);

        info!(job, cause, "crawl job paused");
        let _ = self.events.send(NodeEvent::CrawlJobPaused {
            job: job.to_string(),
            cause: cause.to_string(),
        });
        true
    }

    /// Resume a job type and wake its waiters. Returns `true` if it was paused.
    pub fn resume(&self, job: &str) -> bool {
        let Some(slot) = self.jobs.get(job).map(|s| Arc::clone(s.value())) else {
            return false;
        };
        let mut state = slot.state.lock();
        if !*slot.paused.borrow() {
            return false;
        }
        state.cause = None;
        state.since = None;
        slot.paused.send_replace(false);
        drop(state);

        info!(job, "crawl job resumed");
        let _ = self.events.send(NodeEvent::CrawlJobResumed {
            job: job.to_string(),
        });
        true
    }

    pub fn is_paused(&self, job: &str) -> bool {
        self.jobs
            .get(job)
            .map(|slot| {
                let _state = slot.state.lock();
                *slot.paused.borrow()
            })
            .unwrap_or(false)
    }

    /// Wait until `job` is not paused. Returns immediately when it is running.
    pub async fn wait_while_paused(&self, job: &str) {
        let mut paused = self.slot(job).paused.subscribe();
        // The sender lives in the slot, which outlives this call
        let _ = paused.wait_for(|paused| !*paused).await;
    }

    pub fn status(&self, job: &str) -> CrawlJobStatus {
        let slot = self.slot(job);
        let state = slot.state.lock();
        let paused = *slot.paused.borrow();
        CrawlJobStatus {
            job: job.to_string(),
            paused,
            cause: state.cause.clone(),
            paused_since: state.since,
        }
    }

    /// Status of every registered job type, sorted by name.
    pub fn statuses(&self) -> Vec<CrawlJobStatus> {
        let mut names: Vec<String> = self.jobs.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names.iter().map(|job| self.status(job)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn controller() -> (CrawlJobController, broadcast::Receiver<NodeEvent>) {
        let (tx, rx) = broadcast::channel(16);
        (CrawlJobController::new(tx), rx)
    }

    #[test]
    fn test_pause_resume_round_trip() {
        let (jobs, _rx) = controller();
        assert!(!jobs.is_paused(LOCAL_CRAWL));

        assert!(jobs.pause(LOCAL_CRAWL, "test"));
        assert!(jobs.is_paused(LOCAL_CRAWL));
        assert_eq!(jobs.status(LOCAL_CRAWL).cause.as_deref(), Some("test"));

        assert!(jobs.resume(LOCAL_CRAWL));
        assert!(!jobs.is_paused(LOCAL_CRAWL));
        assert_eq!(jobs.status(LOCAL_CRAWL).cause, None);
    }

    #[test]
    fn test_status_reports_pause_flag() {
        let (jobs, _rx) = controller();
        jobs.pause(REMOTE_TRIGGERED_CRAWL, "memory");

        let status = jobs.status(REMOTE_TRIGGERED_CRAWL);
        assert!(status.paused);
        assert!(status.paused_since.is_some());

        let paused: Vec<_> = jobs
            .statuses()
            .into_iter()
            .filter(|s| s.paused)
            .map(|s| s.job)
            .collect();
        assert_eq!(paused, vec![REMOTE_TRIGGERED_CRAWL.to_string()]);
    }

    #[test]
    fn test_pause_is_idempotent() {
        let (jobs, mut rx) = controller();
        assert!(jobs.pause(LOCAL_CRAWL, "first"));
        assert!(!jobs.pause(LOCAL_CRAWL, "second"));
        assert_eq!(jobs.status(LOCAL_CRAWL).cause.as_deref(), Some("first"));

        assert!(matches!(rx.try_recv(), Ok(NodeEvent::CrawlJobPaused { .. })));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_resume_of_running_or_unknown_job() {
        let (jobs, _rx) = controller();
        assert!(!jobs.resume(LOCAL_CRAWL));
        assert!(!jobs.resume("no-such-job"));
        assert!(!jobs.is_paused("no-such-job"));
    }

    #[test]
    fn test_jobs_are_independent() {
        let (jobs, _rx) = controller();
        jobs.pause(REMOTE_TRIGGERED_CRAWL, "disk");
        assert!(!jobs.is_paused(LOCAL_CRAWL));
        assert!(jobs.is_paused(REMOTE_TRIGGERED_CRAWL));
        assert_eq!(jobs.statuses().len(), 3);
    }

    #[tokio::test]
    async fn test_waiter_unblocks_after_resume() {
        let (jobs, _rx) = controller();
        let jobs = Arc::new(jobs);
        jobs.pause(LOCAL_CRAWL, "test");

        let waiter = {
            let jobs = Arc::clone(&jobs);
            tokio::spawn(async move { jobs.wait_while_paused(LOCAL_CRAWL).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        jobs.resume(LOCAL_CRAWL);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake after resume")
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_running() {
        let (jobs, _rx) = controller();
        tokio::time::timeout(Duration::from_millis(100), jobs.wait_while_paused(LOCAL_CRAWL))
            .await
            .expect("running job must not block");
    }
}
