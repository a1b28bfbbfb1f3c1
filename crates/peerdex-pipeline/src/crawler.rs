//! Crawl loader: the consumer side of the crawl job pause gate.

use std::sync::Arc;
use std::time::Duration;

use peerdex_core::model::{FailCategory, FailureRecord, IndexingQueueEntry};
use peerdex_core::{ServiceError, Switchboard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::StageError;
use crate::indexing::IndexingPipeline;

const DEFAULT_IDLE_DELAY: Duration = Duration::from_millis(500);

/// What one loader step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStep {
    /// The job is paused; nothing was taken from the queue.
    Paused,
    /// The job's queue is empty.
    Idle,
    /// A request was loaded and handed to the pipeline.
    Submitted,
    /// Loading failed and was recorded.
    LoadFailed,
    /// The pipeline no longer accepts entries.
    PipelineClosed,
}

/// Pops requests for one job type, loads them and feeds the pipeline.
pub struct CrawlLoader {
    switchboard: Arc<Switchboard>,
    pipeline: Arc<IndexingPipeline>,
    job: String,
    idle_delay: Duration,
}

impl CrawlLoader {
    pub fn new(switchboard: Arc<Switchboard>, pipeline: Arc<IndexingPipeline>, job: &str) -> Self {
        Self {
            switchboard,
            pipeline,
            job: job.to_string(),
            idle_delay: DEFAULT_IDLE_DELAY,
        }
    }

    /// Pause between polls of an empty queue.
    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    pub fn job(&self) -> &str {
        &self.job
    }

    /// Process at most one request. Never loads while the job is paused.
    pub async fn step(&self) -> LoadStep {
        let sb = &self.switchboard;
        if sb.jobs.is_paused(&self.job) {
            return LoadStep::Paused;
        }

        let Some(request) = sb.services.crawl_queues.next_request(&self.job).await else {
            return LoadStep::Idle;
        };
        // A pause may have landed while the queue was popped
        if sb.jobs.is_paused(&self.job) {
            if let Err(err) = sb.services.crawl_queues.requeue(&self.job, request).await {
                warn!(job = %self.job, error = %err, "could not requeue request after pause");
            }
            return LoadStep::Paused;
        }

        match sb.services.loader.load(&request).await {
            Ok(response) => match self.pipeline.submit(IndexingQueueEntry::new(response)).await {
                Ok(()) => LoadStep::Submitted,
                Err(StageError::Closed(_)) | Err(StageError::Panicked { .. }) => {
                    LoadStep::PipelineClosed
                }
            },
            Err(err) => {
                let category = match err {
                    ServiceError::Network(_) | ServiceError::Timeout(_) => {
                        FailCategory::TemporaryNetworkFailure
                    }
                    _ => FailCategory::FinalLoadContext,
                };
                debug!(job = %self.job, url = %request.url, error = %err, "load failed");
                sb.services.failures.record_failure(FailureRecord::new(
                    request.url.clone(),
                    request.referrer_hash,
                    request.initiator.clone(),
                    category,
                    err.to_string(),
                ));
                LoadStep::LoadFailed
            }
        }
    }

    /// Run until cancelled or the pipeline closes.
    pub fn spawn(self, token: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(job = %self.job, "crawl loader started");
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = self.switchboard.jobs.wait_while_paused(&self.job) => {}
                }

                match self.step().await {
                    LoadStep::Submitted | LoadStep::LoadFailed | LoadStep::Paused => {}
                    LoadStep::Idle => {
                        tokio::select! {
                            _ = token.cancelled() => break,
                            _ = tokio::time::sleep(self.idle_delay) => {}
                        }
                    }
                    LoadStep::PipelineClosed => break,
                }
            }
            info!(job = %self.job, "crawl loader stopped");
        })
    }
}
