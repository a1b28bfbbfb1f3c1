use async_trait::async_trait;

use crate::error::ServiceResult;
use crate::model::Request;

/// The node's crawl queues.
#[async_trait]
pub trait CrawlQueues: Send + Sync {
    /// Entries across all queues.
    fn size(&self) -> usize;

    /// Entries in the local crawl queue.
    fn local_size(&self) -> usize;

    /// Remove every queued request. Returns how many were removed.
    async fn clear(&self) -> ServiceResult<usize>;

    /// Next request for a crawl job type, `None` when its queue is empty.
    async fn next_request(&self, job: &str) -> Option<Request>;

    /// Put a popped request back at the head of its job's queue.
    async fn requeue(&self, job: &str, request: Request) -> ServiceResult<()>;
}

/// Destructive but recoverable clean-up actions run by the shrink cascade.
#[async_trait]
pub trait MaintenanceHooks: Send + Sync {
    async fn clear_search_failures(&self) -> ServiceResult<()>;

    async fn clear_robots_cache(&self) -> ServiceResult<()>;

    async fn clear_news(&self) -> ServiceResult<()>;

    /// Returns `false` when the node keeps no citation index.
    async fn clear_citation_index(&self) -> ServiceResult<bool>;
}

/// In-memory caches that can be dropped under memory pressure.
pub trait SoftCaches: Send + Sync {
    fn clear_search_events(&self);
    fn clear_result_trail(&self);
    fn clear_blacklist_cache(&self);
    fn clear_common_words(&self);
    fn clear_host_cache(&self);
}
