use async_trait::async_trait;

use crate::error::ServiceResult;
use crate::hash::DhtHash;
use crate::model::{
    CommittedRecord, Condenser, CrawlProfile, Document, FailureRecord, ReferenceContainer,
    Request, Response,
};

/// Registry of document format parsers, dispatched by MIME type.
#[async_trait]
pub trait DocumentParser: Send + Sync {
    async fn parse(
        &self,
        url: &str,
        mime_type: &str,
        charset: Option<&str>,
        content: &[u8],
    ) -> ServiceResult<Vec<Document>>;
}

/// Local HTTP resource cache.
#[async_trait]
pub trait ContentCache: Send + Sync {
    /// Cached body for a URL hash, `None` if not cached.
    async fn get_cached_content(&self, url_hash: DhtHash) -> ServiceResult<Option<Vec<u8>>>;

    /// Drop the whole cache.
    async fn clear(&self) -> ServiceResult<()>;
}

/// Fetches resources for crawl requests.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, request: &Request) -> ServiceResult<Response>;
}

/// Why the crawl stacker refused a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackRejection {
    /// The URL is already known; not worth reporting.
    Double,
    /// Any other reason.
    Rejected(String),
}

/// Entry point of the crawl frontier.
#[async_trait]
pub trait CrawlStacker: Send + Sync {
    /// Whether `url` may be crawled under `profile` at `depth`.
    fn check_acceptance(
        &self,
        url: &str,
        profile: &CrawlProfile,
        depth: u32,
    ) -> Result<(), StackRejection>;

    /// Queue a discovered link.
    async fn enqueue(&self, request: Request) -> ServiceResult<()>;
}

/// Full-text store and reverse word index.
#[async_trait]
pub trait IndexStore: Send + Sync {
    async fn store_document(
        &self,
        url: &str,
        referrer_hash: Option<DhtHash>,
        profile: &CrawlProfile,
        document: &Document,
        condenser: &Condenser,
    ) -> ServiceResult<CommittedRecord>;

    async fn remove(&self, url_hash: DhtHash) -> ServiceResult<()>;

    async fn commit(&self) -> ServiceResult<()>;

    async fn optimize(&self, max_segments: usize) -> ServiceResult<()>;

    /// Number of word references held in the reverse word index.
    fn rwi_count(&self) -> u64;

    /// Cap every reference list at `max_references`. Returns how many
    /// references were removed.
    async fn trim_references(&self, max_references: usize) -> ServiceResult<usize>;

    /// Put containers taken out for distribution back into the index.
    async fn restore_references(&self, containers: Vec<ReferenceContainer>) -> ServiceResult<()>;
}

/// Link graph between hosts: who cites whom.
#[async_trait]
pub trait WebStructure: Send + Sync {
    async fn generate_citation_reference(
        &self,
        url_hash: DhtHash,
        document: &Document,
    ) -> ServiceResult<()>;
}

/// Collects non-fatal per-document failures.
pub trait FailureSink: Send + Sync {
    fn record_failure(&self, record: FailureRecord);
}

/// Word synonyms used to augment condenser statistics.
pub trait SynonymLibrary: Send + Sync {
    fn synonyms(&self, word: &str) -> Vec<String>;
}

/// Occupancy of the indexing pipeline, read by schedulers that must not
/// compete with indexing.
pub trait IndexingLoad: Send + Sync {
    /// Entries queued or in flight across all stages.
    fn queue_size(&self) -> usize;
}
