//! The four-stage indexing pipeline: parse, condense, structure analysis
//! and storage.
//!
//! Every stage reads the shared [`Switchboard`] and reports per-document
//! problems to its failure sink instead of erroring. An entry leaves the
//! pipeline after Store, or earlier when a stage cannot continue with it.

mod analysis;
mod condense;
mod parse;
mod store;

use std::sync::Arc;

use peerdex_core::model::{CrawlProfile, FailCategory, FailureRecord, IndexingQueueEntry, Response};
use peerdex_core::traits::IndexingLoad;
use peerdex_core::Switchboard;
use tracing::debug;

use crate::error::Result;
use crate::stage::StageFailure;
use crate::staged::{StageLoad, StageSpec, StagedPipeline};

pub use analysis::StructureAnalyzeProcessor;
pub use condense::CondenseProcessor;
pub use parse::ParseProcessor;
pub use store::StoreProcessor;

pub const PARSE_STAGE: &str = "parse";
pub const CONDENSE_STAGE: &str = "condense";
pub const STRUCTURE_ANALYSIS_STAGE: &str = "structure_analysis";
pub const STORE_STAGE: &str = "store";

/// Record a failure for the URL of `response`.
pub(crate) fn record_failure(
    switchboard: &Switchboard,
    response: &Response,
    url: &str,
    category: FailCategory,
    reason: impl Into<String>,
) {
    let reason = reason.into();
    debug!(url, %category, reason = %reason, "indexing failure");
    switchboard.services.failures.record_failure(FailureRecord::new(
        url,
        response.referrer_hash(),
        response.initiator().cloned(),
        category,
        reason,
    ));
}

/// Resolve the crawl profile of an entry, recording a failure if it is gone.
pub(crate) fn lookup_profile(
    switchboard: &Switchboard,
    entry: &IndexingQueueEntry,
) -> std::result::Result<Arc<CrawlProfile>, StageFailure> {
    let response = entry.response();
    switchboard.profiles.get(response.profile()).ok_or_else(|| {
        let reason = format!("unknown crawl profile {}", response.profile());
        record_failure(
            switchboard,
            response,
            response.url(),
            FailCategory::FinalProcessContext,
            reason.clone(),
        );
        StageFailure::new(reason)
    })
}

/// Noindex is honoured when the profile asks for it, except in intranet mode.
pub(crate) fn honours_noindex(switchboard: &Switchboard, profile: &CrawlProfile) -> bool {
    profile.obey_html_robots_noindex && !switchboard.config.indexing.intranet_mode
}

/// Entry point for crawl results and surrogate imports.
pub struct IndexingPipeline {
    pipeline: StagedPipeline<IndexingQueueEntry>,
}

impl IndexingPipeline {
    /// Start all four stages, sized from the switchboard's pipeline config.
    pub fn spawn(switchboard: Arc<Switchboard>) -> Self {
        let sizing = switchboard.config.pipeline.clone();
        let specs = vec![
            StageSpec::new(
                PARSE_STAGE,
                sizing.parse,
                Arc::new(ParseProcessor::new(Arc::clone(&switchboard))),
            ),
            StageSpec::new(
                CONDENSE_STAGE,
                sizing.condense,
                Arc::new(CondenseProcessor::new(Arc::clone(&switchboard))),
            ),
            StageSpec::new(
                STRUCTURE_ANALYSIS_STAGE,
                sizing.structure_analysis,
                Arc::new(StructureAnalyzeProcessor::new(Arc::clone(&switchboard))),
            ),
            StageSpec::new(
                STORE_STAGE,
                sizing.store,
                Arc::new(StoreProcessor::new(switchboard)),
            ),
        ];
        Self {
            pipeline: StagedPipeline::spawn("indexing", specs),
        }
    }

    /// Hand an entry to the Parse stage, waiting while it is full.
    pub async fn submit(&self, entry: IndexingQueueEntry) -> Result<()> {
        self.pipeline.submit(entry).await
    }

    pub async fn submit_response(&self, response: Response) -> Result<()> {
        self.submit(IndexingQueueEntry::new(response)).await
    }

    pub fn queue_size(&self) -> usize {
        self.pipeline.queue_size()
    }

    pub fn loads(&self) -> Vec<StageLoad> {
        self.pipeline.loads()
    }

    pub async fn shutdown(&self, drain: bool) -> Result<()> {
        self.pipeline.shutdown(drain).await
    }
}

impl IndexingLoad for IndexingPipeline {
    fn queue_size(&self) -> usize {
        self.pipeline.queue_size()
    }
}
