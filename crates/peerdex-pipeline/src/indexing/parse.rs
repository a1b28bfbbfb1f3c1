use std::sync::Arc;

use async_trait::async_trait;
use peerdex_core::model::{
    CrawlProfile, Document, EventOrigin, FailCategory, IndexingQueueEntry, QueueState, Request,
};
use peerdex_core::traits::StackRejection;
use peerdex_core::Switchboard;
use tracing::{debug, warn};

use super::{lookup_profile, record_failure};
use crate::stage::{SkipReason, StageFailure, StageOutcome, StageProcessor};

/// Turns a response into documents.
///
/// Content missing from the response is read from the HTTP cache. Links of
/// proxy and local crawl results are pushed to the crawl stacker.
pub struct ParseProcessor {
    switchboard: Arc<Switchboard>,
}

impl ParseProcessor {
    pub fn new(switchboard: Arc<Switchboard>) -> Self {
        Self { switchboard }
    }

    async fn stack_links(
        &self,
        entry: &IndexingQueueEntry,
        profile: &CrawlProfile,
        documents: &[Document],
    ) {
        let response = entry.response();
        let sb = &self.switchboard;
        let mut stacked = 0usize;

        for document in documents {
            for anchor in &document.anchors {
                if anchor.nofollow && profile.obey_html_robots_nofollow {
                    continue;
                }
                if !profile.accepts_for_crawl(&anchor.url, response.depth()) {
                    continue;
                }
                let depth = response.depth() + 1;
                if sb.services.stacker.check_acceptance(&anchor.url, profile, depth).is_err() {
                    continue;
                }
                let mut request = Request::new(anchor.url.clone(), response.profile().clone(), depth)
                    .with_referrer(response.url_hash())
                    .with_anchor_name(anchor.text.clone());
                if let Some(initiator) = response.initiator() {
                    request = request.with_initiator(initiator.clone());
                }
                match sb.services.stacker.enqueue(request).await {
                    Ok(()) => stacked += 1,
                    Err(err) => debug!(url = %anchor.url, error = %err, "link not stacked"),
                }
            }
        }

        if stacked > 0 {
            debug!(url = response.url(), stacked, "stacked hyperlinks");
        }
    }
}

#[async_trait]
impl StageProcessor<IndexingQueueEntry> for ParseProcessor {
    async fn process(&self, mut entry: IndexingQueueEntry) -> StageOutcome<IndexingQueueEntry> {
        entry.update_status(QueueState::Parsing);
        let sb = &self.switchboard;

        let profile = match lookup_profile(sb, &entry) {
            Ok(profile) => profile,
            Err(failure) => return StageOutcome::Failed(failure),
        };

        // Surrogate imports arrive already parsed
        if entry.documents().is_some() {
            return StageOutcome::Passed(entry);
        }

        if entry.response().content().is_none() {
            let url_hash = entry.response().url_hash();
            match sb.services.cache.get_cached_content(url_hash).await {
                Ok(Some(content)) => entry.response_mut().set_content(content),
                Ok(None) => {
                    let response = entry.response();
                    record_failure(
                        sb,
                        response,
                        response.url(),
                        FailCategory::FinalLoadContext,
                        "missing in cache",
                    );
                    return StageOutcome::Failed(StageFailure::new("missing in cache"));
                }
                Err(err) => {
                    let response = entry.response();
                    warn!(url = response.url(), error = %err, "cache read failed");
                    record_failure(
                        sb,
                        response,
                        response.url(),
                        FailCategory::FinalLoadContext,
                        "missing in cache",
                    );
                    return StageOutcome::Failed(StageFailure::new(err.to_string()));
                }
            }
        }

        let response = entry.response();
        let content = response.content().unwrap_or_default();
        let parsed = sb
            .services
            .parser
            .parse(response.url(), response.mime_type(), response.charset(), content)
            .await;

        let mut documents = match parsed {
            Ok(documents) => documents,
            Err(err) => {
                let reason = format!("parser error: {err}");
                record_failure(
                    sb,
                    response,
                    response.url(),
                    FailCategory::FinalProcessContext,
                    reason.clone(),
                );
                return StageOutcome::Failed(StageFailure::new(reason));
            }
        };

        // The stacker may have learned more about the URLs since they were queued
        documents.retain(|document| {
            match sb.services.stacker.check_acceptance(&document.url, &profile, response.depth()) {
                Ok(()) => true,
                Err(StackRejection::Double) => false,
                Err(StackRejection::Rejected(reason)) => {
                    record_failure(
                        sb,
                        response,
                        &document.url,
                        FailCategory::FinalLoadContext,
                        reason,
                    );
                    false
                }
            }
        });

        if documents.is_empty() {
            return StageOutcome::Skipped(SkipReason::new("no acceptable documents"));
        }

        match response.origin(&sb.local_peer) {
            EventOrigin::ProxyLoad | EventOrigin::LocalCrawling => {
                self.stack_links(&entry, &profile, &documents).await;
            }
            EventOrigin::GlobalCrawling => {}
        }

        entry.set_documents(documents);
        StageOutcome::Passed(entry)
    }
}
