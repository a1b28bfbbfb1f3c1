use std::sync::Arc;

use async_trait::async_trait;
use peerdex_core::model::{Condenser, ContentDomain, FailCategory, IndexingQueueEntry, QueueState};
use peerdex_core::Switchboard;
use tracing::debug;

use super::{honours_noindex, lookup_profile, record_failure};
use crate::stage::{StageOutcome, StageProcessor};

/// Filters documents by profile rules and computes their condensers.
///
/// Profile-level exclusions pass the entry through untouched; Store then
/// finds no condensers and finishes it.
pub struct CondenseProcessor {
    switchboard: Arc<Switchboard>,
}

impl CondenseProcessor {
    pub fn new(switchboard: Arc<Switchboard>) -> Self {
        Self { switchboard }
    }
}

#[async_trait]
impl StageProcessor<IndexingQueueEntry> for CondenseProcessor {
    async fn process(&self, mut entry: IndexingQueueEntry) -> StageOutcome<IndexingQueueEntry> {
        entry.update_status(QueueState::Condensing);
        let sb = &self.switchboard;

        let profile = match lookup_profile(sb, &entry) {
            Ok(profile) => profile,
            Err(failure) => return StageOutcome::Failed(failure),
        };

        let response = entry.response();
        let url = response.url();

        if profile.indexes_nothing() {
            debug!(url, profile = %profile.name, "profile indexes neither text nor media");
            return StageOutcome::Passed(entry);
        }

        if !profile.accepts_url_for_index(url) {
            record_failure(
                sb,
                response,
                url,
                FailCategory::FinalProcessContext,
                "url rejected by index url filter",
            );
            return StageOutcome::Passed(entry);
        }

        let is_media = ContentDomain::is_media_url(url)
            || ContentDomain::from_mime(response.mime_type()).is_media();
        if profile.index_text && !profile.index_media && is_media {
            debug!(url, "media content excluded by profile");
            return StageOutcome::Passed(entry);
        }

        let noindex = honours_noindex(sb, &profile);
        let synonyms = sb.services.synonyms.as_deref();
        let documents = entry.take_documents();
        let mut condensed = Vec::with_capacity(documents.len());

        for document in documents {
            let response = entry.response();
            if noindex && document.indexing_denied {
                record_failure(
                    sb,
                    response,
                    &document.url,
                    FailCategory::FinalProcessContext,
                    "denied by document-attached noindexing rule",
                );
                continue;
            }
            if !profile.accepts_content_for_index(&document.text) {
                record_failure(
                    sb,
                    response,
                    &document.url,
                    FailCategory::FinalProcessContext,
                    "content rejected by index content filter",
                );
                continue;
            }
            let condenser = Condenser::new(&document, synonyms);
            condensed.push((document, Some(condenser)));
        }

        if condensed.is_empty() {
            debug!(url = entry.response().url(), "no document left to index");
            entry.set_documents(Vec::new());
        } else {
            entry.set_condensed(condensed);
        }
        StageOutcome::Passed(entry)
    }
}
