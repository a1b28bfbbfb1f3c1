use std::sync::Arc;

use async_trait::async_trait;
use peerdex_core::model::{EventOrigin, FailCategory, IndexingQueueEntry, QueueState};
use peerdex_core::{NodeEvent, Switchboard};
use tracing::{debug, info, warn};

use super::{honours_noindex, lookup_profile, record_failure};
use crate::stage::{SkipReason, StageOutcome, StageProcessor};

/// Commits condensed documents to the index. Terminal stage.
pub struct StoreProcessor {
    switchboard: Arc<Switchboard>,
}

impl StoreProcessor {
    pub fn new(switchboard: Arc<Switchboard>) -> Self {
        Self { switchboard }
    }
}

#[async_trait]
impl StageProcessor<IndexingQueueEntry> for StoreProcessor {
    async fn process(&self, mut entry: IndexingQueueEntry) -> StageOutcome<IndexingQueueEntry> {
        entry.update_status(QueueState::IndexStorage);
        let sb = &self.switchboard;

        if entry.condensers().is_none() {
            entry.update_status(QueueState::Finished);
            return StageOutcome::Skipped(SkipReason::new("nothing to index"));
        }

        let profile = match lookup_profile(sb, &entry) {
            Ok(profile) => profile,
            Err(failure) => {
                entry.update_status(QueueState::Finished);
                return StageOutcome::Failed(failure);
            }
        };

        let noindex = honours_noindex(sb, &profile);
        let pairs = entry.take_condensed();
        let response = entry.response();
        let origin = response.origin(&sb.local_peer);

        for (document, condenser) in pairs {
            let Some(mut condenser) = condenser else {
                continue;
            };
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
            if profile.indexes_nothing() {
                record_failure(
                    sb,
                    response,
                    &document.url,
                    FailCategory::FinalProcessContext,
                    "denied by profile rule",
                );
                continue;
            }

            let removed = condenser.exclude_words(sb.stopwords());
            if removed > 0 {
                debug!(url = %document.url, removed, "stopwords removed");
            }

            let stored = sb
                .services
                .index
                .store_document(
                    &document.url,
                    response.referrer_hash(),
                    &profile,
                    &document,
                    &condenser,
                )
                .await;
            let record = match stored {
                Ok(record) => record,
                Err(err) => {
                    warn!(url = %document.url, error = %err, "document not stored");
                    record_failure(
                        sb,
                        response,
                        &document.url,
                        FailCategory::FinalProcessContext,
                        format!("storage error: {err}"),
                    );
                    continue;
                }
            };

            sb.counters.record(origin);
            info!(
                url = %document.url,
                words = record.word_count,
                origin = ?origin,
                "document indexed"
            );
            sb.emit(NodeEvent::Indexed {
                url: document.url.clone(),
                origin,
                initiator: response.initiator().cloned(),
                words: record.word_count,
            });

            if origin == EventOrigin::GlobalCrawling {
                if let Some(peer) = response.initiator().cloned() {
                    let network = Arc::clone(&sb.services.network);
                    tokio::spawn(async move {
                        if let Err(err) = network.send_receipt(&peer, &record).await {
                            debug!(peer = %peer, error = %err, "receipt not delivered");
                        }
                    });
                }
            }
        }

        entry.update_status(QueueState::Finished);
        StageOutcome::Passed(entry)
    }
}
