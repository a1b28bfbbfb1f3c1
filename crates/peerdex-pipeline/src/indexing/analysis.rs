use std::sync::Arc;

use async_trait::async_trait;
use peerdex_core::model::{IndexingQueueEntry, QueueState};
use peerdex_core::{DhtHash, Switchboard};
use tracing::warn;

use crate::stage::{StageOutcome, StageProcessor};

/// Records the outbound link structure of indexable documents.
pub struct StructureAnalyzeProcessor {
    switchboard: Arc<Switchboard>,
}

impl StructureAnalyzeProcessor {
    pub fn new(switchboard: Arc<Switchboard>) -> Self {
        Self { switchboard }
    }
}

#[async_trait]
impl StageProcessor<IndexingQueueEntry> for StructureAnalyzeProcessor {
    async fn process(&self, entry: IndexingQueueEntry) -> StageOutcome<IndexingQueueEntry> {
        entry.update_status(QueueState::StructureAnalysis);

        if let (Some(documents), Some(condensers)) = (entry.documents(), entry.condensers()) {
            let web_structure = &self.switchboard.services.web_structure;
            for (document, condenser) in documents.iter().zip(condensers) {
                if condenser.is_none() {
                    continue;
                }
                let url_hash = DhtHash::of(&document.url);
                if let Err(err) = web_structure.generate_citation_reference(url_hash, document).await {
                    warn!(url = %document.url, error = %err, "citation reference not recorded");
                }
            }
        }

        StageOutcome::Passed(entry)
    }
}
