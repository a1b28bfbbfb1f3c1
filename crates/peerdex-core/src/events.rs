//! Node events broadcast to observers such as a status page.

use crate::model::{EventOrigin, PeerId};
use serde::{Deserialize, Serialize};

/// Something an external observer may want to know about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeEvent {
    /// A document was committed to the index.
    Indexed {
        url: String,
        origin: EventOrigin,
        initiator: Option<PeerId>,
        words: usize,
    },
    CrawlJobPaused { job: String, cause: String },
    CrawlJobResumed { job: String },
    /// One step of the shrink cascade ran.
    ShrinkStepExecuted { step: String, success: bool },
    RemoteIndexReceipt { accepted: bool, automatic: bool },
}
