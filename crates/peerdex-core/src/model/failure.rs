use crate::hash::DhtHash;
use crate::model::response::PeerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a per-document failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailCategory {
    /// The document was rejected during processing; retrying will not help.
    FinalProcessContext,
    /// The document could not be obtained or was rejected before processing.
    FinalLoadContext,
    /// A transient network failure; the URL may be retried later.
    TemporaryNetworkFailure,
}

impl fmt::Display for FailCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailCategory::FinalProcessContext => "FINAL_PROCESS_CONTEXT",
            FailCategory::FinalLoadContext => "FINAL_LOAD_CONTEXT",
            FailCategory::TemporaryNetworkFailure => "TEMPORARY_NETWORK_FAILURE",
        };
        f.write_str(name)
    }
}

/// One entry for the failure sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub url: String,
    pub referrer_hash: Option<DhtHash>,
    pub initiator: Option<PeerId>,
    pub category: FailCategory,
    pub reason: String,
    pub recorded_at: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(
        url: impl Into<String>,
        referrer_hash: Option<DhtHash>,
        initiator: Option<PeerId>,
        category: FailCategory,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            referrer_hash,
            initiator,
            category,
            reason: reason.into(),
            recorded_at: Utc::now(),
        }
    }
}
