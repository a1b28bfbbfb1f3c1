//! Why the dispatcher did not act.

use thiserror::Error;

/// A failed precondition for DHT distribution as a whole.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferRejection {
    #[error("online caution: {0}")]
    OnlineCaution(&'static str),

    #[error("seed database not ready")]
    SeedDbNotReady,

    #[error("local peer has never been online")]
    VirginPeer,

    #[error("DHT distribution is disabled by network policy")]
    NetworkPolicy,

    #[error("DHT distribution is not allowed by the operator")]
    NotAllowed,

    #[error("too few index entries: {count} < {min}")]
    TooFewEntries { count: u64, min: u64 },

    #[error("crawl queue not empty: {queued} entries")]
    Crawling { queued: usize },

    #[error("indexing queue busy: {queued} entries")]
    Indexing { queued: usize },
}

/// Reason one accumulation or transmission deferred to the next tick.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeferReason {
    #[error(transparent)]
    Rejected(#[from] TransferRejection),

    #[error("cloud full: {size} of {partitions} partitions")]
    CloudFull { size: usize, partitions: usize },

    #[error("cloud empty")]
    CloudEmpty,

    #[error("free memory {free_mib} MiB below {min_mib} MiB")]
    LowMemory { free_mib: u64, min_mib: u64 },

    #[error("connection load {load}% above {max}%")]
    ConnectionLoad { load: f64, max: f64 },

    #[error("upload {kib} KiB/s above {max_kib} KiB/s")]
    Upload { kib: u64, max_kib: u64 },

    #[error("{sessions} transmission sessions in flight")]
    TooManySessions { sessions: usize },

    #[error("DHT horizon unknown")]
    NoHorizon,

    #[error("selection failed: {0}")]
    SelectionFailed(String),

    #[error("nothing selected")]
    NothingSelected,

    #[error("dispatcher closed")]
    Closed,
}
