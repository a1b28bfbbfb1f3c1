//! Staged concurrent processing for a peerdex node.
//!
//! [`Stage`] is the building block: a bounded queue with a fixed pool of
//! workers. [`StagedPipeline`] chains stages, and [`IndexingPipeline`] is the
//! four-stage chain that turns crawl results into index entries.
//! [`CrawlLoader`] feeds it from the crawl queues, honouring job pauses.

pub mod crawler;
pub mod error;
pub mod indexing;
pub mod stage;
pub mod staged;

pub use crawler::{CrawlLoader, LoadStep};
pub use error::{Result, StageError};
pub use indexing::IndexingPipeline;
pub use stage::{SkipReason, Stage, StageFailure, StageOutcome, StageProcessor, StageStats};
pub use staged::{StageLoad, StageSpec, StagedPipeline};
