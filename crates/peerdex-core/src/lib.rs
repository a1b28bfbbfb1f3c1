//! Core abstractions of a peerdex node.
//!
//! This crate holds what the pipeline, the resource observer and the DHT
//! dispatcher share:
//!
//! - the data model of crawled responses, parsed documents and index
//!   references ([`model`])
//! - the contracts of external collaborators such as parsers, stores and the
//!   peer network ([`traits`])
//! - the node context handed to every component ([`Switchboard`])
//! - crawl job pause/resume ([`CrawlJobController`])
//! - periodic job scheduling and logging setup

pub mod activity;
pub mod error;
pub mod events;
pub mod hash;
pub mod jobs;
pub mod logging;
pub mod model;
pub mod schedule;
pub mod switchboard;
pub mod test_support;
pub mod traits;

pub use activity::ActivityTracker;
pub use error::{ServiceError, ServiceResult};
pub use events::NodeEvent;
pub use hash::DhtHash;
pub use jobs::{CrawlJobController, CrawlJobStatus};
pub use logging::init_logging;
pub use schedule::{spawn_periodic, PeriodicTask};
pub use switchboard::{IndexingCounters, RemoteIndexGate, Services, Switchboard};
