//! Contracts of the collaborators this core orchestrates.
//!
//! Parsers, stores, the crawl frontier and the peer network are opaque to
//! the pipeline, the observer and the dispatcher. They are held as
//! `Arc<dyn Trait>` in [`crate::Services`] so tests can swap in the mocks
//! from `test_support`.

mod indexing;
mod maintenance;
mod network;
mod probe;

pub use indexing::{
    ContentCache, CrawlStacker, DocumentParser, FailureSink, IndexStore, IndexingLoad, Loader,
    StackRejection, SynonymLibrary, WebStructure,
};
pub use maintenance::{CrawlQueues, MaintenanceHooks, SoftCaches};
pub use network::{NetworkStatus, PeerNetwork};
pub use probe::SystemProbe;
