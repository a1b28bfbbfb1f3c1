//! Data model flowing through the indexing pipeline and the DHT.

mod condenser;
mod document;
mod entry;
mod failure;
mod profile;
mod reference;
mod response;

pub use condenser::{Condenser, WordStatistic};
pub use document::{file_extension, Anchor, ContentDomain, Document, ImageLink};
pub use entry::IndexingQueueEntry;
pub use failure::{FailCategory, FailureRecord};
pub use profile::{CrawlProfile, ProfileHandle, ProfileRegistry, UrlPattern};
pub use reference::{CommittedRecord, ReferenceContainer, WordReference};
pub use response::{EventOrigin, PeerId, QueueState, Request, Response, StatusHandle};
