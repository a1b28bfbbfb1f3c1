//! DHT distribution of a peerdex node
//!
//! The [`DhtDispatcher`] moves reverse word index references to the peers
//! responsible for them. Selected references are split by vertical
//! partition into a cloud of at most one chunk per partition, and chunks are
//! sent by a small pool of transmission workers. Chunks that keep failing
//! are restored into the local index.

pub mod chunk;
pub mod dispatcher;
pub mod error;
mod transmission;

pub use chunk::{Cloud, TransmissionChunk};
pub use dispatcher::{Decision, DhtDispatcher, DispatchReport, SettleReport};
pub use error::{DeferReason, TransferRejection};
pub use transmission::TRANSMISSION_STAGE;
