//! Configuration sections of a node.

mod caution;
mod dht;
mod indexing;
mod logging;
mod pipeline;
mod resources;

pub use caution::OnlineCautionConfig;
pub use dht::DhtConfig;
pub use indexing::IndexingConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use pipeline::{PipelineConfig, StageConfig};
pub use resources::{
    DiskFreeConfig, DiskUsedConfig, MemoryConfig, ResourceConfig, ShrinkStep, BYTES_PER_MIB,
};
