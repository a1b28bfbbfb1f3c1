//! Resource observer of a peerdex node
//!
//! A periodic control loop samples free disk space, the size of the data
//! directory and free memory, classifies each reading against a steady-state
//! target and a hard limit, and reacts:
//!
//! - any axis under pressure pauses the local and remote-triggered crawl jobs
//! - exhausted free space or short memory switches off remote index receipt
//! - exhausted disk with autoregulation enabled runs the shrink cascade
//! - full recovery undoes what the observer itself changed
//!
//! Probes that fail count as healthy so a broken probe never stops a node.

pub mod disk_usage;
pub mod error;
pub mod observer;
pub mod probe;
pub mod sampler;
pub mod shrink;
pub mod state;

pub use disk_usage::DiskUsageCache;
pub use error::{ProbeError, ProbeResult};
pub use observer::{ObserverReport, ResourceObserver, THROTTLED_JOBS};
pub use probe::SysinfoProbe;
pub use sampler::ResourceSampler;
pub use shrink::{ShrinkCascade, ShrinkReport, StepResult};
pub use state::{
    classify_free, classify_used, Axis, AxisReading, ResourceSnapshot, ResourceState, Thresholds,
};
