//! Indexing pipeline sizing

use serde::{Deserialize, Serialize};

/// Workers and queue capacity for one pipeline stage.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StageConfig {
    /// Number of concurrent workers pulling from the stage queue
    pub workers: usize,
    /// Bounded queue capacity; producers block once it is reached
    pub queue_capacity: usize,
}

impl StageConfig {
    /// Create a stage sizing.
    pub fn new(workers: usize, queue_capacity: usize) -> Self {
        Self {
            workers,
            queue_capacity,
        }
    }
}

/// Sizing of the four indexing stages.
///
/// Defaults scale with the number of CPUs. Storage is single-threaded and
/// the parse queue is large enough to hold two result pages from a
/// search-triggered load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Parse stage
    pub parse: StageConfig,
    /// Condense stage
    pub condense: StageConfig,
    /// Structure analysis stage
    pub structure_analysis: StageConfig,
    /// Store stage
    pub store: StageConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let cpus = num_cpus::get().max(1);
        Self {
            parse: StageConfig::new(cpus, (cpus * 2).max(20)),
            condense: StageConfig::new(cpus, cpus + 1),
            structure_analysis: StageConfig::new(cpus, cpus + 1),
            store: StageConfig::new(1, cpus + 1),
        }
    }
}
