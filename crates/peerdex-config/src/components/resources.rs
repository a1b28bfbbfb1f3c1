//! Resource observer configuration
//!
//! Limit values use control-circuit naming: the steady-state value is the
//! level the node regulates towards, the undershot/overshot value is the hard
//! limit beyond which corrective action is taken. Sizes are in mebibytes.
//!
//! Enabling `autoregulate` on either disk axis allows the observer to delete
//! index data as soon as the hard limit is crossed.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Binary unit conversion: mebibytes to bytes
pub const BYTES_PER_MIB: u64 = 1024 * 1024;

/// One destructive-but-recoverable action of the shrink cascade.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ShrinkStep {
    /// Drop cached search-failure records
    ClearSearchFailures,
    /// Drop the HTTP resource cache
    ClearHttpCache,
    /// Drop the robots.txt cache
    ClearRobotsCache,
    /// Drop the peer-news databases
    ClearNews,
    /// Drop the link-citation index if the node keeps one
    ClearCitationIndex,
    /// Drop the crawl queues once they exceed the configured size
    ClearCrawlQueues,
    /// Cap every reverse-word-index reference list
    TrimReferenceIndex,
    /// Commit and optimize the full-text index
    OptimizeFulltext,
}

impl ShrinkStep {
    /// The documented cascade order.
    pub fn default_order() -> Vec<ShrinkStep> {
        vec![
            ShrinkStep::ClearSearchFailures,
            ShrinkStep::ClearHttpCache,
            ShrinkStep::ClearRobotsCache,
            ShrinkStep::ClearNews,
            ShrinkStep::ClearCitationIndex,
            ShrinkStep::ClearCrawlQueues,
            ShrinkStep::TrimReferenceIndex,
            ShrinkStep::OptimizeFulltext,
        ]
    }

    /// Short name used in log lines and events.
    pub fn name(&self) -> &'static str {
        match self {
            ShrinkStep::ClearSearchFailures => "clear_search_failures",
            ShrinkStep::ClearHttpCache => "clear_http_cache",
            ShrinkStep::ClearRobotsCache => "clear_robots_cache",
            ShrinkStep::ClearNews => "clear_news",
            ShrinkStep::ClearCitationIndex => "clear_citation_index",
            ShrinkStep::ClearCrawlQueues => "clear_crawl_queues",
            ShrinkStep::TrimReferenceIndex => "trim_reference_index",
            ShrinkStep::OptimizeFulltext => "optimize_fulltext",
        }
    }
}

impl std::fmt::Display for ShrinkStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Free disk space limits for the data directory's filesystem.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiskFreeConfig {
    /// Run the shrink cascade when free space is exhausted
    pub autoregulate: bool,
    /// Target minimum of free space (MiB)
    pub min_steadystate_mib: u64,
    /// Hard minimum of free space (MiB)
    pub min_undershot_mib: u64,
}

impl Default for DiskFreeConfig {
    fn default() -> Self {
        Self {
            autoregulate: false,
            min_steadystate_mib: 2048,
            min_undershot_mib: 1024,
        }
    }
}

/// Limits on the space used by the data directory itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DiskUsedConfig {
    /// Run the shrink cascade when used space is exhausted
    pub autoregulate: bool,
    /// Target maximum of used space (MiB)
    pub max_steadystate_mib: u64,
    /// Hard maximum of used space (MiB)
    pub max_overshot_mib: u64,
    /// Minimum time between two recursive directory-size scans
    pub rescan_interval_secs: u64,
}

impl Default for DiskUsedConfig {
    fn default() -> Self {
        Self {
            autoregulate: false,
            max_steadystate_mib: 524_288,
            max_overshot_mib: 1_048_576,
            rescan_interval_secs: 600,
        }
    }
}

/// Free memory limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MemoryConfig {
    /// Free memory below which remote index receipt is switched off (MiB)
    pub min_steadystate_mib: u64,
    /// Hard minimum of free memory (MiB)
    pub min_undershot_mib: u64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            min_steadystate_mib: 50,
            min_undershot_mib: 20,
        }
    }
}

/// Resource observer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ResourceConfig {
    /// Directory whose filesystem and size are observed
    pub data_dir: PathBuf,
    /// Observer cadence
    pub interval_secs: u64,
    /// Disk free axis
    pub disk_free: DiskFreeConfig,
    /// Disk used axis
    pub disk_used: DiskUsedConfig,
    /// Memory axis
    pub memory: MemoryConfig,
    /// Shrink cascade order; the order is deployment policy
    pub shrink_steps: Vec<ShrinkStep>,
    /// Crawl queues are only cleared once they hold more entries than this
    pub crawl_queue_clear_threshold: usize,
    /// Reference lists are cut to this many references by the trim step
    pub reference_trim_limit: usize,
    /// Segment count the full-text index is optimized down to
    pub optimize_max_segments: usize,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("DATA"),
            interval_secs: 5,
            disk_free: DiskFreeConfig::default(),
            disk_used: DiskUsedConfig::default(),
            memory: MemoryConfig::default(),
            shrink_steps: ShrinkStep::default_order(),
            crawl_queue_clear_threshold: 1000,
            reference_trim_limit: 100,
            optimize_max_segments: 1,
        }
    }
}
