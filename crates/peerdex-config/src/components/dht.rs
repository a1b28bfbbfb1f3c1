//! DHT distribution configuration

use serde::{Deserialize, Serialize};

/// Ceilings and switches for outbound DHT distribution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DhtConfig {
    /// Network policy: does this network use DHT distribution at all
    pub enabled: bool,
    /// Operator setting: may this node distribute its index
    pub distribution_allowed: bool,
    /// Distribute while the local crawl queue is non-empty
    pub allow_while_crawling: bool,
    /// Distribute while the indexing pipeline holds more than one entry
    pub allow_while_indexing: bool,
    /// Minimum number of reverse-word-index entries before distributing
    pub min_rwi_count: usize,
    /// Scheduler cadence
    pub interval_secs: u64,

    /// Maximum containers selected per accumulation
    pub max_container_count: usize,
    /// Maximum references selected per accumulation
    pub max_reference_count: usize,
    /// Accumulation skips below this much free memory (MiB)
    pub min_free_memory_mib: u64,
    /// Accumulation skips above this connection pool load
    pub accumulate_max_connection_load: f64,
    /// Accumulation skips above this upload rate (KiB/s)
    pub accumulate_max_upload_kib: u64,

    /// Transmission skips when more sessions than this are in flight
    pub transmit_max_sessions: usize,
    /// Transmission skips above this connection pool load
    pub transmit_max_connection_load: f64,
    /// Transmission skips above this upload rate (KiB/s)
    pub transmit_max_upload_kib: u64,
    /// Attempts per chunk before it is restored locally and dropped
    pub max_transmission_attempts: u32,
    /// Upper bound for one transmission
    pub transmission_timeout_secs: u64,
    /// Concurrent transmissions; defaults to min(8, CPUs)
    pub transmission_workers: usize,
}

impl Default for DhtConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            distribution_allowed: true,
            allow_while_crawling: false,
            allow_while_indexing: false,
            min_rwi_count: 100,
            interval_secs: 10,
            max_container_count: 100,
            max_reference_count: 1000,
            min_free_memory_mib: 25,
            accumulate_max_connection_load: 50.0,
            accumulate_max_upload_kib: 128,
            transmit_max_sessions: 10,
            transmit_max_connection_load: 75.0,
            transmit_max_upload_kib: 256,
            max_transmission_attempts: 3,
            transmission_timeout_secs: 60,
            transmission_workers: num_cpus::get().clamp(1, 8),
        }
    }
}
