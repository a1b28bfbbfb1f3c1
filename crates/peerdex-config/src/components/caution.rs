use serde::{Deserialize, Serialize};

/// Online caution delays.
///
/// Background DHT distribution defers while any user-facing activity
/// happened within its delay window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OnlineCautionConfig {
    /// Delay after the last proxy access
    pub proxy_delay_ms: u64,
    /// Delay after the last local search
    pub local_search_delay_ms: u64,
    /// Delay after the last remote search
    pub remote_search_delay_ms: u64,
}

impl Default for OnlineCautionConfig {
    fn default() -> Self {
        Self {
            proxy_delay_ms: 100,
            local_search_delay_ms: 1000,
            remote_search_delay_ms: 500,
        }
    }
}
