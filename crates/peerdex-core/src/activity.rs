//! Timestamps of user-facing activity, consulted for online caution.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use peerdex_config::components::OnlineCautionConfig;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Last access times of the proxy and the search interfaces.
#[derive(Debug, Default)]
pub struct ActivityTracker {
    proxy: AtomicU64,
    local_search: AtomicU64,
    remote_search: AtomicU64,
}

impl ActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn touch_proxy(&self) {
        self.proxy.store(now_millis(), Ordering::Relaxed);
    }

    pub fn touch_local_search(&self) {
        self.local_search.store(now_millis(), Ordering::Relaxed);
    }

    pub fn touch_remote_search(&self) {
        self.remote_search.store(now_millis(), Ordering::Relaxed);
    }

    fn within(last: &AtomicU64, delay: Duration, now: u64) -> bool {
        let last = last.load(Ordering::Relaxed);
        last != 0 && now.saturating_sub(last) < delay.as_millis() as u64
    }

    /// Name of the activity still inside its caution window, if any.
    pub fn caution_cause(&self, config: &OnlineCautionConfig) -> Option<&'static str> {
        let now = now_millis();
        if Self::within(&self.proxy, Duration::from_millis(config.proxy_delay_ms), now) {
            Some("proxy")
        } else if Self::within(
            &self.local_search,
            Duration::from_millis(config.local_search_delay_ms),
            now,
        ) {
            Some("local search")
        } else if Self::within(
            &self.remote_search,
            Duration::from_millis(config.remote_search_delay_ms),
            now,
        ) {
            Some("remote search")
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caution_window() {
        let activity = ActivityTracker::new();
        let config = OnlineCautionConfig {
            proxy_delay_ms: 0,
            local_search_delay_ms: 60_000,
            remote_search_delay_ms: 0,
        };
        assert_eq!(activity.caution_cause(&config), None);

        activity.touch_proxy();
        assert_eq!(activity.caution_cause(&config), None);

        activity.touch_local_search();
        assert_eq!(activity.caution_cause(&config), Some("local search"));
    }
}
