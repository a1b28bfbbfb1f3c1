//! Cached size of the data directory.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// Directory size reading reused until the rescan interval has passed.
///
/// Walking the data directory stats every file, so the observer only
/// refreshes this value every few minutes. The fields are atomics and the
/// freshness check is a timestamp comparison.
#[derive(Debug)]
pub struct DiskUsageCache {
    base: Instant,
    interval: Duration,
    bytes: AtomicU64,
    scanned_at_ms: AtomicU64,
    valid: AtomicBool,
}

impl DiskUsageCache {
    pub fn new(interval: Duration) -> Self {
        Self {
            base: Instant::now(),
            interval,
            bytes: AtomicU64::new(0),
            scanned_at_ms: AtomicU64::new(0),
            valid: AtomicBool::new(false),
        }
    }

    fn now_ms(&self) -> u64 {
        self.base.elapsed().as_millis() as u64
    }

    /// The cached size if it is younger than the rescan interval.
    pub fn fresh(&self) -> Option<u64> {
        if !self.valid.load(Ordering::Acquire) {
            return None;
        }
        let age = self
            .now_ms()
            .saturating_sub(self.scanned_at_ms.load(Ordering::Acquire));
        if age < self.interval.as_millis() as u64 {
            Some(self.bytes.load(Ordering::Acquire))
        } else {
            None
        }
    }

    /// Remember a new scan result.
    pub fn store(&self, bytes: u64) {
        self.bytes.store(bytes, Ordering::Release);
        self.scanned_at_ms.store(self.now_ms(), Ordering::Release);
        self.valid.store(true, Ordering::Release);
    }

    /// Force a rescan on the next read, after data was deleted.
    pub fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_value_expires_after_interval() {
        let cache = DiskUsageCache::new(Duration::from_secs(600));
        assert_eq!(cache.fresh(), None);

        cache.store(42);
        assert_eq!(cache.fresh(), Some(42));

        tokio::time::advance(Duration::from_secs(599)).await;
        assert_eq!(cache.fresh(), Some(42));

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(cache.fresh(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalidate_forces_rescan() {
        let cache = DiskUsageCache::new(Duration::from_secs(600));
        cache.store(7);
        cache.invalidate();
        assert_eq!(cache.fresh(), None);

        cache.store(8);
        assert_eq!(cache.fresh(), Some(8));
    }
}
