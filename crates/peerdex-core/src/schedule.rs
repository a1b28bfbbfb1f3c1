//! Fixed-cadence background jobs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A job run once per tick by [`spawn_periodic`].
#[async_trait]
pub trait PeriodicTask: Send + Sync + 'static {
    async fn run_once(&self);
}

/// Run `task` every `interval` until `token` is cancelled.
///
/// The first run happens immediately. A tick that overruns the interval
/// delays the next one instead of bursting to catch up.
pub fn spawn_periodic(
    name: &'static str,
    interval: Duration,
    token: CancellationToken,
    task: Arc<dyn PeriodicTask>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(job = name, interval_ms = interval.as_millis() as u64, "periodic job started");

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    debug!(job = name, "periodic tick");
                    task.run_once().await;
                }
            }
        }

        info!(job = name, "periodic job stopped");
    })
}
