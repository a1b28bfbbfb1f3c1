//! Bounded queue plus worker pool: one step of a staged pipeline.
//!
//! Items are handed to a stage with [`Stage::enqueue`], which waits while
//! the queue is full. Each worker takes one item at a time, runs the stage
//! processor on it and forwards `Passed` results to the next stage. The
//! forward is itself an enqueue, so a slow stage throttles every stage in
//! front of it down to the first producer.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use peerdex_config::components::StageConfig;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{Result, StageError};

/// Why a processor stopped an item without an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkipReason(pub String);

impl SkipReason {
    pub fn new(reason: impl Into<String>) -> Self {
        SkipReason(reason.into())
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A processor failure. The item is dropped; reporting is up to the processor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct StageFailure(pub String);

impl StageFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        StageFailure(reason.into())
    }
}

/// Result of processing one item.
#[derive(Debug)]
pub enum StageOutcome<T> {
    /// Forward the item to the next stage.
    Passed(T),
    /// Stop here; nothing went wrong.
    Skipped(SkipReason),
    /// Stop here because processing failed.
    Failed(StageFailure),
}

/// The transform run by a stage's workers.
#[async_trait]
pub trait StageProcessor<T: Send + 'static>: Send + Sync + 'static {
    async fn process(&self, item: T) -> StageOutcome<T>;
}

/// Counters of one stage at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageStats {
    pub passed: u64,
    pub skipped: u64,
    pub failed: u64,
    pub panicked: u64,
    /// Processed items lost because an abort interrupted their forward.
    pub dropped: u64,
}

#[derive(Debug, Default)]
struct Counters {
    passed: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    panicked: AtomicU64,
    dropped: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> StageStats {
        StageStats {
            passed: self.passed.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// One pipeline stage.
pub struct Stage<T> {
    name: String,
    capacity: usize,
    sender: Mutex<Option<flume::Sender<T>>>,
    receiver: flume::Receiver<T>,
    closing: CancellationToken,
    abort: CancellationToken,
    in_flight: Arc<AtomicUsize>,
    counters: Arc<Counters>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<T: Send + 'static> Stage<T> {
    /// Create the stage and start its workers. Must run inside a tokio runtime.
    ///
    /// `next` receives every `Passed` item; a stage without `next` is terminal
    /// and drops them.
    pub fn spawn(
        name: impl Into<String>,
        config: StageConfig,
        processor: Arc<dyn StageProcessor<T>>,
        next: Option<Arc<Stage<T>>>,
    ) -> Arc<Self> {
        let name = name.into();
        let capacity = config.queue_capacity.max(1);
        let (sender, receiver) = flume::bounded(capacity);

        let stage = Arc::new(Self {
            name,
            capacity,
            sender: Mutex::new(Some(sender)),
            receiver,
            closing: CancellationToken::new(),
            abort: CancellationToken::new(),
            in_flight: Arc::new(AtomicUsize::new(0)),
            counters: Arc::new(Counters::default()),
            workers: Mutex::new(Vec::new()),
        });

        let workers = config.workers.max(1);
        let handles = (0..workers)
            .map(|id| {
                let worker = Worker {
                    id,
                    stage: stage.name.clone(),
                    receiver: stage.receiver.clone(),
                    abort: stage.abort.clone(),
                    in_flight: Arc::clone(&stage.in_flight),
                    counters: Arc::clone(&stage.counters),
                    processor: Arc::clone(&processor),
                    next: next.clone(),
                };
                tokio::spawn(worker.run())
            })
            .collect();
        *stage.workers.lock() = handles;

        info!(stage = %stage.name, workers, capacity, "stage started");
        stage
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items waiting in the queue.
    pub fn queue_depth(&self) -> usize {
        self.receiver.len()
    }

    /// Items currently being processed by a worker.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> StageStats {
        self.counters.snapshot()
    }

    pub fn is_closed(&self) -> bool {
        self.closing.is_cancelled()
    }

    /// Hand an item to the stage, waiting while the queue is full.
    ///
    /// Fails with [`StageError::Closed`] once shutdown has begun, including
    /// for callers already waiting for space.
    pub async fn enqueue(&self, item: T) -> Result<()> {
        let sender = self
            .sender
            .lock()
            .clone()
            .ok_or_else(|| StageError::Closed(self.name.clone()))?;

        tokio::select! {
            biased;
            _ = self.closing.cancelled() => Err(StageError::Closed(self.name.clone())),
            sent = sender.send_async(item) => {
                sent.map_err(|_| StageError::Closed(self.name.clone()))
            }
        }
    }

    /// Stop the stage and wait for its workers.
    ///
    /// With `drain`, queued and in-flight items are still processed and
    /// forwarded; without it workers are interrupted and queued items dropped.
    pub async fn shutdown(&self, drain: bool) -> Result<()> {
        self.closing.cancel();
        // Workers see the channel disconnect once the queue is empty
        self.sender.lock().take();
        if !drain {
            self.abort.cancel();
        }

        let handles = std::mem::take(&mut *self.workers.lock());
        let mut result = Ok(());
        for handle in handles {
            if let Err(err) = handle.await {
                error!(stage = %self.name, error = %err, "stage worker died");
                result = Err(StageError::Panicked {
                    stage: self.name.clone(),
                    message: err.to_string(),
                });
            }
        }

        let dropped = self.receiver.drain().count();
        if dropped > 0 {
            warn!(stage = %self.name, dropped, "queued items dropped on abort");
        }
        info!(stage = %self.name, drain, "stage stopped");
        result
    }
}

struct Worker<T: Send + 'static> {
    id: usize,
    stage: String,
    receiver: flume::Receiver<T>,
    abort: CancellationToken,
    in_flight: Arc<AtomicUsize>,
    counters: Arc<Counters>,
    processor: Arc<dyn StageProcessor<T>>,
    next: Option<Arc<Stage<T>>>,
}

impl<T: Send + 'static> Worker<T> {
    async fn run(self) {
        debug!(stage = %self.stage, worker = self.id, "worker started");
        loop {
            let item = tokio::select! {
                biased;
                _ = self.abort.cancelled() => break,
                received = self.receiver.recv_async() => match received {
                    Ok(item) => item,
                    // Disconnected and empty: drained
                    Err(_) => break,
                },
            };

            self.in_flight.fetch_add(1, Ordering::AcqRel);
            let outcome = tokio::select! {
                biased;
                _ = self.abort.cancelled() => {
                    self.in_flight.fetch_sub(1, Ordering::AcqRel);
                    break;
                }
                outcome = AssertUnwindSafe(self.processor.process(item)).catch_unwind() => outcome,
            };

            match outcome {
                Ok(StageOutcome::Passed(item)) => {
                    self.counters.passed.fetch_add(1, Ordering::Relaxed);
                    if let Some(next) = &self.next {
                        // A full successor must not hold up an abort
                        let forwarded = tokio::select! {
                            biased;
                            _ = self.abort.cancelled() => None,
                            forwarded = next.enqueue(item) => Some(forwarded),
                        };
                        match forwarded {
                            Some(Ok(())) => {}
                            Some(Err(err)) => {
                                warn!(stage = %self.stage, error = %err, "could not forward item");
                            }
                            None => {
                                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                                debug!(stage = %self.stage, "item dropped on abort while forwarding");
                                self.in_flight.fetch_sub(1, Ordering::AcqRel);
                                break;
                            }
                        }
                    }
                }
                Ok(StageOutcome::Skipped(reason)) => {
                    self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                    debug!(stage = %self.stage, %reason, "item skipped");
                }
                Ok(StageOutcome::Failed(failure)) => {
                    self.counters.failed.fetch_add(1, Ordering::Relaxed);
                    debug!(stage = %self.stage, %failure, "item failed");
                }
                Err(payload) => {
                    self.counters.panicked.fetch_add(1, Ordering::Relaxed);
                    error!(
                        stage = %self.stage,
                        worker = self.id,
                        panic = %panic_message(payload.as_ref()),
                        "stage processor panicked, item dropped"
                    );
                }
            }
            self.in_flight.fetch_sub(1, Ordering::AcqRel);
        }
        debug!(stage = %self.stage, worker = self.id, "worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::{mpsc, Semaphore};
    use tokio::time::timeout;

    struct Collect(mpsc::UnboundedSender<u32>);

    #[async_trait]
    impl StageProcessor<u32> for Collect {
        async fn process(&self, item: u32) -> StageOutcome<u32> {
            let _ = self.0.send(item);
            StageOutcome::Passed(item)
        }
    }

    struct Gated(Arc<Semaphore>);

    #[async_trait]
    impl StageProcessor<u32> for Gated {
        async fn process(&self, item: u32) -> StageOutcome<u32> {
            if let Ok(permit) = self.0.acquire().await {
                permit.forget();
            }
            StageOutcome::Passed(item)
        }
    }

    struct Panicky;

    #[async_trait]
    impl StageProcessor<u32> for Panicky {
        async fn process(&self, item: u32) -> StageOutcome<u32> {
            if item == 13 {
                panic!("unlucky item");
            }
            StageOutcome::Passed(item)
        }
    }

    struct AddOne;

    #[async_trait]
    impl StageProcessor<u32> for AddOne {
        async fn process(&self, item: u32) -> StageOutcome<u32> {
            if item % 2 == 1 {
                return StageOutcome::Skipped(SkipReason::new("odd"));
            }
            StageOutcome::Passed(item + 1)
        }
    }

    async fn wait_for(mut condition: impl FnMut() -> bool) {
        timeout(Duration::from_secs(2), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn test_passed_items_are_forwarded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = Stage::spawn("sink", StageConfig::new(1, 4), Arc::new(Collect(tx)), None);
        let first = Stage::spawn("first", StageConfig::new(2, 4), Arc::new(AddOne), Some(sink.clone()));

        for item in [0, 1, 2, 3, 4] {
            first.enqueue(item).await.unwrap();
        }
        first.shutdown(true).await.unwrap();
        sink.shutdown(true).await.unwrap();

        let mut seen = Vec::new();
        while let Ok(item) = rx.try_recv() {
            seen.push(item);
        }
        seen.sort();
        assert_eq!(seen, vec![1, 3, 5]);
        assert_eq!(first.stats().skipped, 2);
        assert_eq!(first.stats().passed, 3);
    }

    #[tokio::test]
    async fn test_enqueue_blocks_at_capacity() {
        let gate = Arc::new(Semaphore::new(0));
        let stage = Stage::spawn("gated", StageConfig::new(1, 2), Arc::new(Gated(gate.clone())), None);

        // The only worker holds item 0 and waits on the gate
        stage.enqueue(0).await.unwrap();
        let watched = stage.clone();
        wait_for(move || watched.in_flight() == 1).await;

        stage.enqueue(1).await.unwrap();
        stage.enqueue(2).await.unwrap();
        assert_eq!(stage.queue_depth(), 2);

        let blocked = timeout(Duration::from_millis(100), stage.enqueue(3)).await;
        assert!(blocked.is_err(), "enqueue must wait while the queue is full");

        let pending = {
            let stage = stage.clone();
            tokio::spawn(async move { stage.enqueue(3).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished());

        gate.add_permits(1);
        timeout(Duration::from_secs(1), pending)
            .await
            .expect("enqueue should return once a slot frees")
            .unwrap()
            .unwrap();

        gate.add_permits(16);
        stage.shutdown(true).await.unwrap();
        assert_eq!(stage.stats().passed, 4);
    }

    #[tokio::test]
    async fn test_panic_drops_only_that_item() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = Stage::spawn("sink", StageConfig::new(1, 8), Arc::new(Collect(tx)), None);
        let stage = Stage::spawn("panicky", StageConfig::new(1, 8), Arc::new(Panicky), Some(sink.clone()));

        for item in [12, 13, 14] {
            stage.enqueue(item).await.unwrap();
        }
        stage.shutdown(true).await.unwrap();
        sink.shutdown(true).await.unwrap();

        let mut seen = Vec::new();
        while let Ok(item) = rx.try_recv() {
            seen.push(item);
        }
        assert_eq!(seen, vec![12, 14]);
        assert_eq!(stage.stats().panicked, 1);
        assert_eq!(stage.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_closed_stage_rejects_items() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let stage = Stage::spawn("closed", StageConfig::new(1, 1), Arc::new(Collect(tx)), None);
        stage.shutdown(true).await.unwrap();

        assert!(stage.is_closed());
        assert_eq!(stage.enqueue(1).await, Err(StageError::Closed("closed".into())));
    }

    #[tokio::test]
    async fn test_abort_wakes_blocked_producers() {
        let gate = Arc::new(Semaphore::new(0));
        let stage = Stage::spawn("abort", StageConfig::new(1, 1), Arc::new(Gated(gate)), None);

        stage.enqueue(0).await.unwrap();
        let watched = stage.clone();
        wait_for(move || watched.in_flight() == 1).await;
        stage.enqueue(1).await.unwrap();

        let blocked = {
            let stage = stage.clone();
            tokio::spawn(async move { stage.enqueue(2).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        timeout(Duration::from_secs(1), stage.shutdown(false))
            .await
            .expect("abort must not wait for the gated worker")
            .unwrap();
        assert!(matches!(blocked.await.unwrap(), Err(StageError::Closed(_))));
        assert_eq!(stage.in_flight(), 0);
        assert_eq!(stage.queue_depth(), 0);
    }
}
