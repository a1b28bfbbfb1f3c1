//! An ordered chain of stages.

use std::sync::Arc;

use peerdex_config::components::StageConfig;
use tracing::info;

use crate::error::{Result, StageError};
use crate::stage::{Stage, StageProcessor, StageStats};

/// Definition of one stage, front to back.
pub struct StageSpec<T: Send + 'static> {
    pub name: String,
    pub config: StageConfig,
    pub processor: Arc<dyn StageProcessor<T>>,
}

impl<T: Send + 'static> StageSpec<T> {
    pub fn new(
        name: impl Into<String>,
        config: StageConfig,
        processor: Arc<dyn StageProcessor<T>>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            processor,
        }
    }
}

/// Load of one stage, for monitoring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageLoad {
    pub name: String,
    pub queue_depth: usize,
    pub in_flight: usize,
    pub capacity: usize,
    pub stats: StageStats,
}

/// Named stages wired so each forwards into the next.
pub struct StagedPipeline<T: Send + 'static> {
    name: String,
    stages: Vec<Arc<Stage<T>>>,
}

impl<T: Send + 'static> StagedPipeline<T> {
    /// Start every stage. `specs` lists the stages in processing order.
    pub fn spawn(name: impl Into<String>, specs: Vec<StageSpec<T>>) -> Self {
        let name = name.into();
        let mut stages: Vec<Arc<Stage<T>>> = Vec::with_capacity(specs.len());
        let mut next: Option<Arc<Stage<T>>> = None;

        // Built back to front so each stage knows its successor
        for spec in specs.into_iter().rev() {
            let stage = Stage::spawn(spec.name, spec.config, spec.processor, next.take());
            next = Some(Arc::clone(&stage));
            stages.push(stage);
        }
        stages.reverse();

        info!(pipeline = %name, stages = stages.len(), "pipeline started");
        Self { name, stages }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue at the first stage, waiting while it is full.
    pub async fn submit(&self, item: T) -> Result<()> {
        match self.stages.first() {
            Some(stage) => stage.enqueue(item).await,
            None => Err(StageError::Closed(self.name.clone())),
        }
    }

    pub fn stage(&self, name: &str) -> Option<&Arc<Stage<T>>> {
        self.stages.iter().find(|stage| stage.name() == name)
    }

    pub fn stages(&self) -> &[Arc<Stage<T>>] {
        &self.stages
    }

    /// Items queued or being processed anywhere in the pipeline.
    pub fn queue_size(&self) -> usize {
        self.stages
            .iter()
            .map(|stage| stage.queue_depth() + stage.in_flight())
            .sum()
    }

    pub fn loads(&self) -> Vec<StageLoad> {
        self.stages
            .iter()
            .map(|stage| StageLoad {
                name: stage.name().to_string(),
                queue_depth: stage.queue_depth(),
                in_flight: stage.in_flight(),
                capacity: stage.capacity(),
                stats: stage.stats(),
            })
            .collect()
    }

    /// Stop all stages front to back.
    ///
    /// In drain mode every stage finishes what it holds, forwarding into the
    /// next stage before that one is closed, so nothing accepted is lost.
    pub async fn shutdown(&self, drain: bool) -> Result<()> {
        let mut result = Ok(());
        for stage in &self.stages {
            if let Err(err) = stage.shutdown(drain).await {
                result = Err(err);
            }
        }
        info!(pipeline = %self.name, drain, "pipeline stopped");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::StageOutcome;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::sync::Semaphore;
    use tokio::time::timeout;

    struct Tag(&'static str);

    #[async_trait]
    impl StageProcessor<Vec<&'static str>> for Tag {
        async fn process(&self, mut item: Vec<&'static str>) -> StageOutcome<Vec<&'static str>> {
            item.push(self.0);
            StageOutcome::Passed(item)
        }
    }

    struct Record(Arc<Mutex<Vec<Vec<&'static str>>>>);

    #[async_trait]
    impl StageProcessor<Vec<&'static str>> for Record {
        async fn process(&self, item: Vec<&'static str>) -> StageOutcome<Vec<&'static str>> {
            self.0.lock().push(item.clone());
            StageOutcome::Passed(item)
        }
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let config = StageConfig::new(3, 4);
        let pipeline = StagedPipeline::spawn(
            "tags",
            vec![
                StageSpec::new("a", config, Arc::new(Tag("a"))),
                StageSpec::new("b", config, Arc::new(Tag("b"))),
                StageSpec::new("record", config, Arc::new(Record(seen.clone()))),
            ],
        );

        for _ in 0..20 {
            pipeline.submit(Vec::new()).await.unwrap();
        }
        pipeline.shutdown(true).await.unwrap();

        let seen = seen.lock();
        assert_eq!(seen.len(), 20);
        assert!(seen.iter().all(|tags| tags == &vec!["a", "b"]));
        assert_eq!(pipeline.queue_size(), 0);
        assert_eq!(pipeline.loads()[2].stats.passed, 20);
    }

    #[tokio::test]
    async fn test_empty_pipeline_rejects_items() {
        let pipeline: StagedPipeline<u32> = StagedPipeline::spawn("empty", Vec::new());
        assert!(matches!(pipeline.submit(1).await, Err(StageError::Closed(_))));
    }

    struct Gate(Arc<Semaphore>);

    #[async_trait]
    impl StageProcessor<Vec<&'static str>> for Gate {
        async fn process(&self, item: Vec<&'static str>) -> StageOutcome<Vec<&'static str>> {
            if let Ok(permit) = self.0.acquire().await {
                permit.forget();
            }
            StageOutcome::Passed(item)
        }
    }

    #[tokio::test]
    async fn test_abort_interrupts_forward_into_full_stage() {
        let gate = Arc::new(Semaphore::new(0));
        let config = StageConfig::new(1, 1);
        let pipeline = StagedPipeline::spawn(
            "blocked",
            vec![
                StageSpec::new("front", config, Arc::new(Tag("front"))),
                StageSpec::new("back", config, Arc::new(Gate(gate))),
            ],
        );

        for _ in 0..3 {
            pipeline.submit(Vec::new()).await.unwrap();
        }

        // back holds one item and has one queued; front is stuck forwarding
        timeout(Duration::from_secs(2), async {
            loop {
                let loads: Vec<_> = pipeline
                    .loads()
                    .iter()
                    .map(|load| (load.queue_depth, load.in_flight))
                    .collect();
                if loads == vec![(0, 1), (1, 1)] {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("pipeline did not fill up");

        timeout(Duration::from_secs(2), pipeline.shutdown(false))
            .await
            .expect("abort must not wait on a full successor")
            .unwrap();

        let front = pipeline.stage("front").unwrap();
        assert_eq!(front.stats().dropped, 1);
        assert_eq!(front.in_flight(), 0);
        assert_eq!(pipeline.queue_size(), 0);
    }
}
