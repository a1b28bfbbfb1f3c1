//! The crawl loader must never load for a paused job.

use std::sync::Arc;
use std::time::Duration;

use peerdex_config::NodeConfig;
use peerdex_core::jobs::{LOCAL_CRAWL, REMOTE_TRIGGERED_CRAWL};
use peerdex_core::model::{CrawlProfile, FailCategory, PeerId, Request};
use peerdex_core::test_support::MockServices;
use peerdex_core::traits::CrawlQueues;
use peerdex_core::Switchboard;
use peerdex_pipeline::{CrawlLoader, IndexingPipeline, LoadStep};
use tokio_util::sync::CancellationToken;

fn setup() -> (MockServices, Arc<Switchboard>, Arc<IndexingPipeline>) {
    let mocks = MockServices::new();
    let switchboard = Arc::new(Switchboard::new(
        NodeConfig::default(),
        PeerId::new("local"),
        mocks.services(),
    ));
    let pipeline = Arc::new(IndexingPipeline::spawn(Arc::clone(&switchboard)));
    (mocks, switchboard, pipeline)
}

#[tokio::test]
async fn paused_job_is_not_loaded() {
    let (mocks, sb, pipeline) = setup();
    let profile = sb.profiles.insert(CrawlProfile::new("local", 1));
    mocks.loader.serve("http://example.test/", "text/html", b"front page");
    mocks
        .crawl_queues
        .push(LOCAL_CRAWL, Request::new("http://example.test/", profile, 0));

    sb.jobs.pause(LOCAL_CRAWL, "test");
    let loader = CrawlLoader::new(Arc::clone(&sb), Arc::clone(&pipeline), LOCAL_CRAWL);
    assert_eq!(loader.step().await, LoadStep::Paused);
    assert!(mocks.loader.loaded().is_empty());

    sb.jobs.resume(LOCAL_CRAWL);
    assert_eq!(loader.step().await, LoadStep::Submitted);
    assert_eq!(loader.step().await, LoadStep::Idle);

    pipeline.shutdown(true).await.unwrap();
    assert_eq!(mocks.index.stored().len(), 1);
}

#[tokio::test]
async fn running_loader_resumes_after_pause() {
    let (mocks, sb, pipeline) = setup();
    let profile = sb.profiles.insert(CrawlProfile::new("local", 1));
    mocks.loader.serve("http://example.test/x", "text/plain", b"x");
    mocks
        .crawl_queues
        .push(LOCAL_CRAWL, Request::new("http://example.test/x", profile, 0));

    sb.jobs.pause(LOCAL_CRAWL, "disk");
    let token = CancellationToken::new();
    let handle = CrawlLoader::new(Arc::clone(&sb), Arc::clone(&pipeline), LOCAL_CRAWL)
        .with_idle_delay(Duration::from_millis(10))
        .spawn(token.clone());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(mocks.loader.loaded().is_empty());

    sb.jobs.resume(LOCAL_CRAWL);
    tokio::time::timeout(Duration::from_secs(1), async {
        while mocks.loader.loaded().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("loader should pick up work after resume");

    token.cancel();
    handle.await.unwrap();
    pipeline.shutdown(true).await.unwrap();
}

#[tokio::test]
async fn pause_during_pop_returns_request_to_queue() {
    let (mocks, sb, pipeline) = setup();
    let profile = sb.profiles.insert(CrawlProfile::new("local", 1));
    mocks.loader.serve("http://example.test/raced", "text/html", b"raced");
    mocks
        .crawl_queues
        .push(LOCAL_CRAWL, Request::new("http://example.test/raced", profile, 0));

    let weak = Arc::downgrade(&sb);
    mocks.log.on("crawl_queues.next_request", move || {
        if let Some(sb) = weak.upgrade() {
            sb.jobs.pause(LOCAL_CRAWL, "disk");
        }
    });

    let loader = CrawlLoader::new(Arc::clone(&sb), Arc::clone(&pipeline), LOCAL_CRAWL);
    assert_eq!(loader.step().await, LoadStep::Paused);
    assert!(mocks.loader.loaded().is_empty());
    assert_eq!(mocks.log.count("crawl_queues.requeue"), 1);

    sb.jobs.resume(LOCAL_CRAWL);
    // The effect pauses again on every pop, so the request keeps coming back
    assert_eq!(loader.step().await, LoadStep::Paused);
    assert_eq!(mocks.crawl_queues.local_size(), 1);
    assert!(mocks.loader.loaded().is_empty());
    pipeline.shutdown(true).await.unwrap();
}

#[tokio::test]
async fn load_failures_are_recorded() {
    let (mocks, sb, pipeline) = setup();
    let profile = sb.profiles.insert(CrawlProfile::new("remote", 0));
    mocks.crawl_queues.push(
        REMOTE_TRIGGERED_CRAWL,
        Request::new("http://example.test/missing", profile, 0),
    );

    let loader = CrawlLoader::new(Arc::clone(&sb), Arc::clone(&pipeline), REMOTE_TRIGGERED_CRAWL);
    assert_eq!(loader.step().await, LoadStep::LoadFailed);

    let failures = mocks.failures.records();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].category, FailCategory::FinalLoadContext);
    pipeline.shutdown(true).await.unwrap();
}

#[tokio::test]
async fn loader_stops_when_pipeline_closes() {
    let (mocks, sb, pipeline) = setup();
    let profile = sb.profiles.insert(CrawlProfile::new("local", 1));
    mocks.loader.serve("http://example.test/late", "text/html", b"late");
    mocks
        .crawl_queues
        .push(LOCAL_CRAWL, Request::new("http://example.test/late", profile, 0));
    pipeline.shutdown(true).await.unwrap();

    let handle = CrawlLoader::new(Arc::clone(&sb), Arc::clone(&pipeline), LOCAL_CRAWL)
        .spawn(CancellationToken::new());
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("loader should exit on a closed pipeline")
        .unwrap();
}
