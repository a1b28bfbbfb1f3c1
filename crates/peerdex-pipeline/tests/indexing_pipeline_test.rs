//! Indexing pipeline behaviour against in-memory collaborators.

use std::sync::Arc;
use std::time::Duration;

use peerdex_config::NodeConfig;
use peerdex_core::model::{
    Anchor, CrawlProfile, Document, FailCategory, IndexingQueueEntry, PeerId, ProfileHandle,
    QueueState, Request, Response,
};
use peerdex_core::test_support::MockServices;
use peerdex_core::traits::StackRejection;
use peerdex_core::{NodeEvent, Switchboard};
use peerdex_pipeline::indexing::CondenseProcessor;
use peerdex_pipeline::{IndexingPipeline, StageOutcome, StageProcessor};

const URL: &str = "http://example.test/a.html";

struct Harness {
    mocks: MockServices,
    switchboard: Arc<Switchboard>,
    pipeline: IndexingPipeline,
    profile: ProfileHandle,
}

fn harness_with(config: NodeConfig, profile: CrawlProfile) -> Harness {
    let mocks = MockServices::new();
    let switchboard = Arc::new(Switchboard::new(
        config,
        PeerId::new("local"),
        mocks.services(),
    ));
    let profile = switchboard.profiles.insert(profile);
    let pipeline = IndexingPipeline::spawn(Arc::clone(&switchboard));
    Harness {
        mocks,
        switchboard,
        pipeline,
        profile,
    }
}

fn text_profile() -> CrawlProfile {
    let mut profile = CrawlProfile::new("text-only", 2);
    profile.index_text = true;
    profile.index_media = false;
    profile
}

fn harness() -> Harness {
    harness_with(NodeConfig::default(), text_profile())
}

fn response(profile: &ProfileHandle, url: &str, body: &str) -> Response {
    Response::new(
        Request::new(url, profile.clone(), 0),
        "text/html",
        Some(body.as_bytes().to_vec()),
    )
}

#[tokio::test]
async fn single_document_is_indexed_end_to_end() {
    let h = harness();
    let response = response(&h.profile, URL, "hello peer to peer world");
    let status = response.status();

    h.pipeline.submit_response(response).await.unwrap();
    h.pipeline.shutdown(true).await.unwrap();

    let stored = h.mocks.index.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].url, URL);
    assert_eq!(stored[0].document.url, URL);
    assert!(stored[0].condenser.word("hello").is_some());
    assert_eq!(status.current(), Some(QueueState::Finished));
    assert!(h.mocks.failures.is_empty());
}

#[tokio::test]
async fn status_passes_every_stage_once_in_order() {
    let h = harness();
    let mut statuses = Vec::new();
    for i in 0..8 {
        let response = response(&h.profile, &format!("http://example.test/{i}.html"), "some words");
        statuses.push(response.status());
        h.pipeline.submit_response(response).await.unwrap();
    }
    h.pipeline.shutdown(true).await.unwrap();

    for status in statuses {
        assert_eq!(
            status.history(),
            vec![
                QueueState::Parsing,
                QueueState::Condensing,
                QueueState::StructureAnalysis,
                QueueState::IndexStorage,
                QueueState::Finished,
            ]
        );
    }
    assert_eq!(h.mocks.index.stored().len(), 8);
    assert_eq!(h.mocks.web_structure.cited().len(), 8);
}

#[tokio::test]
async fn condense_keeps_only_permitted_documents_aligned() {
    let h = harness();
    let documents = vec![
        Document::new("http://example.test/a#1", "text/html", "alpha words"),
        Document::new("http://example.test/a#2", "text/html", "beta words").denied(),
        Document::new("http://example.test/a#3", "text/html", "gamma words"),
        Document::new("http://example.test/a#4", "text/html", "delta words").denied(),
    ];
    let entry = IndexingQueueEntry::with_documents(response(&h.profile, URL, ""), documents);

    let condense = CondenseProcessor::new(Arc::clone(&h.switchboard));
    let StageOutcome::Passed(entry) = condense.process(entry).await else {
        panic!("condense must forward the entry");
    };

    let documents = entry.documents().unwrap();
    let condensers = entry.condensers().unwrap();
    assert_eq!(documents.len(), 2);
    assert_eq!(condensers.len(), 2);
    assert_eq!(documents[0].url, "http://example.test/a#1");
    assert_eq!(documents[1].url, "http://example.test/a#3");
    assert!(condensers[0].as_ref().unwrap().word("alpha").is_some());
    assert!(condensers[1].as_ref().unwrap().word("gamma").is_some());

    let failures = h.mocks.failures.records();
    assert_eq!(failures.len(), 2);
    assert!(failures
        .iter()
        .all(|f| f.category == FailCategory::FinalProcessContext));
    assert_eq!(failures[0].url, "http://example.test/a#2");
    assert_eq!(failures[1].url, "http://example.test/a#4");
}

#[tokio::test]
async fn intranet_mode_ignores_noindex() {
    let mut config = NodeConfig::default();
    config.indexing.intranet_mode = true;
    let h = harness_with(config, text_profile());
    let documents = vec![Document::new(URL, "text/html", "internal page").denied()];

    h.pipeline
        .submit(IndexingQueueEntry::with_documents(response(&h.profile, URL, ""), documents))
        .await
        .unwrap();
    h.pipeline.shutdown(true).await.unwrap();

    assert_eq!(h.mocks.index.stored().len(), 1);
    assert!(h.mocks.failures.is_empty());
}

#[tokio::test]
async fn all_documents_denied_finishes_without_store() {
    let h = harness();
    h.mocks
        .parser
        .set_documents(URL, vec![Document::new(URL, "text/html", "secret").denied()]);
    let response = response(&h.profile, URL, "<html/>");
    let status = response.status();

    h.pipeline.submit_response(response).await.unwrap();
    h.pipeline.shutdown(true).await.unwrap();

    assert!(h.mocks.index.stored().is_empty());
    assert_eq!(h.mocks.failures.len(), 1);
    assert_eq!(status.current(), Some(QueueState::Finished));
}

#[tokio::test]
async fn profile_without_indexing_passes_through_silently() {
    let mut profile = CrawlProfile::new("crawl-only", 1);
    profile.index_text = false;
    profile.index_media = false;
    let h = harness_with(NodeConfig::default(), profile);
    let response = response(&h.profile, URL, "words");
    let status = response.status();

    h.pipeline.submit_response(response).await.unwrap();
    h.pipeline.shutdown(true).await.unwrap();

    assert!(h.mocks.index.stored().is_empty());
    assert!(h.mocks.failures.is_empty());
    assert_eq!(status.current(), Some(QueueState::Finished));
}

#[tokio::test]
async fn media_urls_are_skipped_for_text_profiles() {
    let h = harness();
    let response = Response::new(
        Request::new("http://example.test/cat.jpg", h.profile.clone(), 0),
        "image/jpeg",
        Some(vec![0xff, 0xd8]),
    );

    h.pipeline.submit_response(response).await.unwrap();
    h.pipeline.shutdown(true).await.unwrap();

    assert!(h.mocks.index.stored().is_empty());
    assert!(h.mocks.failures.is_empty());
}

#[tokio::test]
async fn url_filter_rejection_is_recorded() {
    let mut profile = text_profile();
    profile.index_url_must_not_match =
        peerdex_core::model::UrlPattern::new(r".*/private/.*").unwrap();
    let h = harness_with(NodeConfig::default(), profile);

    h.pipeline
        .submit_response(response(&h.profile, "http://example.test/private/x.html", "words"))
        .await
        .unwrap();
    h.pipeline.shutdown(true).await.unwrap();

    assert!(h.mocks.index.stored().is_empty());
    let failures = h.mocks.failures.records();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].category, FailCategory::FinalProcessContext);
}

#[tokio::test]
async fn content_is_read_from_cache_when_missing() {
    let h = harness();
    h.mocks.cache.insert(URL, b"cached body words");
    let response = Response::new(Request::new(URL, h.profile.clone(), 0), "text/html", None);

    h.pipeline.submit_response(response).await.unwrap();
    h.pipeline.shutdown(true).await.unwrap();

    let stored = h.mocks.index.stored();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].condenser.word("cached").is_some());
}

#[tokio::test]
async fn missing_content_is_a_load_failure() {
    let h = harness();
    let response = Response::new(Request::new(URL, h.profile.clone(), 0), "text/html", None);

    h.pipeline.submit_response(response).await.unwrap();
    h.pipeline.shutdown(true).await.unwrap();

    assert!(h.mocks.index.stored().is_empty());
    assert_eq!(h.mocks.parser.parse_count(), 0);
    let failures = h.mocks.failures.records();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].category, FailCategory::FinalLoadContext);
    assert_eq!(failures[0].reason, "missing in cache");
}

#[tokio::test]
async fn parser_error_drops_entry_and_records_url() {
    let h = harness();
    h.mocks.parser.fail_url(URL, "truncated document");

    h.pipeline
        .submit_response(response(&h.profile, URL, "<html"))
        .await
        .unwrap();
    h.pipeline.shutdown(true).await.unwrap();

    assert!(h.mocks.index.stored().is_empty());
    let failures = h.mocks.failures.records();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].url, URL);
    assert!(failures[0].reason.contains("truncated document"));
}

#[tokio::test]
async fn rejected_documents_are_removed_after_parsing() {
    let h = harness();
    let kept = Document::new("http://example.test/a#kept", "text/html", "kept");
    let double = Document::new("http://example.test/a#double", "text/html", "double");
    let banned = Document::new("http://example.test/a#banned", "text/html", "banned");
    h.mocks
        .parser
        .set_documents(URL, vec![kept, double.clone(), banned.clone()]);
    h.mocks.stacker.reject(&double.url, StackRejection::Double);
    h.mocks
        .stacker
        .reject(&banned.url, StackRejection::Rejected("host blacklisted".into()));

    h.pipeline
        .submit_response(response(&h.profile, URL, "<html/>"))
        .await
        .unwrap();
    h.pipeline.shutdown(true).await.unwrap();

    let stored = h.mocks.index.stored();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].document.url, "http://example.test/a#kept");
    let failures = h.mocks.failures.records();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].url, banned.url);
    assert_eq!(failures[0].category, FailCategory::FinalLoadContext);
}

#[tokio::test]
async fn stopwords_are_removed_before_storing() {
    let mut config = NodeConfig::default();
    config.indexing.stopwords = vec!["the".to_string()];
    let h = harness_with(config, text_profile());

    h.pipeline
        .submit_response(response(&h.profile, URL, "the quick fox"))
        .await
        .unwrap();
    h.pipeline.shutdown(true).await.unwrap();

    let stored = h.mocks.index.stored();
    assert!(stored[0].condenser.word("the").is_none());
    assert!(stored[0].condenser.word("quick").is_some());
}

#[tokio::test]
async fn store_failure_is_recorded_and_not_fatal() {
    let h = harness();
    h.mocks.index.set_fail_store(true);
    let response = response(&h.profile, URL, "words");
    let status = response.status();

    h.pipeline.submit_response(response).await.unwrap();
    h.pipeline.shutdown(true).await.unwrap();

    assert_eq!(h.mocks.failures.len(), 1);
    assert_eq!(status.current(), Some(QueueState::Finished));
}

#[tokio::test]
async fn local_crawl_links_are_stacked() {
    let h = harness();
    h.mocks.parser.set_documents(
        URL,
        vec![Document::new(URL, "text/html", "links")
            .with_anchor(Anchor::new("http://example.test/b.html", "b"))
            .with_anchor(Anchor::new("http://example.test/c.html", "c"))],
    );
    let request = Request::new(URL, h.profile.clone(), 0).with_initiator(PeerId::new("local"));
    let response = Response::new(request, "text/html", Some(b"<html/>".to_vec()));

    h.pipeline.submit_response(response).await.unwrap();
    h.pipeline.shutdown(true).await.unwrap();

    let stacked = h.mocks.stacker.enqueued();
    assert_eq!(stacked.len(), 2);
    assert!(stacked.iter().all(|r| r.depth == 1));
    assert!(stacked.iter().all(|r| r.referrer_hash == Some(peerdex_core::DhtHash::of(URL))));
}

#[tokio::test]
async fn links_beyond_profile_depth_are_not_stacked() {
    let h = harness();
    h.mocks.parser.set_documents(
        URL,
        vec![Document::new(URL, "text/html", "links")
            .with_anchor(Anchor::new("http://example.test/b.html", "b"))],
    );
    let response = Response::new(
        Request::new(URL, h.profile.clone(), 2),
        "text/html",
        Some(b"<html/>".to_vec()),
    );

    h.pipeline.submit_response(response).await.unwrap();
    h.pipeline.shutdown(true).await.unwrap();

    assert!(h.mocks.stacker.enqueued().is_empty());
    assert_eq!(h.mocks.index.stored().len(), 1);
}

#[tokio::test]
async fn remote_crawl_sends_receipt_and_skips_stacking() {
    let h = harness();
    let mut events = h.switchboard.subscribe();
    h.mocks.parser.set_documents(
        URL,
        vec![Document::new(URL, "text/html", "remote words")
            .with_anchor(Anchor::new("http://example.test/b.html", "b"))],
    );
    let remote = PeerId::new("remote-peer");
    let request = Request::new(URL, h.profile.clone(), 0).with_initiator(remote.clone());
    let response = Response::new(request, "text/html", Some(b"<html/>".to_vec()));

    h.pipeline.submit_response(response).await.unwrap();
    h.pipeline.shutdown(true).await.unwrap();

    assert!(h.mocks.stacker.enqueued().is_empty());
    tokio::time::timeout(Duration::from_secs(1), async {
        while h.mocks.network.receipts().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("receipt should be sent");
    assert_eq!(h.mocks.network.receipts()[0].0, remote);

    match events.recv().await.unwrap() {
        NodeEvent::Indexed { url, origin, .. } => {
            assert_eq!(url, URL);
            assert_eq!(origin, peerdex_core::model::EventOrigin::GlobalCrawling);
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(
        h.switchboard
            .counters
            .get(peerdex_core::model::EventOrigin::GlobalCrawling),
        1
    );
}

#[tokio::test]
async fn unknown_profile_is_recorded() {
    let h = harness();
    h.pipeline
        .submit_response(response(&ProfileHandle::new("gone"), URL, "words"))
        .await
        .unwrap();
    h.pipeline.shutdown(true).await.unwrap();

    assert!(h.mocks.index.stored().is_empty());
    assert_eq!(h.mocks.failures.len(), 1);
}

#[tokio::test]
async fn submit_after_shutdown_is_rejected() {
    let h = harness();
    h.pipeline.shutdown(true).await.unwrap();
    assert!(h
        .pipeline
        .submit_response(response(&h.profile, URL, "late"))
        .await
        .is_err());
}
