//! Switchboard wiring as seen by the other crates.

use peerdex_config::NodeConfig;
use peerdex_core::jobs::{LOCAL_CRAWL, REMOTE_TRIGGERED_CRAWL};
use peerdex_core::model::{CrawlProfile, PeerId};
use peerdex_core::test_support::MockServices;
use peerdex_core::{NodeEvent, Switchboard};

fn switchboard() -> Switchboard {
    let mut config = NodeConfig::default();
    config.indexing.stopwords = vec!["The".to_string(), "and".to_string()];
    Switchboard::new(config, PeerId::new("local"), MockServices::new().services())
}

#[test]
fn stopwords_are_lowercased() {
    let sb = switchboard();
    assert!(sb.stopwords().contains("the"));
    assert!(sb.stopwords().contains("and"));
    assert_eq!(sb.stopwords().len(), 2);
}

#[tokio::test]
async fn job_and_gate_events_reach_subscribers() {
    let sb = switchboard();
    let mut events = sb.subscribe();

    sb.jobs.pause(LOCAL_CRAWL, "disk free");
    sb.auto_disable_remote_index();
    sb.jobs.resume(LOCAL_CRAWL);

    assert_eq!(
        events.recv().await.unwrap(),
        NodeEvent::CrawlJobPaused {
            job: LOCAL_CRAWL.to_string(),
            cause: "disk free".to_string()
        }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        NodeEvent::RemoteIndexReceipt {
            accepted: false,
            automatic: true
        }
    );
    assert_eq!(
        events.recv().await.unwrap(),
        NodeEvent::CrawlJobResumed {
            job: LOCAL_CRAWL.to_string()
        }
    );
    assert!(!sb.jobs.is_paused(REMOTE_TRIGGERED_CRAWL));
}

#[test]
fn profiles_are_shared_by_handle() -> anyhow::Result<()> {
    let sb = switchboard();
    let handle = sb.profiles.insert(CrawlProfile::new("intranet", 3));
    let profile = sb
        .profiles
        .get(&handle)
        .ok_or_else(|| anyhow::anyhow!("profile not registered"))?;
    assert_eq!(profile.name, "intranet");
    assert!(!sb.remote_index.is_auto_disabled());
    Ok(())
}
