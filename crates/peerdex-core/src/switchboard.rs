//! The node context shared by every component.
//!
//! One [`Switchboard`] is built at startup and handed to the pipeline, the
//! resource observer and the DHT dispatcher as an `Arc`. It owns all state
//! that more than one of them touches.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use peerdex_config::NodeConfig;
use tokio::sync::broadcast;
use tracing::info;

use crate::activity::ActivityTracker;
use crate::events::NodeEvent;
use crate::jobs::CrawlJobController;
use crate::model::{EventOrigin, PeerId, ProfileRegistry};
use crate::traits::{
    ContentCache, CrawlQueues, CrawlStacker, DocumentParser, FailureSink, IndexStore, Loader,
    MaintenanceHooks, PeerNetwork, SoftCaches, SynonymLibrary, SystemProbe, WebStructure,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// The external collaborators of the node.
#[derive(Clone)]
pub struct Services {
    pub parser: Arc<dyn DocumentParser>,
    pub cache: Arc<dyn ContentCache>,
    pub loader: Arc<dyn Loader>,
    pub stacker: Arc<dyn CrawlStacker>,
    pub index: Arc<dyn IndexStore>,
    pub web_structure: Arc<dyn WebStructure>,
    pub failures: Arc<dyn FailureSink>,
    pub network: Arc<dyn PeerNetwork>,
    pub crawl_queues: Arc<dyn CrawlQueues>,
    pub maintenance: Arc<dyn MaintenanceHooks>,
    pub soft_caches: Arc<dyn SoftCaches>,
    pub probe: Arc<dyn SystemProbe>,
    pub synonyms: Option<Arc<dyn SynonymLibrary>>,
}

/// Whether the node accepts index fragments distributed by other peers.
///
/// The resource observer may switch receipt off on its own; that automatic
/// choice is flagged so recovery only undoes what the observer did and never
/// overrides an operator.
#[derive(Debug)]
pub struct RemoteIndexGate {
    accept: AtomicBool,
    auto_disabled: AtomicBool,
}

impl RemoteIndexGate {
    pub fn new(accept: bool) -> Self {
        Self {
            accept: AtomicBool::new(accept),
            auto_disabled: AtomicBool::new(false),
        }
    }

    pub fn accepts(&self) -> bool {
        self.accept.load(Ordering::Acquire)
    }

    pub fn is_auto_disabled(&self) -> bool {
        self.auto_disabled.load(Ordering::Acquire)
    }

    /// Operator choice. Clears any automatic flag.
    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::Release);
        self.auto_disabled.store(false, Ordering::Release);
    }

    /// Disable receipt on behalf of the observer. Returns `true` if receipt
    /// was enabled before.
    pub fn auto_disable(&self) -> bool {
        if self.accept.swap(false, Ordering::AcqRel) {
            self.auto_disabled.store(true, Ordering::Release);
            true
        } else {
            false
        }
    }

    /// Re-enable receipt if, and only if, the observer disabled it.
    pub fn auto_enable(&self) -> bool {
        if self.auto_disabled.swap(false, Ordering::AcqRel) {
            self.accept.store(true, Ordering::Release);
            true
        } else {
            false
        }
    }
}

/// Page counters per indexing origin.
#[derive(Debug, Default)]
pub struct IndexingCounters {
    proxy: AtomicU64,
    local: AtomicU64,
    remote: AtomicU64,
}

impl IndexingCounters {
    pub fn record(&self, origin: EventOrigin) {
        let counter = match origin {
            EventOrigin::ProxyLoad => &self.proxy,
            EventOrigin::LocalCrawling => &self.local,
            EventOrigin::GlobalCrawling => &self.remote,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, origin: EventOrigin) -> u64 {
        match origin {
            EventOrigin::ProxyLoad => self.proxy.load(Ordering::Relaxed),
            EventOrigin::LocalCrawling => self.local.load(Ordering::Relaxed),
            EventOrigin::GlobalCrawling => self.remote.load(Ordering::Relaxed),
        }
    }

    pub fn total(&self) -> u64 {
        self.proxy.load(Ordering::Relaxed)
            + self.local.load(Ordering::Relaxed)
            + self.remote.load(Ordering::Relaxed)
    }
}

/// Shared node context.
pub struct Switchboard {
    pub config: NodeConfig,
    pub local_peer: PeerId,
    pub services: Services,
    pub profiles: ProfileRegistry,
    pub jobs: CrawlJobController,
    pub activity: ActivityTracker,
    pub remote_index: RemoteIndexGate,
    pub counters: IndexingCounters,
    stopwords: HashSet<String>,
    events: broadcast::Sender<NodeEvent>,
}

impl Switchboard {
    pub fn new(config: NodeConfig, local_peer: PeerId, services: Services) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let stopwords = config
            .indexing
            .stopwords
            .iter()
            .map(|word| word.to_lowercase())
            .collect();
        info!(peer = %local_peer, "switchboard initialized");
        Self {
            jobs: CrawlJobController::new(events.clone()),
            config,
            local_peer,
            services,
            profiles: ProfileRegistry::new(),
            activity: ActivityTracker::new(),
            remote_index: RemoteIndexGate::new(true),
            counters: IndexingCounters::default(),
            stopwords,
            events,
        }
    }

    pub fn stopwords(&self) -> &HashSet<String> {
        &self.stopwords
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.events.subscribe()
    }

    /// Broadcast an event. Having no subscribers is fine.
    pub fn emit(&self, event: NodeEvent) {
        let _ = self.events.send(event);
    }

    /// Toggle remote index receipt on behalf of the observer and report it.
    pub fn auto_disable_remote_index(&self) -> bool {
        let changed = self.remote_index.auto_disable();
        if changed {
            self.emit(NodeEvent::RemoteIndexReceipt {
                accepted: false,
                automatic: true,
            });
        }
        changed
    }

    pub fn auto_enable_remote_index(&self) -> bool {
        let changed = self.remote_index.auto_enable();
        if changed {
            self.emit(NodeEvent::RemoteIndexReceipt {
                accepted: true,
                automatic: true,
            });
        }
        changed
    }
}
