use crate::hash::DhtHash;
use crate::model::profile::ProfileHandle;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identity of a peer (its seed hash).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        PeerId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a resource came to be indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOrigin {
    /// Fetched through the proxy; no initiating peer
    ProxyLoad,
    /// Crawled on behalf of this peer
    LocalCrawling,
    /// Crawled because another peer asked for it
    GlobalCrawling,
}

impl EventOrigin {
    pub fn classify(initiator: Option<&PeerId>, local_peer: &PeerId) -> Self {
        match initiator {
            None => EventOrigin::ProxyLoad,
            Some(peer) if peer == local_peer => EventOrigin::LocalCrawling,
            Some(_) => EventOrigin::GlobalCrawling,
        }
    }
}

/// Processing state of a response inside the indexing pipeline.
///
/// Observational only; no control decision reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    Parsing,
    Condensing,
    StructureAnalysis,
    IndexStorage,
    Finished,
}

impl fmt::Display for QueueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QueueState::Parsing => "PARSING",
            QueueState::Condensing => "CONDENSING",
            QueueState::StructureAnalysis => "STRUCTUREANALYSIS",
            QueueState::IndexStorage => "INDEXSTORAGE",
            QueueState::Finished => "FINISHED",
        };
        f.write_str(name)
    }
}

/// Shared view on the queue state of one response.
///
/// Cloning the handle lets monitoring code follow a response after the
/// entry carrying it has been handed to the pipeline.
#[derive(Debug, Clone, Default)]
pub struct StatusHandle {
    history: Arc<Mutex<Vec<QueueState>>>,
}

impl StatusHandle {
    pub fn update(&self, state: QueueState) {
        self.history.lock().push(state);
    }

    pub fn current(&self) -> Option<QueueState> {
        self.history.lock().last().copied()
    }

    /// Every state the response has passed through, in order.
    pub fn history(&self) -> Vec<QueueState> {
        self.history.lock().clone()
    }
}

/// A crawl request: what to load, on whose behalf and under which profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub url: String,
    pub referrer_hash: Option<DhtHash>,
    pub initiator: Option<PeerId>,
    pub anchor_name: String,
    pub profile: ProfileHandle,
    pub depth: u32,
    pub applied_at: DateTime<Utc>,
}

impl Request {
    pub fn new(url: impl Into<String>, profile: ProfileHandle, depth: u32) -> Self {
        Self {
            url: url.into(),
            referrer_hash: None,
            initiator: None,
            anchor_name: String::new(),
            profile,
            depth,
            applied_at: Utc::now(),
        }
    }

    pub fn with_initiator(mut self, initiator: PeerId) -> Self {
        self.initiator = Some(initiator);
        self
    }

    pub fn with_referrer(mut self, referrer_hash: DhtHash) -> Self {
        self.referrer_hash = Some(referrer_hash);
        self
    }

    pub fn with_anchor_name(mut self, name: impl Into<String>) -> Self {
        self.anchor_name = name.into();
        self
    }

    pub fn url_hash(&self) -> DhtHash {
        DhtHash::of(&self.url)
    }
}

/// Metadata and payload of one fetched resource.
///
/// Read-only to the pipeline apart from the queue state and the content,
/// which Parse fills from the cache when the loader did not keep it.
#[derive(Debug, Clone)]
pub struct Response {
    request: Request,
    mime_type: String,
    charset: Option<String>,
    content: Option<Vec<u8>>,
    status: StatusHandle,
}

impl Response {
    pub fn new(request: Request, mime_type: impl Into<String>, content: Option<Vec<u8>>) -> Self {
        Self {
            request,
            mime_type: mime_type.into(),
            charset: None,
            content,
            status: StatusHandle::default(),
        }
    }

    pub fn with_charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn url(&self) -> &str {
        &self.request.url
    }

    pub fn url_hash(&self) -> DhtHash {
        self.request.url_hash()
    }

    pub fn referrer_hash(&self) -> Option<DhtHash> {
        self.request.referrer_hash
    }

    pub fn initiator(&self) -> Option<&PeerId> {
        self.request.initiator.as_ref()
    }

    pub fn profile(&self) -> &ProfileHandle {
        &self.request.profile
    }

    pub fn depth(&self) -> u32 {
        self.request.depth
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn charset(&self) -> Option<&str> {
        self.charset.as_deref()
    }

    pub fn content(&self) -> Option<&[u8]> {
        self.content.as_deref()
    }

    pub fn set_content(&mut self, content: Vec<u8>) {
        self.content = Some(content);
    }

    pub fn origin(&self, local_peer: &PeerId) -> EventOrigin {
        EventOrigin::classify(self.initiator(), local_peer)
    }

    pub fn update_status(&self, state: QueueState) {
        self.status.update(state);
    }

    pub fn status(&self) -> StatusHandle {
        self.status.clone()
    }
}
