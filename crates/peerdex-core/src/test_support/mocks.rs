//! Mock implementations of every collaborator trait.
//!
//! The mocks are:
//!
//! - **Observable**: calls are counted or recorded for assertions
//! - **Configurable**: canned results, error injection, scripted readings
//! - **Isolated**: no I/O, everything lives in memory
//!
//! Several mocks can share one [`CallLog`], which keeps a single ordered
//! record of the calls across components. A log can also carry effects that
//! fire when a given call is recorded, for example a probe reading that
//! changes once the HTTP cache has been cleared.
//!
//! # Example
//!
//! ```rust
//! use peerdex_core::test_support::mocks::{CallLog, ScriptedProbe};
//! use std::sync::Arc;
//!
//! let log = CallLog::new();
//! let probe = Arc::new(ScriptedProbe::new());
//! let effect_probe = Arc::clone(&probe);
//! log.on("cache.clear", move || effect_probe.set_disk_free(u64::MAX));
//!
//! log.record("cache.clear");
//! assert_eq!(log.count("cache.clear"), 1);
//! ```

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::error::{ServiceError, ServiceResult};
use crate::hash::DhtHash;
use crate::model::{
    CommittedRecord, Condenser, CrawlProfile, Document, FailureRecord, PeerId,
    ReferenceContainer, Request, Response, WordReference,
};
use crate::switchboard::Services;
use crate::traits::{
    ContentCache, CrawlQueues, CrawlStacker, DocumentParser, FailureSink, IndexStore, IndexingLoad,
    Loader,
    MaintenanceHooks, NetworkStatus, PeerNetwork, SoftCaches, StackRejection, SynonymLibrary,
    SystemProbe, WebStructure,
};

// ============================================================================
// Call log
// ============================================================================

type Effect = Arc<dyn Fn() + Send + Sync>;

/// Ordered record of calls shared by several mocks.
#[derive(Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
    effects: Arc<Mutex<HashMap<String, Vec<Effect>>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a call and run the effects registered for it.
    pub fn record(&self, call: &str) {
        self.calls.lock().push(call.to_string());
        let effects = self.effects.lock().get(call).cloned().unwrap_or_default();
        for effect in effects {
            effect();
        }
    }

    /// Register an effect that runs every time `call` is recorded.
    pub fn on(&self, call: &str, effect: impl Fn() + Send + Sync + 'static) {
        self.effects
            .lock()
            .entry(call.to_string())
            .or_default()
            .push(Arc::new(effect));
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls.lock().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn contains(&self, call: &str) -> bool {
        self.count(call) > 0
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

// ============================================================================
// Parser
// ============================================================================

/// Parser returning canned documents.
///
/// URLs without a canned result parse into a single document whose text is
/// the content interpreted as UTF-8.
#[derive(Default)]
pub struct MockParser {
    documents: Mutex<HashMap<String, Vec<Document>>>,
    failures: Mutex<HashMap<String, String>>,
    delay: Mutex<Option<Duration>>,
    parse_count: AtomicUsize,
}

impl MockParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_documents(&self, url: &str, documents: Vec<Document>) {
        self.documents.lock().insert(url.to_string(), documents);
    }

    pub fn fail_url(&self, url: &str, reason: &str) {
        self.failures.lock().insert(url.to_string(), reason.to_string());
    }

    /// Sleep this long in every parse call.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn parse_count(&self) -> usize {
        self.parse_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentParser for MockParser {
    async fn parse(
        &self,
        url: &str,
        mime_type: &str,
        _charset: Option<&str>,
        content: &[u8],
    ) -> ServiceResult<Vec<Document>> {
        self.parse_count.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(reason) = self.failures.lock().get(url) {
            return Err(ServiceError::Parser(reason.clone()));
        }
        if let Some(documents) = self.documents.lock().get(url) {
            return Ok(documents.clone());
        }
        Ok(vec![Document::new(
            url,
            mime_type,
            String::from_utf8_lossy(content),
        )])
    }
}

// ============================================================================
// Content cache and loader
// ============================================================================

/// HTTP cache keyed by URL hash.
pub struct MockContentCache {
    log: CallLog,
    entries: Mutex<HashMap<DhtHash, Vec<u8>>>,
    fail_clear: AtomicBool,
}

impl MockContentCache {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            entries: Mutex::new(HashMap::new()),
            fail_clear: AtomicBool::new(false),
        }
    }

    pub fn insert(&self, url: &str, content: &[u8]) {
        self.entries.lock().insert(DhtHash::of(url), content.to_vec());
    }

    pub fn set_fail_clear(&self, fail: bool) {
        self.fail_clear.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl ContentCache for MockContentCache {
    async fn get_cached_content(&self, url_hash: DhtHash) -> ServiceResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().get(&url_hash).cloned())
    }

    async fn clear(&self) -> ServiceResult<()> {
        self.log.record("cache.clear");
        if self.fail_clear.load(Ordering::SeqCst) {
            return Err(ServiceError::Cache("cache directory not writable".into()));
        }
        self.entries.lock().clear();
        Ok(())
    }
}

/// Loader serving canned bodies.
#[derive(Default)]
pub struct MockLoader {
    bodies: Mutex<HashMap<String, (String, Vec<u8>)>>,
    loaded: Mutex<Vec<String>>,
}

impl MockLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, mime_type: &str, body: &[u8]) {
        self.bodies
            .lock()
            .insert(url.to_string(), (mime_type.to_string(), body.to_vec()));
    }

    pub fn loaded(&self) -> Vec<String> {
        self.loaded.lock().clone()
    }
}

#[async_trait]
impl Loader for MockLoader {
    async fn load(&self, request: &Request) -> ServiceResult<Response> {
        self.loaded.lock().push(request.url.clone());
        let body = self.bodies.lock().get(&request.url).cloned();
        match body {
            Some((mime_type, content)) => {
                Ok(Response::new(request.clone(), mime_type, Some(content)))
            }
            None => Err(ServiceError::Load(format!("404 for {}", request.url))),
        }
    }
}

// ============================================================================
// Crawl stacker
// ============================================================================

/// Crawl frontier recording stacked links.
#[derive(Default)]
pub struct MockStacker {
    rejections: Mutex<HashMap<String, StackRejection>>,
    enqueued: Mutex<Vec<Request>>,
}

impl MockStacker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&self, url: &str, rejection: StackRejection) {
        self.rejections.lock().insert(url.to_string(), rejection);
    }

    pub fn enqueued(&self) -> Vec<Request> {
        self.enqueued.lock().clone()
    }
}

#[async_trait]
impl CrawlStacker for MockStacker {
    fn check_acceptance(
        &self,
        url: &str,
        _profile: &CrawlProfile,
        _depth: u32,
    ) -> Result<(), StackRejection> {
        match self.rejections.lock().get(url) {
            Some(rejection) => Err(rejection.clone()),
            None => Ok(()),
        }
    }

    async fn enqueue(&self, request: Request) -> ServiceResult<()> {
        self.enqueued.lock().push(request);
        Ok(())
    }
}

// ============================================================================
// Index store
// ============================================================================

/// One `store_document` call as seen by [`MockIndexStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub url: String,
    pub referrer_hash: Option<DhtHash>,
    pub profile: String,
    pub document: Document,
    pub condenser: Condenser,
}

/// Full-text store and reverse word index kept in memory.
pub struct MockIndexStore {
    log: CallLog,
    stored: Mutex<Vec<StoredDocument>>,
    restored: Mutex<Vec<ReferenceContainer>>,
    rwi_count: AtomicU64,
    fail_store: AtomicBool,
    fail_calls: Mutex<HashSet<String>>,
}

impl MockIndexStore {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            stored: Mutex::new(Vec::new()),
            restored: Mutex::new(Vec::new()),
            rwi_count: AtomicU64::new(0),
            fail_store: AtomicBool::new(false),
            fail_calls: Mutex::new(HashSet::new()),
        }
    }

    pub fn stored(&self) -> Vec<StoredDocument> {
        self.stored.lock().clone()
    }

    pub fn restored(&self) -> Vec<ReferenceContainer> {
        self.restored.lock().clone()
    }

    pub fn set_rwi_count(&self, count: u64) {
        self.rwi_count.store(count, Ordering::SeqCst);
    }

    pub fn set_fail_store(&self, fail: bool) {
        self.fail_store.store(fail, Ordering::SeqCst);
    }

    /// Make the maintenance call named `call` (as recorded in the log) fail.
    pub fn fail_call(&self, call: &str) {
        self.fail_calls.lock().insert(call.to_string());
    }

    fn maintenance(&self, call: &str) -> ServiceResult<()> {
        self.log.record(call);
        if self.fail_calls.lock().contains(call) {
            return Err(ServiceError::Storage(format!("{call} failed")));
        }
        Ok(())
    }
}

#[async_trait]
impl IndexStore for MockIndexStore {
    async fn store_document(
        &self,
        url: &str,
        referrer_hash: Option<DhtHash>,
        profile: &CrawlProfile,
        document: &Document,
        condenser: &Condenser,
    ) -> ServiceResult<CommittedRecord> {
        if self.fail_store.load(Ordering::SeqCst) {
            return Err(ServiceError::Storage("index is read-only".into()));
        }
        self.stored.lock().push(StoredDocument {
            url: url.to_string(),
            referrer_hash,
            profile: profile.name.clone(),
            document: document.clone(),
            condenser: condenser.clone(),
        });
        self.rwi_count
            .fetch_add(condenser.distinct_words() as u64, Ordering::SeqCst);
        Ok(CommittedRecord {
            url: document.url.clone(),
            url_hash: DhtHash::of(&document.url),
            word_count: condenser.distinct_words(),
            stored_at: Utc::now(),
        })
    }

    async fn remove(&self, url_hash: DhtHash) -> ServiceResult<()> {
        self.stored.lock().retain(|s| DhtHash::of(&s.url) != url_hash);
        Ok(())
    }

    async fn commit(&self) -> ServiceResult<()> {
        self.maintenance("index.commit")
    }

    async fn optimize(&self, _max_segments: usize) -> ServiceResult<()> {
        self.maintenance("index.optimize")
    }

    fn rwi_count(&self) -> u64 {
        self.rwi_count.load(Ordering::SeqCst)
    }

    async fn trim_references(&self, _max_references: usize) -> ServiceResult<usize> {
        self.maintenance("index.trim_references")?;
        Ok(0)
    }

    async fn restore_references(&self, containers: Vec<ReferenceContainer>) -> ServiceResult<()> {
        let references: usize = containers.iter().map(|c| c.len()).sum();
        self.rwi_count.fetch_add(references as u64, Ordering::SeqCst);
        self.restored.lock().extend(containers);
        Ok(())
    }
}

// ============================================================================
// Web structure, failures, synonyms
// ============================================================================

/// Records citation updates.
#[derive(Default)]
pub struct MockWebStructure {
    cited: Mutex<Vec<DhtHash>>,
}

impl MockWebStructure {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cited(&self) -> Vec<DhtHash> {
        self.cited.lock().clone()
    }
}

#[async_trait]
impl WebStructure for MockWebStructure {
    async fn generate_citation_reference(
        &self,
        url_hash: DhtHash,
        _document: &Document,
    ) -> ServiceResult<()> {
        self.cited.lock().push(url_hash);
        Ok(())
    }
}

/// Failure sink keeping every record.
#[derive(Default)]
pub struct RecordingFailureSink {
    records: Mutex<Vec<FailureRecord>>,
}

impl RecordingFailureSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<FailureRecord> {
        self.records.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl FailureSink for RecordingFailureSink {
    fn record_failure(&self, record: FailureRecord) {
        self.records.lock().push(record);
    }
}

/// Fixed synonym table.
#[derive(Default)]
pub struct StaticSynonyms {
    table: HashMap<String, Vec<String>>,
}

impl StaticSynonyms {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        let mut table: HashMap<String, Vec<String>> = HashMap::new();
        for (word, synonym) in pairs {
            table
                .entry(word.to_string())
                .or_default()
                .push(synonym.to_string());
        }
        Self { table }
    }
}

impl SynonymLibrary for StaticSynonyms {
    fn synonyms(&self, word: &str) -> Vec<String> {
        self.table.get(word).cloned().unwrap_or_default()
    }
}

// ============================================================================
// Peer network
// ============================================================================

/// Peer network with adjustable load readings.
///
/// `select_containers` returns a fresh batch of containers on every call.
/// Each container holds references spread over all vertical partitions, so
/// one selection always produces a chunk for every partition. Containers
/// whose term hash falls outside the requested range are left out.
pub struct MockNetwork {
    status: Mutex<NetworkStatus>,
    partitions: AtomicUsize,
    horizon: Mutex<Option<u64>>,
    connection_load: Mutex<f64>,
    upload: AtomicU64,
    containers_per_selection: AtomicUsize,
    selections: AtomicUsize,
    selection_ranges: Mutex<Vec<(DhtHash, DhtHash)>>,
    transmit_failures: AtomicUsize,
    transmit_delay: Mutex<Option<Duration>>,
    transmitted: Mutex<Vec<(PeerId, Vec<ReferenceContainer>)>>,
    transmit_attempts: AtomicUsize,
    receipts: Mutex<Vec<(PeerId, CommittedRecord)>>,
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self {
            status: Mutex::new(NetworkStatus {
                seed_db_ready: true,
                local_seed_virgin: false,
                dht_active: true,
            }),
            partitions: AtomicUsize::new(4),
            horizon: Mutex::new(Some(u64::MAX / 16)),
            connection_load: Mutex::new(0.0),
            upload: AtomicU64::new(0),
            containers_per_selection: AtomicUsize::new(2),
            selections: AtomicUsize::new(0),
            selection_ranges: Mutex::new(Vec::new()),
            transmit_failures: AtomicUsize::new(0),
            transmit_delay: Mutex::new(None),
            transmitted: Mutex::new(Vec::new()),
            transmit_attempts: AtomicUsize::new(0),
            receipts: Mutex::new(Vec::new()),
        }
    }
}

impl MockNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_status(&self, status: NetworkStatus) {
        *self.status.lock() = status;
    }

    pub fn set_partitions(&self, partitions: usize) {
        self.partitions.store(partitions, Ordering::SeqCst);
    }

    pub fn set_horizon(&self, horizon: Option<u64>) {
        *self.horizon.lock() = horizon;
    }

    pub fn set_connection_load(&self, percent: f64) {
        *self.connection_load.lock() = percent;
    }

    pub fn set_upload_bytes_per_sec(&self, bytes: u64) {
        self.upload.store(bytes, Ordering::SeqCst);
    }

    pub fn set_containers_per_selection(&self, count: usize) {
        self.containers_per_selection.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` transmissions.
    pub fn fail_transmissions(&self, count: usize) {
        self.transmit_failures.store(count, Ordering::SeqCst);
    }

    pub fn set_transmit_delay(&self, delay: Duration) {
        *self.transmit_delay.lock() = Some(delay);
    }

    pub fn selections(&self) -> usize {
        self.selections.load(Ordering::SeqCst)
    }

    /// `(start, limit)` of every selection, oldest first.
    pub fn selection_ranges(&self) -> Vec<(DhtHash, DhtHash)> {
        self.selection_ranges.lock().clone()
    }

    pub fn transmitted(&self) -> Vec<(PeerId, Vec<ReferenceContainer>)> {
        self.transmitted.lock().clone()
    }

    pub fn transmit_attempts(&self) -> usize {
        self.transmit_attempts.load(Ordering::SeqCst)
    }

    pub fn receipts(&self) -> Vec<(PeerId, CommittedRecord)> {
        self.receipts.lock().clone()
    }
}

#[async_trait]
impl PeerNetwork for MockNetwork {
    fn status(&self) -> NetworkStatus {
        *self.status.lock()
    }

    fn vertical_partitions(&self) -> usize {
        self.partitions.load(Ordering::SeqCst)
    }

    fn dht_horizon(&self) -> Option<u64> {
        *self.horizon.lock()
    }

    fn dht_target(&self, term_hash: DhtHash, vertical: usize) -> Option<PeerId> {
        Some(PeerId::new(format!("peer-{vertical}-{:02x}", term_hash.0 >> 56)))
    }

    async fn select_containers(
        &self,
        start: DhtHash,
        limit: DhtHash,
        max_containers: usize,
        max_references: usize,
    ) -> ServiceResult<Vec<ReferenceContainer>> {
        self.selection_ranges.lock().push((start, limit));
        let batch = self.selections.fetch_add(1, Ordering::SeqCst) as u64;
        let partitions = self.vertical_partitions().max(1) as u64;
        let count = self.containers_per_selection.load(Ordering::SeqCst).min(max_containers);
        let step = u64::MAX / partitions;

        let containers = (0..count as u64)
            .map(|i| {
                let references = (0..partitions)
                    .take(max_references)
                    .map(|v| WordReference::new(DhtHash(v * step + step / 2 + batch * 1_000 + i), 1, 0))
                    .collect();
                ReferenceContainer::with_references(start.offset(i), references)
            })
            .filter(|container| container.term_hash.in_range(start, limit))
            .collect();
        Ok(containers)
    }

    async fn transmit(&self, target: &PeerId, containers: &[ReferenceContainer]) -> ServiceResult<()> {
        self.transmit_attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.transmit_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failed = self
            .transmit_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(ServiceError::Network(format!("{target} refused the transfer")));
        }
        self.transmitted
            .lock()
            .push((target.clone(), containers.to_vec()));
        Ok(())
    }

    fn connection_load_percent(&self) -> f64 {
        *self.connection_load.lock()
    }

    fn active_upload_bytes_per_sec(&self) -> u64 {
        self.upload.load(Ordering::SeqCst)
    }

    async fn send_receipt(&self, peer: &PeerId, record: &CommittedRecord) -> ServiceResult<()> {
        self.receipts.lock().push((peer.clone(), record.clone()));
        Ok(())
    }
}

// ============================================================================
// Crawl queues, maintenance, soft caches
// ============================================================================

/// Crawl queues holding requests per job type.
pub struct MockCrawlQueues {
    log: CallLog,
    queues: Mutex<HashMap<String, VecDeque<Request>>>,
    extra_size: AtomicUsize,
}

impl MockCrawlQueues {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            queues: Mutex::new(HashMap::new()),
            extra_size: AtomicUsize::new(0),
        }
    }

    pub fn push(&self, job: &str, request: Request) {
        self.queues
            .lock()
            .entry(job.to_string())
            .or_default()
            .push_back(request);
    }

    /// Pretend the queues hold `count` more entries than were pushed.
    pub fn set_extra_size(&self, count: usize) {
        self.extra_size.store(count, Ordering::SeqCst);
    }
}

#[async_trait]
impl CrawlQueues for MockCrawlQueues {
    fn size(&self) -> usize {
        let queued: usize = self.queues.lock().values().map(|q| q.len()).sum();
        queued + self.extra_size.load(Ordering::SeqCst)
    }

    fn local_size(&self) -> usize {
        self.queues
            .lock()
            .get(crate::jobs::LOCAL_CRAWL)
            .map(|q| q.len())
            .unwrap_or(0)
    }

    async fn clear(&self) -> ServiceResult<usize> {
        self.log.record("crawl_queues.clear");
        let removed = self.size();
        self.queues.lock().clear();
        self.extra_size.store(0, Ordering::SeqCst);
        Ok(removed)
    }

    async fn next_request(&self, job: &str) -> Option<Request> {
        let request = self.queues.lock().get_mut(job).and_then(|q| q.pop_front());
        if request.is_some() {
            self.log.record("crawl_queues.next_request");
        }
        request
    }

    async fn requeue(&self, job: &str, request: Request) -> ServiceResult<()> {
        self.log.record("crawl_queues.requeue");
        self.queues
            .lock()
            .entry(job.to_string())
            .or_default()
            .push_front(request);
        Ok(())
    }
}

/// Maintenance hooks recorded in a [`CallLog`].
pub struct MockMaintenance {
    log: CallLog,
    has_citation_index: AtomicBool,
    failing: Mutex<HashSet<String>>,
}

impl MockMaintenance {
    pub fn new(log: CallLog) -> Self {
        Self {
            log,
            has_citation_index: AtomicBool::new(true),
            failing: Mutex::new(HashSet::new()),
        }
    }

    pub fn set_has_citation_index(&self, present: bool) {
        self.has_citation_index.store(present, Ordering::SeqCst);
    }

    /// Make the hook named `call` (as recorded in the log) fail.
    pub fn fail_call(&self, call: &str) {
        self.failing.lock().insert(call.to_string());
    }

    fn run(&self, call: &str) -> ServiceResult<()> {
        self.log.record(call);
        if self.failing.lock().contains(call) {
            return Err(ServiceError::Io(format!("{call}: permission denied")));
        }
        Ok(())
    }
}

#[async_trait]
impl MaintenanceHooks for MockMaintenance {
    async fn clear_search_failures(&self) -> ServiceResult<()> {
        self.run("maintenance.clear_search_failures")
    }

    async fn clear_robots_cache(&self) -> ServiceResult<()> {
        self.run("maintenance.clear_robots_cache")
    }

    async fn clear_news(&self) -> ServiceResult<()> {
        self.run("maintenance.clear_news")
    }

    async fn clear_citation_index(&self) -> ServiceResult<bool> {
        self.run("maintenance.clear_citation_index")?;
        Ok(self.has_citation_index.load(Ordering::SeqCst))
    }
}

/// Soft caches recorded in a [`CallLog`].
pub struct MockSoftCaches {
    log: CallLog,
}

impl MockSoftCaches {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

impl SoftCaches for MockSoftCaches {
    fn clear_search_events(&self) {
        self.log.record("soft.search_events");
    }

    fn clear_result_trail(&self) {
        self.log.record("soft.result_trail");
    }

    fn clear_blacklist_cache(&self) {
        self.log.record("soft.blacklist");
    }

    fn clear_common_words(&self) {
        self.log.record("soft.common_words");
    }

    fn clear_host_cache(&self) {
        self.log.record("soft.host_cache");
    }
}

// ============================================================================
// System probe
// ============================================================================

/// Probe returning scripted readings. A reading set to `None` fails.
pub struct ScriptedProbe {
    disk_free: Mutex<Option<u64>>,
    dir_size: Mutex<Option<u64>>,
    memory_free: Mutex<Option<u64>>,
    dir_size_calls: AtomicUsize,
}

impl Default for ScriptedProbe {
    fn default() -> Self {
        Self {
            disk_free: Mutex::new(Some(u64::MAX)),
            dir_size: Mutex::new(Some(0)),
            memory_free: Mutex::new(Some(u64::MAX)),
            dir_size_calls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedProbe {
    /// A probe reporting plenty of every resource.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_disk_free(&self, bytes: u64) {
        *self.disk_free.lock() = Some(bytes);
    }

    pub fn set_dir_size(&self, bytes: u64) {
        *self.dir_size.lock() = Some(bytes);
    }

    pub fn set_memory_free(&self, bytes: u64) {
        *self.memory_free.lock() = Some(bytes);
    }

    pub fn fail_disk_free(&self) {
        *self.disk_free.lock() = None;
    }

    pub fn fail_dir_size(&self) {
        *self.dir_size.lock() = None;
    }

    pub fn fail_memory_free(&self) {
        *self.memory_free.lock() = None;
    }

    pub fn dir_size_calls(&self) -> usize {
        self.dir_size_calls.load(Ordering::SeqCst)
    }
}

fn reading(value: Option<u64>, what: &str) -> ServiceResult<u64> {
    value.ok_or_else(|| ServiceError::Probe(format!("{what} unavailable")))
}

impl SystemProbe for ScriptedProbe {
    fn disk_free(&self, _path: &Path) -> ServiceResult<u64> {
        reading(*self.disk_free.lock(), "disk free")
    }

    fn dir_size(&self, _path: &Path) -> ServiceResult<u64> {
        self.dir_size_calls.fetch_add(1, Ordering::SeqCst);
        reading(*self.dir_size.lock(), "directory size")
    }

    fn memory_free(&self) -> ServiceResult<u64> {
        reading(*self.memory_free.lock(), "free memory")
    }
}

/// Indexing load with a settable queue size.
#[derive(Default)]
pub struct FixedIndexingLoad(AtomicUsize);

impl FixedIndexingLoad {
    pub fn new(size: usize) -> Self {
        FixedIndexingLoad(AtomicUsize::new(size))
    }

    pub fn set(&self, size: usize) {
        self.0.store(size, Ordering::SeqCst);
    }
}

impl IndexingLoad for FixedIndexingLoad {
    fn queue_size(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// Every mock, wired to one shared [`CallLog`].
#[derive(Clone)]
pub struct MockServices {
    pub log: CallLog,
    pub parser: Arc<MockParser>,
    pub cache: Arc<MockContentCache>,
    pub loader: Arc<MockLoader>,
    pub stacker: Arc<MockStacker>,
    pub index: Arc<MockIndexStore>,
    pub web_structure: Arc<MockWebStructure>,
    pub failures: Arc<RecordingFailureSink>,
    pub network: Arc<MockNetwork>,
    pub crawl_queues: Arc<MockCrawlQueues>,
    pub maintenance: Arc<MockMaintenance>,
    pub soft_caches: Arc<MockSoftCaches>,
    pub probe: Arc<ScriptedProbe>,
}

impl Default for MockServices {
    fn default() -> Self {
        Self::new()
    }
}

impl MockServices {
    pub fn new() -> Self {
        let log = CallLog::new();
        Self {
            parser: Arc::new(MockParser::new()),
            cache: Arc::new(MockContentCache::new(log.clone())),
            loader: Arc::new(MockLoader::new()),
            stacker: Arc::new(MockStacker::new()),
            index: Arc::new(MockIndexStore::new(log.clone())),
            web_structure: Arc::new(MockWebStructure::new()),
            failures: Arc::new(RecordingFailureSink::new()),
            network: Arc::new(MockNetwork::new()),
            crawl_queues: Arc::new(MockCrawlQueues::new(log.clone())),
            maintenance: Arc::new(MockMaintenance::new(log.clone())),
            soft_caches: Arc::new(MockSoftCaches::new(log.clone())),
            probe: Arc::new(ScriptedProbe::new()),
            log,
        }
    }

    /// The mocks as trait objects.
    pub fn services(&self) -> Services {
        Services {
            parser: self.parser.clone(),
            cache: self.cache.clone(),
            loader: self.loader.clone(),
            stacker: self.stacker.clone(),
            index: self.index.clone(),
            web_structure: self.web_structure.clone(),
            failures: self.failures.clone(),
            network: self.network.clone(),
            crawl_queues: self.crawl_queues.clone(),
            maintenance: self.maintenance.clone(),
            soft_caches: self.soft_caches.clone(),
            probe: self.probe.clone(),
            synonyms: None,
        }
    }
}
