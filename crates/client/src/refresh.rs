//! Refresh orchestration.
//!
//! Decides per request whether a collection's snapshot is fresh enough,
//! whether we are online, and which source (incremental sync or the mirror)
//! to pull from. Network work runs on spawned tasks; completion callbacks
//! and notices always go back through the injected [`Host`].
//!
//! Besides per-request refreshes there are three whole-registry passes:
//! [`Refresher::check_all`] at startup, [`Refresher::update_all`] on demand,
//! and [`Refresher::export_to`] for publishing mirror snapshots.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tagcache_core::cache::unix_now;
use tagcache_core::{AppConfig, Host, MainTask, Page, Registry, SnapshotStore, search};
use tokio::task::JoinHandle;

use crate::mirror::{MirrorClient, MirrorError};
use crate::notion::{NotionClient, NotionConfig, NotionError, QueryTransport};
use crate::probe::{Connectivity, HttpProbe};
use crate::sync::{SyncOptions, build_snapshot, sync_pages};

pub const UPDATE_COMPLETE_NOTICE: &str = "Cache successfully downloaded and updated";
pub const STALE_NOTICE: &str = "Newer database version available. Run an update.";

/// Errors from building a refresher or running a full update.
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("offline: cannot reach the network")]
    Offline,

    #[error("failed to download {name} database from the mirror: {source}")]
    Mirror {
        name: String,
        #[source]
        source: MirrorError,
    },

    #[error(transparent)]
    Setup(#[from] MirrorError),

    #[error(transparent)]
    Store(#[from] tagcache_core::Error),

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no Notion token configured")]
    NoTransport,

    #[error("failed to fetch {name} database from Notion: {source}")]
    Sync {
        name: String,
        #[source]
        source: NotionError,
    },
}

/// What the startup check did for one collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CheckOutcome {
    /// Snapshot was within its expiry window.
    Fresh,
    /// Replaced from the mirror.
    Mirrored { pages: usize },
    /// Mirror failed; merged an incremental sync instead.
    Synced { pages: usize },
    /// Expired, but another refresh of it was already running.
    Busy,
    /// Expired and we could not reach the network.
    Offline,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionCheck {
    pub collection_id: String,
    pub name: String,
    #[serde(flatten)]
    pub outcome: CheckOutcome,
}

/// One collection written by [`Refresher::export_to`].
#[derive(Debug, Clone, Serialize)]
pub struct ExportedCollection {
    pub collection_id: String,
    pub name: String,
    pub pages: usize,
}

/// Completion handle for a background refresh.
///
/// Empty when the request finished without spawning (fresh snapshot or a
/// refresh already running). There is no cancellation.
#[derive(Debug, Default)]
pub struct RefreshHandle(Option<JoinHandle<()>>);

impl RefreshHandle {
    pub fn is_spawned(&self) -> bool {
        self.0.is_some()
    }

    /// Wait for the background task, if any.
    pub async fn wait(self) {
        if let Some(handle) = self.0
            && let Err(e) = handle.await
        {
            tracing::error!(error = %e, "refresh task failed");
        }
    }
}

struct Inner {
    store: Arc<SnapshotStore>,
    registry: Registry,
    host: Arc<dyn Host>,
    mirror: MirrorClient,
    probe: Arc<dyn Connectivity>,
    transport: Option<Arc<dyn QueryTransport>>,
    sync: SyncOptions,
    in_flight: Mutex<HashSet<String>>,
}

/// Removes a collection from the in-flight set when dropped.
struct InFlight {
    inner: Arc<Inner>,
    collection_id: String,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.collection_id);
    }
}

/// Keeps snapshots current and answers searches against them.
#[derive(Clone)]
pub struct Refresher {
    inner: Arc<Inner>,
}

impl Refresher {
    /// `transport` is the source for forced (incremental) refreshes; without
    /// one, forced refreshes only log.
    pub fn new(
        store: Arc<SnapshotStore>, registry: Registry, host: Arc<dyn Host>, mirror: MirrorClient,
        probe: Arc<dyn Connectivity>, transport: Option<Arc<dyn QueryTransport>>, sync: SyncOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                registry,
                host,
                mirror,
                probe,
                transport,
                sync,
                in_flight: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// Wire up every component from configuration.
    ///
    /// Without a Notion token, forced refreshes are unavailable but mirror
    /// refreshes and searches work.
    pub async fn from_app(config: &AppConfig, host: Arc<dyn Host>) -> Result<Self, RefreshError> {
        let store = Arc::new(SnapshotStore::open(&config.cache_dir, config.expiry_window()).await?);
        let probe: Arc<dyn Connectivity> = Arc::new(HttpProbe::from_app(config)?);
        let mirror = MirrorClient::from_app(config, Arc::clone(&store), Arc::clone(&probe))?;
        let sync = SyncOptions { window: config.expiry_window(), page_size: config.page_size };

        let transport: Option<Arc<dyn QueryTransport>> =
            match NotionConfig::from_app(config).and_then(NotionClient::new) {
                Ok(client) => Some(Arc::new(client)),
                Err(NotionError::MissingToken) => {
                    tracing::debug!("no Notion token; incremental sync disabled");
                    None
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Notion client unavailable; incremental sync disabled");
                    None
                }
            };

        Ok(Self::new(store, config.registry(), host, mirror, probe, transport, sync))
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.inner.store
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn can_sync(&self) -> bool {
        self.inner.transport.is_some()
    }

    /// Bring `collection_id` up to date, then run `on_done`.
    ///
    /// A fresh snapshot without `force` runs `on_done` inline. Otherwise the
    /// work is spawned and `on_done` is queued on the host's main thread once
    /// it finishes, whatever the outcome. A collection that is already
    /// refreshing gets `on_done` queued right away.
    pub async fn refresh(&self, collection_id: &str, force: bool, on_done: MainTask) -> RefreshHandle {
        if !force && !self.inner.store.is_expired(collection_id).await {
            tracing::debug!(collection_id, "snapshot fresh");
            on_done();
            return RefreshHandle::default();
        }

        let Some(guard) = self.begin(collection_id) else {
            tracing::debug!(collection_id, "refresh already in progress");
            self.inner.host.run_on_main(on_done);
            return RefreshHandle::default();
        };

        let inner = Arc::clone(&self.inner);
        let collection_id = collection_id.to_string();
        let handle = tokio::spawn(async move {
            inner.run_refresh(&collection_id, force).await;
            drop(guard);
            inner.host.run_on_main(on_done);
        });

        RefreshHandle(Some(handle))
    }

    /// Download every mirror, then force-sync every collection.
    ///
    /// `progress` receives `(step, total, message)`. The first mirror
    /// failure aborts the whole update.
    pub async fn update_all<F>(&self, progress: F) -> Result<(), RefreshError>
    where
        F: Fn(usize, usize, &str),
    {
        let inner = &self.inner;
        let total = inner.registry.len() * 2;

        if !inner.probe.is_online().await {
            inner.host.notify("Offline: cannot update the cache");
            return Err(RefreshError::Offline);
        }

        for (step, collection) in inner.registry.iter().enumerate() {
            progress(step, total, &format!("Downloading {} database from the mirror...", collection.name));
            if let Err(source) = inner.mirror.try_download(&collection.id).await {
                let message = format!("Failed to download {} database from the mirror", collection.name);
                tracing::warn!(collection_id = %collection.id, error = %source, "{message}");
                inner.host.notify(&message);
                return Err(RefreshError::Mirror { name: collection.name.clone(), source });
            }
        }

        let offset = inner.registry.len();
        for (step, collection) in inner.registry.iter().enumerate() {
            progress(offset + step, total, &format!("Updating new {} pages from Notion...", collection.name));
            let Some(_guard) = self.begin(&collection.id) else {
                tracing::debug!(collection_id = %collection.id, "refresh already in progress; skipping sync");
                continue;
            };
            inner.sync_collection(&collection.id).await;
        }

        progress(total, total, UPDATE_COMPLETE_NOTICE);
        inner.host.notify(UPDATE_COMPLETE_NOTICE);
        Ok(())
    }

    /// Startup pass over every collection.
    ///
    /// Expired collections are pulled from the mirror first; a collection
    /// whose mirror download fails gets a forced incremental sync instead.
    /// Fresh collections are left alone. Runs to completion, one collection
    /// at a time.
    pub async fn check_all(&self) -> Vec<CollectionCheck> {
        let inner = &self.inner;
        let online = inner.probe.is_online().await;
        let mut checks = Vec::with_capacity(inner.registry.len());

        for collection in inner.registry.iter() {
            let id = collection.id.as_str();
            let outcome = if !inner.store.is_expired(id).await {
                tracing::debug!(collection_id = id, "snapshot fresh");
                CheckOutcome::Fresh
            } else if !online {
                tracing::info!(collection_id = id, "snapshot expired but offline");
                CheckOutcome::Offline
            } else {
                match inner.mirror.try_download(id).await {
                    Ok(pages) => CheckOutcome::Mirrored { pages },
                    Err(e) => {
                        tracing::warn!(collection_id = id, error = %e, "mirror failed, falling back to Notion");
                        match self.begin(id) {
                            Some(_guard) => CheckOutcome::Synced { pages: inner.sync_collection(id).await },
                            None => CheckOutcome::Busy,
                        }
                    }
                }
            };

            checks.push(CollectionCheck { collection_id: id.to_string(), name: collection.name.clone(), outcome });
        }

        tracing::info!(collections = checks.len(), "cache check complete");
        checks
    }

    /// Fetch every searchable page of every collection from Notion and write
    /// full snapshots into `out`, in the format the mirror serves.
    ///
    /// All collections are fetched before anything is written, so a failed
    /// fetch leaves `out` untouched.
    pub async fn export_to(&self, out: &SnapshotStore) -> Result<Vec<ExportedCollection>, RefreshError> {
        let inner = &self.inner;
        let transport = inner.transport.as_deref().ok_or(RefreshError::NoTransport)?;

        let mut snapshots = Vec::with_capacity(inner.registry.len());
        for collection in inner.registry.iter() {
            let snapshot = build_snapshot(transport, &collection.id, inner.sync.page_size)
                .await
                .map_err(|source| RefreshError::Sync { name: collection.name.clone(), source })?;
            snapshots.push((collection, snapshot));
        }

        let mut exported = Vec::with_capacity(snapshots.len());
        for (collection, snapshot) in snapshots {
            out.replace(&collection.id, &snapshot).await?;
            tracing::info!(collection_id = %collection.id, pages = snapshot.pages.len(), "exported snapshot");
            exported.push(ExportedCollection {
                collection_id: collection.id.clone(),
                name: collection.name.clone(),
                pages: snapshot.pages.len(),
            });
        }

        Ok(exported)
    }

    /// Ranked pages of `collection_id` matching `query`, from the local snapshot.
    ///
    /// A stale snapshot is still searched; if we are online the host is told
    /// an update is available.
    pub async fn search(&self, collection_id: &str, query: &str) -> Vec<Page> {
        let inner = &self.inner;
        let (pages, timestamp) = inner.store.load(collection_id).await;

        if inner.store.is_expired(collection_id).await && inner.probe.is_online().await {
            tracing::info!(collection_id, age_secs = unix_now() - timestamp, "snapshot stale");
            inner.host.notify(STALE_NOTICE);
        }

        search::filter(&pages, query)
    }

    fn begin(&self, collection_id: &str) -> Option<InFlight> {
        let mut in_flight = self.inner.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        in_flight
            .insert(collection_id.to_string())
            .then(|| InFlight { inner: Arc::clone(&self.inner), collection_id: collection_id.to_string() })
    }
}

impl Inner {
    async fn run_refresh(&self, collection_id: &str, force: bool) {
        let name = self.registry.name_of(collection_id);

        if !self.probe.is_online().await {
            tracing::info!(collection_id, name, "offline, using cached data");
            return;
        }

        if force {
            self.sync_collection(collection_id).await;
        } else if !self.mirror.download_all_mirrors().await {
            tracing::warn!(collection_id, name, "mirror download incomplete");
        }
    }

    /// Incremental sync of one collection into the store.
    ///
    /// Returns how many fetched pages were saved.
    async fn sync_collection(&self, collection_id: &str) -> usize {
        let name = self.registry.name_of(collection_id);

        let Some(transport) = self.transport.as_deref() else {
            tracing::warn!(collection_id, name, "no Notion token configured; skipping sync");
            return 0;
        };

        let since = match self.store.load_snapshot(collection_id).await {
            Ok(snapshot) => snapshot.timestamp,
            Err(_) => 0.0,
        };

        let outcome = sync_pages(transport, collection_id, since, self.sync).await;

        if outcome.pages.is_empty() {
            if outcome.interrupted.as_ref().is_some_and(NotionError::is_transient) {
                self.host.notify(&format!("Offline: Using cached {name} data"));
            }
            return 0;
        }

        let fetched = outcome.pages.len();
        match self.store.save(collection_id, outcome.pages).await {
            Ok(()) => {
                self.host.notify(&format!("{name} database updated"));
                fetched
            }
            Err(e) => {
                tracing::error!(collection_id, error = %e, "failed to save synced pages");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notion::{QueryRequest, QueryResponse};
    use crate::probe::AssumeOnline;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tagcache_core::{Collection, Snapshot};

    const WEEK: Duration = Duration::from_secs(7 * 86_400);

    #[derive(Default)]
    struct RecordingHost {
        notices: Mutex<Vec<String>>,
        dispatched: AtomicUsize,
    }

    impl Host for RecordingHost {
        fn run_on_main(&self, task: MainTask) {
            self.dispatched.fetch_add(1, Ordering::SeqCst);
            task();
        }

        fn notify(&self, message: &str) {
            self.notices.lock().unwrap().push(message.to_string());
        }
    }

    struct FixedTransport(Result<QueryResponse, NotionError>);

    #[async_trait]
    impl QueryTransport for FixedTransport {
        async fn query(&self, _id: &str, _request: &QueryRequest) -> Result<QueryResponse, NotionError> {
            self.0.clone()
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        host: Arc<RecordingHost>,
        refresher: Refresher,
    }

    async fn fixture(online: bool) -> Fixture {
        fixture_with(online, None).await
    }

    async fn fixture_with(online: bool, transport: Option<Arc<dyn QueryTransport>>) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SnapshotStore::open(dir.path(), WEEK).await.unwrap());
        let registry = Registry::new(vec![Collection::new("Demo", "demo-db")]);
        let probe: Arc<dyn Connectivity> = Arc::new(AssumeOnline(online));
        let mirror = MirrorClient::new(
            "http://127.0.0.1:9",
            Duration::from_millis(200),
            Arc::clone(&store),
            registry.clone(),
            Arc::clone(&probe),
        )
        .unwrap();
        let host = Arc::new(RecordingHost::default());
        let refresher = Refresher::new(
            store,
            registry,
            host.clone(),
            mirror,
            probe,
            transport,
            SyncOptions { window: WEEK, page_size: 100 },
        );
        Fixture { _dir: dir, host, refresher }
    }

    fn counter() -> (Arc<AtomicUsize>, MainTask) {
        let hits = Arc::new(AtomicUsize::new(0));
        let task_hits = Arc::clone(&hits);
        (hits, Box::new(move || {
            task_hits.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[tokio::test]
    async fn test_fresh_snapshot_runs_callback_inline() {
        let f = fixture(true).await;
        f.refresher.store().save("demo-db", vec![Page::new("a")]).await.unwrap();

        let (hits, on_done) = counter();
        let handle = f.refresher.refresh("demo-db", false, on_done).await;

        assert!(!handle.is_spawned());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(f.host.dispatched.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_offline_dispatches_through_host() {
        let f = fixture(false).await;
        let (hits, on_done) = counter();

        f.refresher.refresh("demo-db", true, on_done).await.wait().await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(f.host.dispatched.load(Ordering::SeqCst), 1);
        assert!(f.host.notices.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_forced_sync_merges_and_notifies() {
        let response =
            QueryResponse { results: vec![Page::new("n1"), Page::new("n2")], has_more: false, next_cursor: None };
        let f = fixture_with(true, Some(Arc::new(FixedTransport(Ok(response))))).await;
        let refresher = &f.refresher;
        let (hits, on_done) = counter();

        refresher.refresh("demo-db", true, on_done).await.wait().await;

        let (pages, _) = refresher.store().load("demo-db").await;
        assert_eq!(pages.len(), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(*f.host.notices.lock().unwrap(), vec!["Demo database updated".to_string()]);
    }

    #[tokio::test]
    async fn test_forced_sync_timeout_notifies_offline() {
        let f = fixture_with(true, Some(Arc::new(FixedTransport(Err(NotionError::Timeout))))).await;
        let refresher = &f.refresher;
        let (hits, on_done) = counter();

        refresher.refresh("demo-db", true, on_done).await.wait().await;

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(*f.host.notices.lock().unwrap(), vec!["Offline: Using cached Demo data".to_string()]);
        assert!(!refresher.store().path_for("demo-db").exists());
    }

    #[tokio::test]
    async fn test_duplicate_refresh_is_skipped() {
        let f = fixture(true).await;
        let guard = f.refresher.begin("demo-db").unwrap();
        let (hits, on_done) = counter();

        let handle = f.refresher.refresh("demo-db", true, on_done).await;
        assert!(!handle.is_spawned());
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        drop(guard);
        assert!(f.refresher.begin("demo-db").is_some());
    }

    #[tokio::test]
    async fn test_search_stale_snapshot_notifies() {
        let f = fixture(true).await;
        let page = Page::new("p").with_title("Heart failure").with_formula("Search Term", "heart failure");
        let stale = Snapshot { timestamp: unix_now() - WEEK.as_secs_f64() - 10.0, ..Snapshot::with_pages(vec![page]) };
        f.refresher.store().replace("demo-db", &stale).await.unwrap();

        let results = f.refresher.search("demo-db", "cardiac fail").await;

        assert_eq!(results.len(), 1);
        assert_eq!(*f.host.notices.lock().unwrap(), vec![STALE_NOTICE.to_string()]);
    }

    #[tokio::test]
    async fn test_search_stale_offline_is_silent() {
        let f = fixture(false).await;
        let results = f.refresher.search("demo-db", "anything").await;
        assert!(results.is_empty());
        assert!(f.host.notices.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_all_leaves_fresh_alone() {
        let f = fixture(true).await;
        f.refresher.store().save("demo-db", vec![Page::new("a")]).await.unwrap();

        let checks = f.refresher.check_all().await;

        assert_eq!(checks.len(), 1);
        assert_eq!(checks[0].outcome, CheckOutcome::Fresh);
        assert!(f.host.notices.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_check_all_offline_touches_nothing() {
        let f = fixture(false).await;
        let checks = f.refresher.check_all().await;
        assert_eq!(checks[0].outcome, CheckOutcome::Offline);
        assert!(!f.refresher.store().path_for("demo-db").exists());
    }

    #[tokio::test]
    async fn test_check_all_falls_back_to_sync() {
        // The fixture mirror points at a closed port.
        let response = QueryResponse { results: vec![Page::new("n1")], has_more: false, next_cursor: None };
        let f = fixture_with(true, Some(Arc::new(FixedTransport(Ok(response))))).await;

        let checks = f.refresher.check_all().await;

        assert_eq!(checks[0].outcome, CheckOutcome::Synced { pages: 1 });
        assert_eq!(checks[0].name, "Demo");
        let (pages, _) = f.refresher.store().load("demo-db").await;
        assert_eq!(pages.len(), 1);
    }

    #[tokio::test]
    async fn test_check_all_skips_busy_collection() {
        let f = fixture(true).await;
        let _guard = f.refresher.begin("demo-db").unwrap();
        let checks = f.refresher.check_all().await;
        assert_eq!(checks[0].outcome, CheckOutcome::Busy);
    }

    #[tokio::test]
    async fn test_export_requires_token() {
        let f = fixture(true).await;
        let out_dir = tempfile::tempdir().unwrap();
        let out = SnapshotStore::open(out_dir.path(), WEEK).await.unwrap();

        let result = f.refresher.export_to(&out).await;
        assert!(matches!(result, Err(RefreshError::NoTransport)));
    }

    #[tokio::test]
    async fn test_export_failure_writes_nothing() {
        let f = fixture_with(true, Some(Arc::new(FixedTransport(Err(NotionError::Timeout))))).await;
        let out_dir = tempfile::tempdir().unwrap();
        let out = SnapshotStore::open(out_dir.path(), WEEK).await.unwrap();

        let result = f.refresher.export_to(&out).await;

        assert!(matches!(result, Err(RefreshError::Sync { ref name, source: NotionError::Timeout }) if name == "Demo"));
        assert!(!out.path_for("demo-db").exists());
    }

    #[tokio::test]
    async fn test_update_all_offline_fails() {
        let f = fixture(false).await;
        let result = f.refresher.update_all(|_, _, _| {}).await;
        assert!(matches!(result, Err(RefreshError::Offline)));
    }
}
