use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tagcache_client::mirror::{self, MirrorClient, MirrorError};
use tagcache_client::probe::{AssumeOnline, Connectivity};
use tagcache_client::refresh::{CheckOutcome, RefreshError, Refresher, UPDATE_COMPLETE_NOTICE};
use tagcache_client::sync::SyncOptions;
use tagcache_client::{NotionClient, NotionConfig, QueryTransport};
use tagcache_core::cache::unix_now;
use tagcache_core::{Collection, Host, MainTask, Page, Registry, SnapshotStore, search};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WEEK: Duration = Duration::from_secs(7 * 86_400);

#[derive(Default)]
struct TestHost {
    notices: Mutex<Vec<String>>,
    dispatched: AtomicUsize,
}

impl Host for TestHost {
    fn run_on_main(&self, task: MainTask) {
        self.dispatched.fetch_add(1, Ordering::SeqCst);
        task();
    }

    fn notify(&self, message: &str) {
        self.notices.lock().unwrap().push(message.to_string());
    }
}

fn demo_pages() -> Vec<Page> {
    ["one", "two", "three"]
        .iter()
        .enumerate()
        .map(|(i, word)| {
            Page::new(format!("demo-{}", i + 1))
                .with_title(&format!("Record {word}"))
                .with_formula("Search Term", &format!("record {word}"))
        })
        .collect()
}

async fn mount_demo_mirror(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/mirror/Demo.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(demo_pages()))
        .mount(server)
        .await;
}

/// A refresher whose mirror and Notion endpoints both live on `server`.
async fn wired_refresher(
    server: &MockServer, dir: &tempfile::TempDir,
) -> (Arc<SnapshotStore>, Arc<TestHost>, Refresher) {
    let store = Arc::new(SnapshotStore::open(dir.path(), WEEK).await.unwrap());
    let registry = Registry::new(vec![Collection::new("Demo", "Demo")]);
    let probe: Arc<dyn Connectivity> = Arc::new(AssumeOnline(true));
    let mirror = MirrorClient::new(
        format!("{}/mirror", server.uri()),
        Duration::from_secs(2),
        Arc::clone(&store),
        registry.clone(),
        Arc::clone(&probe),
    )
    .unwrap();
    let notion = NotionClient::new(NotionConfig {
        token: "secret_test".into(),
        base_url: format!("{}/v1", server.uri()),
        ..Default::default()
    })
    .unwrap();
    let transport: Arc<dyn QueryTransport> = Arc::new(notion);
    let host = Arc::new(TestHost::default());
    let refresher = Refresher::new(
        Arc::clone(&store),
        registry,
        host.clone(),
        mirror,
        probe,
        Some(transport),
        SyncOptions { window: WEEK, page_size: 100 },
    );
    (store, host, refresher)
}

async fn mount_failing_mirror(server: &MockServer, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/mirror/Demo.json"))
        .respond_with(ResponseTemplate::new(500))
        .expect(expected)
        .mount(server)
        .await;
}

fn query_reply(pages: &[Page]) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "results": pages,
        "has_more": false,
        "next_cursor": null,
    }))
}

#[tokio::test]
async fn test_demo_scenario() {
    let server = MockServer::start().await;
    mount_demo_mirror(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SnapshotStore::open(dir.path(), WEEK).await.unwrap());
    let registry = Registry::new(vec![Collection::new("Demo", "Demo")]);
    let probe: Arc<dyn Connectivity> = Arc::new(AssumeOnline(true));
    let base = format!("{}/mirror", server.uri());
    let mirror = MirrorClient::new(base, Duration::from_secs(2), Arc::clone(&store), registry, probe).unwrap();

    let before = unix_now();
    let (pages, timestamp) = store.load("Demo").await;
    assert!(pages.is_empty());
    assert!(timestamp >= before);
    assert!(store.is_expired("Demo").await);

    assert!(mirror.download_mirror("Demo").await);

    let (pages, timestamp) = store.load("Demo").await;
    assert_eq!(pages.len(), 3);
    assert!(timestamp >= before);
    assert!(!store.is_expired("Demo").await);

    let hits = search::filter(&pages, "two");
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, "demo-2");
}

#[tokio::test]
async fn test_lazy_refresh_pulls_mirror_then_searches() {
    let server = MockServer::start().await;
    mount_demo_mirror(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SnapshotStore::open(dir.path(), WEEK).await.unwrap());
    let registry = Registry::new(vec![Collection::new("Demo", "Demo")]);
    let probe: Arc<dyn Connectivity> = Arc::new(AssumeOnline(true));
    let mirror = MirrorClient::new(
        format!("{}/mirror", server.uri()),
        Duration::from_secs(2),
        Arc::clone(&store),
        registry.clone(),
        Arc::clone(&probe),
    )
    .unwrap();
    let host = Arc::new(TestHost::default());
    let refresher = Refresher::new(
        store,
        registry,
        host.clone(),
        mirror,
        probe,
        None,
        SyncOptions { window: WEEK, page_size: 100 },
    );

    let done = Arc::new(AtomicUsize::new(0));
    let done_in_task = Arc::clone(&done);
    let handle = refresher
        .refresh("Demo", false, Box::new(move || {
            done_in_task.fetch_add(1, Ordering::SeqCst);
        }))
        .await;
    assert!(handle.is_spawned());
    handle.wait().await;

    assert_eq!(done.load(Ordering::SeqCst), 1);
    assert_eq!(host.dispatched.load(Ordering::SeqCst), 1);

    let hits = refresher.search("Demo", "thr").await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title(), "Record three");
    assert!(host.notices.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_update_all_downloads_then_syncs() {
    let server = MockServer::start().await;
    mount_demo_mirror(&server).await;

    let changed =
        vec![Page::new("demo-2").with_title("Record two (revised)").with_formula("Search Term", "record two")];
    Mock::given(method("POST"))
        .and(path("/v1/databases/Demo/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": changed,
            "has_more": false,
            "next_cursor": null,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SnapshotStore::open(dir.path(), WEEK).await.unwrap());
    let registry = Registry::new(vec![Collection::new("Demo", "Demo")]);
    let probe: Arc<dyn Connectivity> = Arc::new(AssumeOnline(true));
    let mirror = MirrorClient::new(
        format!("{}/mirror", server.uri()),
        Duration::from_secs(2),
        Arc::clone(&store),
        registry.clone(),
        Arc::clone(&probe),
    )
    .unwrap();
    let notion = NotionClient::new(NotionConfig {
        token: "secret_test".into(),
        base_url: format!("{}/v1", server.uri()),
        ..Default::default()
    })
    .unwrap();
    let transport: Arc<dyn QueryTransport> = Arc::new(notion);
    let host = Arc::new(TestHost::default());
    let refresher = Refresher::new(
        Arc::clone(&store),
        registry,
        host.clone(),
        mirror,
        probe,
        Some(transport),
        SyncOptions { window: WEEK, page_size: 100 },
    );

    let steps = Mutex::new(Vec::new());
    refresher
        .update_all(|step, total, _message| steps.lock().unwrap().push((step, total)))
        .await
        .unwrap();

    assert_eq!(*steps.lock().unwrap(), vec![(0, 2), (1, 2), (2, 2)]);

    let (pages, _) = store.load("Demo").await;
    assert_eq!(pages.len(), 3);
    assert_eq!(pages[1].title(), "Record two (revised)");

    let notices = host.notices.lock().unwrap();
    assert_eq!(*notices, vec!["Demo database updated".to_string(), UPDATE_COMPLETE_NOTICE.to_string()]);
}

#[tokio::test]
async fn test_update_all_stops_at_first_mirror_failure() {
    let server = MockServer::start().await;
    mount_failing_mirror(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/databases/Demo/query"))
        .respond_with(query_reply(&demo_pages()))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (store, host, refresher) = wired_refresher(&server, &dir).await;

    let steps = Mutex::new(Vec::new());
    let result = refresher.update_all(|step, total, _message| steps.lock().unwrap().push((step, total))).await;

    assert!(matches!(
        result,
        Err(RefreshError::Mirror { ref name, source: MirrorError::HttpError { status: 500 } }) if name == "Demo"
    ));
    assert_eq!(*steps.lock().unwrap(), vec![(0, 2)]);
    assert_eq!(*host.notices.lock().unwrap(), vec!["Failed to download Demo database from the mirror".to_string()]);
    assert!(!store.path_for("Demo").exists());
}

#[tokio::test]
async fn test_check_all_falls_back_to_notion_once() {
    let server = MockServer::start().await;
    mount_failing_mirror(&server, 1).await;
    Mock::given(method("POST"))
        .and(path("/v1/databases/Demo/query"))
        .respond_with(query_reply(&demo_pages()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (store, host, refresher) = wired_refresher(&server, &dir).await;

    let checks = refresher.check_all().await;

    assert_eq!(checks.len(), 1);
    assert_eq!(checks[0].outcome, CheckOutcome::Synced { pages: 3 });
    assert!(!store.is_expired("Demo").await);
    assert_eq!(*host.notices.lock().unwrap(), vec!["Demo database updated".to_string()]);

    // Now fresh: a second pass makes no requests.
    let again = refresher.check_all().await;
    assert_eq!(again[0].outcome, CheckOutcome::Fresh);
}

#[tokio::test]
async fn test_check_all_prefers_mirror() {
    let server = MockServer::start().await;
    mount_demo_mirror(&server).await;
    Mock::given(method("POST")).respond_with(query_reply(&[])).expect(0).mount(&server).await;

    let dir = tempfile::tempdir().unwrap();
    let (_store, _host, refresher) = wired_refresher(&server, &dir).await;

    let checks = refresher.check_all().await;
    assert_eq!(checks[0].outcome, CheckOutcome::Mirrored { pages: 3 });
}

#[tokio::test]
async fn test_export_writes_mirror_documents() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/databases/Demo/query"))
        .respond_with(query_reply(&demo_pages()))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let (_store, _host, refresher) = wired_refresher(&server, &dir).await;
    let out_dir = tempfile::tempdir().unwrap();
    let out = SnapshotStore::open(out_dir.path(), WEEK).await.unwrap();

    let before = unix_now();
    let exported = refresher.export_to(&out).await.unwrap();
    assert_eq!(exported.len(), 1);
    assert_eq!(exported[0].pages, 3);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["filter"]["property"], "For Search");
    assert!(!body.to_string().contains("last_edited_time"));

    let bytes = std::fs::read(out.path_for("Demo")).unwrap();
    let snapshot = mirror::parse_document(&bytes).unwrap();
    assert_eq!(snapshot.pages, demo_pages());
    assert!(snapshot.timestamp >= before);
}
