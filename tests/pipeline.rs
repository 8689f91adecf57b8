//! End-to-end pipeline runs against a scripted page source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use tubescrape::browser::{PageSource, SessionLauncher};
use tubescrape::config::{Settings, StoreLayout};
use tubescrape::models::{RunState, SearchLimits};
use tubescrape::storage::TwoTierStore;
use tubescrape::{open_store, Pipeline, PipelineOptions, Result, ScrapeError, Store};

/// A scripted site: URL fragment to page markup, plus optional per-page latency.
#[derive(Clone, Default)]
struct FakeSite {
    pages: Arc<HashMap<String, String>>,
    latency: Arc<HashMap<String, Duration>>,
    fail_launch: bool,
    cancel_on: Option<(String, CancellationToken)>,
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

impl FakeSite {
    fn new(pages: &[(&str, String)]) -> Self {
        Self {
            pages: Arc::new(
                pages
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect(),
            ),
            ..Default::default()
        }
    }

    fn with_latency(mut self, fragment: &str, latency: Duration) -> Self {
        let mut map = (*self.latency).clone();
        map.insert(fragment.to_string(), latency);
        self.latency = Arc::new(map);
        self
    }

    fn lookup<'a, T>(map: &'a HashMap<String, T>, url: &str) -> Option<&'a T> {
        map.iter()
            .find(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(_, v)| v)
    }
}

struct FakeSession {
    site: FakeSite,
    current: Option<String>,
    closed: bool,
}

#[async_trait]
impl PageSource for FakeSession {
    async fn open(&mut self, url: &str) -> Result<()> {
        if let Some(latency) = FakeSite::lookup(&self.site.latency, url) {
            tokio::time::sleep(*latency).await;
        }
        if let Some((fragment, token)) = &self.site.cancel_on {
            if url.contains(fragment.as_str()) {
                token.cancel();
            }
        }
        match FakeSite::lookup(&self.site.pages, url) {
            Some(html) => {
                self.current = Some(html.clone());
                Ok(())
            }
            None => Err(ScrapeError::navigation(url, "connection reset")),
        }
    }

    async fn capture(&mut self) -> Result<String> {
        Ok(self.current.clone().unwrap_or_default())
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.site.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl SessionLauncher for FakeSite {
    type Session = FakeSession;

    async fn acquire(&self) -> Result<FakeSession> {
        if self.fail_launch {
            return Err(ScrapeError::SessionStart("no browser binary found".into()));
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(FakeSession {
            site: self.clone(),
            current: None,
            closed: false,
        })
    }
}

fn search_page(ids: &[&str]) -> String {
    ids.iter()
        .map(|id| format!(r#"<a href="/playlist?list={}" title="Playlist {}">x</a>"#, id, id))
        .collect()
}

fn playlist_page(title: &str, video_ids: &[&str]) -> String {
    let rows: String = video_ids
        .iter()
        .map(|id| {
            format!(
                r#"<ytd-playlist-video-renderer><a id="video-title" href="/watch?v={}&index=1" title="Video {}"></a></ytd-playlist-video-renderer>"#,
                id, id
            )
        })
        .collect();
    format!(
        r#"<html><body><yt-formatted-string id="text-container">{}</yt-formatted-string>{}</body></html>"#,
        title, rows
    )
}

fn options() -> PipelineOptions {
    PipelineOptions {
        collection_delay: Duration::ZERO,
        step_timeout: Duration::from_secs(2),
    }
}

fn two_tier(dir: &std::path::Path) -> Store {
    Arc::new(TwoTierStore::in_dir(dir))
}

fn three_playlists() -> FakeSite {
    FakeSite::new(&[
        ("search_query=", search_page(&["PLA", "PLB", "PLA", "PLC"])),
        ("list=PLA", playlist_page("Alpha", &["a1", "a2", "a1", "a3"])),
        ("list=PLB", playlist_page("Beta", &["b1"])),
        ("list=PLC", playlist_page("Gamma", &[])),
    ])
}

#[tokio::test]
async fn test_full_run_persists_every_collection() {
    let dir = tempfile::tempdir().unwrap();
    let store = two_tier(dir.path());
    let site = three_playlists();
    let pipeline = Pipeline::new(site.clone(), store.clone(), options());

    let summary = pipeline
        .search("lofi beats", SearchLimits::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.state, RunState::Done);
    assert!(summary.is_success());
    assert!(!summary.cancelled);
    assert_eq!(summary.collections_found, 3);
    assert_eq!(summary.collection_ids, vec!["PLA", "PLB", "PLC"]);
    assert_eq!(summary.items_scraped, 4);
    assert!(summary.finished_at.is_some());

    let index = store.load_collections().await.unwrap();
    for collection in &index {
        let items = store
            .load_items(&collection.collection_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(collection.item_count as usize, items.len());
        let positions: Vec<u32> = items.iter().map(|i| i.position).collect();
        let expected: Vec<u32> = (1..=items.len() as u32).collect();
        assert_eq!(positions, expected);
    }

    let alpha = store.load_items("PLA").await.unwrap().unwrap();
    let ids: Vec<&str> = alpha.iter().map(|i| i.item_id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "a2", "a3"]);

    // Empty playlists are kept with an empty item file
    let gamma = store.find_collection("PLC").await.unwrap().unwrap();
    assert!(gamma.is_empty());
    assert_eq!(store.load_items("PLC").await.unwrap(), Some(vec![]));

    assert_eq!(site.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(site.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_collection_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let store = two_tier(dir.path());
    let site = FakeSite::new(&[
        ("search_query=", search_page(&["PLA", "PLB", "PLC"])),
        ("list=PLA", playlist_page("Alpha", &["a1"])),
        ("list=PLC", playlist_page("Gamma", &["c1"])),
    ]);
    let pipeline = Pipeline::new(site, store.clone(), options());

    let summary = pipeline
        .search("lofi", SearchLimits::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.state, RunState::Done);
    assert_eq!(summary.collection_ids, vec!["PLA", "PLC"]);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].collection_id, "PLB");
    assert!(summary.failures[0].reason.contains("connection reset"));
    assert!(store.find_collection("PLB").await.unwrap().is_none());
}

#[tokio::test]
async fn test_session_start_failure_fails_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = two_tier(dir.path());
    let site = FakeSite {
        fail_launch: true,
        ..three_playlists()
    };
    let pipeline = Pipeline::new(site, store.clone(), options());

    let summary = pipeline
        .search("lofi", SearchLimits::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.state, RunState::Failed);
    assert!(summary.error.as_deref().unwrap().contains("no browser binary"));
    assert_eq!(summary.collections_found, 0);
    assert!(store.load_collections().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_search_page_failure_fails_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = two_tier(dir.path());
    let site = FakeSite::new(&[("list=PLA", playlist_page("Alpha", &["a1"]))]);
    let pipeline = Pipeline::new(site.clone(), store, options());

    let summary = pipeline
        .search("lofi", SearchLimits::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.state, RunState::Failed);
    assert!(summary.error.is_some());
    assert_eq!(site.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_no_results_finishes_done() {
    let dir = tempfile::tempdir().unwrap();
    let store = two_tier(dir.path());
    let site = FakeSite::new(&[("search_query=", "<p>No results</p>".to_string())]);
    let pipeline = Pipeline::new(site, store, options());

    let summary = pipeline
        .search("zzzz", SearchLimits::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.state, RunState::Done);
    assert_eq!(summary.collections_found, 0);
    assert_eq!(summary.items_scraped, 0);
}

#[tokio::test]
async fn test_cancel_keeps_completed_work() {
    let dir = tempfile::tempdir().unwrap();
    let store = two_tier(dir.path());
    let cancel = CancellationToken::new();
    let site = FakeSite {
        cancel_on: Some(("list=PLA".to_string(), cancel.clone())),
        ..three_playlists()
    };
    let pipeline = Pipeline::new(site.clone(), store.clone(), options());

    let summary = pipeline
        .search("lofi", SearchLimits::default(), &cancel)
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.state, RunState::Failed);
    assert_eq!(summary.collection_ids, vec!["PLA"]);
    let index = store.load_collections().await.unwrap();
    assert_eq!(index.len(), 1);
    assert_eq!(site.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let dir = tempfile::tempdir().unwrap();
    let store = two_tier(dir.path());
    let site = three_playlists();
    let pipeline = Pipeline::new(site.clone(), store, options());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = pipeline
        .search("lofi", SearchLimits::default(), &cancel)
        .await
        .unwrap();

    assert!(summary.cancelled);
    assert_eq!(summary.state, RunState::Failed);
    assert_eq!(site.acquired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_concurrent_run_keeps_rank_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = two_tier(dir.path());
    // The first-ranked playlist is the slowest to load
    let site = three_playlists()
        .with_latency("list=PLA", Duration::from_millis(150))
        .with_latency("list=PLB", Duration::from_millis(50));
    let pipeline = Pipeline::new(site.clone(), store.clone(), options());
    let limits = SearchLimits {
        concurrency: 3,
        ..Default::default()
    };

    let summary = pipeline
        .search("lofi", limits, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.state, RunState::Done);
    assert_eq!(summary.collection_ids, vec!["PLA", "PLB", "PLC"]);
    let order: Vec<String> = store
        .load_collections()
        .await
        .unwrap()
        .into_iter()
        .map(|c| c.collection_id)
        .collect();
    assert_eq!(order, vec!["PLA", "PLB", "PLC"]);

    // One session for the search plus one per playlist, all released
    assert_eq!(site.acquired.load(Ordering::SeqCst), 4);
    assert_eq!(site.released.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_rescrape_replaces_items_and_keeps_index_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = two_tier(dir.path());
    let first = FakeSite::new(&[
        ("search_query=", search_page(&["PLA", "PLB"])),
        ("list=PLA", playlist_page("Alpha", &["a1", "a2"])),
        ("list=PLB", playlist_page("Beta", &["b1"])),
    ]);
    Pipeline::new(first, store.clone(), options())
        .search("lofi", SearchLimits::default(), &CancellationToken::new())
        .await
        .unwrap();

    let second = FakeSite::new(&[
        ("search_query=", search_page(&["PLB"])),
        ("list=PLB", playlist_page("Beta v2", &["b2", "b3"])),
    ]);
    Pipeline::new(second, store.clone(), options())
        .search("lofi", SearchLimits::default(), &CancellationToken::new())
        .await
        .unwrap();

    let index = store.load_collections().await.unwrap();
    let ids: Vec<&str> = index.iter().map(|c| c.collection_id.as_str()).collect();
    assert_eq!(ids, vec!["PLA", "PLB"]);
    assert_eq!(index[1].title, "Beta v2");
    assert_eq!(index[1].item_count, 2);

    let beta = store.load_items("PLB").await.unwrap().unwrap();
    let video_ids: Vec<&str> = beta.iter().map(|i| i.item_id.as_str()).collect();
    assert_eq!(video_ids, vec!["b2", "b3"]);
}

#[tokio::test]
async fn test_snapshot_layout_run() {
    let dir = tempfile::tempdir().unwrap();
    let mut settings = Settings::with_data_dir(dir.path().to_path_buf());
    settings.layout = StoreLayout::Snapshot;
    let store = open_store(&settings);
    let pipeline = Pipeline::new(three_playlists(), store.clone(), options());

    let summary = pipeline
        .search("lofi", SearchLimits::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(summary.is_success());

    let raw = std::fs::read_to_string(settings.snapshot_path()).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc["search_query"], "lofi");
    assert_eq!(doc["total_playlists"], 3);
    assert_eq!(doc["playlists"][0]["playlist_id"], "PLA");
    assert_eq!(doc["playlists"][0]["videos"].as_array().unwrap().len(), 3);

    let (item, owner) = pipeline.get_item("b1").await.unwrap().unwrap();
    assert_eq!(item.position, 1);
    assert_eq!(owner.title, "Beta");
}

#[tokio::test]
async fn test_deduplicate_after_overlapping_runs() {
    let dir = tempfile::tempdir().unwrap();
    let store = two_tier(dir.path());
    let site = FakeSite::new(&[
        ("search_query=", search_page(&["PLA", "PLB"])),
        ("list=PLA", playlist_page("Alpha", &["x1", "x2"])),
        ("list=PLB", playlist_page("Beta", &["x2", "x3"])),
    ]);
    let pipeline = Pipeline::new(site, store.clone(), options());
    pipeline
        .search("lofi", SearchLimits::default(), &CancellationToken::new())
        .await
        .unwrap();

    let report = pipeline.deduplicate_items().await.unwrap();
    assert_eq!(report.removed_count, 1);

    let beta = store.load_items("PLB").await.unwrap().unwrap();
    assert_eq!(beta.len(), 1);
    assert_eq!(beta[0].item_id, "x3");
    assert_eq!(beta[0].position, 1);
    assert_eq!(
        store.find_collection("PLB").await.unwrap().unwrap().item_count,
        1
    );
}
