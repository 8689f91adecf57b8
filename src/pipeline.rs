//! Pipeline orchestrator.
//!
//! Sequences session start, search, and per-collection visits
//! (navigate, scroll, extract, persist) into one bounded run. Only failures
//! that make further progress impossible end the run early; a collection
//! that fails is recorded in the summary and skipped.

mod state;

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

pub use state::StateTracker;

use crate::browser::{PageSource, SessionLauncher};
use crate::config::Settings;
use crate::error::{Result, ScrapeError};
use crate::extract::{self, normalize};
use crate::models::{
    Collection, CollectionFailure, CollectionStub, Item, RunState, RunSummary, SearchLimits,
};
use crate::storage::{DedupReport, Store};

/// Timing knobs for a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    /// Pause before each collection visit after the first.
    pub collection_delay: Duration,
    /// Upper bound for session start and for each page step.
    pub step_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            collection_delay: Duration::from_millis(500),
            step_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&Settings> for PipelineOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            collection_delay: settings.collection_delay(),
            step_timeout: settings.step_timeout(),
        }
    }
}

/// A scraped collection whose items are already on disk.
struct Scraped {
    collection: Collection,
    item_count: usize,
}

pub struct Pipeline<L: SessionLauncher> {
    launcher: L,
    store: Store,
    options: PipelineOptions,
}

impl<L: SessionLauncher> Pipeline<L> {
    pub fn new(launcher: L, store: Store, options: PipelineOptions) -> Self {
        Self {
            launcher,
            store,
            options,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Search for collections matching `query` and scrape each of them.
    ///
    /// Every run that gets started yields `Ok`: a run that had to stop early
    /// ends in [`RunState::Failed`] with `error` set, and whatever was
    /// persisted before that point stays persisted. `Err` is reserved for
    /// requests that cannot start a run at all.
    pub async fn search(
        &self,
        query: &str,
        limits: SearchLimits,
        cancel: &CancellationToken,
    ) -> Result<RunSummary> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ScrapeError::Config("search query is empty".into()));
        }

        let span = info_span!("scrape_run", query);
        async move {
            let mut summary = RunSummary::new(query);
            let mut tracker = StateTracker::new();

            let outcome = self
                .run(query, &limits, cancel, &mut tracker, &mut summary)
                .await;

            match outcome {
                Ok(()) => tracker.advance(RunState::Done),
                Err(e) => {
                    warn!("Run ended early: {}", e);
                    summary.error = Some(e.to_string());
                    tracker.advance(RunState::Failed);
                }
            }
            summary.cancelled = cancel.is_cancelled();
            summary.state = tracker.state();
            summary.finished_at = Some(Utc::now());

            info!(
                found = summary.collections_found,
                scraped = summary.collections_scraped(),
                items = summary.items_scraped,
                failed = summary.failures.len(),
                state = %summary.state,
                "Run finished"
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }

    async fn run(
        &self,
        query: &str,
        limits: &SearchLimits,
        cancel: &CancellationToken,
        tracker: &mut StateTracker,
        summary: &mut RunSummary,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }
        tracker.advance(RunState::Searching);

        if let Err(e) = self.store.note_search(query).await {
            warn!("Could not record search query: {}", e);
        }

        let mut session = self.acquire().await?;
        // Release on every path before inspecting the outcome
        let outcome = self
            .run_with_session(&mut session, query, limits, cancel, tracker, summary)
            .await;
        session.close().await;
        outcome
    }

    async fn run_with_session(
        &self,
        session: &mut L::Session,
        query: &str,
        limits: &SearchLimits,
        cancel: &CancellationToken,
        tracker: &mut StateTracker,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let search_url = normalize::search_url(query, limits.sort);
        info!("Searching {}", search_url);
        self.bounded("open search results", session.open(&search_url))
            .await?;
        let html = self
            .bounded("scroll search results", session.capture())
            .await?;

        let mut stubs = extract::extract_collections(&html);
        summary.collections_found = stubs.len();
        stubs.truncate(limits.max_collections);
        info!(
            found = summary.collections_found,
            visiting = stubs.len(),
            "Collected search results"
        );

        if limits.concurrency > 1 && stubs.len() > 1 {
            // Workers start their own sessions
            session.close().await;
            self.visit_concurrently(stubs, limits, cancel, tracker, summary)
                .await
        } else {
            self.visit_sequentially(session, stubs, limits, cancel, tracker, summary)
                .await
        }
    }

    async fn visit_sequentially(
        &self,
        session: &mut L::Session,
        stubs: Vec<CollectionStub>,
        limits: &SearchLimits,
        cancel: &CancellationToken,
        tracker: &mut StateTracker,
        summary: &mut RunSummary,
    ) -> Result<()> {
        for (idx, stub) in stubs.iter().enumerate() {
            if idx > 0 {
                self.throttle(cancel).await;
            }
            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }

            let span = info_span!("collection", id = %stub.collection_id);
            let outcome = self
                .scrape_collection(session, stub, limits.max_items_per_collection, tracker)
                .instrument(span)
                .await;
            self.record(summary, stub, outcome).await?;
        }
        Ok(())
    }

    /// Visit collections on isolated sessions, `limits.concurrency` at a time.
    ///
    /// Results are consumed in relevance order, so the index receives new
    /// collections in the same order as a sequential run would.
    async fn visit_concurrently(
        &self,
        stubs: Vec<CollectionStub>,
        limits: &SearchLimits,
        cancel: &CancellationToken,
        tracker: &mut StateTracker,
        summary: &mut RunSummary,
    ) -> Result<()> {
        let workers = limits.concurrency;
        let max_items = limits.max_items_per_collection;
        let stop = cancel.child_token();
        tracker.advance(RunState::Navigating);

        let mut results = stream::iter(stubs.into_iter().enumerate())
            .map(|(idx, stub)| {
                let stop = stop.clone();
                async move {
                    if idx >= workers {
                        self.throttle(&stop).await;
                    }
                    if stop.is_cancelled() {
                        return (stub, Err(ScrapeError::Cancelled));
                    }
                    let span = info_span!("collection", id = %stub.collection_id);
                    let outcome = self.scrape_isolated(&stub, max_items).instrument(span).await;
                    if matches!(&outcome, Err(e) if e.is_fatal_to_run()) {
                        stop.cancel();
                    }
                    (stub, outcome)
                }
            })
            .buffered(workers);

        // Work that finished before a fatal error is still recorded
        let mut fatal = None;
        while let Some((stub, outcome)) = results.next().await {
            if let Err(e) = self.record(summary, &stub, outcome).await {
                stop.cancel();
                fatal.get_or_insert(e);
            }
        }

        fatal.map_or(Ok(()), Err)
    }

    /// Start a dedicated session, visit one collection, and release the session.
    async fn scrape_isolated(&self, stub: &CollectionStub, max_items: usize) -> Result<Scraped> {
        let mut tracker = StateTracker::resume(RunState::Searching);
        let mut session = self.acquire().await?;
        let outcome = self
            .scrape_collection(&mut session, stub, max_items, &mut tracker)
            .await;
        session.close().await;
        outcome
    }

    /// Visit one collection page and persist its items.
    async fn scrape_collection<S: PageSource + ?Sized>(
        &self,
        session: &mut S,
        stub: &CollectionStub,
        max_items: usize,
        tracker: &mut StateTracker,
    ) -> Result<Scraped> {
        tracker.advance(RunState::Navigating);
        self.bounded("open collection", session.open(&stub.url()))
            .await?;

        tracker.advance(RunState::Scrolling);
        let html = self.bounded("scroll collection", session.capture()).await?;

        tracker.advance(RunState::Extracting);
        let (collection, items) =
            extract::extract_collection_page(&html, stub, max_items, Utc::now());
        if items.is_empty() {
            warn!("No items extracted, keeping collection with an empty item list");
        }

        tracker.advance(RunState::Persisting);
        self.store.save_items(&collection.collection_id, &items).await?;

        Ok(Scraped {
            item_count: items.len(),
            collection,
        })
    }

    /// Fold one collection outcome into the summary. Only run-fatal errors
    /// are returned.
    async fn record(
        &self,
        summary: &mut RunSummary,
        stub: &CollectionStub,
        outcome: Result<Scraped>,
    ) -> Result<()> {
        let outcome = match outcome {
            Ok(scraped) => self
                .store
                .merge_collections(std::slice::from_ref(&scraped.collection))
                .await
                .map(|()| scraped),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(scraped) => {
                info!(
                    collection = %stub.collection_id,
                    items = scraped.item_count,
                    "Collection saved"
                );
                summary.collection_ids.push(scraped.collection.collection_id);
                summary.items_scraped += scraped.item_count;
                Ok(())
            }
            Err(e) if e.is_fatal_to_run() => Err(e),
            Err(e) => {
                warn!(collection = %stub.collection_id, "Skipping collection: {}", e);
                summary.failures.push(CollectionFailure {
                    collection_id: stub.collection_id.clone(),
                    reason: e.to_string(),
                });
                Ok(())
            }
        }
    }

    async fn acquire(&self) -> Result<L::Session> {
        let secs = self.options.step_timeout.as_secs();
        tokio::time::timeout(self.options.step_timeout, self.launcher.acquire())
            .await
            .map_err(|_| {
                ScrapeError::SessionStart(format!("browser did not start within {}s", secs))
            })?
    }

    /// Run one page step under the step timeout.
    async fn bounded<T, F>(&self, step: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.options.step_timeout, fut)
            .await
            .map_err(|_| ScrapeError::Timeout {
                step: step.to_string(),
                secs: self.options.step_timeout.as_secs(),
            })?
    }

    /// Pause between collection visits; returns early on cancellation.
    async fn throttle(&self, cancel: &CancellationToken) {
        if self.options.collection_delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(self.options.collection_delay) => {}
        }
    }

    pub async fn get_collection(&self, collection_id: &str) -> Result<Option<Collection>> {
        self.store.find_collection(collection_id).await
    }

    /// Look up an item by id or by any watch/short/embed link to it.
    pub async fn get_item(&self, id_or_url: &str) -> Result<Option<(Item, Collection)>> {
        let Some(item_id) = normalize::item_id_from_url(id_or_url) else {
            return Ok(None);
        };
        self.store.find_item(&item_id).await
    }

    pub async fn deduplicate_items(&self) -> Result<DedupReport> {
        self.store.deduplicate_items().await
    }
}
