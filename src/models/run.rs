//! Search run parameters and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Orchestrator state.
///
/// `Idle → Searching → (Navigating → Scrolling → Extracting → Persisting)* → Done`,
/// with `Failed` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Searching,
    Navigating,
    Scrolling,
    Extracting,
    Persisting,
    Done,
    Failed,
}

impl RunState {
    /// Check whether moving from `self` to `next` is a legal transition.
    pub fn can_transition_to(self, next: RunState) -> bool {
        use RunState::*;
        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (Idle, Searching) => true,
            (Searching, Navigating | Done) => true,
            (Navigating, Scrolling) => true,
            // A collection that fails mid-visit is skipped.
            (Navigating | Scrolling | Extracting, Navigating) => true,
            (Scrolling, Extracting) => true,
            (Extracting, Persisting) => true,
            // After a collection is persisted (or skipped) the run moves to the
            // next collection or finishes.
            (Persisting, Navigating | Done) => true,
            (Navigating | Scrolling | Extracting, Done) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Searching => "searching",
            Self::Navigating => "navigating",
            Self::Scrolling => "scrolling",
            Self::Extracting => "extracting",
            Self::Persisting => "persisting",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result ordering requested from the search page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Relevance,
    UploadDate,
    ViewCount,
    Rating,
}

impl SortOrder {
    /// Value of the site's `sp` filter parameter, or `None` for the default ordering.
    pub fn filter_param(self) -> Option<&'static str> {
        match self {
            Self::Relevance => None,
            Self::UploadDate => Some("CAI%253D"),
            Self::ViewCount | Self::Rating => Some("CAyA%253D"),
        }
    }
}

impl std::fmt::Display for SortOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Relevance => write!(f, "relevance"),
            Self::UploadDate => write!(f, "upload-date"),
            Self::ViewCount => write!(f, "view-count"),
            Self::Rating => write!(f, "rating"),
        }
    }
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "relevance" => Ok(Self::Relevance),
            "uploaddate" => Ok(Self::UploadDate),
            "viewcount" => Ok(Self::ViewCount),
            "rating" => Ok(Self::Rating),
            _ => Err(format!(
                "Invalid sort order '{}'. Valid options: relevance, upload-date, view-count, rating",
                s
            )),
        }
    }
}

/// Bounds for a single search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchLimits {
    pub max_collections: usize,
    pub max_items_per_collection: usize,
    /// Number of collections scraped at once, each on its own session.
    pub concurrency: usize,
    pub sort: SortOrder,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_collections: 15,
            max_items_per_collection: 50,
            concurrency: 1,
            sort: SortOrder::default(),
        }
    }
}

/// A collection that was skipped during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionFailure {
    pub collection_id: String,
    pub reason: String,
}

/// Count-accurate report of a search run, including partial results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub query: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub state: RunState,
    /// Unique collection references found on the results page.
    pub collections_found: usize,
    /// Collection ids persisted during this run, in relevance order.
    pub collection_ids: Vec<String>,
    pub items_scraped: usize,
    pub failures: Vec<CollectionFailure>,
    pub cancelled: bool,
    /// Run-level error, when the run ended in `Failed`.
    pub error: Option<String>,
}

impl RunSummary {
    pub fn new(query: &str) -> Self {
        Self {
            query: query.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            state: RunState::Idle,
            collections_found: 0,
            collection_ids: Vec::new(),
            items_scraped: 0,
            failures: Vec::new(),
            cancelled: false,
            error: None,
        }
    }

    pub fn collections_scraped(&self) -> usize {
        self.collection_ids.len()
    }

    pub fn is_success(&self) -> bool {
        self.state == RunState::Done
    }
}
