//! Error types for the scrape pipeline.
//!
//! Extraction misses (no title element, no matching link) are not errors;
//! they resolve through fallback chains or row skips inside `extract`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The browser process could not be started or connected to.
    #[error("Failed to start browser session: {0}")]
    SessionStart(String),
    /// Visiting a URL failed (network, CDP, invalid URL).
    #[error("Navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },
    /// A navigation or render step exceeded its time budget.
    #[error("Timed out after {secs}s: {step}")]
    Timeout { step: String, secs: u64 },
    /// Reading or writing persisted state failed. Prior state is untouched.
    #[error("Persistence error at {}: {source}", path.display())]
    PersistenceIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid JSON in {}: {source}", path.display())]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid configuration: {0}")]
    Config(String),
    #[error("Run cancelled")]
    Cancelled,
}

impl ScrapeError {
    pub fn navigation(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Navigation {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::PersistenceIo {
            path: path.into(),
            source,
        }
    }

    /// Whether this error must abort the whole run rather than a single collection.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(
            self,
            Self::SessionStart(_) | Self::Cancelled | Self::Config(_)
        )
    }
}

pub type Result<T, E = ScrapeError> = std::result::Result<T, E>;
