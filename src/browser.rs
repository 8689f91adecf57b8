//! Browser session management and page rendering.
//!
//! A [`SessionLauncher`] produces exclusively-owned [`PageSource`]s. Callers
//! must `close` every session they acquire, on success and failure alike.

mod binary;
mod render;
mod session;
mod stealth;

use async_trait::async_trait;

pub use binary::find_chrome;
pub use render::{
    capture_page, open_page, render_page, scroll_until_stable, PageDriver, ScrollPolicy,
};
pub use session::{ChromeLauncher, ChromeSession};
pub use stealth::STEALTH_SCRIPTS;

use crate::error::Result;

/// A rendering session bound to one logical flow of control.
#[async_trait]
pub trait PageSource: Send {
    /// Navigate to `url` and wait for the initial render to settle.
    async fn open(&mut self, url: &str) -> Result<()>;

    /// Trigger lazy loading on the open page and return the rendered markup.
    async fn capture(&mut self) -> Result<String>;

    async fn render(&mut self, url: &str) -> Result<String> {
        self.open(url).await?;
        self.capture().await
    }

    /// Release the underlying browser resources. Safe to call more than once.
    async fn close(&mut self);
}

/// Starts rendering sessions.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    type Session: PageSource + 'static;

    /// Start a session. Failures map to [`crate::ScrapeError::SessionStart`].
    async fn acquire(&self) -> Result<Self::Session>;
}
