//! Bounded scroll-until-stable rendering.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::config::BrowserEngineConfig;
use crate::error::Result;

/// Low-level page operations a renderer needs.
#[async_trait]
pub trait PageDriver: Send {
    async fn navigate(&mut self, url: &str) -> Result<()>;
    async fn scroll_to_bottom(&mut self) -> Result<()>;
    /// Current `document.documentElement.scrollHeight`.
    async fn document_height(&mut self) -> Result<u64>;
    /// Full rendered markup.
    async fn content(&mut self) -> Result<String>;
}

/// Delays and iteration cap for one render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollPolicy {
    pub settle_delay: Duration,
    pub scroll_delay: Duration,
    pub max_iterations: u32,
}

impl ScrollPolicy {
    /// No waits; for pages that are already fully rendered.
    pub fn immediate(max_iterations: u32) -> Self {
        Self {
            settle_delay: Duration::ZERO,
            scroll_delay: Duration::ZERO,
            max_iterations,
        }
    }
}

impl From<&BrowserEngineConfig> for ScrollPolicy {
    fn from(config: &BrowserEngineConfig) -> Self {
        Self {
            settle_delay: Duration::from_millis(config.settle_delay_ms),
            scroll_delay: Duration::from_millis(config.scroll_delay_ms),
            max_iterations: config.scroll_iterations(),
        }
    }
}

impl Default for ScrollPolicy {
    fn default() -> Self {
        Self::from(&BrowserEngineConfig::default())
    }
}

/// Scroll until the document height stops increasing or the cap is reached.
///
/// Returns the number of scroll iterations performed. The cap is the only
/// termination guarantee for pages whose height never settles.
pub async fn scroll_until_stable<D>(driver: &mut D, policy: &ScrollPolicy) -> Result<u32>
where
    D: PageDriver + ?Sized,
{
    let mut last_height = driver.document_height().await?;
    let max_iterations = policy.max_iterations.max(1);

    for iteration in 1..=max_iterations {
        driver.scroll_to_bottom().await?;
        if !policy.scroll_delay.is_zero() {
            tokio::time::sleep(policy.scroll_delay).await;
        }

        let height = driver.document_height().await?;
        if height <= last_height {
            debug!(iteration, height, "Document height stable");
            return Ok(iteration);
        }
        last_height = height;
    }

    debug!(max_iterations, last_height, "Scroll cap reached");
    Ok(max_iterations)
}

/// Navigate and wait out the settle delay.
pub async fn open_page<D>(driver: &mut D, url: &str, policy: &ScrollPolicy) -> Result<()>
where
    D: PageDriver + ?Sized,
{
    driver.navigate(url).await?;
    if !policy.settle_delay.is_zero() {
        tokio::time::sleep(policy.settle_delay).await;
    }
    Ok(())
}

/// Scroll until stable and return the rendered markup.
pub async fn capture_page<D>(driver: &mut D, policy: &ScrollPolicy) -> Result<String>
where
    D: PageDriver + ?Sized,
{
    let iterations = scroll_until_stable(driver, policy).await?;
    debug!(iterations, "Captured page");
    driver.content().await
}

/// Navigate, settle, scroll until stable, and return the rendered markup.
pub async fn render_page<D>(driver: &mut D, url: &str, policy: &ScrollPolicy) -> Result<String>
where
    D: PageDriver + ?Sized,
{
    open_page(driver, url, policy).await?;
    capture_page(driver, policy).await
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::error::ScrapeError;

    /// Replays a fixed sequence of heights; the last one repeats.
    struct FakeDriver {
        heights: VecDeque<u64>,
        scrolls: u32,
        visited: Vec<String>,
    }

    impl FakeDriver {
        fn new(heights: &[u64]) -> Self {
            Self {
                heights: heights.iter().copied().collect(),
                scrolls: 0,
                visited: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl PageDriver for FakeDriver {
        async fn navigate(&mut self, url: &str) -> Result<()> {
            if url.is_empty() {
                return Err(ScrapeError::navigation(url, "empty url"));
            }
            self.visited.push(url.to_string());
            Ok(())
        }

        async fn scroll_to_bottom(&mut self) -> Result<()> {
            self.scrolls += 1;
            Ok(())
        }

        async fn document_height(&mut self) -> Result<u64> {
            if self.heights.len() > 1 {
                Ok(self.heights.pop_front().unwrap())
            } else {
                Ok(*self.heights.front().unwrap())
            }
        }

        async fn content(&mut self) -> Result<String> {
            Ok(format!("<html>{}</html>", self.scrolls))
        }
    }

    #[tokio::test]
    async fn test_stable_height_stops_after_one_iteration() {
        let mut driver = FakeDriver::new(&[1000, 1000]);
        let iterations = scroll_until_stable(&mut driver, &ScrollPolicy::immediate(5))
            .await
            .unwrap();
        assert_eq!(iterations, 1);
        assert_eq!(driver.scrolls, 1);
    }

    #[tokio::test]
    async fn test_growth_continues_until_stable() {
        let mut driver = FakeDriver::new(&[1000, 2000, 3000, 3000]);
        let iterations = scroll_until_stable(&mut driver, &ScrollPolicy::immediate(5))
            .await
            .unwrap();
        assert_eq!(iterations, 3);
    }

    #[tokio::test]
    async fn test_cap_bounds_never_stable_page() {
        let heights: Vec<u64> = (1..=100).map(|n| n * 1000).collect();
        let mut driver = FakeDriver::new(&heights);
        let iterations = scroll_until_stable(&mut driver, &ScrollPolicy::immediate(3))
            .await
            .unwrap();
        assert_eq!(iterations, 3);
        assert_eq!(driver.scrolls, 3);
    }

    #[tokio::test]
    async fn test_zero_cap_still_scrolls_once() {
        let mut driver = FakeDriver::new(&[1000, 2000, 3000]);
        let iterations = scroll_until_stable(&mut driver, &ScrollPolicy::immediate(0))
            .await
            .unwrap();
        assert_eq!(iterations, 1);
    }

    #[tokio::test]
    async fn test_render_page_returns_content() {
        let mut driver = FakeDriver::new(&[500, 800, 800]);
        let html = render_page(&mut driver, "https://example.com", &ScrollPolicy::immediate(3))
            .await
            .unwrap();
        assert_eq!(html, "<html>2</html>");
        assert_eq!(driver.visited, vec!["https://example.com"]);
    }

    #[tokio::test]
    async fn test_render_page_propagates_navigation_error() {
        let mut driver = FakeDriver::new(&[500]);
        let err = render_page(&mut driver, "", &ScrollPolicy::immediate(3))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Navigation { .. }));
        assert_eq!(driver.scrolls, 0);
    }

    #[test]
    fn test_policy_from_config_clamps() {
        let config = BrowserEngineConfig {
            max_scroll_iterations: 99,
            ..Default::default()
        };
        let policy = ScrollPolicy::from(&config);
        assert_eq!(policy.max_iterations, 5);
        assert_eq!(policy.settle_delay, Duration::from_millis(1000));
    }
}
