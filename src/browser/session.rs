//! Chromium sessions over the DevTools protocol.

#[cfg(feature = "browser")]
use std::time::Duration;

use async_trait::async_trait;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
#[cfg(feature = "browser")]
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams,
};
#[cfg(feature = "browser")]
use chromiumoxide::handler::viewport::Viewport as CdpViewport;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use tokio::task::JoinHandle;

#[cfg(feature = "browser")]
use super::binary::find_chrome;
#[cfg(feature = "browser")]
use super::render::{capture_page, open_page, PageDriver};
use super::render::ScrollPolicy;
#[cfg(feature = "browser")]
use super::stealth::STEALTH_SCRIPTS;
use super::{PageSource, SessionLauncher};
#[cfg(feature = "browser")]
use crate::config::BrowserEngineType;
use crate::config::BrowserEngineConfig;
use crate::error::{Result, ScrapeError};

/// JavaScript to wait for page ready state.
#[cfg(feature = "browser")]
const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

#[cfg(feature = "browser")]
const SCROLL_SCRIPT: &str = "window.scrollTo(0, document.documentElement.scrollHeight); true";

#[cfg(feature = "browser")]
const HEIGHT_SCRIPT: &str = "document.documentElement.scrollHeight";

/// Launches local Chromium, or connects to a remote one when `remote_url` is set.
#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    config: BrowserEngineConfig,
}

impl ChromeLauncher {
    pub fn new(config: BrowserEngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BrowserEngineConfig {
        &self.config
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl SessionLauncher for ChromeLauncher {
    type Session = ChromeSession;

    async fn acquire(&self) -> Result<ChromeSession> {
        ChromeSession::start(self.config.clone()).await
    }
}

/// One browser with a single page, exclusively owned by its caller.
#[cfg(feature = "browser")]
pub struct ChromeSession {
    config: BrowserEngineConfig,
    policy: ScrollPolicy,
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    /// Remote browsers are shared; only our page is closed on release.
    remote: bool,
    current_url: String,
}

#[cfg(feature = "browser")]
impl ChromeSession {
    async fn start(config: BrowserEngineConfig) -> Result<Self> {
        let (browser, handler, remote) = match config.remote_url.clone() {
            Some(url) => {
                let (browser, handler) = connect_remote(&url).await?;
                (browser, handler, true)
            }
            None => {
                let (browser, handler) = launch_local(&config).await?;
                (browser, handler, false)
            }
        };

        let mut session = Self {
            policy: ScrollPolicy::from(&config),
            config,
            browser: Some(browser),
            page: None,
            handler: Some(handler),
            remote,
            current_url: String::new(),
        };

        // Release a half-initialised session before reporting the failure
        if let Err(e) = session.open_page().await {
            session.close().await;
            return Err(e);
        }
        Ok(session)
    }

    /// Open the working page and mask automation signals before any navigation.
    async fn open_page(&mut self) -> Result<()> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| ScrapeError::SessionStart("browser not running".into()))?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ScrapeError::SessionStart(format!("Failed to open page: {}", e)))?;

        page.execute(SetUserAgentOverrideParams::new(
            self.config.user_agent().to_string(),
        ))
        .await
        .map_err(|e| ScrapeError::SessionStart(format!("Failed to set user agent: {}", e)))?;

        if self.config.engine == BrowserEngineType::Stealth {
            debug!("Applying stealth scripts");
            for script in STEALTH_SCRIPTS {
                if let Err(e) = page
                    .execute(AddScriptToEvaluateOnNewDocumentParams::new(script.to_string()))
                    .await
                {
                    warn!("Stealth script injection failed: {}", e);
                }
            }
        }

        self.page = Some(page);
        Ok(())
    }

    fn page(&self) -> Result<&Page> {
        self.page
            .as_ref()
            .ok_or_else(|| ScrapeError::navigation(&self.current_url, "session already closed"))
    }

    /// Browser product string, e.g. `HeadlessChrome/120.0.6099.109`.
    pub async fn version(&self) -> Result<String> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| ScrapeError::SessionStart("browser not running".into()))?;
        let version = browser
            .version()
            .await
            .map_err(|e| ScrapeError::SessionStart(format!("Failed to query version: {}", e)))?;
        Ok(version.product)
    }

    /// Wait for the page to reach a ready state.
    async fn wait_for_page_ready(&self) {
        let Ok(page) = self.page() else {
            return;
        };
        let ready_timeout = Duration::from_secs(self.config.timeout);
        match tokio::time::timeout(
            ready_timeout,
            page.evaluate(WAIT_FOR_READY_SCRIPT.to_string()),
        )
        .await
        {
            Ok(Ok(result)) => {
                let state: String = result
                    .into_value()
                    .unwrap_or_else(|_| "unknown".to_string());
                debug!("Page ready state: {}", state);
            }
            Ok(Err(e)) => debug!("Could not check ready state: {}", e),
            Err(_) => warn!("Timeout waiting for page ready state"),
        }
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageDriver for ChromeSession {
    async fn navigate(&mut self, url: &str) -> Result<()> {
        info!("Navigating to {}", url);
        self.current_url = url.to_string();

        let nav_params = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| ScrapeError::navigation(url, format!("Invalid URL: {}", e)))?;

        let nav_timeout = Duration::from_secs(self.config.timeout);
        tokio::time::timeout(nav_timeout, self.page()?.execute(nav_params))
            .await
            .map_err(|_| ScrapeError::Timeout {
                step: format!("navigate {}", url),
                secs: self.config.timeout,
            })?
            .map_err(|e| ScrapeError::navigation(url, e))?;

        self.wait_for_page_ready().await;
        Ok(())
    }

    async fn scroll_to_bottom(&mut self) -> Result<()> {
        self.page()?
            .evaluate(SCROLL_SCRIPT.to_string())
            .await
            .map_err(|e| ScrapeError::navigation(&self.current_url, e))?;
        Ok(())
    }

    async fn document_height(&mut self) -> Result<u64> {
        let result = self
            .page()?
            .evaluate(HEIGHT_SCRIPT.to_string())
            .await
            .map_err(|e| ScrapeError::navigation(&self.current_url, e))?;
        let height: f64 = result
            .into_value()
            .map_err(|e| ScrapeError::navigation(&self.current_url, e))?;
        Ok(height.max(0.0) as u64)
    }

    async fn content(&mut self) -> Result<String> {
        self.page()?
            .content()
            .await
            .map_err(|e| ScrapeError::navigation(&self.current_url, e))
    }
}

#[cfg(feature = "browser")]
#[async_trait]
impl PageSource for ChromeSession {
    async fn open(&mut self, url: &str) -> Result<()> {
        let policy = self.policy;
        open_page(self, url, &policy).await
    }

    async fn capture(&mut self) -> Result<String> {
        let policy = self.policy;
        capture_page(self, &policy).await
    }

    async fn close(&mut self) {
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }
        if let Some(mut browser) = self.browser.take() {
            if !self.remote {
                if let Err(e) = browser.close().await {
                    debug!("Browser close failed: {}", e);
                }
                let _ = browser.wait().await;
            }
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

#[cfg(feature = "browser")]
fn spawn_handler(mut handler: chromiumoxide::Handler) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    })
}

/// Launch a local browser process.
#[cfg(feature = "browser")]
async fn launch_local(config: &BrowserEngineConfig) -> Result<(Browser, JoinHandle<()>)> {
    info!("Launching browser (headless={})", config.headless);

    let chrome_path = find_chrome(config.chrome_path.as_deref())?;
    let mut builder = BrowserConfig::builder()
        .chrome_executable(chrome_path)
        .window_size(config.viewport.width, config.viewport.height)
        .viewport(CdpViewport {
            width: config.viewport.width,
            height: config.viewport.height,
            ..Default::default()
        });

    // with_head means NOT headless
    if !config.headless {
        builder = builder.with_head();
    }

    // Drop the driver defaults so --enable-automation is never passed
    builder = builder.disable_default_args().args(config.launch_args());

    let browser_config = builder
        .build()
        .map_err(|e| ScrapeError::SessionStart(format!("Failed to build browser config: {}", e)))?;

    let (browser, handler) = Browser::launch(browser_config)
        .await
        .map_err(|e| ScrapeError::SessionStart(format!("Failed to launch browser: {}", e)))?;

    Ok((browser, spawn_handler(handler)))
}

/// Connect to a remote Chrome instance.
#[cfg(feature = "browser")]
async fn connect_remote(url: &str) -> Result<(Browser, JoinHandle<()>)> {
    info!("Connecting to remote browser at {}", url);

    let ws_url = if url.contains("/devtools/browser/") {
        url.to_string()
    } else {
        // Get WebSocket URL from the /json/version endpoint
        let http_url = url
            .replace("ws://", "http://")
            .replace("wss://", "https://");
        let version_url = format!("{}/json/version", http_url.trim_end_matches('/'));

        let resp: serde_json::Value = reqwest::Client::new()
            .get(&version_url)
            .send()
            .await
            .map_err(|e| ScrapeError::SessionStart(format!("Failed to reach {}: {}", version_url, e)))?
            .json()
            .await
            .map_err(|e| {
                ScrapeError::SessionStart(format!("Failed to parse browser version info: {}", e))
            })?;

        resp.get("webSocketDebuggerUrl")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| ScrapeError::SessionStart("No webSocketDebuggerUrl in response".into()))?
    };

    info!("Connecting to WebSocket: {}", ws_url);
    let (browser, handler) = Browser::connect(ws_url)
        .await
        .map_err(|e| ScrapeError::SessionStart(format!("Failed to connect to remote browser: {}", e)))?;

    Ok((browser, spawn_handler(handler)))
}

// Stubs for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct ChromeSession {
    _policy: ScrollPolicy,
}

#[cfg(not(feature = "browser"))]
impl ChromeSession {
    pub async fn version(&self) -> Result<String> {
        Err(not_compiled())
    }
}

#[cfg(not(feature = "browser"))]
fn not_compiled() -> ScrapeError {
    ScrapeError::SessionStart(
        "Browser support not compiled. Rebuild with: cargo build --features browser".into(),
    )
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl PageSource for ChromeSession {
    async fn open(&mut self, _url: &str) -> Result<()> {
        Err(not_compiled())
    }

    async fn capture(&mut self) -> Result<String> {
        Err(not_compiled())
    }

    async fn close(&mut self) {}
}

#[cfg(not(feature = "browser"))]
#[async_trait]
impl SessionLauncher for ChromeLauncher {
    type Session = ChromeSession;

    async fn acquire(&self) -> Result<ChromeSession> {
        Err(not_compiled())
    }
}
