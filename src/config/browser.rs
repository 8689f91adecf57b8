//! Browser engine configuration types.
//!
//! These live outside `#[cfg(feature = "browser")]` so that config parsing
//! works in builds without the browser feature.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default user agent presented by browser sessions.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Smallest and largest accepted scroll iteration caps.
pub const MIN_SCROLL_ITERATIONS: u32 = 1;
pub const MAX_SCROLL_ITERATIONS: u32 = 5;

/// Chromium switches passed to every launched browser. The driver's own
/// defaults are disabled because they include `--enable-automation`.
const LAUNCH_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--disable-infobars",
    "--disable-background-networking",
    "--disable-background-timer-throttling",
    "--disable-backgrounding-occluded-windows",
    "--disable-breakpad",
    "--disable-client-side-phishing-detection",
    "--disable-default-apps",
    "--disable-dev-shm-usage",
    "--disable-hang-monitor",
    "--disable-ipc-flooding-protection",
    "--disable-popup-blocking",
    "--disable-prompt-on-repost",
    "--disable-renderer-backgrounding",
    "--disable-sync",
    "--disable-gpu",
    "--metrics-recording-only",
    "--no-first-run",
    "--no-default-browser-check",
    "--password-store=basic",
    "--use-mock-keychain",
    "--lang=en-US",
];

/// Browser engine types.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BrowserEngineType {
    /// Chromium with automation signals masked (default).
    #[default]
    Stealth,

    /// No stealth patches (for debugging).
    Standard,
}

impl BrowserEngineType {
    /// Parse from string (for CLI/env var).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "stealth" => Some(Self::Stealth),
            "standard" => Some(Self::Standard),
            _ => None,
        }
    }
}

impl std::fmt::Display for BrowserEngineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stealth => write!(f, "stealth"),
            Self::Standard => write!(f, "standard"),
        }
    }
}

impl std::str::FromStr for BrowserEngineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s).ok_or_else(|| {
            format!(
                "Invalid browser engine '{}'. Valid options: stealth, standard",
                s
            )
        })
    }
}

/// Fixed browser viewport.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Browser engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BrowserEngineConfig {
    /// Browser engine type.
    #[serde(default)]
    pub engine: BrowserEngineType,

    /// Run in headless mode (default: true).
    /// Set to false for debugging or if headless detection is an issue.
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Pass `--no-sandbox` (needed in most containers).
    #[serde(default = "default_no_sandbox")]
    pub no_sandbox: bool,

    #[serde(default)]
    pub viewport: Viewport,

    /// User agent override. Defaults to [`BROWSER_USER_AGENT`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Page load timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Wait after navigation before the first scroll, in milliseconds.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Wait after each scroll before measuring, in milliseconds.
    #[serde(default = "default_scroll_delay_ms")]
    pub scroll_delay_ms: u64,

    /// Upper bound on scroll iterations per page.
    #[serde(default = "default_max_scroll_iterations")]
    pub max_scroll_iterations: u32,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,

    /// Explicit Chrome/Chromium executable. Discovered when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chrome_path: Option<PathBuf>,

    /// Remote Chrome DevTools URL (e.g., "ws://localhost:9222").
    /// If set, connects to an existing browser instead of launching one.
    /// Can also be set via BROWSER_URL environment variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
}

impl Default for BrowserEngineConfig {
    fn default() -> Self {
        Self {
            engine: BrowserEngineType::default(),
            headless: default_headless(),
            no_sandbox: default_no_sandbox(),
            viewport: Viewport::default(),
            user_agent: None,
            timeout: default_timeout(),
            settle_delay_ms: default_settle_delay_ms(),
            scroll_delay_ms: default_scroll_delay_ms(),
            max_scroll_iterations: default_max_scroll_iterations(),
            chrome_args: Vec::new(),
            chrome_path: None,
            remote_url: None,
        }
    }
}

impl BrowserEngineConfig {
    /// Apply environment variable overrides.
    ///
    /// - `BROWSER_URL` - Remote Chrome DevTools URL
    /// - `CHROME_PATH` - Chrome/Chromium executable
    /// - `BROWSER_HEADLESS` - `false`/`0` to show the browser window
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("BROWSER_URL") {
            if !val.is_empty() {
                self.remote_url = Some(val);
            }
        }

        if let Ok(val) = std::env::var("CHROME_PATH") {
            if !val.is_empty() {
                self.chrome_path = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = std::env::var("BROWSER_HEADLESS") {
            if let Some(headless) = parse_bool(&val) {
                self.headless = headless;
            }
        }

        self
    }

    /// Scroll iteration cap clamped to the supported range.
    pub fn scroll_iterations(&self) -> u32 {
        self.max_scroll_iterations
            .clamp(MIN_SCROLL_ITERATIONS, MAX_SCROLL_ITERATIONS)
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(BROWSER_USER_AGENT)
    }

    /// Full command line for a local launch, user-supplied args last.
    pub fn launch_args(&self) -> Vec<String> {
        let mut args: Vec<String> = LAUNCH_ARGS.iter().map(|a| a.to_string()).collect();
        args.push(format!("--user-agent={}", self.user_agent()));
        if self.no_sandbox {
            args.push("--no-sandbox".to_string());
        }
        args.extend(
            self.chrome_args
                .iter()
                .filter(|arg| arg.as_str() != "--enable-automation")
                .cloned(),
        );
        args
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn default_headless() -> bool {
    true
}

pub fn default_no_sandbox() -> bool {
    true
}

pub fn default_timeout() -> u64 {
    30
}

fn default_settle_delay_ms() -> u64 {
    1000
}

fn default_scroll_delay_ms() -> u64 {
    500
}

fn default_max_scroll_iterations() -> u32 {
    3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_args_never_enable_automation() {
        let config = BrowserEngineConfig {
            chrome_args: vec!["--enable-automation".into(), "--mute-audio".into()],
            ..Default::default()
        };
        let args = config.launch_args();
        assert!(!args.iter().any(|a| a == "--enable-automation"));
        assert!(args.contains(&"--disable-blink-features=AutomationControlled".to_string()));
        assert!(args.contains(&"--no-sandbox".to_string()));
        assert!(args.contains(&format!("--user-agent={}", BROWSER_USER_AGENT)));
        assert_eq!(args.last().map(String::as_str), Some("--mute-audio"));

        let sandboxed = BrowserEngineConfig {
            no_sandbox: false,
            ..Default::default()
        };
        assert!(!sandboxed.launch_args().contains(&"--no-sandbox".to_string()));
    }

    #[test]
    fn test_browser_engine_type_serde() {
        let stealth: BrowserEngineType = serde_json::from_str("\"stealth\"").unwrap();
        assert_eq!(stealth, BrowserEngineType::Stealth);

        let standard: BrowserEngineType = serde_json::from_str("\"standard\"").unwrap();
        assert_eq!(standard, BrowserEngineType::Standard);
    }

    #[test]
    fn test_browser_engine_type_from_str() {
        assert_eq!(
            BrowserEngineType::from_str("STEALTH"),
            Some(BrowserEngineType::Stealth)
        );
        assert_eq!(BrowserEngineType::from_str("cookies"), None);
        assert!("bogus".parse::<BrowserEngineType>().is_err());
        assert_eq!(format!("{}", BrowserEngineType::Standard), "standard");
    }

    #[test]
    fn test_browser_engine_config_default() {
        let config = BrowserEngineConfig::default();
        assert_eq!(config.engine, BrowserEngineType::Stealth);
        assert!(config.headless);
        assert!(config.no_sandbox);
        assert_eq!(config.viewport, Viewport { width: 1280, height: 720 });
        assert_eq!(config.timeout, 30);
        assert_eq!(config.settle_delay_ms, 1000);
        assert_eq!(config.scroll_delay_ms, 500);
        assert_eq!(config.max_scroll_iterations, 3);
        assert_eq!(config.user_agent(), BROWSER_USER_AGENT);
        assert!(config.remote_url.is_none());
    }

    #[test]
    fn test_browser_engine_config_serde_defaults() {
        let config: BrowserEngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, BrowserEngineConfig::default());
    }

    #[test]
    fn test_browser_engine_config_serde_with_values() {
        let json = r#"{
            "engine": "standard",
            "headless": false,
            "viewport": {"width": 1920, "height": 1080},
            "user_agent": "test-agent",
            "max_scroll_iterations": 5,
            "chrome_args": ["--lang=en-US"]
        }"#;

        let config: BrowserEngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.engine, BrowserEngineType::Standard);
        assert!(!config.headless);
        assert_eq!(config.viewport.width, 1920);
        assert_eq!(config.user_agent(), "test-agent");
        assert_eq!(config.scroll_iterations(), 5);
        assert_eq!(config.chrome_args, vec!["--lang=en-US"]);
    }

    #[test]
    fn test_scroll_iterations_clamped() {
        let mut config = BrowserEngineConfig {
            max_scroll_iterations: 0,
            ..Default::default()
        };
        assert_eq!(config.scroll_iterations(), 1);
        config.max_scroll_iterations = 50;
        assert_eq!(config.scroll_iterations(), 5);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool(" 1 "), Some(true));
        assert_eq!(parse_bool("maybe"), None);
    }
}
