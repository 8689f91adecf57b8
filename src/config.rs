//! Configuration management for tubescrape using the prefer crate.

mod browser;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use browser::{BrowserEngineConfig, BrowserEngineType, Viewport, BROWSER_USER_AGENT};

use crate::models::SearchLimits;

/// Default collection index filename.
pub const DEFAULT_INDEX_FILENAME: &str = "collections.json";
/// Default directory (under the data dir) holding one item file per collection.
pub const DEFAULT_ITEMS_DIRNAME: &str = "items";
/// Default single-file snapshot filename.
pub const DEFAULT_SNAPSHOT_FILENAME: &str = "youtube_data.json";

/// Physical layout of persisted data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreLayout {
    /// Collection index plus one item file per collection.
    #[default]
    TwoTier,
    /// Everything in a single JSON document.
    Snapshot,
}

impl StoreLayout {
    /// Parse from string (for CLI/env var).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace(['-', '_'], "").as_str() {
            "twotier" => Some(Self::TwoTier),
            "snapshot" => Some(Self::Snapshot),
            _ => None,
        }
    }
}

impl std::fmt::Display for StoreLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TwoTier => write!(f, "two-tier"),
            Self::Snapshot => write!(f, "snapshot"),
        }
    }
}

impl std::str::FromStr for StoreLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str(s).ok_or_else(|| {
            format!(
                "Invalid store layout '{}'. Valid options: two-tier, snapshot",
                s
            )
        })
    }
}

/// Application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Collection index filename (two-tier layout).
    pub index_filename: String,
    /// Item file directory name (two-tier layout).
    pub items_dirname: String,
    /// Snapshot filename (snapshot layout).
    pub snapshot_filename: String,
    pub layout: StoreLayout,
    pub max_collections: usize,
    pub max_items_per_collection: usize,
    /// Pause between collection visits in milliseconds.
    pub collection_delay_ms: u64,
    /// Upper bound for a single navigation/render step, in seconds.
    pub step_timeout_secs: u64,
    /// Collections scraped at once, one browser session each.
    pub concurrency: usize,
    pub browser: BrowserEngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        // Default to ~/Documents/tubescrape/ for user data
        // Falls back gracefully: Documents dir -> Home dir -> Current dir
        let data_dir = dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tubescrape");

        Self {
            data_dir,
            index_filename: DEFAULT_INDEX_FILENAME.to_string(),
            items_dirname: DEFAULT_ITEMS_DIRNAME.to_string(),
            snapshot_filename: DEFAULT_SNAPSHOT_FILENAME.to_string(),
            layout: StoreLayout::default(),
            max_collections: 15,
            max_items_per_collection: 50,
            collection_delay_ms: 500,
            step_timeout_secs: 30,
            concurrency: 1,
            browser: BrowserEngineConfig::default(),
        }
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            ..Default::default()
        }
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(&self.index_filename)
    }

    pub fn items_dir(&self) -> PathBuf {
        self.data_dir.join(&self.items_dirname)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot_filename)
    }

    pub fn collection_delay(&self) -> Duration {
        Duration::from_millis(self.collection_delay_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs.max(1))
    }

    /// Run limits derived from these settings.
    pub fn search_limits(&self) -> SearchLimits {
        SearchLimits {
            max_collections: self.max_collections,
            max_items_per_collection: self.max_items_per_collection,
            concurrency: self.concurrency.max(1),
            ..Default::default()
        }
    }

    /// Ensure the data directories exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| {
            std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create data directory '{}': {}",
                    self.data_dir.display(),
                    e
                ),
            )
        })?;
        if self.layout == StoreLayout::TwoTier {
            std::fs::create_dir_all(self.items_dir())?;
        }
        Ok(())
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_dirname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<StoreLayout>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_collections: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items_per_collection: Option<usize>,
    /// Pause between collection visits in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_delay_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,
    /// Browser engine settings.
    #[serde(default)]
    pub browser: BrowserEngineConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers tubescrape config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("tubescrape").await {
            Ok(pref_config) => {
                if let Some(path) = pref_config.source_path() {
                    match Self::load_from_path(path).await {
                        Ok(config) => config,
                        Err(e) => {
                            tracing::warn!("Ignoring config file {}: {}", path.display(), e);
                            Self::default_with_env()
                        }
                    }
                } else {
                    Self::default_with_env()
                }
            }
            // No config file found, use defaults with env overrides
            Err(_) => Self::default_with_env(),
        }
    }

    /// Create a default config with environment variable overrides applied.
    pub fn default_with_env() -> Self {
        Self {
            browser: BrowserEngineConfig::default().with_env_overrides(),
            ..Default::default()
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(&contents, ext)?;

        config.source_path = Some(path.to_path_buf());
        config.browser = config.browser.with_env_overrides();
        Ok(config)
    }

    /// Parse configuration text in the format named by `ext`.
    pub fn parse(contents: &str, ext: &str) -> Result<Self, String> {
        match ext {
            "toml" => toml::from_str(contents)
                .map_err(|e| format!("Failed to parse TOML config: {}", e)),
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e)),
            _ => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }

    /// Get the base directory for resolving relative paths.
    /// Returns the config file's parent directory if available, otherwise None.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// - Absolute paths are returned as-is
    /// - Paths starting with ~ are expanded
    /// - Relative paths are resolved relative to `base_dir`
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply configuration to settings.
    /// `base_dir` is used to resolve relative paths (typically config file dir or CWD).
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            settings.data_dir = self.resolve_path(data_dir, base_dir);
        }
        if let Some(ref name) = self.index_filename {
            settings.index_filename = name.clone();
        }
        if let Some(ref name) = self.items_dirname {
            settings.items_dirname = name.clone();
        }
        if let Some(ref name) = self.snapshot_filename {
            settings.snapshot_filename = name.clone();
        }
        if let Some(layout) = self.layout {
            settings.layout = layout;
        }
        if let Some(max) = self.max_collections {
            settings.max_collections = max;
        }
        if let Some(max) = self.max_items_per_collection {
            settings.max_items_per_collection = max;
        }
        if let Some(delay) = self.collection_delay_ms {
            settings.collection_delay_ms = delay;
        }
        if let Some(timeout) = self.step_timeout_secs {
            settings.step_timeout_secs = timeout;
        }
        if let Some(concurrency) = self.concurrency {
            settings.concurrency = concurrency.max(1);
        }
        settings.browser = self.browser.clone();
    }
}

/// Load settings from the discovered config file (if any).
///
/// `data_override` (the `--data` flag) takes precedence over the file.
pub async fn load_settings(data_override: Option<PathBuf>) -> (Settings, Config) {
    let config = Config::load().await;
    let mut settings = Settings::default();

    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    config.apply_to_settings(&mut settings, &base_dir);

    if let Some(data_dir) = data_override {
        settings.data_dir = data_dir;
    }

    (settings, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings = Settings::with_data_dir(PathBuf::from("/tmp/ts"));
        assert_eq!(settings.index_path(), PathBuf::from("/tmp/ts/collections.json"));
        assert_eq!(settings.items_dir(), PathBuf::from("/tmp/ts/items"));
        assert_eq!(settings.snapshot_path(), PathBuf::from("/tmp/ts/youtube_data.json"));
        assert_eq!(settings.layout, StoreLayout::TwoTier);
        assert_eq!(settings.max_collections, 15);
        assert_eq!(settings.max_items_per_collection, 50);
        assert_eq!(settings.collection_delay(), Duration::from_millis(500));
        assert_eq!(settings.search_limits().concurrency, 1);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            data_dir = "scrapes"
            layout = "snapshot"
            max_collections = 5

            [browser]
            headless = false
            max_scroll_iterations = 4
        "#;
        let config = Config::parse(toml, "toml").unwrap();
        assert_eq!(config.layout, Some(StoreLayout::Snapshot));
        assert_eq!(config.max_collections, Some(5));
        assert!(!config.browser.headless);
        assert_eq!(config.browser.max_scroll_iterations, 4);
        // Unset browser fields keep their defaults.
        assert_eq!(config.browser.timeout, 30);
    }

    #[test]
    fn test_parse_yaml_and_json() {
        let yaml = "max_items_per_collection: 10\nconcurrency: 3\n";
        let config = Config::parse(yaml, "yml").unwrap();
        assert_eq!(config.max_items_per_collection, Some(10));
        assert_eq!(config.concurrency, Some(3));

        let json = r#"{"collection_delay_ms": 0, "browser": {"engine": "standard"}}"#;
        let config = Config::parse(json, "json").unwrap();
        assert_eq!(config.collection_delay_ms, Some(0));
        assert_eq!(config.browser.engine, BrowserEngineType::Standard);

        assert!(Config::parse("{not json", "json").is_err());
    }

    #[test]
    fn test_apply_to_settings_resolves_relative_paths() {
        let config = Config {
            data_dir: Some("scrapes".into()),
            concurrency: Some(0),
            max_collections: Some(3),
            ..Default::default()
        };
        let mut settings = Settings::default();
        config.apply_to_settings(&mut settings, Path::new("/etc/tubescrape"));
        assert_eq!(settings.data_dir, PathBuf::from("/etc/tubescrape/scrapes"));
        assert_eq!(settings.concurrency, 1);
        assert_eq!(settings.max_collections, 3);

        let absolute = Config {
            data_dir: Some("/var/lib/ts".into()),
            ..Default::default()
        };
        absolute.apply_to_settings(&mut settings, Path::new("/etc/tubescrape"));
        assert_eq!(settings.data_dir, PathBuf::from("/var/lib/ts"));
    }

    #[tokio::test]
    async fn test_load_from_path_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tubescrape.toml");
        std::fs::write(&path, "max_collections = 2\n").unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        assert_eq!(config.max_collections, Some(2));
        assert_eq!(config.base_dir(), Some(dir.path().to_path_buf()));
    }

    #[test]
    fn test_store_layout_from_str() {
        assert_eq!(StoreLayout::from_str("two-tier"), Some(StoreLayout::TwoTier));
        assert_eq!(StoreLayout::from_str("two_tier"), Some(StoreLayout::TwoTier));
        assert_eq!(StoreLayout::from_str("Snapshot"), Some(StoreLayout::Snapshot));
        assert!("sqlite".parse::<StoreLayout>().is_err());
    }
}
