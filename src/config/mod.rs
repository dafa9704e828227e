use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::event::EventKind;
use crate::infrastructure::runtime::{
    WorkerSettings, DEFAULT_DECODE_CONCURRENCY, DEFAULT_POLL_INTERVAL,
};
use crate::render::{
    DEFAULT_LOAD_MORE_ROWS, DEFAULT_MIN_RENDER_INTERVAL, DEFAULT_PAGE_RADIUS, DEFAULT_PAGE_SIZE,
    PAGE_SIZES,
};
use crate::store::DEFAULT_MAX_STORED_EVENTS;

#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    pub name: Option<String>,
    pub rpc: Option<String>,
    pub ws: Option<String>,
    pub ipc: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,

    /// Block explorer base URL, e.g. `https://etherscan.io`
    #[serde(default)]
    pub explorer_prefix: Option<String>,

    #[serde(default)]
    pub display: DisplayConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub max_stored_events: usize,
    pub page_size: usize,
    pub page_sizes: Vec<usize>,
    pub min_render_interval_ms: u64,
    pub page_radius: usize,
    /// Rows from the bottom of the list at which the next page loads
    pub load_more_rows: usize,
    /// Kind labels shown at startup; all kinds when unset
    pub enabled_kinds: Option<Vec<String>>,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            max_stored_events: DEFAULT_MAX_STORED_EVENTS,
            page_size: DEFAULT_PAGE_SIZE,
            page_sizes: PAGE_SIZES.to_vec(),
            min_render_interval_ms: DEFAULT_MIN_RENDER_INTERVAL.as_millis() as u64,
            page_radius: DEFAULT_PAGE_RADIUS,
            load_more_rows: DEFAULT_LOAD_MORE_ROWS,
            enabled_kinds: None,
        }
    }
}

impl DisplayConfig {
    pub fn min_render_interval(&self) -> Duration {
        Duration::from_millis(self.min_render_interval_ms)
    }

    /// Sorted, deduplicated page sizes that always contain `page_size`
    pub fn page_sizes(&self) -> Vec<usize> {
        let mut sizes: Vec<usize> = self
            .page_sizes
            .iter()
            .copied()
            .chain(std::iter::once(self.page_size))
            .filter(|size| *size > 0)
            .collect();
        sizes.sort_unstable();
        sizes.dedup();
        sizes
    }

    /// Kinds active at startup and any labels that didn't parse
    pub fn enabled_kinds(&self) -> (Vec<EventKind>, Vec<String>) {
        let Some(labels) = &self.enabled_kinds else {
            return (EventKind::ALL.to_vec(), Vec::new());
        };
        let mut kinds = Vec::new();
        let mut unknown = Vec::new();
        for label in labels {
            match EventKind::parse(label) {
                Some(kind) if !kinds.contains(&kind) => kinds.push(kind),
                Some(_) => {}
                None => unknown.push(label.clone()),
            }
        }
        (kinds, unknown)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// In-flight decodes per block; 1 decodes strictly in sequence
    pub decode_concurrency: usize,
    pub poll_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            decode_concurrency: DEFAULT_DECODE_CONCURRENCY,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl PipelineConfig {
    pub fn worker_settings(&self) -> WorkerSettings {
        WorkerSettings {
            decode_concurrency: self.decode_concurrency.max(1),
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(50)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive, e.g. `info` or `tokenfeed=debug`
    pub level: String,
    pub json: bool,
    /// Log file; defaults to `tokenfeed.log` in the data dir
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            file: None,
        }
    }
}

impl LogConfig {
    pub fn file_path(&self) -> Option<PathBuf> {
        self.file
            .clone()
            .or_else(|| data_dir().map(|dir| dir.join("tokenfeed.log")))
    }
}

/// Load the config file. A missing file yields the defaults.
pub fn load() -> Result<Config> {
    match config_path() {
        Some(path) if path.exists() => load_from(&path),
        _ => Ok(Config::default()),
    }
}

pub fn load_from(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    toml::from_str::<Config>(&content).with_context(|| format!("Invalid config {}", path.display()))
}

pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os("TOKENFEED_CONFIG").map(PathBuf::from) {
        return Some(path);
    }
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from) {
        return Some(xdg.join("tokenfeed").join("config.toml"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".config").join("tokenfeed").join("config.toml"));
    }

    directories::ProjectDirs::from("io", "tokenfeed", "tokenfeed")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

pub fn data_dir() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").map(PathBuf::from) {
        return Some(xdg.join("tokenfeed"));
    }
    if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
        return Some(home.join(".local").join("share").join("tokenfeed"));
    }
    directories::ProjectDirs::from("io", "tokenfeed", "tokenfeed")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Strip the trailing slash so links join as `{prefix}/tx/{hash}`
pub fn normalize_explorer_prefix(prefix: &str) -> String {
    prefix.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.endpoints.is_empty());
        assert_eq!(config.display.max_stored_events, 1000);
        assert_eq!(config.display.page_size, 25);
        assert_eq!(config.display.min_render_interval(), Duration::from_millis(1000));
        assert_eq!(config.pipeline.decode_concurrency, 4);
        assert_eq!(config.pipeline.poll_interval_ms, 500);
        assert_eq!(config.log.level, "info");
        assert_eq!(config.display.enabled_kinds().0.len(), 9);
    }

    #[test]
    fn test_full_config() {
        let config: Config = toml::from_str(
            r#"
explorer_prefix = "https://etherscan.io/"

[[endpoints]]
name = "mainnet"
ws = "wss://eth.example/ws"

[display]
max_stored_events = 200
page_size = 30
page_sizes = [50, 10, 10]
enabled_kinds = ["erc20Transfer", "ERC721MINT", "bogus"]

[pipeline]
decode_concurrency = 0
poll_interval_ms = 1

[log]
level = "tokenfeed=debug"
json = true
"#,
        )
        .unwrap();

        assert_eq!(config.endpoints[0].ws.as_deref(), Some("wss://eth.example/ws"));
        assert_eq!(config.display.max_stored_events, 200);
        assert_eq!(config.display.min_render_interval_ms, 1000);
        assert_eq!(config.display.page_sizes(), vec![10, 30, 50]);

        let (kinds, unknown) = config.display.enabled_kinds();
        assert_eq!(kinds, vec![EventKind::Erc20Transfer, EventKind::Erc721Mint]);
        assert_eq!(unknown, vec!["bogus".to_string()]);

        let settings = config.pipeline.worker_settings();
        assert_eq!(settings.decode_concurrency, 1);
        assert_eq!(settings.poll_interval, Duration::from_millis(50));
        assert!(config.log.json);

        assert_eq!(
            normalize_explorer_prefix(config.explorer_prefix.as_deref().unwrap()),
            "https://etherscan.io"
        );
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = std::env::temp_dir().join(format!("tokenfeed-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        fs::write(&path, "[display]\npage_size = \"many\"\n").unwrap();
        assert!(load_from(&path).is_err());
        let _ = fs::remove_dir_all(&dir);
    }
}
