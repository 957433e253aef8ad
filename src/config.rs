use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::warn;

use crate::analytics::Granularity;
use crate::filter::FilterConfig;
use crate::parsers::browser::Browser;

pub const CONFIG_VERSION: u32 = 1;

const DEFAULT_CONFIG: &[u8] = include_bytes!("../config/default.yml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config {path} already exists")]
    AlreadyExists { path: PathBuf },
    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("unsupported config version {found} (expected {})", CONFIG_VERSION)]
    UnsupportedVersion { found: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    #[default]
    Timeline,
    Stats,
    TopDomains,
    BrowserUsage,
    Patterns,
    Json,
    Jsonl,
    Csv,
}

impl OutputFormat {
    /// Formats written to a file instead of printed.
    pub fn is_export(self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Jsonl | OutputFormat::Csv)
    }

    pub fn default_filename(self) -> Option<&'static str> {
        match self {
            OutputFormat::Json => Some("browser_history.json"),
            OutputFormat::Jsonl => Some("browser_history.jsonl"),
            OutputFormat::Csv => Some("browser_history.csv"),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub limit: usize,
    pub days_back: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Timeline,
            limit: 100,
            days_back: 7,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DisplayConfig {
    pub show_url: bool,
    pub show_visit_count: bool,
    pub date_format: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            show_url: true,
            show_visit_count: true,
            date_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub group_patterns_by: Granularity,
    pub top_domains_limit: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            group_patterns_by: Granularity::Hour,
            top_domains_limit: 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CollectionConfig {
    pub parallel: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ExportConfig {
    pub anonymize_urls: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub version: u32,
    /// Keyed by browser config key; unknown keys are reported and ignored.
    #[serde(default)]
    pub browsers: BTreeMap<String, bool>,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub exports: ExportConfig,
}

impl Config {
    /// Browsers switched on, in declared order. A browser missing from the
    /// `browsers` table counts as enabled.
    pub fn enabled_browsers(&self) -> Vec<Browser> {
        for key in self.browsers.keys() {
            if key.parse::<Browser>().is_err() {
                warn!("unknown browser '{key}' in config ignored");
            }
        }
        Browser::ALL
            .into_iter()
            .filter(|b| self.browsers.get(b.key()).copied().unwrap_or(true))
            .collect()
    }

    pub fn set_browser(&mut self, browser: Browser, enabled: bool) {
        self.browsers.insert(browser.key().to_string(), enabled);
    }
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,
    pub config_hash: String,
}

pub fn load_config(path: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let bytes: Vec<u8> = if let Some(p) = path {
        std::fs::read(p).map_err(|source| ConfigError::Read {
            path: p.to_path_buf(),
            source,
        })?
    } else {
        DEFAULT_CONFIG.to_vec()
    };

    let config: Config = serde_yaml::from_slice(&bytes)?;
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion {
            found: config.version,
        });
    }

    let config_hash = hash_bytes(&bytes);

    Ok(LoadedConfig { config, config_hash })
}

/// Write the embedded default configuration to `path`. Refuses to overwrite.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        return Err(ConfigError::AlreadyExists {
            path: path.to_path_buf(),
        });
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, DEFAULT_CONFIG).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    hex::encode(digest)
}
