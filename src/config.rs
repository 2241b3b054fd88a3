use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::history::storage::restrict_permissions;
use crate::history::DEFAULT_HISTORY_KEY;

const DATA_DIR: &str = ".labelscan";
const CONFIG_FILE: &str = "config.json";
const HOME_ENV: &str = "LABELSCAN_HOME";

pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the history file (defaults to the data directory)
    pub history_dir: Option<PathBuf>,
    /// Storage key for the history log
    pub history_key: String,
    /// Maximum retained scans; unbounded when absent
    pub max_history: Option<usize>,
    /// JSON knowledge base replacing the builtin table
    pub knowledge_base_path: Option<PathBuf>,
    /// Scan persistence rules
    pub policy: ScanPolicy,
    /// chrono format string for scan timestamps
    pub timestamp_format: String,
    pub vision: VisionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            history_dir: None,
            history_key: DEFAULT_HISTORY_KEY.to_string(),
            max_history: None,
            knowledge_base_path: None,
            policy: ScanPolicy::default(),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            vision: VisionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Where history is stored, falling back to `data_dir`
    pub fn history_dir_or(&self, data_dir: &Path) -> PathBuf {
        self.history_dir
            .clone()
            .unwrap_or_else(|| data_dir.to_path_buf())
    }
}

/// Which scans end up in history
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ScanPolicy {
    /// Store scans whose recognized text was empty
    pub persist_empty_text: bool,
    /// Store scans that had text but no known ingredient
    pub persist_no_findings: bool,
    /// Store scans whose recognition call failed
    pub record_recognition_failures: bool,
}

/// Text detection service settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct VisionConfig {
    pub endpoint: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://vision.googleapis.com/v1/images:annotate".to_string(),
            api_key_env: "LABELSCAN_VISION_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

/// Data directory: `$LABELSCAN_HOME`, else `~/.labelscan`
pub fn data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(HOME_ENV).filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(DATA_DIR)
}

/// Get the path to the config file
pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

/// Load the config, using defaults if the file doesn't exist
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        log::debug!("No config at {}, using defaults", path.display());
        return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let config: AppConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;

    if config.max_history == Some(0) {
        anyhow::bail!("max_history must be at least 1 (omit it for unbounded history)");
    }

    Ok(config)
}

/// Save the config to disk
pub fn save_config(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(config).context("failed to serialize config")?;
    fs::write(path, &content).context("failed to write config file")?;
    restrict_permissions(path).context("failed to set config file permissions")?;
    Ok(())
}

/// Write a default config to `path`, leaving an existing file alone unless
/// `force` is set. Returns whether a file was written.
pub fn init_config(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        log::info!("Config already exists at {}", path.display());
        return Ok(false);
    }
    save_config(path, &AppConfig::default())?;
    log::info!("Wrote default config to {}", path.display());
    Ok(true)
}
