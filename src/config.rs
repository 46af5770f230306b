use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub functions: FunctionsConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub sharing: SharingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding stored objects, one subdirectory per owner.
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,

    /// Base URL objects are served under; `<base>/<storage_path>` is the public URL.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,

    /// Unreferenced objects younger than this are left alone by repair;
    /// an upload may still be about to record them.
    #[serde(default = "default_orphan_grace_secs")]
    pub orphan_grace_secs: u64,
}

fn default_storage_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from(".local/share"))
        .join("eventlens/objects")
}

fn default_public_base_url() -> String {
    "http://127.0.0.1:54321/storage/v1/object/public/photos".to_string()
}

fn default_orphan_grace_secs() -> u64 {
    3600
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
            public_base_url: default_public_base_url(),
            orphan_grace_secs: default_orphan_grace_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionsConfig {
    /// Base URL of the remote functions, e.g. `https://<project>/functions/v1`.
    #[serde(default = "default_functions_endpoint")]
    pub endpoint: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Length every image, text and face embedding must have.
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
}

fn default_functions_endpoint() -> String {
    "http://127.0.0.1:54321/functions/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_embedding_dim() -> usize {
    1536
}

impl Default for FunctionsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_functions_endpoint(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            embedding_dim: default_embedding_dim(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Minimum cosine similarity (0-1) for a photo to match a text query.
    #[serde(default = "default_search_threshold")]
    pub threshold: f32,

    #[serde(default = "default_search_limit")]
    pub limit: usize,
}

fn default_search_threshold() -> f32 {
    0.7
}

fn default_search_limit() -> usize {
    50
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            threshold: default_search_threshold(),
            limit: default_search_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharingConfig {
    /// Length of the legacy share code stored on each event.
    #[serde(default = "default_event_code_len")]
    pub event_code_len: usize,
}

fn default_event_code_len() -> usize {
    8
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            event_code_len: default_event_code_len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level filter in `EnvFilter` syntax, e.g. `info` or `eventlens=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Prefer the systemd journal on Linux.
    #[serde(default = "default_journald")]
    pub journald: bool,

    /// Directory for log files when the journal is not used.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_journald() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            journald: default_journald(),
            dir: None,
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eventlens")
        .join("eventlens.db")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            storage: StorageConfig::default(),
            functions: FunctionsConfig::default(),
            search: SearchConfig::default(),
            sharing: SharingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load from `EVENTLENS_CONFIG` or the default location, writing defaults on first run.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("eventlens")
    }

    fn config_path() -> PathBuf {
        match std::env::var_os("EVENTLENS_CONFIG") {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => Self::config_dir().join("config.toml"),
        }
    }
}
