//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{FramecastError, FramecastResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,

    /// Render pipeline settings.
    pub render: RenderSettings,

    /// Where published artifacts go.
    pub storage: StorageConfig,

    /// Where render results are recorded.
    pub persistence: PersistenceConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Render pipeline parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Frame rate of the muxed video. Audio offsets always use 60.
    pub fps: u32,

    /// x264 constant rate factor.
    pub crf: u32,

    /// x264 preset.
    pub preset: String,

    /// Pause after the 85/90 transitions so pollers can observe them.
    pub stage_pause_ms: u64,

    /// Delay between the 99.9 and 100 transitions.
    pub terminal_delay_ms: u64,

    /// Upper bound on renders running at once.
    pub max_concurrent_jobs: usize,

    /// Fallback root for local audio references.
    pub asset_root: PathBuf,

    /// Timeout for remote audio downloads.
    pub fetch_timeout_secs: u64,

    /// Keep `final.mp4` in the session directory after publishing.
    pub keep_final_artifact: bool,
}

/// Object storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Copy into a local directory served by `framecast serve`.
    Local,
    /// Resumable (TUS) upload to a storage endpoint.
    Tus,
}

/// Object storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Base URL of the storage service (TUS backend).
    pub endpoint: String,

    /// Bucket receiving rendered videos.
    pub bucket: String,

    /// Service key sent as bearer token.
    pub api_key: Option<String>,

    /// Target directory for the local backend.
    pub local_dir: PathBuf,

    /// URL prefix under which `local_dir` is served. Its path part is
    /// where `framecast serve` mounts the directory.
    pub public_base_url: String,

    /// Upload chunk size in bytes.
    pub chunk_size: usize,
}

/// Result persistence backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceBackend {
    /// Append JSON lines to a local file.
    Jsonl,
    /// POST rows to a PostgREST-compatible endpoint.
    Rest,
}

/// Result persistence configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub backend: PersistenceBackend,
    pub endpoint: String,
    pub table: String,
    pub api_key: Option<String>,
    pub jsonl_path: PathBuf,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "framecast=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

/// Resumable upload chunk size mandated by the storage service.
pub const DEFAULT_CHUNK_SIZE: usize = 6 * 1024 * 1024;

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            fps: 60,
            crf: 23,
            preset: "medium".to_string(),
            stage_pause_ms: 500,
            terminal_delay_ms: 1000,
            max_concurrent_jobs: 2,
            asset_root: PathBuf::from("."),
            fetch_timeout_secs: 30,
            keep_final_artifact: true,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let data = data_dir();
        Self {
            backend: StorageBackend::Local,
            endpoint: String::new(),
            bucket: "videos".to_string(),
            api_key: None,
            local_dir: data.join("published"),
            public_base_url: "http://127.0.0.1:8000/published".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::Jsonl,
            endpoint: String::new(),
            table: "videos".to_string(),
            api_key: None,
            jsonl_path: data_dir().join("results.jsonl"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        let mut config = if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                    Self::default()
                }
            }
        } else {
            Self::default()
        };
        config.apply_env();
        config
    }

    /// Load config from an explicit file. Missing sections use defaults.
    pub fn load_from(path: &Path) -> FramecastResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FramecastError::config(format!("Failed to read {}: {e}", path.display()))
        })?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }

    /// Reject settings the pipeline cannot run with.
    pub fn validate(&self) -> FramecastResult<()> {
        if self.render.fps == 0 {
            return Err(FramecastError::config("render.fps must be positive"));
        }
        if self.render.max_concurrent_jobs == 0 {
            return Err(FramecastError::config(
                "render.max_concurrent_jobs must be positive",
            ));
        }
        if self.storage.chunk_size == 0 {
            return Err(FramecastError::config("storage.chunk_size must be positive"));
        }
        if self.storage.backend == StorageBackend::Tus && self.storage.endpoint.is_empty() {
            return Err(FramecastError::config(
                "storage.endpoint is required for the tus backend",
            ));
        }
        if self.persistence.backend == PersistenceBackend::Rest
            && self.persistence.endpoint.is_empty()
        {
            return Err(FramecastError::config(
                "persistence.endpoint is required for the rest backend",
            ));
        }
        Ok(())
    }

    /// Apply `FRAMECAST_*` environment overrides.
    pub fn apply_env(&mut self) {
        if let Ok(host) = std::env::var("FRAMECAST_HOST") {
            self.server.host = host;
        }
        if let Some(port) = std::env::var("FRAMECAST_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
        {
            self.server.port = port;
        }
        if let Ok(key) = std::env::var("FRAMECAST_STORAGE_KEY") {
            self.storage.api_key = Some(key);
        }
        if let Ok(key) = std::env::var("FRAMECAST_PERSISTENCE_KEY") {
            self.persistence.api_key = Some(key);
        }
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("framecast").join("config.json")
}

/// Default data directory for published files and result logs.
fn data_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("framecast")
}
