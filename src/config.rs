//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `readings.toml`.
//!     loads configuration from file or falls back to defaults.
//!
//! structure:
//!     - ServerConfig: Where the HTTP API listens.
//!     - StorageConfig: Which store backend, and where sqlite keeps its file.
//!     - LoggingConfig: Log level and output format.
//!
//! ==============================================================================

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// env var naming an explicit config file
pub const CONFIG_ENV: &str = "READINGS_CONFIG";

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct HubConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// file this config came from, None for built-in defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_bind() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("database.db")
}

fn default_pool_size() -> usize {
    4
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: default_bind() }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: default_db_path(),
            pool_size: default_pool_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

impl HubConfig {
    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: HubConfig = toml::from_str(content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config: {}", e))?;
        config.check()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| anyhow::anyhow!("Failed to read config file: {}", e))?;

        let mut config = Self::from_toml(&content)?;
        config.source = Some(path.as_ref().to_path_buf());
        Ok(config)
    }

    /// Load with default fallback
    ///
    /// `READINGS_CONFIG` must load if set; the conventional locations are
    /// tried quietly and skipped on failure. Runs before logging is up, so
    /// skipped files are returned for the caller to report.
    pub fn load_or_default() -> anyhow::Result<(Self, Vec<String>)> {
        if let Ok(explicit) = std::env::var(CONFIG_ENV) {
            return Ok((Self::load(explicit)?, Vec::new()));
        }

        let paths = [
            PathBuf::from("config").join("readings.toml"),
            PathBuf::from("..").join("config").join("readings.toml"),
        ];

        let mut skipped = Vec::new();
        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => return Ok((config, skipped)),
                    Err(e) => skipped.push(format!("{}: {:#}", path.display(), e)),
                }
            }
        }

        Ok((Self::default(), skipped))
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.storage.pool_size == 0 {
            anyhow::bail!("storage.pool_size must be at least 1");
        }
        if self.server.bind.trim().is_empty() {
            anyhow::bail!("server.bind must not be empty");
        }
        Ok(())
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        let source = self
            .source
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "built-in defaults".to_string());
        tracing::info!(
            %source,
            bind = %self.server.bind,
            backend = ?self.storage.backend,
            db = %self.storage.path.display(),
            pool_size = self.storage.pool_size,
            log_level = %self.logging.level,
            "configuration loaded"
        );
    }
}
