//! Configuration management for the filedock server
//!
//! Settings are layered: built-in defaults, then `config.json` in the working
//! directory, then `FILEDOCK_*` environment variables. A default
//! `config.json` is written on first start so operators have something to
//! edit.

use config::{Config, ConfigError, Environment, File};
use log::{info, warn};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = "config.json";

/// Complete server configuration, loaded once at startup
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Directory every request is sandboxed to
    pub storage_dir: String,

    /// IP address to bind the HTTP listener
    pub bind_address: String,

    /// Listener port. Accepts `8080` as well as Go-style `":8080"`
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,

    /// URL prefix the whole app is mounted under
    pub root_path: String,

    /// Upload bodies up to this size are parsed in memory
    pub memory_buffer_mb: usize,

    /// Progress sampling cadence for transfers
    pub sample_interval_ms: u64,
}

/// Shape of the config file written on first start
#[derive(Serialize)]
struct DefaultFile {
    storage_dir: String,
    port: String,
    root_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            root_path: "/".to_string(),
            memory_buffer_mb: 32,
            sample_interval_ms: 1000,
        }
    }
}

impl ServerConfig {
    /// Load configuration from ./config.json with environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new("."))
    }

    /// Load configuration from `<dir>/config.json` with environment overrides
    pub fn load_from(dir: &Path) -> Result<Self, ConfigError> {
        let file_path = dir.join(CONFIG_FILE);
        if !file_path.exists() {
            write_default_file(&file_path);
        }

        let defaults = ServerConfig::default();
        let settings = Config::builder()
            .set_default("storage_dir", defaults.storage_dir)?
            .set_default("bind_address", defaults.bind_address)?
            .set_default("port", i64::from(defaults.port))?
            .set_default("root_path", defaults.root_path)?
            .set_default("memory_buffer_mb", defaults.memory_buffer_mb as i64)?
            .set_default("sample_interval_ms", defaults.sample_interval_ms as i64)?
            .add_source(File::from(file_path).required(false))
            .add_source(Environment::with_prefix("FILEDOCK"))
            .build()?;

        let mut config: ServerConfig = settings.try_deserialize()?;
        if config.storage_dir.trim().is_empty() {
            config.storage_dir = default_storage_dir();
        }
        config.root_path = normalize_root_path(&config.root_path);
        config.validate()?;

        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.storage_dir.is_empty() {
            return Err(ConfigError::Message("storage_dir cannot be empty".into()));
        }

        if self.port == 0 {
            return Err(ConfigError::Message("port cannot be 0".into()));
        }

        if self.bind_address.is_empty() {
            return Err(ConfigError::Message("bind_address cannot be empty".into()));
        }

        if self.memory_buffer_mb == 0 {
            return Err(ConfigError::Message(
                "memory_buffer_mb must be greater than 0".into(),
            ));
        }

        if self.sample_interval_ms == 0 {
            return Err(ConfigError::Message(
                "sample_interval_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Get bind address and port as a socket address string
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    pub fn storage_root(&self) -> PathBuf {
        PathBuf::from(&self.storage_dir)
    }

    /// In-memory upload threshold in bytes
    pub fn memory_buffer_bytes(&self) -> usize {
        self.memory_buffer_mb.saturating_mul(1024 * 1024)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

/// Ensures a leading `/` and strips a trailing one (except for `/` itself).
pub fn normalize_root_path(path: &str) -> String {
    let trimmed = path.trim();
    if trimmed.is_empty() {
        return "/".to_string();
    }

    let mut normalized = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    };
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

fn default_storage_dir() -> String {
    match dirs::download_dir() {
        Some(dir) => dir.to_string_lossy().to_string(),
        None => {
            warn!("Cannot determine the user's download directory, using ./downloads");
            "./downloads".to_string()
        }
    }
}

fn write_default_file(path: &Path) {
    let defaults = DefaultFile {
        storage_dir: default_storage_dir(),
        port: ":8080".to_string(),
        root_path: "/".to_string(),
    };

    let written = serde_json::to_string_pretty(&defaults)
        .map_err(|e| e.to_string())
        .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
    match written {
        Ok(()) => info!("Created default config file {}", path.display()),
        Err(e) => warn!("Failed to write default config file {}: {}", path.display(), e),
    }
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortValue {
        Number(u16),
        Text(String),
    }

    match PortValue::deserialize(deserializer)? {
        PortValue::Number(port) => Ok(port),
        PortValue::Text(text) => text
            .trim()
            .trim_start_matches(':')
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port {:?}", text))),
    }
}
