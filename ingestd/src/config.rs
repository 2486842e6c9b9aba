//! ingestd configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::scheduler::SchedulerConfig;

/// Main ingestd configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR); the CLI flag wins over this
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Listener settings for the line-protocol adapter
    pub server: ServerConfig,

    /// Batching and pacing
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Validate configuration before use
    pub fn validate(&self) -> Result<()> {
        if self.scheduler.batch_size == 0 {
            return Err(eyre::eyre!("scheduler.batch-size must be at least 1"));
        }
        if self.server.host.trim().is_empty() {
            return Err(eyre::eyre!("server.host must not be empty"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain, then apply environment overrides
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = Self::load_file_chain(config_path)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Read only the log level, ignoring errors
    ///
    /// Runs before logging is set up, so failures stay silent here and
    /// surface later from `load`.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load_file_chain(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_file_chain(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .ingestd.yml
        let local_config = PathBuf::from(".ingestd.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/ingestd/ingestd.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("ingestd").join("ingestd.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    ///
    /// Recognised keys: `PORT`, `INGESTD_HOST`, `INGESTD_BATCH_SIZE`,
    /// `INGESTD_RATE_LIMIT_MS`, `INGESTD_ITEM_DELAY_MS`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT") {
            self.server.port = port.trim().parse().context(format!("Invalid PORT: {}", port))?;
        }
        if let Some(host) = lookup("INGESTD_HOST") {
            self.server.host = host;
        }
        if let Some(size) = lookup("INGESTD_BATCH_SIZE") {
            self.scheduler.batch_size = size
                .trim()
                .parse()
                .context(format!("Invalid INGESTD_BATCH_SIZE: {}", size))?;
        }
        if let Some(ms) = lookup("INGESTD_RATE_LIMIT_MS") {
            self.scheduler.rate_limit_ms = ms
                .trim()
                .parse()
                .context(format!("Invalid INGESTD_RATE_LIMIT_MS: {}", ms))?;
        }
        if let Some(ms) = lookup("INGESTD_ITEM_DELAY_MS") {
            self.scheduler.item_delay_ms = ms
                .trim()
                .parse()
                .context(format!("Invalid INGESTD_ITEM_DELAY_MS: {}", ms))?;
        }
        Ok(())
    }
}

/// Listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind / connect host
    pub host: String,

    /// Bind / connect port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding and connecting
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
