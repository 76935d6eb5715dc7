use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::expand::ExpandConfig;

const APP_NAME: &str = "wildprompt";
const CONFIG_FILE: &str = "config.json";
const DEFAULT_PORT: u16 = 17020;

/// Application configuration.
///
/// Read from `<config dir>/wildprompt/config.json`, then overridden by
/// environment variables:
/// - `WILDPROMPT_DB` - Path to the SQLite database
/// - `WILDPROMPT_PORT` - Port for the HTTP API
/// - `WILDPROMPT_MAX_DEPTH` - Limit on nested fragment references
/// - `WILDPROMPT_MAX_REFERENCES` - Limit on fragment lookups per expansion
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Database file. Defaults to the platform data directory.
    pub database_path: Option<PathBuf>,
    pub port: u16,
    pub expand: ExpandConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            port: DEFAULT_PORT,
            expand: ExpandConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the user's config directory and the environment.
    /// Falls back to defaults if the file doesn't exist or fails to parse.
    pub fn load() -> Self {
        let mut config = match Self::try_load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn try_load() -> Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            return Ok(Self::default());
        }
        Self::from_file(&config_path)
    }

    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config = serde_json::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Apply overrides from `lookup`, which maps variable names to values.
    /// Unparseable values are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("WILDPROMPT_DB").filter(|s| !s.trim().is_empty()) {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(port) = lookup("WILDPROMPT_PORT").and_then(|s| s.trim().parse().ok()) {
            self.port = port;
        }
        if let Some(depth) = lookup("WILDPROMPT_MAX_DEPTH").and_then(|s| s.trim().parse().ok()) {
            self.expand.max_depth = depth;
        }
        if let Some(limit) = lookup("WILDPROMPT_MAX_REFERENCES").and_then(|s| s.trim().parse().ok()) {
            self.expand.max_references = limit;
        }
    }

    /// Save the current configuration to disk.
    pub fn save(&self) -> Result<()> {
        self.save_to(&get_config_path()?)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }
}

fn get_config_path() -> Result<PathBuf> {
    let mut path =
        config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}
