// Application configuration
// Read from a TOML file; FUEL_TRACKER_CONFIG overrides the path

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::format::{DEFAULT_DATE_PATTERN, DEFAULT_LOCALE};
use crate::preferences::UnitPreference;

pub const CONFIG_ENV: &str = "FUEL_TRACKER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "fuel-tracker.toml";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: "127.0.0.1:3000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: PathBuf,
    /// BCP-47 tag used for number and currency formatting
    pub locale: String,
    /// strftime pattern for dates
    pub date_pattern: String,
    pub preferences: UnitPreference,
    pub server: ServerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            database_path: PathBuf::from("fuel-tracker.db"),
            locale: DEFAULT_LOCALE.to_string(),
            date_pattern: DEFAULT_DATE_PATTERN.to_string(),
            preferences: UnitPreference::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the configured file. A missing default file yields defaults; a
    /// missing file named explicitly through the env var is an error.
    pub fn load() -> Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(Path::new(&path)),
            Err(_) => {
                let path = Path::new(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::from_file(path)
                } else {
                    info!("no {} found, using defaults", DEFAULT_CONFIG_PATH);
                    Ok(AppConfig::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&contents).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let cfg: AppConfig = toml::from_str(contents)?;
        Ok(cfg)
    }
}
