//! Application configuration management.
//!
//! This module handles loading and saving the data-layer configuration:
//! where the GeoJSON assets are published, where the cache lives, and how
//! old a cached copy may get before it counts as stale.
//!
//! Configuration is stored at `~/.config/mapasur/config.json`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "mapasur";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Where the GeoJSON assets are published by default
const DEFAULT_BASE_URL: &str = "https://mapasur.com.ar";

/// Consider a cached resource stale after 24 hours by default.
/// The datasets change rarely, so a day of staleness is acceptable.
const DEFAULT_MAX_CACHE_AGE_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not determine {0} directory")]
    MissingDirectory(&'static str),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Origin the resource paths are resolved against.
    pub base_url: String,
    pub buildings_path: String,
    pub streets_path: String,
    pub max_cache_age_ms: u64,
    /// Explicit cache directory; falls back to the platform cache dir.
    pub cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            buildings_path: "assets/fonavi.geojson".to_string(),
            streets_path: "assets/calles.geojson".to_string(),
            max_cache_age_ms: DEFAULT_MAX_CACHE_AGE_MS,
            cache_dir: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            Ok(serde_json::from_str(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf, ConfigError> {
        let config_dir =
            dirs::config_dir().ok_or(ConfigError::MissingDirectory("config"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf, ConfigError> {
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir =
            dirs::cache_dir().ok_or(ConfigError::MissingDirectory("cache"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn buildings_url(&self) -> String {
        self.resource_url(&self.buildings_path)
    }

    pub fn streets_url(&self) -> String {
        self.resource_url(&self.streets_path)
    }

    fn resource_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    pub fn max_cache_age(&self) -> Duration {
        Duration::from_millis(self.max_cache_age_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_urls() {
        let config = Config::default();
        assert_eq!(
            config.buildings_url(),
            "https://mapasur.com.ar/assets/fonavi.geojson"
        );
        assert_eq!(
            config.streets_url(),
            "https://mapasur.com.ar/assets/calles.geojson"
        );
    }

    #[test]
    fn test_resource_url_handles_trailing_slash() {
        let config = Config {
            base_url: "http://localhost:8080/".to_string(),
            ..Config::default()
        };
        assert_eq!(
            config.streets_url(),
            "http://localhost:8080/assets/calles.geojson"
        );
    }

    #[test]
    fn test_partial_config_parses_with_defaults() {
        let config: Config =
            serde_json::from_str(r#"{ "base_url": "http://example.org" }"#)
                .expect("partial config should parse");
        assert_eq!(config.base_url, "http://example.org");
        assert_eq!(config.max_cache_age(), Duration::from_secs(24 * 60 * 60));
    }
}
