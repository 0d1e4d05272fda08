//! Runtime configuration: loading from TOML, defaults, and validation

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::intercept::{Classifier, GenerationNames, DEFAULT_PRECACHE};

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for this schema
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is present but unusable
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration
///
/// Every field has a default, so an empty file (or no file at all) is a valid
/// configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Prefix shared by every generation name
    pub prefix: String,
    /// Deployed version; part of the generation names
    pub version: String,
    /// Origin the app shell is served from
    pub origin: String,
    /// Base URL of the backend data API
    pub backend_url: String,
    /// Host globs routed network-first
    pub backend_hosts: Vec<String>,
    /// Static-asset CDN host globs routed cache-first
    pub asset_hosts: Vec<String>,
    /// Paths or URLs precached at install time
    pub precache: Vec<String>,
    /// Response store location; the platform cache directory when unset
    pub cache_dir: Option<PathBuf>,
    pub request_timeout_secs: u64,
    /// Log filter used when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: "fortune".to_string(),
            version: "v1".to_string(),
            origin: "https://app.fortune.example".to_string(),
            backend_url: "https://api.fortune.example/v1".to_string(),
            backend_hosts: vec!["*.supabase.co".to_string(), "api.fortune.example".to_string()],
            asset_hosts: vec![
                "fonts.googleapis.com".to_string(),
                "fonts.gstatic.com".to_string(),
                "cdn.jsdelivr.net".to_string(),
            ],
            precache: DEFAULT_PRECACHE.iter().map(|s| s.to_string()).collect(),
            cache_dir: None,
            request_timeout_secs: 10,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads and validates a TOML config file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the rest of the crate cannot work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("prefix", &self.prefix), ("version", &self.version)] {
            if value.is_empty() || value.contains(['/', '\\']) {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a non-empty name without path separators",
                    field
                )));
            }
        }
        self.origin_url()?;
        Url::parse(&self.backend_url)
            .map_err(|e| ConfigError::Invalid(format!("backend_url: {}", e)))?;
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin).map_err(|e| ConfigError::Invalid(format!("origin: {}", e)))
    }

    pub fn generation_names(&self) -> GenerationNames {
        GenerationNames::for_version(&self.prefix, &self.version)
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::new(&self.backend_hosts, &self.asset_hosts)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Directory holding the response store's generations
    ///
    /// Returns `None` if no directory is configured and the platform cache
    /// directory cannot be determined.
    pub fn store_dir(&self) -> Option<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Some(dir.clone());
        }
        ProjectDirs::from("", "", "fortune-cache").map(|dirs| dirs.cache_dir().join("responses"))
    }
}
