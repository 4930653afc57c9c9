//! Configuration Storage Implementation
//!
//! Provides JSON file-based configuration storage with:
//! - Atomic writes using temp file + rename
//! - Thread-safe access via RwLock
//! - Default configuration generation
//!
//! The bearer token is read from the file but never written back.

use crate::update::UpdateMode;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration store settings
#[derive(Debug, Clone)]
pub struct ConfigStoreConfig {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Whether to create default config if not exists
    pub create_default: bool,
}

impl Default for ConfigStoreConfig {
    fn default() -> Self {
        let app_data = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("updater-core");

        Self {
            config_path: app_data.join("config.json"),
            create_default: true,
        }
    }
}

/// Updater configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Configuration version for future migrations
    #[serde(default = "default_version")]
    pub version: u32,

    /// Manifest endpoint URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Release channel this build subscribes to
    #[serde(default = "default_channel")]
    pub channel: String,

    /// Bearer token for the manifest request
    ///
    /// Never serialized from memory. A token written into the file by hand
    /// is carried over when the store rewrites the file.
    #[serde(default, skip_serializing)]
    pub auth_token: Option<SecretString>,

    /// Timeout for the manifest request; `None` waits indefinitely
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    /// Scratch directory for downloaded artifacts
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// How the host installs a verified artifact
    #[serde(default)]
    pub update_mode: UpdateMode,

    /// Regex selecting the platform asset from a manifest's asset list
    #[serde(default)]
    pub asset_pattern: Option<String>,

    /// User-Agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Last modified timestamp
    #[serde(default = "default_timestamp")]
    pub last_modified: String,
}

fn default_version() -> u32 {
    1
}

fn default_endpoint() -> String {
    "https://releases.updater-core.dev/manifest.json".to_string()
}

fn default_channel() -> String {
    "stable".to_string()
}

fn default_scratch_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("updater-core")
        .join("updates")
}

fn default_user_agent() -> String {
    crate::core::build_info::default_user_agent()
}

fn default_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            endpoint: default_endpoint(),
            channel: default_channel(),
            auth_token: None,
            request_timeout_secs: None,
            scratch_dir: default_scratch_dir(),
            update_mode: UpdateMode::default(),
            asset_pattern: None,
            user_agent: default_user_agent(),
            last_modified: default_timestamp(),
        }
    }
}

impl UpdaterConfig {
    /// Create a config pointing at the given manifest endpoint
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Set the release channel
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = channel.into();
        self
    }

    /// Set the scratch directory
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    /// Set the manifest request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_secs = Some(timeout.as_secs().max(1));
        self
    }

    /// Set the bearer token
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(SecretString::new(token.into()));
        self
    }

    /// Set the update mode
    pub fn with_update_mode(mut self, mode: UpdateMode) -> Self {
        self.update_mode = mode;
        self
    }

    /// Set the asset pattern
    pub fn with_asset_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.asset_pattern = Some(pattern.into());
        self
    }

    /// Timeout for the manifest request
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if !(self.endpoint.starts_with("https://") || self.endpoint.starts_with("http://")) {
            return Err(ConfigError::Invalid(format!(
                "endpoint must be an http(s) URL: {}",
                self.endpoint
            )));
        }

        if self.channel.trim().is_empty() {
            return Err(ConfigError::Invalid("channel must not be empty".to_string()));
        }

        if let Some(pattern) = &self.asset_pattern {
            regex::Regex::new(pattern).map_err(|e| {
                ConfigError::Invalid(format!("asset_pattern does not compile: {}", e))
            })?;
        }

        if self.request_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

const AUTH_TOKEN_KEY: &str = "auth_token";

/// Configuration store with thread-safe access
pub struct ConfigStore {
    config: Arc<RwLock<UpdaterConfig>>,
    settings: ConfigStoreConfig,
}

impl ConfigStore {
    /// Create a new configuration store
    pub async fn new(settings: ConfigStoreConfig) -> ConfigResult<Self> {
        if let Some(parent) = settings.config_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let config = if settings.config_path.exists() {
            Self::load_from_file(&settings.config_path).await?
        } else if settings.create_default {
            let default_config = UpdaterConfig::default();
            Self::save_to_file(&settings.config_path, &default_config).await?;
            default_config
        } else {
            return Err(ConfigError::NotFound(settings.config_path.clone()));
        };

        tracing::debug!("Loaded updater config from {}", settings.config_path.display());

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            settings,
        })
    }

    /// Load configuration from file
    async fn load_from_file(path: &Path) -> ConfigResult<UpdaterConfig> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: UpdaterConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file with atomic write
    async fn save_to_file(path: &Path, config: &UpdaterConfig) -> ConfigResult<()> {
        let mut document = serde_json::to_value(config)?;
        if let Some(token) = Self::token_on_disk(path).await {
            if let Some(fields) = document.as_object_mut() {
                fields.insert(AUTH_TOKEN_KEY.to_string(), token);
            }
        }
        let content = serde_json::to_string_pretty(&document)?;

        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, &content).await?;
        tokio::fs::rename(&temp_path, path).await?;

        Ok(())
    }

    /// Token the user stored in the existing file, if any
    async fn token_on_disk(path: &Path) -> Option<serde_json::Value> {
        let content = tokio::fs::read_to_string(path).await.ok()?;
        let mut document: serde_json::Value = serde_json::from_str(&content).ok()?;
        match document.get_mut(AUTH_TOKEN_KEY).map(serde_json::Value::take) {
            Some(token @ serde_json::Value::String(_)) => Some(token),
            _ => None,
        }
    }

    /// Get current configuration (read-only)
    pub async fn get(&self) -> UpdaterConfig {
        self.config.read().await.clone()
    }

    /// Update configuration
    pub async fn update<F>(&self, updater: F) -> ConfigResult<UpdaterConfig>
    where
        F: FnOnce(&mut UpdaterConfig),
    {
        let mut config = self.config.write().await;

        let mut candidate = config.clone();
        updater(&mut candidate);
        candidate.validate()?;
        candidate.last_modified = chrono::Utc::now().to_rfc3339();

        Self::save_to_file(&self.settings.config_path, &candidate).await?;
        *config = candidate;

        Ok(config.clone())
    }

    /// Set entire configuration
    pub async fn set(&self, mut new_config: UpdaterConfig) -> ConfigResult<()> {
        new_config.validate()?;
        new_config.last_modified = chrono::Utc::now().to_rfc3339();

        let mut config = self.config.write().await;
        Self::save_to_file(&self.settings.config_path, &new_config).await?;
        *config = new_config;

        Ok(())
    }

    /// Path of the backing file
    pub fn config_path(&self) -> &Path {
        &self.settings.config_path
    }
}
