//! Release metadata source
//!
//! One GET against the configured manifest endpoint per check. The current
//! version is fixed at construction from build metadata and never taken
//! from the response.

use super::manifest::{ArtifactRef, AssetMatcher, ReleaseManifest};
use super::types::UpdateInfo;
use super::version::VersionComparator;
use crate::config::UpdaterConfig;
use crate::core::build_info;
use crate::core::error::{Result, UpdateError};
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;

/// Release metadata mapped for this build
#[derive(Debug, Clone)]
pub struct ResolvedRelease {
    pub info: UpdateInfo,
    /// Present exactly when `info.available`
    pub artifact: Option<ArtifactRef>,
}

/// Source of release metadata
#[async_trait]
pub trait ReleaseSource: Send + Sync {
    /// Fetch the newest release on `channel` and compare it with the running build
    async fn fetch_latest(&self, channel: &str) -> Result<ResolvedRelease>;
}

/// Settings for [`HttpReleaseSource`]
#[derive(Debug, Clone)]
pub struct HttpReleaseSourceConfig {
    pub endpoint: String,
    pub current_version: String,
    pub auth_token: Option<SecretString>,
    /// Applied to the manifest request only
    pub request_timeout: Option<Duration>,
    pub user_agent: String,
    pub asset_pattern: Option<String>,
}

impl HttpReleaseSourceConfig {
    pub fn from_updater_config(config: &UpdaterConfig) -> Self {
        Self {
            endpoint: config.endpoint.clone(),
            current_version: build_info::current_version().to_string(),
            auth_token: config.auth_token.clone(),
            request_timeout: config.request_timeout(),
            user_agent: config.user_agent.clone(),
            asset_pattern: config.asset_pattern.clone(),
        }
    }
}

/// Fetches the JSON manifest over HTTP(S)
pub struct HttpReleaseSource {
    client: reqwest::Client,
    config: HttpReleaseSourceConfig,
    matcher: AssetMatcher,
}

impl HttpReleaseSource {
    pub fn new(config: HttpReleaseSourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| UpdateError::Network(format!("failed to build HTTP client: {}", e)))?;

        let matcher = AssetMatcher::new(config.asset_pattern.as_deref())?;

        Ok(Self {
            client,
            config,
            matcher,
        })
    }

    pub fn current_version(&self) -> &str {
        &self.config.current_version
    }

    async fn fetch_manifest(&self, channel: &str) -> Result<ReleaseManifest> {
        let platform = build_info::platform_info();
        let mut request = self.client.get(&self.config.endpoint).query(&[
            ("channel", channel),
            ("version", self.config.current_version.as_str()),
            ("platform", platform.as_str()),
        ]);

        if let Some(token) = &self.config.auth_token {
            request = request.bearer_auth(token.expose_secret());
        }
        if let Some(timeout) = self.config.request_timeout {
            request = request.timeout(timeout);
        }

        tracing::debug!(
            "Requesting manifest {} (channel={}, version={}, platform={})",
            self.config.endpoint,
            channel,
            self.config.current_version,
            platform
        );

        let response = request.send().await?;

        // Handle rate limiting
        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(60);

            return Err(UpdateError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !response.status().is_success() {
            return Err(UpdateError::Network(format!(
                "Server returned status: {}",
                response.status()
            )));
        }

        let body = response.bytes().await?;
        ReleaseManifest::from_slice(&body)
    }

    fn resolve(&self, manifest: &ReleaseManifest, channel: &str) -> Result<ResolvedRelease> {
        let entry = manifest.for_channel(channel)?;
        let current = &self.config.current_version;

        if !VersionComparator::is_newer(&entry.version, current)? {
            let mut info = UpdateInfo::unavailable(
                current.clone(),
                format!("remote version {} is not newer than {}", entry.version, current),
            );
            info.release_url = entry.release_url.clone();
            return Ok(ResolvedRelease {
                info,
                artifact: None,
            });
        }

        let artifact = entry.artifact(&self.matcher).ok_or_else(|| {
            UpdateError::Parse(format!(
                "release {} has no artifact for {}",
                entry.version,
                build_info::platform_info()
            ))
        })?;

        if artifact.digest.trim().is_empty() {
            return Err(UpdateError::Parse(format!(
                "release {} has no digest for {}",
                entry.version, artifact.url
            )));
        }

        let debug_info = match &artifact.asset_name {
            Some(name) => format!("channel={}, asset={}", channel, name),
            None => format!("channel={}", channel),
        };

        Ok(ResolvedRelease {
            info: UpdateInfo {
                available: true,
                current_version: current.clone(),
                latest_version: entry.version.clone(),
                release_notes: entry.release_notes.clone(),
                release_url: entry.release_url.clone(),
                installer_url: artifact.url.clone(),
                debug_info,
            },
            artifact: Some(artifact),
        })
    }
}

#[async_trait]
impl ReleaseSource for HttpReleaseSource {
    async fn fetch_latest(&self, channel: &str) -> Result<ResolvedRelease> {
        let manifest = self.fetch_manifest(channel).await?;
        let resolved = self.resolve(&manifest, channel)?;

        if resolved.info.available {
            tracing::info!(
                "Update available: {} -> {}",
                resolved.info.current_version,
                resolved.info.latest_version
            );
        } else {
            tracing::info!("Up to date at {}", resolved.info.current_version);
        }

        Ok(resolved)
    }
}
