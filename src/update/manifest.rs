//! Release manifest format
//!
//! The endpoint serves either a single release object or a multi-channel
//! document `{ "releases": [ ... ] }`. Field names are camelCase.

use crate::core::error::{Result, UpdateError};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Platform-specific artifact listed by a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseAsset {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// One release entry of the manifest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseEntry {
    /// Empty means "any channel"
    #[serde(default)]
    pub channel: String,
    pub version: String,
    #[serde(default)]
    pub release_notes: String,
    #[serde(default)]
    pub release_url: String,
    #[serde(default)]
    pub installer_url: String,
    #[serde(default)]
    pub digest: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ManifestDocument {
    Channels { releases: Vec<ReleaseEntry> },
    Single(ReleaseEntry),
}

/// Parsed manifest, normalized to a list of entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseManifest {
    entries: Vec<ReleaseEntry>,
}

impl ReleaseManifest {
    /// Parse the raw response body
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let document: ManifestDocument = serde_json::from_slice(body)
            .map_err(|e| UpdateError::Parse(format!("invalid manifest: {}", e)))?;

        let entries = match document {
            ManifestDocument::Channels { releases } => releases,
            ManifestDocument::Single(entry) => vec![entry],
        };

        if entries.is_empty() {
            return Err(UpdateError::Parse("manifest lists no releases".to_string()));
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ReleaseEntry] {
        &self.entries
    }

    /// The entry for `channel`
    ///
    /// Channel names compare case-insensitively; the first matching entry
    /// wins. An entry without a channel serves every channel.
    pub fn for_channel(&self, channel: &str) -> Result<&ReleaseEntry> {
        self.entries
            .iter()
            .find(|entry| entry.channel.eq_ignore_ascii_case(channel))
            .or_else(|| self.entries.iter().find(|entry| entry.channel.is_empty()))
            .ok_or_else(|| {
                let offered: Vec<&str> = self.entries.iter().map(|e| e.channel.as_str()).collect();
                UpdateError::Parse(format!(
                    "manifest has no release for channel '{}' (offers: {})",
                    channel,
                    offered.join(", ")
                ))
            })
    }
}

/// Artifact location resolved for this platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub url: String,
    pub digest: String,
    pub size: Option<u64>,
    /// Asset name when the artifact came from the asset list
    pub asset_name: Option<String>,
}

/// Selects the platform asset from a release's asset list
#[derive(Debug, Clone)]
pub struct AssetMatcher {
    pattern: Regex,
}

impl AssetMatcher {
    /// Use the configured pattern, or the platform default when none is set
    pub fn new(pattern: Option<&str>) -> Result<Self> {
        match pattern {
            Some(pattern) => {
                let pattern = Regex::new(pattern).map_err(|e| {
                    UpdateError::Parse(format!("asset pattern does not compile: {}", e))
                })?;
                Ok(Self { pattern })
            }
            None => Self::for_platform(std::env::consts::OS, std::env::consts::ARCH),
        }
    }

    /// Match names of the form `{name}_{os}_{arch}.{ext}` (or `-` separated)
    pub fn for_platform(os: &str, arch: &str) -> Result<Self> {
        let os = match os {
            "macos" => "macos|darwin|mac".to_string(),
            other => regex::escape(other),
        };
        let arch = match arch {
            "x86_64" => "x86_64|amd64|x64".to_string(),
            "aarch64" => "aarch64|arm64".to_string(),
            "x86" => "x86|386|i686".to_string(),
            other => regex::escape(other),
        };

        let pattern = format!(r"(?i)[_-](?:{})[_-](?:{})(?:[._-]|$)", os, arch);
        let pattern = Regex::new(&pattern)
            .map_err(|e| UpdateError::Parse(format!("platform pattern does not compile: {}", e)))?;
        Ok(Self { pattern })
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.pattern.is_match(name)
    }
}

impl ReleaseEntry {
    /// Resolve the artifact to download
    ///
    /// A matching asset overrides the top-level `installerUrl` and `digest`;
    /// without one the top-level fields are used. Returns `None` when
    /// neither yields a URL.
    pub fn artifact(&self, matcher: &AssetMatcher) -> Option<ArtifactRef> {
        if let Some(asset) = self.assets.iter().find(|asset| matcher.is_match(&asset.name)) {
            return Some(ArtifactRef {
                url: asset.url.clone(),
                digest: if asset.digest.is_empty() {
                    self.digest.clone()
                } else {
                    asset.digest.clone()
                },
                size: asset.size,
                asset_name: Some(asset.name.clone()),
            });
        }

        if self.installer_url.is_empty() {
            return None;
        }

        Some(ArtifactRef {
            url: self.installer_url.clone(),
            digest: self.digest.clone(),
            size: self.size,
            asset_name: None,
        })
    }
}
