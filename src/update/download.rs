//! Artifact downloader
//!
//! Streams a release artifact into the scratch directory as a `.part` file.
//! The file is owned by a [`PartialArtifact`] guard that deletes it unless
//! the caller promotes it, so failures, cancellation and dropped futures
//! never leave partial data behind. Retries always start from zero.

use crate::core::error::{Result, UpdateError};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Extension of in-progress downloads; the only files scratch cleanup removes
pub const PARTIAL_EXTENSION: &str = "part";

/// Bytes per step of the progress curve used when the size is unknown
pub const UNKNOWN_SIZE_STEP_BYTES: u64 = 256 * 1024;

/// Download progress snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadProgress {
    pub downloaded: u64,
    pub total: Option<u64>,
    /// Percentage in `0..=100`; 100 only once the transfer has completed
    pub percent: u8,
}

/// Percentage for a transfer of known size, held below 100 until completion
pub fn ratio_percent(received: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (received as u128 * 100 / total as u128).min(99);
    pct as u8
}

/// Deterministic curve for transfers of unknown size
///
/// Every [`UNKNOWN_SIZE_STEP_BYTES`] closes half of the remaining distance
/// to 99.
pub fn stepped_percent(received: u64) -> u8 {
    let steps = received / UNKNOWN_SIZE_STEP_BYTES;
    if steps >= 7 {
        return 99;
    }
    (99 - (99u64 >> steps)) as u8
}

/// Temporary download that is deleted on drop unless promoted
#[derive(Debug)]
pub struct PartialArtifact {
    path: PathBuf,
    size: u64,
    armed: bool,
}

impl PartialArtifact {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            size: 0,
            armed: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// Move the completed download to `target`, replacing any existing file
    pub async fn promote(mut self, target: &Path) -> Result<PathBuf> {
        tokio::fs::rename(&self.path, target).await?;
        self.armed = false;
        Ok(target.to_path_buf())
    }
}

impl Drop for PartialArtifact {
    fn drop(&mut self) {
        if self.armed {
            match std::fs::remove_file(&self.path) {
                Ok(()) => tracing::debug!("Removed partial download {}", self.path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    "Failed to remove partial download {}: {}",
                    self.path.display(),
                    e
                ),
            }
        }
    }
}

/// Streams artifacts into a scratch directory
#[derive(Clone)]
pub struct Downloader {
    client: reqwest::Client,
    scratch_dir: PathBuf,
}

impl Downloader {
    /// The client carries no timeout; transfers end on completion, error or cancel
    pub fn new(scratch_dir: impl Into<PathBuf>, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent.to_string())
            .build()
            .map_err(|e| UpdateError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            scratch_dir: scratch_dir.into(),
        })
    }

    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    /// Download `url` into a fresh `.part` file
    ///
    /// `on_progress` sees non-decreasing percentages, one call per change,
    /// ending with 100 on success.
    pub async fn fetch<F>(
        &self,
        url: &str,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<PartialArtifact>
    where
        F: FnMut(DownloadProgress) + Send,
    {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;

        let part_path = self
            .scratch_dir
            .join(format!("{}.{}", uuid::Uuid::now_v7(), PARTIAL_EXTENSION));
        let mut artifact = PartialArtifact::new(part_path);

        tracing::info!("Downloading {} to {}", url, artifact.path.display());

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(UpdateError::Cancelled),
            response = self.client.get(url).send() => response?,
        };

        if !response.status().is_success() {
            return Err(UpdateError::Network(format!(
                "Server returned status: {}",
                response.status()
            )));
        }

        let total = response.content_length().filter(|len| *len > 0);
        let mut file = File::create(&artifact.path).await?;
        let mut stream = response.bytes_stream();
        let mut downloaded: u64 = 0;
        let mut last_percent: Option<u8> = None;

        let mut report = |downloaded: u64, percent: u8| {
            if last_percent.map_or(true, |last| percent > last) {
                last_percent = Some(percent);
                on_progress(DownloadProgress {
                    downloaded,
                    total,
                    percent,
                });
            }
        };

        report(0, 0);

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(UpdateError::Cancelled),
                chunk = stream.next() => chunk,
            };

            let Some(chunk) = chunk else { break };
            let chunk = chunk?;

            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            let percent = match total {
                Some(total) => ratio_percent(downloaded, total),
                None => stepped_percent(downloaded),
            };
            report(downloaded, percent);
        }

        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        if let Some(total) = total {
            if downloaded < total {
                return Err(UpdateError::Network(format!(
                    "transfer ended early: received {} of {} bytes",
                    downloaded, total
                )));
            }
        }

        artifact.size = downloaded;
        report(downloaded, 100);

        tracing::info!("Downloaded {} bytes from {}", downloaded, url);
        Ok(artifact)
    }
}

/// Whether `path` names an in-progress download
pub fn is_partial_file(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == PARTIAL_EXTENSION)
}

/// File name for a verified artifact, taken from the URL's last path segment
pub fn artifact_file_name(url: &str, version: &str) -> String {
    let segment = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .rsplit('/')
        .next()
        .unwrap_or_default();

    let sanitized: String = segment
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') || is_partial_file(Path::new(&sanitized)) {
        let version: String = version
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
            .collect();
        format!("update-{}.bin", version)
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_ratio_percent() {
        assert_eq!(ratio_percent(0, 1000), 0);
        assert_eq!(ratio_percent(500, 1000), 50);
        assert_eq!(ratio_percent(1000, 1000), 99);
        assert_eq!(ratio_percent(5000, 1000), 99);
        assert_eq!(ratio_percent(10, 0), 0);
    }

    #[test]
    fn test_stepped_percent_curve() {
        let step = UNKNOWN_SIZE_STEP_BYTES;
        assert_eq!(stepped_percent(0), 0);
        assert_eq!(stepped_percent(step - 1), 0);
        assert_eq!(stepped_percent(step), 50);
        assert_eq!(stepped_percent(2 * step), 75);
        assert_eq!(stepped_percent(3 * step), 87);
        assert_eq!(stepped_percent(100 * step), 99);
        assert_eq!(stepped_percent(u64::MAX), 99);
    }

    #[test]
    fn test_artifact_file_name() {
        assert_eq!(
            artifact_file_name("https://x.test/dl/app_linux_amd64.zip?sig=1", "1.0.0"),
            "app_linux_amd64.zip"
        );
        assert_eq!(artifact_file_name("https://x.test/", "1.2.0"), "update-1.2.0.bin");
        assert_eq!(
            artifact_file_name("https://x.test/../..", "v2/../1"),
            "update-v2..1.bin"
        );
        assert_eq!(artifact_file_name("https://x.test/a b.exe", "1"), "ab.exe");
    }

    #[tokio::test]
    async fn test_partial_artifact_removed_on_drop() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("x.part");
        tokio::fs::write(&path, b"partial").await.unwrap();

        drop(PartialArtifact::new(path.clone()));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_promote_keeps_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("x.part");
        let target = temp_dir.path().join("app.zip");
        tokio::fs::write(&path, b"complete").await.unwrap();

        let promoted = PartialArtifact::new(path.clone()).promote(&target).await.unwrap();
        assert_eq!(promoted, target);
        assert!(!path.exists());
        assert_eq!(tokio::fs::read(&target).await.unwrap(), b"complete");
    }
}
