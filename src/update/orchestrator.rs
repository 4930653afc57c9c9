//! Update session state machine
//!
//! `Idle -> Checking -> {Available, UpToDate, CheckFailed} -> Downloading ->
//! Verifying -> {Ready, Failed}`.
//!
//! Checks never fail: errors degrade to an "up to date" answer carrying the
//! cause in `debug_info`. At most one apply runs at a time. A check that
//! lands while an apply is running replaces the cached release but leaves
//! the transfer alone; its phase takes effect once the apply ends.

use super::download::{artifact_file_name, is_partial_file, Downloader};
use super::progress::{
    scale_download_percent, ProgressReporter, UpdateProgressCallback, DOWNLOAD_SHARE,
    PROGRESS_CHANNEL_CAPACITY,
};
use super::source::{HttpReleaseSource, HttpReleaseSourceConfig, ReleaseSource, ResolvedRelease};
use super::types::{ReadyArtifact, UpdateInfo, UpdateMode, UpdateProgress, UpdateState, UpdateStatus};
use super::verify::IntegrityVerifier;
use crate::config::UpdaterConfig;
use crate::core::build_info;
use crate::core::error::{Result, UpdateError};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Settings that do not change over the orchestrator's lifetime
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub current_version: String,
    pub channel: String,
    pub mode: UpdateMode,
    pub scratch_dir: PathBuf,
}

impl OrchestratorSettings {
    pub fn from_updater_config(config: &UpdaterConfig) -> Self {
        Self {
            current_version: build_info::current_version().to_string(),
            channel: config.channel.clone(),
            mode: config.update_mode,
            scratch_dir: config.scratch_dir.clone(),
        }
    }
}

/// Process-local session state
#[derive(Debug)]
struct SessionState {
    phase: UpdateState,
    /// Release from the newest completed check, when one is available
    latest: Option<ResolvedRelease>,
    /// Bumped by every check so a slow check cannot overwrite a newer one
    generation: u64,
    apply_in_flight: bool,
    /// Phase produced by a check that completed during an apply
    deferred_phase: Option<UpdateState>,
    ready: Option<ReadyArtifact>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            phase: UpdateState::Idle,
            latest: None,
            generation: 0,
            apply_in_flight: false,
            deferred_phase: None,
            ready: None,
        }
    }
}

/// Drives update checks and apply sessions
pub struct UpdateOrchestrator {
    source: Arc<dyn ReleaseSource>,
    downloader: Downloader,
    settings: OrchestratorSettings,
    session: Mutex<SessionState>,
    events: broadcast::Sender<UpdateProgress>,
    progress_callback: Option<UpdateProgressCallback>,
    cancel: CancellationToken,
}

impl UpdateOrchestrator {
    pub fn new(
        source: Arc<dyn ReleaseSource>,
        downloader: Downloader,
        settings: OrchestratorSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(PROGRESS_CHANNEL_CAPACITY);
        Self {
            source,
            downloader,
            settings,
            session: Mutex::new(SessionState::new()),
            events,
            progress_callback: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Build an HTTP-backed orchestrator from configuration
    pub fn from_config(config: &UpdaterConfig) -> Result<Self> {
        config.validate()?;

        let source = HttpReleaseSource::new(HttpReleaseSourceConfig::from_updater_config(config))?;
        let downloader = Downloader::new(&config.scratch_dir, &config.user_agent)?;

        Ok(Self::new(
            Arc::new(source),
            downloader,
            OrchestratorSettings::from_updater_config(config),
        ))
    }

    /// Set progress callback
    pub fn with_progress_callback(mut self, callback: UpdateProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Receive every progress event from now on
    pub fn subscribe(&self) -> broadcast::Receiver<UpdateProgress> {
        self.events.subscribe()
    }

    pub fn current_version(&self) -> &str {
        &self.settings.current_version
    }

    pub fn state(&self) -> UpdateState {
        self.session.lock().phase
    }

    /// Info from the newest check that found an update
    pub fn latest_info(&self) -> Option<UpdateInfo> {
        self.session.lock().latest.as_ref().map(|r| r.info.clone())
    }

    /// Verified artifact awaiting handoff
    pub fn ready_artifact(&self) -> Option<ReadyArtifact> {
        self.session.lock().ready.clone()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    // ========================================================================
    // Check
    // ========================================================================

    /// Check the release source
    ///
    /// Restarts the state machine unless an apply is running. Never fails.
    pub async fn check_for_update(&self) -> UpdateInfo {
        let current = self.settings.current_version.clone();

        if self.cancel.is_cancelled() {
            return UpdateInfo::unavailable(current, "check failed: updater is shut down");
        }

        let (generation, stale_artifact) = {
            let mut session = self.session.lock();
            session.generation += 1;
            let stale = if session.apply_in_flight {
                None
            } else {
                session.phase = UpdateState::Checking;
                session.latest = None;
                session.ready.take()
            };
            (session.generation, stale)
        };

        if let Some(stale) = stale_artifact {
            remove_artifact(&stale.path).await;
        }

        tracing::info!(
            "Checking for updates (channel={}, current={})",
            self.settings.channel,
            current
        );

        let result = tokio::select! {
            _ = self.cancel.cancelled() => Err(UpdateError::Cancelled),
            result = self.source.fetch_latest(&self.settings.channel) => result,
        };

        let (info, phase, latest) = match result {
            Ok(release) if release.info.available && release.artifact.is_some() => {
                (release.info.clone(), UpdateState::Available, Some(release))
            }
            Ok(release) => (release.info, UpdateState::UpToDate, None),
            Err(e) => {
                tracing::warn!("Update check failed: {}", e);
                (
                    UpdateInfo::unavailable(current, format!("check failed: {}", e)),
                    UpdateState::CheckFailed,
                    None,
                )
            }
        };

        let mut session = self.session.lock();
        if session.generation == generation {
            session.latest = latest;
            if session.apply_in_flight {
                session.deferred_phase = Some(phase);
            } else {
                session.phase = phase;
            }
        } else {
            tracing::debug!("Discarding result of superseded check #{}", generation);
        }

        info
    }

    // ========================================================================
    // Apply
    // ========================================================================

    /// Download and verify the release found by the last check
    ///
    /// Returns the terminal event of the session. The only error is
    /// [`UpdateError::SessionBusy`]; every other failure is reported as a
    /// `failed` event.
    pub async fn apply_update(&self) -> Result<UpdateProgress> {
        let mut reporter = ProgressReporter::new(self.events.clone(), self.progress_callback.clone());

        let (release, stale_artifact) = {
            let mut session = self.session.lock();
            if session.apply_in_flight {
                tracing::debug!("Rejecting apply: a session is already running");
                return Err(UpdateError::SessionBusy);
            }

            if self.cancel.is_cancelled() {
                drop(session);
                return Ok(reporter.failed("update cancelled"));
            }

            let release = if session.phase.can_apply() {
                session.latest.clone()
            } else {
                None
            };
            let Some(release) = release else {
                tracing::debug!("Apply requested with no available update");
                return Ok(UpdateProgress::failed(0, "no available update"));
            };

            session.apply_in_flight = true;
            session.deferred_phase = None;
            session.phase = UpdateState::Downloading;
            (release, session.ready.take())
        };

        let mut guard = ApplyGuard {
            session: &self.session,
            ready: None,
            succeeded: false,
        };

        if let Some(stale) = stale_artifact {
            remove_artifact(&stale.path).await;
        }

        let outcome = self.run_apply(&release, &mut reporter, &mut guard).await;
        guard.succeeded = outcome.status == UpdateStatus::Ready;
        drop(guard);

        Ok(outcome)
    }

    async fn run_apply(
        &self,
        release: &ResolvedRelease,
        reporter: &mut ProgressReporter,
        guard: &mut ApplyGuard<'_>,
    ) -> UpdateProgress {
        let version = release.info.latest_version.clone();
        let Some(artifact_ref) = release.artifact.as_ref() else {
            return reporter.failed("no available update");
        };

        tracing::info!("Applying update {} -> {}", self.settings.current_version, version);
        reporter.report(UpdateStatus::Downloading, 0, format!("Downloading {}", version));

        let download = {
            let message = format!("Downloading {}", version);
            self.downloader
                .fetch(&artifact_ref.url, &self.cancel, |p| {
                    reporter.report(
                        UpdateStatus::Downloading,
                        scale_download_percent(p.percent),
                        message.clone(),
                    )
                })
                .await
        };

        let partial = match download {
            Ok(partial) => partial,
            Err(UpdateError::Cancelled) => {
                tracing::info!("Download of {} cancelled", version);
                return reporter.failed("update cancelled");
            }
            Err(e) => {
                tracing::warn!("Download of {} failed: {}", version, e);
                return reporter.failed(format!("download failed: {}", e));
            }
        };

        self.session.lock().phase = UpdateState::Verifying;
        reporter.report(UpdateStatus::Verifying, DOWNLOAD_SHARE, "Verifying download");

        let verified = tokio::select! {
            _ = self.cancel.cancelled() => Err(UpdateError::Cancelled),
            result = IntegrityVerifier::check(partial.path(), &artifact_ref.digest) => result,
        };

        match verified {
            Ok(()) => {}
            Err(UpdateError::Cancelled) => return reporter.failed("update cancelled"),
            Err(e) => {
                tracing::warn!("Integrity check failed for {}: {}", version, e);
                return reporter.failed("integrity check failed");
            }
        }

        let target = self
            .settings
            .scratch_dir
            .join(artifact_file_name(&artifact_ref.url, &version));
        let path = match partial.promote(&target).await {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Failed to store verified artifact: {}", e);
                return reporter.failed(format!("could not store update: {}", e));
            }
        };

        if self.cancel.is_cancelled() {
            remove_artifact(&path).await;
            return reporter.failed("update cancelled");
        }

        tracing::info!("Update {} verified and ready at {}", version, path.display());
        guard.ready = Some(ReadyArtifact {
            path,
            version: version.clone(),
            mode: self.settings.mode,
        });

        reporter.ready(format!("Update {} is ready, restart to finish installing", version))
    }

    // ========================================================================
    // Handoff and teardown
    // ========================================================================

    /// The host has taken over the artifact; remove it from scratch storage
    pub async fn complete_handoff(&self) -> Result<Option<ReadyArtifact>> {
        let taken = {
            let mut session = self.session.lock();
            let taken = session.ready.take();
            if taken.is_some() && session.phase == UpdateState::Ready {
                session.phase = UpdateState::Idle;
            }
            taken
        };

        if let Some(artifact) = &taken {
            match tokio::fs::remove_file(&artifact.path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
            tracing::info!("Handoff of {} complete", artifact.version);
        }

        Ok(taken)
    }

    /// Remove leftover partial downloads from the scratch directory
    ///
    /// Only `.part` files are touched; the recorded ready artifact and any
    /// file the updater did not create are kept. Fails with `SessionBusy` while
    /// an apply is running. Returns the number of files removed.
    pub async fn cleanup(&self) -> Result<usize> {
        let keep = {
            let session = self.session.lock();
            if session.apply_in_flight {
                return Err(UpdateError::SessionBusy);
            }
            session.ready.as_ref().map(|r| r.path.clone())
        };

        let removed = clean_scratch_dir(&self.settings.scratch_dir, keep.as_deref()).await?;
        if removed > 0 {
            tracing::info!(
                "Removed {} partial download(s) from {}",
                removed,
                self.settings.scratch_dir.display()
            );
        }
        Ok(removed)
    }

    /// Tear the session down
    ///
    /// Aborts in-flight transfers and releases temporary files. Later checks
    /// report "up to date" and later applies fail with "update cancelled".
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down updater");
        self.cancel.cancel();

        let (in_flight, keep) = {
            let session = self.session.lock();
            (
                session.apply_in_flight,
                session.ready.as_ref().map(|r| r.path.clone()),
            )
        };

        // A running apply removes its own partial file once it observes the cancel
        if !in_flight {
            if let Err(e) = clean_scratch_dir(&self.settings.scratch_dir, keep.as_deref()).await {
                tracing::warn!("Failed to clean scratch directory: {}", e);
            }
        }
    }
}

impl Drop for UpdateOrchestrator {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Ends an apply session even when its future is dropped mid-flight
struct ApplyGuard<'a> {
    session: &'a Mutex<SessionState>,
    ready: Option<ReadyArtifact>,
    succeeded: bool,
}

impl Drop for ApplyGuard<'_> {
    fn drop(&mut self) {
        let mut session = self.session.lock();
        session.apply_in_flight = false;

        let outcome = if self.succeeded {
            UpdateState::Ready
        } else {
            UpdateState::Failed
        };

        match self.ready.take() {
            Some(ready) if self.succeeded => session.ready = Some(ready),
            Some(orphan) => {
                if let Err(e) = std::fs::remove_file(&orphan.path) {
                    tracing::warn!("Failed to remove {}: {}", orphan.path.display(), e);
                }
            }
            None => {}
        }

        // A verified artifact outranks whatever a concurrent check found;
        // that check has already replaced `latest`
        let deferred = session.deferred_phase.take();
        session.phase = match deferred {
            Some(phase) if !self.succeeded => phase,
            _ => outcome,
        };
    }
}

async fn remove_artifact(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed artifact {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove artifact {}: {}", path.display(), e),
    }
}

async fn clean_scratch_dir(dir: &Path, keep: Option<&Path>) -> Result<usize> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    // The directory is host-provided and may hold files the updater never wrote
    let mut removed = 0;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if keep == Some(path.as_path()) || !is_partial_file(&path) {
            continue;
        }
        if !entry.file_type().await?.is_file() {
            continue;
        }
        tokio::fs::remove_file(&path).await?;
        removed += 1;
    }

    Ok(removed)
}
