//! Host-facing facade
//!
//! The operations a presentation layer binds to: `check_for_update`,
//! `apply_update`, `get_version` and `get_platform_info`, plus the handoff
//! and teardown calls the host needs around a restart.

use crate::config::UpdaterConfig;
use crate::core::build_info;
use crate::core::error::Result;
use crate::update::{
    ReadyArtifact, UpdateInfo, UpdateOrchestrator, UpdateProgress, UpdateProgressCallback,
};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Application handle owning one update session
#[derive(Clone)]
pub struct App {
    orchestrator: Arc<UpdateOrchestrator>,
}

impl App {
    /// Build the updater from configuration
    pub fn new(config: &UpdaterConfig) -> Result<Self> {
        Ok(Self::with_orchestrator(UpdateOrchestrator::from_config(config)?))
    }

    /// Build with a progress callback installed
    pub fn with_progress_callback(
        config: &UpdaterConfig,
        callback: UpdateProgressCallback,
    ) -> Result<Self> {
        let orchestrator = UpdateOrchestrator::from_config(config)?.with_progress_callback(callback);
        Ok(Self::with_orchestrator(orchestrator))
    }

    pub fn with_orchestrator(orchestrator: UpdateOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub fn orchestrator(&self) -> &UpdateOrchestrator {
        &self.orchestrator
    }

    /// Version of the running build
    pub fn get_version(&self) -> String {
        build_info::current_version().to_string()
    }

    /// `"<os>/<arch>"` of the running build
    pub fn get_platform_info(&self) -> String {
        build_info::platform_info()
    }

    pub async fn check_for_update(&self) -> UpdateInfo {
        self.orchestrator.check_for_update().await
    }

    /// Terminal event of the apply session; `Err` only for `SessionBusy`
    pub async fn apply_update(&self) -> Result<UpdateProgress> {
        self.orchestrator.apply_update().await
    }

    /// Progress events of every later apply session
    pub fn subscribe(&self) -> broadcast::Receiver<UpdateProgress> {
        self.orchestrator.subscribe()
    }

    pub fn ready_artifact(&self) -> Option<ReadyArtifact> {
        self.orchestrator.ready_artifact()
    }

    pub async fn complete_handoff(&self) -> Result<Option<ReadyArtifact>> {
        self.orchestrator.complete_handoff().await
    }

    pub async fn cleanup(&self) -> Result<usize> {
        self.orchestrator.cleanup().await
    }

    pub async fn shutdown(&self) {
        self.orchestrator.shutdown().await
    }
}
