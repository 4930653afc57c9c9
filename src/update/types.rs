//! Data model shared by the update pipeline and the host

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Result of one update check
///
/// A fresh value is produced per check and never mutated afterwards.
/// When `available` is false, `latest_version` equals `current_version`
/// and `installer_url` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub available: bool,
    pub current_version: String,
    pub latest_version: String,
    pub release_notes: String,
    pub release_url: String,
    pub installer_url: String,
    /// Diagnostic detail, not meant for display
    pub debug_info: String,
}

impl UpdateInfo {
    /// An "up to date" answer carrying a diagnostic
    pub fn unavailable(current_version: impl Into<String>, debug_info: impl Into<String>) -> Self {
        let current_version = current_version.into();
        Self {
            available: false,
            latest_version: current_version.clone(),
            current_version,
            release_notes: String::new(),
            release_url: String::new(),
            installer_url: String::new(),
            debug_info: debug_info.into(),
        }
    }
}

/// Status reported in an [`UpdateProgress`] event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateStatus {
    Checking,
    Downloading,
    Verifying,
    Ready,
    Failed,
}

impl UpdateStatus {
    /// Ready and Failed end an apply session
    pub fn is_terminal(&self) -> bool {
        matches!(self, UpdateStatus::Ready | UpdateStatus::Failed)
    }
}

impl std::fmt::Display for UpdateStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateStatus::Checking => write!(f, "checking"),
            UpdateStatus::Downloading => write!(f, "downloading"),
            UpdateStatus::Verifying => write!(f, "verifying"),
            UpdateStatus::Ready => write!(f, "ready"),
            UpdateStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Progress event pushed to subscribers during an apply session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProgress {
    pub status: UpdateStatus,
    /// Percentage in `0..=100`
    pub progress: u8,
    pub message: String,
    /// Only ever true together with [`UpdateStatus::Ready`]
    pub need_restart: bool,
}

impl UpdateProgress {
    pub fn new(status: UpdateStatus, progress: u8, message: impl Into<String>) -> Self {
        Self {
            status,
            progress: progress.min(100),
            message: message.into(),
            need_restart: status == UpdateStatus::Ready,
        }
    }

    pub fn ready(message: impl Into<String>) -> Self {
        Self::new(UpdateStatus::Ready, 100, message)
    }

    pub fn failed(progress: u8, message: impl Into<String>) -> Self {
        Self::new(UpdateStatus::Failed, progress, message)
    }
}

/// How the host installs a verified artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateMode {
    /// The artifact is an installer the host launches
    #[default]
    Installer,
    /// The artifact replaces the running executable in place
    Portable,
}

impl std::fmt::Display for UpdateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateMode::Installer => write!(f, "installer"),
            UpdateMode::Portable => write!(f, "portable"),
        }
    }
}

/// Verified artifact handed to the host for installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadyArtifact {
    pub path: PathBuf,
    pub version: String,
    pub mode: UpdateMode,
}

// ============================================================================
// Session State Machine
// ============================================================================

/// Phase of the orchestrator's state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateState {
    /// Nothing checked yet
    Idle,
    /// Check in flight
    Checking,
    /// A newer release is known and can be applied
    Available,
    /// The remote release is not newer
    UpToDate,
    /// The last check degraded to "no update"
    CheckFailed,
    /// Artifact transfer in flight
    Downloading,
    /// Digest check in flight
    Verifying,
    /// Verified artifact recorded, restart required
    Ready,
    /// The last apply ended in failure
    Failed,
}

impl UpdateState {
    /// Whether an apply session is running
    pub fn is_applying(&self) -> bool {
        matches!(self, UpdateState::Downloading | UpdateState::Verifying)
    }

    /// Whether `apply_update` may start from this state
    pub fn can_apply(&self) -> bool {
        matches!(self, UpdateState::Available)
    }

    /// Check if the state allows cancellation
    pub fn can_cancel(&self) -> bool {
        matches!(
            self,
            UpdateState::Checking | UpdateState::Downloading | UpdateState::Verifying
        )
    }

    /// Check if the state is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, UpdateState::Ready | UpdateState::Failed)
    }
}
