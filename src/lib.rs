//! updater-core - self-update orchestration
//!
//! This crate provides the core of an application's self-update workflow:
//! - Version comparison of local and remote builds
//! - Release manifest fetching over HTTP(S) with optional bearer auth
//! - Streamed artifact download with ordered progress events
//! - Digest verification before the artifact is handed to the host
//! - A session state machine deciding when a restart is required
//!
//! Installing the artifact and relaunching stay with the host.

pub mod app;
pub mod config;
pub mod core;
pub mod logging;
pub mod update;

// Re-export commonly used items
pub use app::App;
pub use config::{ConfigStore, ConfigStoreConfig, UpdaterConfig};
pub use core::error::{ErrorRecovery, RecoveryAction, Result, UpdateError};
pub use update::{
    ReadyArtifact, UpdateInfo, UpdateMode, UpdateOrchestrator, UpdateProgress, UpdateStatus,
    VersionComparator,
};
