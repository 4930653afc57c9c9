//! Update module
//!
//! This module provides functionality for:
//! - Comparing version strings
//! - Fetching release metadata from a JSON manifest
//! - Streaming artifacts to scratch storage with progress
//! - Digest verification before an artifact is handed to the host
//! - The session state machine behind check / apply

pub mod download;
pub mod manifest;
pub mod orchestrator;
pub mod progress;
pub mod source;
pub mod types;
pub mod verify;
pub mod version;


pub use download::{DownloadProgress, Downloader, PartialArtifact};
pub use manifest::{ArtifactRef, AssetMatcher, ReleaseAsset, ReleaseEntry, ReleaseManifest};
pub use orchestrator::{OrchestratorSettings, UpdateOrchestrator};
pub use progress::{ProgressReporter, UpdateProgressCallback};
pub use source::{HttpReleaseSource, HttpReleaseSourceConfig, ReleaseSource, ResolvedRelease};
pub use types::{ReadyArtifact, UpdateInfo, UpdateMode, UpdateProgress, UpdateState, UpdateStatus};
pub use verify::{DigestAlgorithm, ExpectedDigest, IntegrityVerifier};
pub use version::{ParsedVersion, VersionComparator};
