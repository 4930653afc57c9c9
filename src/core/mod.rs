//! Core Module
//!
//! Error taxonomy and build-time metadata shared by the rest of the crate.

pub mod build_info;
pub mod error;

// Re-export commonly used items
pub use build_info::{current_version, platform_info, VERSION};
pub use error::{ErrorRecovery, RecoveryAction, Result, UpdateError};
