//! Error types for the updater core
//!
//! A single taxonomy shared by every stage of an update session, with
//! recovery hints the host uses to decide whether to offer a retry.

use thiserror::Error;

/// Result type alias for updater operations
pub type Result<T> = std::result::Result<T, UpdateError>;

/// Main error type for the updater core
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limited, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid version format: {0}")]
    InvalidVersionFormat(String),

    #[error("Disk error: {0}")]
    Disk(#[from] std::io::Error),

    #[error("Integrity mismatch: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    #[error("An update session is already in progress")]
    SessionBusy,

    #[error("Update cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),
}

impl UpdateError {
    /// True for failures of the transport itself (timeouts, DNS, non-2xx)
    pub fn is_network(&self) -> bool {
        matches!(self, UpdateError::Network(_) | UpdateError::RateLimited { .. })
    }
}

impl From<reqwest::Error> for UpdateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            UpdateError::Parse(err.to_string())
        } else if err.is_timeout() {
            UpdateError::Network(format!("request timed out: {}", err))
        } else {
            UpdateError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for UpdateError {
    fn from(err: serde_json::Error) -> Self {
        UpdateError::Parse(err.to_string())
    }
}

/// Trait for error recovery strategies
pub trait ErrorRecovery {
    /// Check if the error is retryable
    fn is_retryable(&self) -> bool;

    /// Get suggested retry delay in milliseconds
    fn retry_delay_ms(&self) -> Option<u64>;

    /// Get recovery action suggestion
    fn recovery_action(&self) -> RecoveryAction;
}

/// Recovery action suggestions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// Retry the operation
    Retry,
    /// Wait for the running session and try later
    Wait,
    /// Treat the result as "no update available"
    Fallback,
    /// Notify user and wait for input
    NotifyUser,
    /// Abort the operation
    Abort,
}

impl ErrorRecovery for UpdateError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            UpdateError::Network(_)
                | UpdateError::RateLimited { .. }
                | UpdateError::IntegrityMismatch { .. }
                | UpdateError::SessionBusy
        )
    }

    fn retry_delay_ms(&self) -> Option<u64> {
        match self {
            UpdateError::RateLimited { retry_after_secs } => {
                Some(retry_after_secs.saturating_mul(1000))
            }
            UpdateError::Network(_) => Some(5000),
            UpdateError::IntegrityMismatch { .. } => Some(1000),
            UpdateError::SessionBusy => Some(500),
            _ => None,
        }
    }

    fn recovery_action(&self) -> RecoveryAction {
        match self {
            UpdateError::Network(_) | UpdateError::RateLimited { .. } => RecoveryAction::Retry,
            UpdateError::Parse(_) | UpdateError::InvalidVersionFormat(_) => {
                RecoveryAction::Fallback
            }
            UpdateError::IntegrityMismatch { .. } => RecoveryAction::Retry,
            UpdateError::SessionBusy => RecoveryAction::Wait,
            UpdateError::Disk(_) | UpdateError::Config(_) => RecoveryAction::NotifyUser,
            UpdateError::Cancelled => RecoveryAction::Abort,
        }
    }
}
