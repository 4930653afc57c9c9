//! Configuration Management Module
//!
//! Provides persistent updater configuration with:
//! - JSON file-based storage
//! - Atomic writes
//! - Validation of endpoint and asset pattern
//! - Thread-safe access

mod storage;

pub use storage::{ConfigError, ConfigResult, ConfigStore, ConfigStoreConfig, UpdaterConfig};
