//! Build-time metadata of the running binary
//!
//! The current version is never taken from the network: it is baked in at
//! compile time, either from `APP_BUILD_VERSION` (release pipelines stamp
//! their tag there) or from the package version.

/// Version of the running binary
pub const VERSION: &str = match option_env!("APP_BUILD_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

/// Get the current application version
pub fn current_version() -> &'static str {
    VERSION
}

/// Get the platform string, `<os>/<arch>`
pub fn platform_info() -> String {
    format!("{}/{}", std::env::consts::OS, std::env::consts::ARCH)
}

/// Default User-Agent for manifest and artifact requests
pub fn default_user_agent() -> String {
    format!("updater-core/{}", VERSION)
}
