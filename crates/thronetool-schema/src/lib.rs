//! App identities, platform detection, path resolution, and tool configuration
//! for throne-tool.
//!
//! This crate is the pure data layer: `AppIdentity` and `Platform` select
//! behavior, `HostDirs` captures the directory roots read from the
//! environment, `PathResolver` maps (platform × app) to concrete install,
//! config, and executable paths through a static capability table, and
//! `ToolConfig` holds the optional user configuration file.

pub mod app;
pub mod config;
pub mod host;
pub mod paths;
pub mod platform;

pub use app::AppIdentity;
pub use config::{HotspotSettings, ToolConfig, DEFAULT_RELEASE_URL};
pub use host::HostDirs;
pub use paths::{AppPaths, PathResolver};
pub use platform::Platform;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("unsupported platform: {0} (supported: linux, macos, windows)")]
    UnsupportedPlatform(String),
    #[error("unsupported platform: {0} is not set")]
    HostDirUnavailable(&'static str),
    #[error("unknown app '{0}' (expected: throne, nekoray)")]
    UnknownApp(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
}
