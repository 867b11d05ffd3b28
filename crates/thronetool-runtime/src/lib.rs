//! Host-facing side of throne-tool.
//!
//! This crate owns everything that shells out or talks to the network: the
//! pluggable `PlatformAdapter` trait with native Linux (dpkg/rpm), macOS
//! (app bundle) and Windows (installer) adapters plus a filesystem-only mock,
//! GitHub release lookup, prerequisite checks, and the Wi-Fi hotspot
//! controller.

pub mod adapter;
pub mod command;
pub mod hotspot;
pub mod linux;
pub mod macos;
pub mod mock;
pub mod prereq;
pub mod release;
pub mod windows;

pub use adapter::{select_adapter, AdapterOutput, InstallTarget, PlatformAdapter};
pub use command::{command_exists, CommandSpec, Transcript};
pub use hotspot::{HostShell, HotspotController, HotspotReport, HotspotRequest, SystemShell};
pub use mock::{AdapterCall, MockAdapter};
pub use prereq::{check_hotspot_prereqs, check_install_prereqs, format_missing, MissingPrereq};
pub use release::{AssetKind, Release, ReleaseAsset, ReleaseClient};

use thiserror::Error;
use thronetool_schema::{AppIdentity, Platform, SchemaError};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("adapter '{0}' is not available (expected 'system' or 'mock')")]
    AdapterUnavailable(String),
    #[error("{operation} of {app} failed:\n{diagnostics}")]
    AdapterFailed {
        operation: &'static str,
        app: AppIdentity,
        diagnostics: String,
    },
    #[error("command failed: {command}: {detail}")]
    CommandFailed { command: String, detail: String },
    #[error("{0} is not published upstream anymore; only Throne can be installed")]
    NotPublished(AppIdentity),
    #[error("unsupported Linux distribution: {0} (supported: Ubuntu, Debian, Linux Mint, Pop!_OS, Fedora, RHEL, CentOS, Rocky, AlmaLinux)")]
    UnsupportedDistribution(String),
    #[error("release lookup failed: {0}")]
    Release(String),
    #[error("hotspot commands are supported on Linux and macOS only, not {0}")]
    HotspotUnsupported(Platform),
    #[error("hotspot: {0}")]
    Hotspot(String),
    #[error("{0}")]
    MissingPrereqs(String),
    #[error(transparent)]
    Schema(#[from] SchemaError),
}
