//! Lifecycle orchestration for Throne and NekoRay installations.
//!
//! `StateInspector` derives the install state live from the filesystem,
//! `lifecycle::validate` decides which transitions are allowed, and the
//! `Orchestrator` drives install, remove, backup, restore and the phased
//! reinstall pipeline through a `PlatformAdapter`, reporting every outcome
//! as an `OperationResult`.

pub mod inspector;
pub mod lifecycle;
pub mod orchestrator;
pub mod reinstall;
pub mod result;
pub mod signal;

pub use inspector::{probe, InstallState, StateInspector};
pub use lifecycle::{validate, Transition};
pub use orchestrator::Orchestrator;
pub use reinstall::ReinstallOptions;
pub use result::{AppInfo, ErrorKind, Operation, OperationResult};
pub use signal::{install_signal_handler, shutdown_requested};

use std::path::PathBuf;
use thiserror::Error;
use thronetool_runtime::RuntimeError;
use thronetool_schema::{AppIdentity, SchemaError};
use thronetool_store::ArchiveError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    #[error("{app} is installed but broken; use --force to reinstall over it")]
    AlreadyBroken { app: AppIdentity },
    #[error("{app} is not installed; nothing to back up")]
    NothingToBackup { app: AppIdentity },
    #[error("{app} is not installed; {operation} needs an existing installation")]
    NotInstalled {
        app: AppIdentity,
        operation: &'static str,
    },
    #[error("{app} was only partially removed; still present: {}", join_paths(.remnants))]
    PartialRemoval {
        app: AppIdentity,
        remnants: Vec<PathBuf>,
    },
    #[error("install of {app} finished but the app is {state}")]
    InstallIncomplete {
        app: AppIdentity,
        state: InstallState,
    },
    #[error(
        "backup archive {} is inside {}, which removing {app} deletes; choose an --output outside it",
        archive.display(),
        location.display()
    )]
    BackupInsideRemoval {
        app: AppIdentity,
        archive: PathBuf,
        location: PathBuf,
    },
    #[error("interrupted before {0}")]
    Interrupted(&'static str),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn join_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "unknown".to_owned();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn schema_kind(e: &SchemaError) -> ErrorKind {
    match e {
        SchemaError::UnsupportedPlatform(_) | SchemaError::HostDirUnavailable(_) => {
            ErrorKind::UnsupportedPlatform
        }
        SchemaError::UnknownApp(_) | SchemaError::Config(_) => ErrorKind::Config,
        SchemaError::Io(_) => ErrorKind::Io,
    }
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Schema(e) | CoreError::Runtime(RuntimeError::Schema(e)) => schema_kind(e),
            CoreError::Archive(ArchiveError::SourceNotFound(_)) => ErrorKind::SourceNotFound,
            CoreError::Archive(ArchiveError::ArchiveWrite { .. })
            | CoreError::BackupInsideRemoval { .. } => ErrorKind::ArchiveWrite,
            CoreError::Archive(ArchiveError::ArchiveMismatch { .. }) => ErrorKind::ArchiveMismatch,
            CoreError::Archive(ArchiveError::Extraction { .. }) => ErrorKind::Extraction,
            CoreError::Runtime(RuntimeError::HotspotUnsupported(_)) => {
                ErrorKind::HotspotUnsupported
            }
            CoreError::Runtime(_) | CoreError::InstallIncomplete { .. } => {
                ErrorKind::PlatformAdapter
            }
            CoreError::AlreadyBroken { .. } => ErrorKind::AlreadyBroken,
            CoreError::NothingToBackup { .. } | CoreError::NotInstalled { .. } => {
                ErrorKind::NothingToBackup
            }
            CoreError::PartialRemoval { .. } => ErrorKind::PartialRemoval,
            CoreError::Interrupted(_) => ErrorKind::Interrupted,
            CoreError::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether the system was left in a state the user can simply retry from.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, CoreError::PartialRemoval { .. })
    }
}
