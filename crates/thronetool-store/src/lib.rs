//! Backup archives and configuration snapshots for throne-tool.
//!
//! `pack` turns a configuration directory into a single gzip-compressed tar
//! archive tagged with the owning app, and `unpack` restores one through a
//! staging directory that is swapped in only after it has been verified.
//! `ConfigSnapshot` is the per-file manifest both sides compare against.

pub mod archive;
pub mod snapshot;

pub use archive::{
    archive_file_name, inspect, pack, pack_at, unpack, ArchiveManifest, ARCHIVE_EXTENSION,
    FORMAT_VERSION, MANIFEST_ENTRY,
};
pub use snapshot::{ConfigSnapshot, FileRecord};

use std::path::{Path, PathBuf};
use thiserror::Error;
use thronetool_schema::AppIdentity;

/// Fsync a directory so that a preceding `rename()` is durable.
#[cfg(unix)]
pub(crate) fn fsync_dir(dir: &Path) -> Result<(), std::io::Error> {
    let f = std::fs::File::open(dir)?;
    f.sync_all()
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
pub(crate) fn fsync_dir(_dir: &Path) -> Result<(), std::io::Error> {
    Ok(())
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("configuration directory not found: {}", .0.display())]
    SourceNotFound(PathBuf),
    #[error("failed to write archive {}: {reason}", path.display())]
    ArchiveWrite { path: PathBuf, reason: String },
    #[error("archive {} was made for {found}, not {expected}", path.display())]
    ArchiveMismatch {
        path: PathBuf,
        expected: AppIdentity,
        found: AppIdentity,
    },
    #[error("failed to extract archive {}: {reason}", path.display())]
    Extraction { path: PathBuf, reason: String },
}

impl ArchiveError {
    pub(crate) fn write(path: &Path, reason: impl std::fmt::Display) -> Self {
        ArchiveError::ArchiveWrite {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn extract(path: &Path, reason: impl std::fmt::Display) -> Self {
        ArchiveError::Extraction {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }
}
