use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{self, Read};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub size: u64,
    /// Seconds since the Unix epoch.
    pub modified: i64,
    pub blake3: String,
}

/// Manifest of a configuration tree keyed by `/`-separated relative path.
///
/// Only regular files and directories are recorded. Symlinks and special
/// files are skipped with a warning.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigSnapshot {
    pub files: BTreeMap<String, FileRecord>,
    #[serde(default)]
    pub dirs: BTreeSet<String>,
}

impl ConfigSnapshot {
    pub fn scan(root: &Path) -> io::Result<Self> {
        let mut snapshot = Self::default();
        scan_dir(root, "", &mut snapshot)?;
        Ok(snapshot)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.values().map(|f| f.size).sum()
    }

    /// Paths whose presence, size, or digest differ between the two snapshots.
    ///
    /// Modification times are not compared.
    pub fn content_differences(&self, other: &Self) -> Vec<String> {
        let mut diffs = Vec::new();
        for (path, record) in &self.files {
            match other.files.get(path) {
                None => diffs.push(format!("missing file {path}")),
                Some(o) if o.size != record.size || o.blake3 != record.blake3 => {
                    diffs.push(format!("changed file {path}"));
                }
                Some(_) => {}
            }
        }
        for path in other.files.keys() {
            if !self.files.contains_key(path) {
                diffs.push(format!("unexpected file {path}"));
            }
        }
        for dir in self.dirs.difference(&other.dirs) {
            diffs.push(format!("missing directory {dir}"));
        }
        for dir in other.dirs.difference(&self.dirs) {
            diffs.push(format!("unexpected directory {dir}"));
        }
        diffs
    }
}

fn scan_dir(dir: &Path, prefix: &str, snapshot: &mut ConfigSnapshot) -> io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_str().ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("non-UTF-8 file name under {}", dir.display()),
            )
        })?;
        let rel = if prefix.is_empty() {
            name.to_owned()
        } else {
            format!("{prefix}/{name}")
        };

        let path = entry.path();
        let meta = path.symlink_metadata()?;
        if meta.is_dir() {
            snapshot.dirs.insert(rel.clone());
            scan_dir(&path, &rel, snapshot)?;
        } else if meta.is_file() {
            let mut file = fs::File::open(&path)?;
            let (size, digest) = hash_reader(&mut file)?;
            snapshot.files.insert(
                rel,
                FileRecord {
                    size,
                    modified: unix_seconds(meta.modified()?),
                    blake3: digest,
                },
            );
        } else {
            warn!("skipping unsupported file type: {rel}");
        }
    }
    Ok(())
}

pub(crate) fn hash_reader(reader: &mut impl Read) -> io::Result<(u64, String)> {
    let mut hasher = blake3::Hasher::new();
    let size = io::copy(reader, &mut hasher)?;
    Ok((size, hasher.finalize().to_hex().to_string()))
}

pub(crate) fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}
