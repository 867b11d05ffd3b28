use crate::snapshot::{hash_reader, ConfigSnapshot, FileRecord};
use crate::{fsync_dir, ArchiveError};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Seek};
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thronetool_schema::AppIdentity;
use tracing::{debug, info, warn};

/// First entry of every archive.
pub const MANIFEST_ENTRY: &str = "thronetool-manifest.json";
pub const ARCHIVE_EXTENSION: &str = "tar.gz";
pub const FORMAT_VERSION: u32 = 1;

const TREE_PREFIX: &str = "config";
const STAGING_MARKER: &str = ".restore-";
const PREVIOUS_MARKER: &str = ".previous-";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub format_version: u32,
    pub app: AppIdentity,
    /// RFC 3339, UTC.
    pub created_at: String,
    pub tool_version: String,
    pub files: ConfigSnapshot,
}

/// `<app>-backup-<YYYY-MM-DD>.tar.gz`, with `-<counter>` before the extension
/// when `counter` is non-zero.
pub fn archive_file_name(app: AppIdentity, date: NaiveDate, counter: u32) -> String {
    let base = format!("{}-backup-{}", app.slug(), date.format("%Y-%m-%d"));
    if counter == 0 {
        format!("{base}.{ARCHIVE_EXTENSION}")
    } else {
        format!("{base}-{counter}.{ARCHIVE_EXTENSION}")
    }
}

/// Pack `source_dir` into a backup archive for `app`.
///
/// `destination` may be a directory (a dated, collision-free name is chosen
/// inside it) or a file path that must not exist yet. Returns the path of the
/// written archive.
pub fn pack(
    source_dir: &Path,
    destination: &Path,
    app: AppIdentity,
) -> Result<PathBuf, ArchiveError> {
    pack_at(source_dir, destination, app, Utc::now())
}

/// [`pack`] with an explicit creation time.
///
/// The archive is built in a temporary file next to its destination, read
/// back and compared with the source snapshot, and only then renamed into
/// place. Any failure leaves nothing behind.
pub fn pack_at(
    source_dir: &Path,
    destination: &Path,
    app: AppIdentity,
    now: DateTime<Utc>,
) -> Result<PathBuf, ArchiveError> {
    if !source_dir.is_dir() {
        return Err(ArchiveError::SourceNotFound(source_dir.to_path_buf()));
    }
    let dest = resolve_destination(destination, app, now.date_naive())?;
    let parent = parent_dir(&dest);

    let snapshot = ConfigSnapshot::scan(source_dir)
        .map_err(|e| ArchiveError::write(&dest, format!("scan {}: {e}", source_dir.display())))?;
    let manifest = ArchiveManifest {
        format_version: FORMAT_VERSION,
        app,
        created_at: now.to_rfc3339_opts(SecondsFormat::Secs, true),
        tool_version: env!("CARGO_PKG_VERSION").to_owned(),
        files: snapshot,
    };

    let tmp = tempfile::Builder::new()
        .prefix(".thronetool-")
        .suffix(".partial")
        .tempfile_in(&parent)
        .map_err(|e| ArchiveError::write(&dest, e))?;
    debug!("writing archive to {}", tmp.path().display());
    write_archive(tmp.as_file(), source_dir, &manifest)
        .map_err(|e| ArchiveError::write(&dest, e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| ArchiveError::write(&dest, e))?;

    let (written, contents) = read_archive(tmp.path())
        .map_err(|e| ArchiveError::write(&dest, format!("verification failed: {e}")))?;
    let diffs = manifest.files.content_differences(&contents);
    if written != manifest || !diffs.is_empty() {
        return Err(ArchiveError::write(
            &dest,
            format!(
                "verification failed: source changed while packing ({})",
                diffs.join(", ")
            ),
        ));
    }

    tmp.persist_noclobber(&dest)
        .map_err(|e| ArchiveError::write(&dest, e.error))?;
    fsync_dir(&parent).map_err(|e| ArchiveError::write(&dest, e))?;

    info!(
        "packed {} files ({} bytes) from {} into {}",
        manifest.files.file_count(),
        manifest.files.total_bytes(),
        source_dir.display(),
        dest.display()
    );
    Ok(dest)
}

/// Read an archive's manifest and check every entry against it, without
/// extracting anything.
pub fn inspect(archive_path: &Path) -> Result<ArchiveManifest, ArchiveError> {
    let (manifest, contents) =
        read_archive(archive_path).map_err(|e| ArchiveError::extract(archive_path, e))?;
    let diffs = manifest.files.content_differences(&contents);
    if !diffs.is_empty() {
        return Err(ArchiveError::extract(
            archive_path,
            format!("contents do not match manifest: {}", diffs.join(", ")),
        ));
    }
    Ok(manifest)
}

/// Restore an archive made for `app` into `target_dir`.
///
/// The archive's app is checked before anything is touched. Entries are
/// extracted into a sibling staging directory and verified against the
/// manifest; only then is the previous `target_dir` moved aside and replaced.
/// On any failure `target_dir` keeps its previous contents.
pub fn unpack(
    archive_path: &Path,
    target_dir: &Path,
    app: AppIdentity,
) -> Result<ConfigSnapshot, ArchiveError> {
    if !archive_path.is_file() {
        return Err(ArchiveError::extract(archive_path, "no such file"));
    }
    let manifest = read_manifest(archive_path).map_err(|e| ArchiveError::extract(archive_path, e))?;
    if manifest.app != app {
        return Err(ArchiveError::ArchiveMismatch {
            path: archive_path.to_path_buf(),
            expected: app,
            found: manifest.app,
        });
    }

    let name = target_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| {
            ArchiveError::extract(
                archive_path,
                format!("invalid restore target {}", target_dir.display()),
            )
        })?
        .to_owned();
    let parent = parent_dir(target_dir);
    fs::create_dir_all(&parent).map_err(|e| ArchiveError::extract(archive_path, e))?;
    recover_interrupted(&parent, &name, target_dir);

    let staging = tempfile::Builder::new()
        .prefix(&format!(".{name}{STAGING_MARKER}"))
        .tempdir_in(&parent)
        .map_err(|e| ArchiveError::extract(archive_path, e))?;
    debug!("extracting {} into {}", archive_path.display(), staging.path().display());
    extract_tree(archive_path, staging.path(), &manifest)
        .map_err(|e| ArchiveError::extract(archive_path, e))?;

    let extracted =
        ConfigSnapshot::scan(staging.path()).map_err(|e| ArchiveError::extract(archive_path, e))?;
    let diffs = manifest.files.content_differences(&extracted);
    if !diffs.is_empty() {
        return Err(ArchiveError::extract(
            archive_path,
            format!("extracted tree does not match manifest: {}", diffs.join(", ")),
        ));
    }

    // The staging TempDir no longer exists after a successful swap; its drop
    // then has nothing to clean.
    swap_into_place(staging.path(), target_dir, &parent, &name)
        .map_err(|e| ArchiveError::extract(archive_path, e))?;
    fsync_dir(&parent).map_err(|e| ArchiveError::extract(archive_path, e))?;

    info!(
        "restored {} files from {} into {}",
        extracted.file_count(),
        archive_path.display(),
        target_dir.display()
    );
    Ok(extracted)
}

fn resolve_destination(
    destination: &Path,
    app: AppIdentity,
    date: NaiveDate,
) -> Result<PathBuf, ArchiveError> {
    if destination.is_dir() || ends_with_separator(destination) {
        fs::create_dir_all(destination).map_err(|e| ArchiveError::write(destination, e))?;
        return (0..=u32::MAX)
            .map(|counter| destination.join(archive_file_name(app, date, counter)))
            .find(|candidate| candidate.symlink_metadata().is_err())
            .ok_or_else(|| ArchiveError::write(destination, "no free archive name"));
    }

    if destination.symlink_metadata().is_ok() {
        return Err(ArchiveError::write(
            destination,
            "refusing to overwrite an existing file",
        ));
    }
    let parent = parent_dir(destination);
    fs::create_dir_all(&parent).map_err(|e| ArchiveError::write(destination, e))?;
    Ok(destination.to_path_buf())
}

fn ends_with_separator(path: &Path) -> bool {
    let s = path.as_os_str().to_string_lossy();
    s.ends_with('/') || s.ends_with(std::path::MAIN_SEPARATOR)
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Write the manifest entry followed by the tree under `config/`.
///
/// Entries are sorted, ownership is zeroed and timestamps are fixed at the
/// epoch, so the tree part only depends on paths, modes, and bytes.
fn write_archive(out: &fs::File, source_dir: &Path, manifest: &ArchiveManifest) -> io::Result<()> {
    let mut ar = tar::Builder::new(GzEncoder::new(out, Compression::default()));
    ar.follow_symlinks(false);

    let json = serde_json::to_vec_pretty(manifest)?;
    let mut header = make_header(tar::EntryType::Regular, 0o644);
    header.set_size(json.len() as u64);
    header.set_cksum();
    ar.append_data(&mut header, MANIFEST_ENTRY, json.as_slice())?;

    let root_meta = source_dir.symlink_metadata()?;
    let mut header = make_header(tar::EntryType::Directory, mode_of(&root_meta));
    header.set_size(0);
    header.set_cksum();
    ar.append_data(&mut header, format!("{TREE_PREFIX}/"), io::empty())?;

    let mut entries: Vec<(&str, bool)> = manifest
        .files
        .dirs
        .iter()
        .map(|d| (d.as_str(), true))
        .chain(manifest.files.files.keys().map(|f| (f.as_str(), false)))
        .collect();
    entries.sort_unstable();

    for (rel, is_dir) in entries {
        let full = join_rel(source_dir, rel);
        let meta = full.symlink_metadata()?;
        if is_dir {
            let mut header = make_header(tar::EntryType::Directory, mode_of(&meta));
            header.set_size(0);
            header.set_cksum();
            ar.append_data(&mut header, format!("{TREE_PREFIX}/{rel}/"), io::empty())?;
        } else {
            let data = fs::read(&full)?;
            let mut header = make_header(tar::EntryType::Regular, mode_of(&meta));
            header.set_size(data.len() as u64);
            header.set_cksum();
            ar.append_data(&mut header, format!("{TREE_PREFIX}/{rel}"), data.as_slice())?;
        }
    }

    ar.into_inner()?.finish()?;
    Ok(())
}

fn make_header(entry_type: tar::EntryType, mode: u32) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mode(mode);
    header
}

#[cfg(unix)]
fn mode_of(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(meta: &fs::Metadata) -> u32 {
    if meta.is_dir() {
        0o755
    } else {
        0o644
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
#[allow(clippy::unnecessary_wraps)]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

fn open_entries(archive_path: &Path) -> io::Result<tar::Archive<GzDecoder<fs::File>>> {
    let mut file = fs::File::open(archive_path)?;
    let mut magic = [0u8; 4];
    let n = file.read(&mut magic)?;
    if n == magic.len() && &magic == ZIP_MAGIC {
        return Err(invalid(format!(
            "this is a zip file; backups are gzip'd tar archives (*.{ARCHIVE_EXTENSION}) made by `throne-tool backup`"
        )));
    }
    file.rewind()?;
    Ok(tar::Archive::new(GzDecoder::new(file)))
}

fn read_manifest_entry<R: Read>(entries: &mut tar::Entries<'_, R>) -> io::Result<ArchiveManifest> {
    let mut first = entries.next().ok_or_else(|| invalid("archive is empty"))??;
    if first.path()?.as_ref() != Path::new(MANIFEST_ENTRY) {
        return Err(invalid("not a throne-tool backup (missing manifest record)"));
    }
    let mut buf = Vec::new();
    first.read_to_end(&mut buf)?;
    let manifest: ArchiveManifest = serde_json::from_slice(&buf)?;
    if manifest.format_version > FORMAT_VERSION {
        return Err(invalid(format!(
            "archive format version {} is newer than supported version {FORMAT_VERSION}",
            manifest.format_version
        )));
    }
    Ok(manifest)
}

fn read_manifest(archive_path: &Path) -> io::Result<ArchiveManifest> {
    let mut ar = open_entries(archive_path)?;
    let mut entries = ar.entries()?;
    read_manifest_entry(&mut entries)
}

fn read_archive(archive_path: &Path) -> io::Result<(ArchiveManifest, ConfigSnapshot)> {
    let mut ar = open_entries(archive_path)?;
    let mut entries = ar.entries()?;
    let manifest = read_manifest_entry(&mut entries)?;

    let mut contents = ConfigSnapshot::default();
    for entry in entries {
        let mut entry = entry?;
        let rel = tree_path(&entry)?;
        match (entry.header().entry_type(), rel) {
            (tar::EntryType::Directory, Some(rel)) => {
                contents.dirs.insert(rel);
            }
            (tar::EntryType::Directory, None) => {}
            (tar::EntryType::Regular, Some(rel)) => {
                let (size, blake3) = hash_reader(&mut entry)?;
                let modified = manifest.files.files.get(&rel).map_or(0, |f| f.modified);
                contents.files.insert(
                    rel,
                    FileRecord {
                        size,
                        modified,
                        blake3,
                    },
                );
            }
            (other, _) => return Err(invalid(format!("unsupported entry type {other:?}"))),
        }
    }
    Ok((manifest, contents))
}

/// Relative path of a tree entry below `config/`, `None` for `config/` itself.
/// Absolute paths and `..` components are rejected.
fn tree_path<R: Read>(entry: &tar::Entry<'_, R>) -> io::Result<Option<String>> {
    let path = entry.path()?;
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == TREE_PREFIX => {}
        _ => return Err(invalid(format!("unexpected entry {}", path.display()))),
    }
    let mut parts = Vec::new();
    for component in components {
        match component {
            Component::Normal(part) => parts.push(
                part.to_str()
                    .ok_or_else(|| invalid("non-UTF-8 entry name"))?
                    .to_owned(),
            ),
            Component::CurDir => {}
            _ => return Err(invalid(format!("unsafe entry path {}", path.display()))),
        }
    }
    Ok(if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    })
}

fn join_rel(base: &Path, rel: &str) -> PathBuf {
    rel.split('/').fold(base.to_path_buf(), |p, c| p.join(c))
}

fn from_unix_seconds(secs: i64) -> SystemTime {
    if secs >= 0 {
        UNIX_EPOCH + Duration::from_secs(secs.unsigned_abs())
    } else {
        UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs())
    }
}

fn extract_tree(archive_path: &Path, staging: &Path, manifest: &ArchiveManifest) -> io::Result<()> {
    let mut ar = open_entries(archive_path)?;
    let mut entries = ar.entries()?;
    read_manifest_entry(&mut entries)?;

    // Directory modes are applied last so read-only directories can still be filled.
    let mut dir_modes = Vec::new();
    for entry in entries {
        let mut entry = entry?;
        let rel = tree_path(&entry)?;
        let dest = rel.as_deref().map_or_else(|| staging.to_path_buf(), |r| join_rel(staging, r));
        let mode = entry.header().mode()?;
        match entry.header().entry_type() {
            tar::EntryType::Directory => {
                fs::create_dir_all(&dest)?;
                dir_modes.push((dest, mode));
            }
            tar::EntryType::Regular => {
                let Some(rel) = rel else {
                    return Err(invalid("file entry at archive root"));
                };
                if let Some(p) = dest.parent() {
                    fs::create_dir_all(p)?;
                }
                let mut out = fs::File::create(&dest)?;
                io::copy(&mut entry, &mut out)?;
                if let Some(record) = manifest.files.files.get(&rel) {
                    out.set_modified(from_unix_seconds(record.modified))?;
                }
                out.sync_all()?;
                drop(out);
                set_mode(&dest, mode)?;
            }
            other => return Err(invalid(format!("unsupported entry type {other:?}"))),
        }
    }
    for (dir, mode) in dir_modes.into_iter().rev() {
        set_mode(&dir, mode)?;
    }
    Ok(())
}

fn remove_path(path: &Path) -> io::Result<()> {
    if path.symlink_metadata()?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn swap_into_place(staged: &Path, target: &Path, parent: &Path, name: &str) -> io::Result<()> {
    let previous = if target.symlink_metadata().is_ok() {
        let aside = parent.join(format!(".{name}{PREVIOUS_MARKER}{}", std::process::id()));
        fs::rename(target, &aside)?;
        Some(aside)
    } else {
        None
    };

    if let Err(e) = fs::rename(staged, target) {
        if let Some(aside) = &previous {
            if let Err(back) = fs::rename(aside, target) {
                warn!(
                    "could not move previous configuration back from {}: {back}",
                    aside.display()
                );
            }
        }
        return Err(e);
    }

    if let Some(aside) = previous {
        if let Err(e) = remove_path(&aside) {
            warn!(
                "failed to remove previous configuration {}: {e}",
                aside.display()
            );
        }
    }
    Ok(())
}

/// Clean up after a restore that was killed mid-way.
///
/// Staging directories are discarded. A target moved aside but never
/// replaced is moved back; one that was replaced is deleted.
fn recover_interrupted(parent: &Path, name: &str, target: &Path) {
    let Ok(entries) = fs::read_dir(parent) else {
        return;
    };
    let staging_prefix = format!(".{name}{STAGING_MARKER}");
    let previous_prefix = format!(".{name}{PREVIOUS_MARKER}");

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        let path = entry.path();
        if file_name.starts_with(&staging_prefix) {
            warn!("removing stale restore staging directory {}", path.display());
            if let Err(e) = remove_path(&path) {
                warn!("failed to remove {}: {e}", path.display());
            }
        } else if file_name.starts_with(&previous_prefix) {
            if target.symlink_metadata().is_err() {
                warn!(
                    "moving configuration left aside by an interrupted restore back to {}",
                    target.display()
                );
                if let Err(e) = fs::rename(&path, target) {
                    warn!("failed to move {} back: {e}", path.display());
                }
            } else {
                warn!(
                    "removing configuration left aside by an interrupted restore: {}",
                    path.display()
                );
                if let Err(e) = remove_path(&path) {
                    warn!("failed to remove {}: {e}", path.display());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap()
    }

    fn create_config(dir: &Path) {
        fs::create_dir_all(dir.join("profiles")).unwrap();
        fs::create_dir_all(dir.join("route_profiles/empty")).unwrap();
        fs::write(dir.join("groups.json"), r#"{"groups":[1,2]}"#).unwrap();
        fs::write(dir.join("profiles/0.json"), r#"{"type":"vless"}"#).unwrap();
        fs::write(dir.join("profiles/blob.bin"), [0u8, 159, 146, 150, 255]).unwrap();
    }

    fn config_dir() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("config");
        create_config(&src);
        (dir, src)
    }

    #[test]
    fn pack_unpack_roundtrip() {
        let (_dir, src) = config_dir();
        let out = tempfile::tempdir().unwrap();
        let archive = pack(&src, out.path(), AppIdentity::Throne).unwrap();

        let restore_root = tempfile::tempdir().unwrap();
        let target = restore_root.path().join("Throne/config");
        unpack(&archive, &target, AppIdentity::Throne).unwrap();

        let before = ConfigSnapshot::scan(&src).unwrap();
        let after = ConfigSnapshot::scan(&target).unwrap();
        assert!(before.content_differences(&after).is_empty());
        assert_eq!(
            fs::read(target.join("profiles/blob.bin")).unwrap(),
            [0u8, 159, 146, 150, 255]
        );
        assert!(target.join("route_profiles/empty").is_dir());
    }

    #[test]
    fn roundtrip_keeps_modification_times() {
        let (_dir, src) = config_dir();
        let out = tempfile::tempdir().unwrap();
        let archive = pack(&src, out.path(), AppIdentity::Throne).unwrap();
        let target = out.path().join("restored");
        unpack(&archive, &target, AppIdentity::Throne).unwrap();

        let before = ConfigSnapshot::scan(&src).unwrap();
        let after = ConfigSnapshot::scan(&target).unwrap();
        assert_eq!(
            before.files["groups.json"].modified,
            after.files["groups.json"].modified
        );
    }

    #[test]
    fn pack_into_directory_uses_dated_name() {
        let (_dir, src) = config_dir();
        let out = tempfile::tempdir().unwrap();
        let archive = pack_at(&src, out.path(), AppIdentity::Throne, fixed_now()).unwrap();
        assert_eq!(
            archive.file_name().unwrap().to_str().unwrap(),
            "throne-backup-2026-03-14.tar.gz"
        );
        assert!(archive.is_file());
    }

    #[test]
    fn pack_name_collision_appends_counter() {
        let (_dir, src) = config_dir();
        let out = tempfile::tempdir().unwrap();
        let first = pack_at(&src, out.path(), AppIdentity::NekoRay, fixed_now()).unwrap();
        let second = pack_at(&src, out.path(), AppIdentity::NekoRay, fixed_now()).unwrap();
        let third = pack_at(&src, out.path(), AppIdentity::NekoRay, fixed_now()).unwrap();
        assert_ne!(first, second);
        assert!(second.ends_with("nekoray-backup-2026-03-14-1.tar.gz"));
        assert!(third.ends_with("nekoray-backup-2026-03-14-2.tar.gz"));
    }

    #[test]
    fn pack_to_explicit_file_path() {
        let (_dir, src) = config_dir();
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("nested/my-backup.tar.gz");
        let archive = pack(&src, &dest, AppIdentity::Throne).unwrap();
        assert_eq!(archive, dest);
        assert!(dest.is_file());
    }

    #[test]
    fn pack_refuses_to_overwrite_existing_file() {
        let (_dir, src) = config_dir();
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("keep.tar.gz");
        fs::write(&dest, "precious").unwrap();

        let err = pack(&src, &dest, AppIdentity::Throne).unwrap_err();
        assert!(matches!(err, ArchiveError::ArchiveWrite { .. }));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "precious");
    }

    #[test]
    fn pack_missing_source_fails() {
        let out = tempfile::tempdir().unwrap();
        let err = pack(
            &out.path().join("does-not-exist"),
            out.path(),
            AppIdentity::Throne,
        )
        .unwrap_err();
        assert!(matches!(err, ArchiveError::SourceNotFound(_)));
        assert_eq!(fs::read_dir(out.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn pack_failure_leaves_no_partial_archive() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, src) = config_dir();
        let out = tempfile::tempdir().unwrap();
        let locked = out.path().join("locked");
        fs::create_dir(&locked).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o500)).unwrap();
        if fs::write(locked.join("probe"), "x").is_ok() {
            // Running as root; permissions are not enforced.
            fs::remove_file(locked.join("probe")).unwrap();
            return;
        }

        let err = pack(&src, &locked, AppIdentity::Throne).unwrap_err();

        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        assert!(matches!(err, ArchiveError::ArchiveWrite { .. }));
        assert_eq!(fs::read_dir(&locked).unwrap().count(), 0);
    }

    #[test]
    fn pack_is_deterministic_for_same_timestamp() {
        let (_dir, src) = config_dir();
        let out = tempfile::tempdir().unwrap();
        let a = pack_at(&src, &out.path().join("a.tar.gz"), AppIdentity::Throne, fixed_now())
            .unwrap();
        let b = pack_at(&src, &out.path().join("b.tar.gz"), AppIdentity::Throne, fixed_now())
            .unwrap();
        assert_eq!(fs::read(a).unwrap(), fs::read(b).unwrap());
    }

    #[test]
    fn manifest_is_first_entry() {
        let (_dir, src) = config_dir();
        let out = tempfile::tempdir().unwrap();
        let archive = pack_at(&src, out.path(), AppIdentity::Throne, fixed_now()).unwrap();

        let mut ar = open_entries(&archive).unwrap();
        let first = ar.entries().unwrap().next().unwrap().unwrap();
        assert_eq!(first.path().unwrap().as_ref(), Path::new(MANIFEST_ENTRY));

        let manifest = inspect(&archive).unwrap();
        assert_eq!(manifest.app, AppIdentity::Throne);
        assert_eq!(manifest.created_at, "2026-03-14T09:26:53Z");
        assert_eq!(manifest.format_version, FORMAT_VERSION);
        assert_eq!(manifest.files.file_count(), 3);
    }

    #[test]
    fn unpack_rejects_other_app_and_leaves_target_untouched() {
        let (_dir, src) = config_dir();
        let out = tempfile::tempdir().unwrap();
        let archive = pack(&src, out.path(), AppIdentity::NekoRay).unwrap();

        let target = out.path().join("Throne/config");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("groups.json"), "mine").unwrap();
        let before = ConfigSnapshot::scan(&target).unwrap();

        let err = unpack(&archive, &target, AppIdentity::Throne).unwrap_err();
        assert!(matches!(
            err,
            ArchiveError::ArchiveMismatch {
                expected: AppIdentity::Throne,
                found: AppIdentity::NekoRay,
                ..
            }
        ));
        let after = ConfigSnapshot::scan(&target).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn unpack_replaces_existing_tree() {
        let (_dir, src) = config_dir();
        let out = tempfile::tempdir().unwrap();
        let archive = pack(&src, out.path(), AppIdentity::Throne).unwrap();

        let target = out.path().join("config");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("stale.json"), "old").unwrap();
        fs::write(target.join("groups.json"), "old").unwrap();

        unpack(&archive, &target, AppIdentity::Throne).unwrap();
        assert!(!target.join("stale.json").exists());
        assert_eq!(
            fs::read_to_string(target.join("groups.json")).unwrap(),
            r#"{"groups":[1,2]}"#
        );
        let leftovers: Vec<_> = fs::read_dir(out.path())
            .unwrap()
            .flatten()
            .filter(|e| e.file_name().to_string_lossy().starts_with(".config."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn unpack_corrupt_archive_keeps_target() {
        let out = tempfile::tempdir().unwrap();
        let bogus = out.path().join("bogus.tar.gz");
        fs::write(&bogus, b"definitely not gzip").unwrap();

        let target = out.path().join("config");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("a"), "keep").unwrap();

        let err = unpack(&bogus, &target, AppIdentity::Throne).unwrap_err();
        assert!(matches!(err, ArchiveError::Extraction { .. }));
        assert_eq!(fs::read_to_string(target.join("a")).unwrap(), "keep");
    }

    #[test]
    fn unpack_names_zip_files() {
        let out = tempfile::tempdir().unwrap();
        let zip = out.path().join("throne-backup-2026-01-02.zip");
        fs::write(&zip, b"PK\x03\x04\x14\x00\x00\x00").unwrap();

        let target = out.path().join("config");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("a"), "keep").unwrap();

        let err = unpack(&zip, &target, AppIdentity::Throne).unwrap_err();
        assert!(matches!(err, ArchiveError::Extraction { .. }));
        assert!(err.to_string().contains("zip file"), "{err}");
        assert_eq!(fs::read_to_string(target.join("a")).unwrap(), "keep");
    }

    #[test]
    fn unpack_truncated_archive_keeps_target() {
        let (_dir, src) = config_dir();
        let out = tempfile::tempdir().unwrap();
        let archive = pack(&src, out.path(), AppIdentity::Throne).unwrap();
        let bytes = fs::read(&archive).unwrap();
        fs::write(&archive, &bytes[..bytes.len() / 2]).unwrap();

        let target = out.path().join("config");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("a"), "keep").unwrap();

        assert!(unpack(&archive, &target, AppIdentity::Throne).is_err());
        assert_eq!(fs::read_to_string(target.join("a")).unwrap(), "keep");
        assert!(!target.join("groups.json").exists());
    }

    #[test]
    fn unpack_missing_archive_fails() {
        let out = tempfile::tempdir().unwrap();
        let err = unpack(
            &out.path().join("absent.tar.gz"),
            &out.path().join("config"),
            AppIdentity::Throne,
        )
        .unwrap_err();
        assert!(matches!(err, ArchiveError::Extraction { .. }));
    }

    fn handmade_archive(path: &Path, manifest: &ArchiveManifest, entries: &[(&[u8], &[u8])]) {
        let file = fs::File::create(path).unwrap();
        let mut ar = tar::Builder::new(GzEncoder::new(file, Compression::default()));
        let json = serde_json::to_vec(manifest).unwrap();
        let mut header = make_header(tar::EntryType::Regular, 0o644);
        header.set_size(json.len() as u64);
        header.set_cksum();
        ar.append_data(&mut header, MANIFEST_ENTRY, json.as_slice())
            .unwrap();
        for (name, data) in entries {
            // Raw header path so unsafe names reach the archive unvalidated.
            let mut header = make_header(tar::EntryType::Regular, 0o644);
            header.as_old_mut().name[..name.len()].copy_from_slice(name);
            header.set_size(data.len() as u64);
            header.set_cksum();
            ar.append(&header, *data).unwrap();
        }
        ar.into_inner().unwrap().finish().unwrap();
    }

    fn manifest_for(files: &[(&str, &[u8])]) -> ArchiveManifest {
        let mut snapshot = ConfigSnapshot::default();
        for (name, data) in files {
            snapshot.files.insert(
                (*name).to_owned(),
                FileRecord {
                    size: data.len() as u64,
                    modified: 0,
                    blake3: blake3::hash(data).to_hex().to_string(),
                },
            );
        }
        ArchiveManifest {
            format_version: FORMAT_VERSION,
            app: AppIdentity::Throne,
            created_at: "2026-03-14T00:00:00Z".to_owned(),
            tool_version: "test".to_owned(),
            files: snapshot,
        }
    }

    #[test]
    fn unpack_rejects_path_traversal() {
        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("evil.tar.gz");
        handmade_archive(
            &archive,
            &manifest_for(&[]),
            &[(b"config/../../escape.txt", b"pwned")],
        );

        let target = out.path().join("restore/config");
        let err = unpack(&archive, &target, AppIdentity::Throne).unwrap_err();
        assert!(matches!(err, ArchiveError::Extraction { .. }));
        assert!(!out.path().join("escape.txt").exists());
        assert!(!target.exists());
    }

    #[test]
    fn unpack_rejects_tree_not_matching_manifest() {
        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("tampered.tar.gz");
        handmade_archive(
            &archive,
            &manifest_for(&[("groups.json", b"original")]),
            &[(b"config/groups.json", b"tampered")],
        );

        let target = out.path().join("config");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("groups.json"), "current").unwrap();

        let err = unpack(&archive, &target, AppIdentity::Throne).unwrap_err();
        assert!(err.to_string().contains("changed file groups.json"));
        assert_eq!(
            fs::read_to_string(target.join("groups.json")).unwrap(),
            "current"
        );
        assert!(inspect(&archive).is_err());
    }

    #[test]
    fn unpack_rejects_newer_format() {
        let out = tempfile::tempdir().unwrap();
        let archive = out.path().join("future.tar.gz");
        let mut manifest = manifest_for(&[]);
        manifest.format_version = FORMAT_VERSION + 1;
        handmade_archive(&archive, &manifest, &[]);

        let err = unpack(&archive, &out.path().join("config"), AppIdentity::Throne).unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }

    #[test]
    fn stale_staging_is_removed_before_restore() {
        let (_dir, src) = config_dir();
        let out = tempfile::tempdir().unwrap();
        let archive = pack(&src, out.path(), AppIdentity::Throne).unwrap();

        let stale = out.path().join(".config.restore-abc123");
        fs::create_dir_all(stale.join("half")).unwrap();

        unpack(&archive, &out.path().join("config"), AppIdentity::Throne).unwrap();
        assert!(!stale.exists());
    }

    #[test]
    fn target_left_aside_is_recovered() {
        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("config");
        let aside = out.path().join(".config.previous-4242");
        fs::create_dir_all(&aside).unwrap();
        fs::write(aside.join("groups.json"), "saved").unwrap();

        recover_interrupted(out.path(), "config", &target);
        assert!(!aside.exists());
        assert_eq!(
            fs::read_to_string(target.join("groups.json")).unwrap(),
            "saved"
        );
    }

    #[test]
    fn archive_names() {
        let date = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
        assert_eq!(
            archive_file_name(AppIdentity::Throne, date, 0),
            "throne-backup-2025-01-02.tar.gz"
        );
        assert_eq!(
            archive_file_name(AppIdentity::NekoRay, date, 3),
            "nekoray-backup-2025-01-02-3.tar.gz"
        );
    }
}
