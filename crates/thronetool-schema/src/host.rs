use crate::SchemaError;
use std::path::{Path, PathBuf};

/// Environment variable that re-roots every resolved path under a directory.
pub const ROOT_ENV: &str = "THRONETOOL_ROOT";

/// Directory roots that resolved app paths are joined against.
///
/// System-wide locations (`/opt`, `/usr/share`, `/Applications`) hang off
/// `system_root`; per-user ones off `home`. The Windows roots are optional so
/// that resolution only fails when a row actually needs one of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDirs {
    pub home: PathBuf,
    pub system_root: PathBuf,
    pub appdata: Option<PathBuf>,
    pub local_appdata: Option<PathBuf>,
    pub program_files: Option<PathBuf>,
    pub program_files_x86: Option<PathBuf>,
}

impl HostDirs {
    /// Read directory roots from the process environment.
    ///
    /// When `THRONETOOL_ROOT` is set, every root is placed under it instead.
    pub fn from_env() -> Result<Self, SchemaError> {
        if let Some(root) = non_empty_var(ROOT_ENV) {
            return Ok(Self::rooted(Path::new(&root)));
        }

        let home = non_empty_var("HOME")
            .or_else(|| non_empty_var("USERPROFILE"))
            .map(PathBuf::from)
            .ok_or(SchemaError::HostDirUnavailable("HOME"))?;

        Ok(Self {
            home,
            system_root: PathBuf::from("/"),
            appdata: non_empty_var("APPDATA").map(PathBuf::from),
            local_appdata: non_empty_var("LOCALAPPDATA").map(PathBuf::from),
            program_files: non_empty_var("ProgramFiles").map(PathBuf::from),
            program_files_x86: non_empty_var("ProgramFiles(x86)").map(PathBuf::from),
        })
    }

    /// A fully self-contained layout under `root`, used for sandboxes and tests.
    pub fn rooted(root: &Path) -> Self {
        let home = root.join("home").join("user");
        Self {
            appdata: Some(home.join("AppData").join("Roaming")),
            local_appdata: Some(home.join("AppData").join("Local")),
            program_files: Some(root.join("Program Files")),
            program_files_x86: Some(root.join("Program Files (x86)")),
            system_root: root.to_path_buf(),
            home,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rooted_keeps_everything_inside_root() {
        let root = Path::new("/tmp/sandbox");
        let dirs = HostDirs::rooted(root);
        assert!(dirs.home.starts_with(root));
        assert_eq!(dirs.system_root, root);
        for dir in [
            &dirs.appdata,
            &dirs.local_appdata,
            &dirs.program_files,
            &dirs.program_files_x86,
        ] {
            assert!(dir.as_ref().unwrap().starts_with(root));
        }
    }

    #[test]
    fn rooted_appdata_lives_under_home() {
        let dirs = HostDirs::rooted(Path::new("/r"));
        assert!(dirs.appdata.unwrap().starts_with(&dirs.home));
    }
}
