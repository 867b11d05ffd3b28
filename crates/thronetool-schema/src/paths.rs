use crate::{AppIdentity, HostDirs, Platform, SchemaError};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Concrete locations of one app on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppPaths {
    pub install_dir: PathBuf,
    pub config_dir: PathBuf,
    pub executable: PathBuf,
    /// Desktop entries, alternate-case install dirs, and the config root:
    /// everything an uninstall is expected to clear besides `install_dir`.
    pub extra_locations: Vec<PathBuf>,
}

impl AppPaths {
    /// `install_dir` and extra locations that are still present on disk.
    pub fn existing_remnants(&self) -> Vec<PathBuf> {
        std::iter::once(&self.install_dir)
            .chain(&self.extra_locations)
            .filter(|p| p.symlink_metadata().is_ok())
            .cloned()
            .collect()
    }

    /// The install, config or extra location that `path` lies inside, if
    /// any. Both sides are canonicalized when they exist, so relative and
    /// symlinked spellings still match.
    pub fn enclosing_location(&self, path: &Path) -> Option<&Path> {
        let path = canonical_or_raw(path);
        std::iter::once(&self.install_dir)
            .chain(std::iter::once(&self.config_dir))
            .chain(&self.extra_locations)
            .map(PathBuf::as_path)
            .find(|loc| path.starts_with(canonical_or_raw(loc)))
    }
}

fn canonical_or_raw(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[derive(Debug, Clone, Copy)]
enum Root {
    System,
    Home,
    AppData,
    LocalAppData,
    ProgramFiles,
    ProgramFilesX86,
}

#[derive(Debug, Clone, Copy)]
struct Location {
    root: Root,
    rel: &'static str,
}

const fn at(root: Root, rel: &'static str) -> Location {
    Location { root, rel }
}

struct Row {
    platform: Platform,
    app: AppIdentity,
    install_dir: Location,
    /// Relative to `install_dir`.
    executable: &'static str,
    config_dir: Location,
    extra: &'static [Location],
}

const TABLE: &[Row] = &[
    Row {
        platform: Platform::Linux,
        app: AppIdentity::Throne,
        install_dir: at(Root::System, "opt/Throne"),
        executable: "Throne",
        config_dir: at(Root::Home, ".config/Throne/config"),
        extra: &[
            at(Root::System, "opt/throne"),
            at(Root::System, "usr/share/applications/Throne.desktop"),
            at(Root::System, "usr/share/applications/throne.desktop"),
            at(Root::Home, ".local/share/applications/Throne.desktop"),
            at(Root::Home, ".local/share/applications/throne.desktop"),
            at(Root::Home, ".config/Throne"),
            at(Root::Home, ".config/throne"),
        ],
    },
    Row {
        platform: Platform::Linux,
        app: AppIdentity::NekoRay,
        install_dir: at(Root::System, "opt/nekoray"),
        executable: "nekoray",
        config_dir: at(Root::Home, ".config/nekoray/config"),
        extra: &[
            at(Root::System, "opt/NekoRay"),
            at(Root::System, "usr/share/applications/NekoRay.desktop"),
            at(Root::System, "usr/share/applications/nekoray.desktop"),
            at(Root::Home, ".local/share/applications/NekoRay.desktop"),
            at(Root::Home, ".local/share/applications/nekoray.desktop"),
            at(Root::Home, ".config/nekoray"),
            at(Root::Home, ".config/NekoRay"),
        ],
    },
    Row {
        platform: Platform::MacOs,
        app: AppIdentity::Throne,
        install_dir: at(Root::System, "Applications/Throne.app"),
        executable: "Contents/MacOS/Throne",
        config_dir: at(Root::Home, "Library/Preferences/throne/config"),
        extra: &[at(Root::Home, "Library/Preferences/throne")],
    },
    Row {
        platform: Platform::MacOs,
        app: AppIdentity::NekoRay,
        install_dir: at(Root::System, "Applications/NekoRay.app"),
        executable: "Contents/MacOS/nekoray",
        config_dir: at(Root::Home, "Library/Preferences/nekoray/config"),
        extra: &[
            at(Root::System, "Applications/nekoray.app"),
            at(Root::Home, "Library/Preferences/nekoray"),
        ],
    },
    Row {
        platform: Platform::Windows,
        app: AppIdentity::Throne,
        install_dir: at(Root::LocalAppData, "Programs/Throne"),
        executable: "Throne.exe",
        config_dir: at(Root::AppData, "Throne/config"),
        extra: &[
            at(Root::ProgramFiles, "Throne"),
            at(Root::ProgramFilesX86, "Throne"),
            at(Root::AppData, "Throne"),
        ],
    },
    Row {
        platform: Platform::Windows,
        app: AppIdentity::NekoRay,
        install_dir: at(Root::LocalAppData, "Programs/NekoRay"),
        executable: "NekoRay.exe",
        config_dir: at(Root::AppData, "nekoray/config"),
        extra: &[
            at(Root::ProgramFiles, "NekoRay"),
            at(Root::ProgramFilesX86, "NekoRay"),
            at(Root::AppData, "nekoray"),
        ],
    },
];

/// Maps (app, platform) to concrete paths via the capability table.
///
/// Resolution is a pure lookup: nothing on disk is consulted.
#[derive(Debug, Clone)]
pub struct PathResolver {
    dirs: HostDirs,
}

impl PathResolver {
    pub fn new(dirs: HostDirs) -> Self {
        Self { dirs }
    }

    pub fn from_env() -> Result<Self, SchemaError> {
        Ok(Self::new(HostDirs::from_env()?))
    }

    pub fn dirs(&self) -> &HostDirs {
        &self.dirs
    }

    pub fn resolve(&self, app: AppIdentity, platform: Platform) -> Result<AppPaths, SchemaError> {
        let row = TABLE
            .iter()
            .find(|r| r.platform == platform && r.app == app)
            .ok_or_else(|| SchemaError::UnsupportedPlatform(platform.to_string()))?;

        let install_dir = self.locate(row.install_dir)?;
        let executable = join_rel(&install_dir, row.executable);
        let config_dir = self.locate(row.config_dir)?;
        // Extras on a root the host does not define are simply not probed.
        let extra_locations = row
            .extra
            .iter()
            .filter_map(|loc| self.locate(*loc).ok())
            .collect();

        Ok(AppPaths {
            install_dir,
            config_dir,
            executable,
            extra_locations,
        })
    }

    fn root(&self, root: Root) -> Result<&Path, SchemaError> {
        match root {
            Root::System => Ok(&self.dirs.system_root),
            Root::Home => Ok(&self.dirs.home),
            Root::AppData => self
                .dirs
                .appdata
                .as_deref()
                .ok_or(SchemaError::HostDirUnavailable("APPDATA")),
            Root::LocalAppData => self
                .dirs
                .local_appdata
                .as_deref()
                .ok_or(SchemaError::HostDirUnavailable("LOCALAPPDATA")),
            Root::ProgramFiles => self
                .dirs
                .program_files
                .as_deref()
                .ok_or(SchemaError::HostDirUnavailable("ProgramFiles")),
            Root::ProgramFilesX86 => self
                .dirs
                .program_files_x86
                .as_deref()
                .ok_or(SchemaError::HostDirUnavailable("ProgramFiles(x86)")),
        }
    }

    fn locate(&self, loc: Location) -> Result<PathBuf, SchemaError> {
        Ok(join_rel(self.root(loc.root)?, loc.rel))
    }
}

fn join_rel(base: &Path, rel: &str) -> PathBuf {
    rel.split('/').fold(base.to_path_buf(), |p, c| p.join(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> PathResolver {
        PathResolver::new(HostDirs::rooted(Path::new("/sandbox")))
    }

    #[test]
    fn every_platform_and_app_has_a_row() {
        let r = resolver();
        for platform in [Platform::Linux, Platform::MacOs, Platform::Windows] {
            for app in AppIdentity::ALL {
                assert!(r.resolve(app, platform).is_ok(), "{app} on {platform}");
            }
        }
    }

    #[test]
    fn linux_throne_paths() {
        let p = resolver()
            .resolve(AppIdentity::Throne, Platform::Linux)
            .unwrap();
        assert_eq!(p.install_dir, Path::new("/sandbox/opt/Throne"));
        assert_eq!(p.executable, Path::new("/sandbox/opt/Throne/Throne"));
        assert_eq!(
            p.config_dir,
            Path::new("/sandbox/home/user/.config/Throne/config")
        );
    }

    #[test]
    fn macos_executable_is_inside_bundle() {
        let p = resolver()
            .resolve(AppIdentity::NekoRay, Platform::MacOs)
            .unwrap();
        assert!(p.executable.starts_with(&p.install_dir));
        assert!(p.executable.ends_with("Contents/MacOS/nekoray"));
        assert!(p.config_dir.ends_with("Library/Preferences/nekoray/config"));
    }

    #[test]
    fn windows_uses_appdata_roots() {
        let dirs = HostDirs::rooted(Path::new("/sandbox"));
        let p = PathResolver::new(dirs.clone())
            .resolve(AppIdentity::Throne, Platform::Windows)
            .unwrap();
        assert!(p.install_dir.starts_with(dirs.local_appdata.unwrap()));
        assert!(p.config_dir.starts_with(dirs.appdata.unwrap()));
        assert!(p.executable.ends_with("Throne.exe"));
    }

    #[test]
    fn windows_without_appdata_is_unsupported() {
        let mut dirs = HostDirs::rooted(Path::new("/sandbox"));
        dirs.appdata = None;
        let err = PathResolver::new(dirs)
            .resolve(AppIdentity::Throne, Platform::Windows)
            .unwrap_err();
        assert!(matches!(err, SchemaError::HostDirUnavailable("APPDATA")));
    }

    #[test]
    fn missing_program_files_only_drops_extras() {
        let mut dirs = HostDirs::rooted(Path::new("/sandbox"));
        dirs.program_files = None;
        dirs.program_files_x86 = None;
        let p = PathResolver::new(dirs)
            .resolve(AppIdentity::NekoRay, Platform::Windows)
            .unwrap();
        assert_eq!(p.extra_locations.len(), 1);
    }

    #[test]
    fn extras_never_repeat_install_dir() {
        let r = resolver();
        for platform in [Platform::Linux, Platform::MacOs, Platform::Windows] {
            for app in AppIdentity::ALL {
                let p = r.resolve(app, platform).unwrap();
                assert!(!p.extra_locations.contains(&p.install_dir));
            }
        }
    }

    #[test]
    fn config_root_is_listed_for_removal() {
        let p = resolver()
            .resolve(AppIdentity::Throne, Platform::Linux)
            .unwrap();
        let root = p.config_dir.parent().unwrap().to_path_buf();
        assert!(p.extra_locations.contains(&root));
    }

    #[test]
    fn existing_remnants_reports_present_paths() {
        let dir = tempfile::tempdir().unwrap();
        let p = PathResolver::new(HostDirs::rooted(dir.path()))
            .resolve(AppIdentity::Throne, Platform::Linux)
            .unwrap();
        assert!(p.existing_remnants().is_empty());

        std::fs::create_dir_all(&p.install_dir).unwrap();
        let desktop = &p.extra_locations[1];
        std::fs::create_dir_all(desktop.parent().unwrap()).unwrap();
        std::fs::write(desktop, "[Desktop Entry]").unwrap();

        let remnants = p.existing_remnants();
        assert_eq!(remnants, vec![p.install_dir.clone(), desktop.clone()]);
    }

    #[test]
    fn enclosing_location_finds_config_root() {
        let dir = tempfile::tempdir().unwrap();
        let p = PathResolver::new(HostDirs::rooted(dir.path()))
            .resolve(AppIdentity::Throne, Platform::Linux)
            .unwrap();
        let backups = dir.path().join("home/user/.config/Throne/backups");
        std::fs::create_dir_all(&backups).unwrap();
        let archive = backups.join("throne-backup-2026-01-02.tar.gz");
        std::fs::write(&archive, "x").unwrap();

        assert_eq!(
            p.enclosing_location(&archive),
            Some(dir.path().join("home/user/.config/Throne").as_path())
        );
        assert_eq!(p.enclosing_location(&dir.path().join("home/user/backups")), None);
    }
}
