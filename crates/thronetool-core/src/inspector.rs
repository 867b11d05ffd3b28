use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use thronetool_schema::{AppIdentity, AppPaths, PathResolver, Platform};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallState {
    Absent,
    Installed,
    Broken,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallState::Absent => write!(f, "absent"),
            InstallState::Installed => write!(f, "installed"),
            InstallState::Broken => write!(f, "broken"),
        }
    }
}

/// Derive the install state from disk. Never cached.
pub fn probe(paths: &AppPaths) -> InstallState {
    if paths.install_dir.symlink_metadata().is_err() {
        return InstallState::Absent;
    }
    if readable_file(&paths.executable) && readable_dir(&paths.config_dir) {
        InstallState::Installed
    } else {
        InstallState::Broken
    }
}

fn readable_file(path: &Path) -> bool {
    path.is_file() && fs::File::open(path).is_ok()
}

fn readable_dir(path: &Path) -> bool {
    path.is_dir() && fs::read_dir(path).is_ok()
}

pub struct StateInspector {
    resolver: PathResolver,
    platform: Platform,
}

impl StateInspector {
    pub fn new(resolver: PathResolver, platform: Platform) -> Self {
        Self { resolver, platform }
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn paths(&self, app: AppIdentity) -> Result<AppPaths, CoreError> {
        Ok(self.resolver.resolve(app, self.platform)?)
    }

    pub fn inspect(&self, app: AppIdentity) -> Result<InstallState, CoreError> {
        let paths = self.paths(app)?;
        let state = probe(&paths);
        debug!("{app} on {}: {state}", self.platform);
        Ok(state)
    }
}
