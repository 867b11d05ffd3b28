use crate::adapter::{require_published, AdapterOutput, InstallTarget, PlatformAdapter};
use crate::command::{CommandSpec, Transcript};
use crate::release::{AssetKind, ReleaseClient};
use crate::RuntimeError;
use std::path::PathBuf;
use tracing::info;

/// Runs the upstream installer and the app's own uninstaller.
pub struct WindowsAdapter {
    releases: ReleaseClient,
}

/// Uninstallers the app may have left, in the order they are tried.
pub fn uninstaller_candidates(target: &InstallTarget) -> Vec<PathBuf> {
    let exe = format!("Uninstall {}.exe", target.app.display_name());
    std::iter::once(&target.paths.install_dir)
        .chain(&target.paths.extra_locations)
        .map(|dir| dir.join(&exe))
        .collect()
}

/// PowerShell one-liner printing a file's product version.
pub fn version_query(exe: &std::path::Path) -> CommandSpec {
    let escaped = exe.to_string_lossy().replace('\'', "''");
    CommandSpec::new("powershell").args([
        "-NoProfile".to_owned(),
        "-Command".to_owned(),
        format!("(Get-Item '{escaped}').VersionInfo.ProductVersion"),
    ])
}

impl WindowsAdapter {
    pub fn new(releases: ReleaseClient) -> Self {
        Self { releases }
    }

    fn install_steps(&self, target: &InstallTarget, t: &mut Transcript) -> Result<(), RuntimeError> {
        self.check_install(target)?;
        let release = self.releases.latest()?;
        let asset = release.require(&AssetKind::WindowsInstaller)?;
        t.note(format!("release {}: {}", release.tag_name, asset.name));

        let tmp = tempfile::tempdir()?;
        let installer = self.releases.download(asset, tmp.path())?;
        info!("running installer {}", asset.name);
        t.run(&CommandSpec::new(installer.to_string_lossy()))?;
        Ok(())
    }

    fn remove_steps(target: &InstallTarget, t: &mut Transcript) -> Result<(), RuntimeError> {
        let uninstaller = uninstaller_candidates(target)
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| RuntimeError::CommandFailed {
                command: "uninstall".to_owned(),
                detail: format!("no uninstaller found for {}", target.app.display_name()),
            })?;
        info!("running uninstaller {}", uninstaller.display());
        t.run(&CommandSpec::new(uninstaller.to_string_lossy()))?;
        Ok(())
    }
}

impl PlatformAdapter for WindowsAdapter {
    fn name(&self) -> &'static str {
        "windows"
    }

    fn check_install(&self, target: &InstallTarget) -> Result<(), RuntimeError> {
        require_published(target)
    }

    fn install(&self, target: &InstallTarget) -> Result<AdapterOutput, RuntimeError> {
        let mut t = Transcript::default();
        let outcome = self.install_steps(target, &mut t);
        t.finish("install", target.app, outcome)
    }

    fn remove(&self, target: &InstallTarget) -> Result<AdapterOutput, RuntimeError> {
        let mut t = Transcript::default();
        let outcome = Self::remove_steps(target, &mut t);
        t.finish("remove", target.app, outcome)
    }

    fn installed_version(&self, target: &InstallTarget) -> Option<String> {
        if !target.paths.executable.is_file() {
            return None;
        }
        let out = version_query(&target.paths.executable).capture()?;
        let version = out.trim();
        (!version.is_empty()).then(|| version.to_owned())
    }
}
