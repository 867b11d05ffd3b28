use crate::adapter::{require_published, AdapterOutput, InstallTarget, PlatformAdapter};
use crate::command::{CommandSpec, Transcript};
use crate::release::{AssetKind, ReleaseClient};
use crate::RuntimeError;
use std::path::{Path, PathBuf};
use tracing::info;

/// Installs the Throne app bundle from the release zip.
pub struct MacOsAdapter {
    releases: ReleaseClient,
}

impl MacOsAdapter {
    pub fn new(releases: ReleaseClient) -> Self {
        Self { releases }
    }

    fn install_steps(&self, target: &InstallTarget, t: &mut Transcript) -> Result<(), RuntimeError> {
        self.check_install(target)?;
        let release = self.releases.latest()?;
        let asset = release.require(&AssetKind::mac_for_host())?;
        t.note(format!("release {}: {}", release.tag_name, asset.name));

        let tmp = tempfile::tempdir()?;
        let zip = self.releases.download(asset, tmp.path())?;
        let extracted = tmp.path().join("extracted");
        t.run(
            &CommandSpec::new("ditto")
                .args(["-x", "-k"])
                .arg(zip.to_string_lossy())
                .arg(extracted.to_string_lossy()),
        )?;

        let bundle_name = target
            .paths
            .install_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let bundle = find_bundle(&extracted, &bundle_name).ok_or_else(|| {
            RuntimeError::Release(format!("{bundle_name} not found in {}", asset.name))
        })?;
        info!("copying {} to {}", bundle.display(), target.paths.install_dir.display());
        t.run(
            &CommandSpec::new("ditto")
                .arg(bundle.to_string_lossy())
                .arg(target.paths.install_dir.to_string_lossy()),
        )
        .map_err(|e| {
            RuntimeError::CommandFailed {
                command: "copy app bundle".to_owned(),
                detail: format!("{e} (writing to /Applications may require sudo)"),
            }
        })?;
        Ok(())
    }

    fn remove_steps(target: &InstallTarget, t: &mut Transcript) -> Result<(), RuntimeError> {
        for path in target.paths.existing_remnants() {
            t.run(&CommandSpec::sudo("rm").arg("-rf").arg(path.to_string_lossy()))?;
        }
        Ok(())
    }
}

/// The bundle either sits at the top of the zip or in one wrapping directory.
fn find_bundle(root: &Path, bundle_name: &str) -> Option<PathBuf> {
    let direct = root.join(bundle_name);
    if direct.is_dir() {
        return Some(direct);
    }
    std::fs::read_dir(root)
        .ok()?
        .flatten()
        .map(|e| e.path().join(bundle_name))
        .find(|p| p.is_dir())
}

/// `CFBundleShortVersionString`, else `CFBundleVersion`, from an XML plist.
pub fn plist_version(plist: &str) -> Option<String> {
    ["CFBundleShortVersionString", "CFBundleVersion"]
        .iter()
        .find_map(|key| plist_string(plist, key))
}

fn plist_string(plist: &str, key: &str) -> Option<String> {
    let marker = format!("<key>{key}</key>");
    let rest = &plist[plist.find(&marker)? + marker.len()..];
    let rest = rest.trim_start().strip_prefix("<string>")?;
    let value = rest[..rest.find("</string>")?].trim();
    (!value.is_empty()).then(|| value.to_owned())
}

impl PlatformAdapter for MacOsAdapter {
    fn name(&self) -> &'static str {
        "macos"
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
        let plist = target.paths.install_dir.join("Contents").join("Info.plist");
        let content = std::fs::read_to_string(plist).ok()?;
        plist_version(&content)
    }
}
