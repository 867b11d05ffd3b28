use crate::adapter::{require_published, AdapterOutput, InstallTarget, PlatformAdapter};
use crate::command::{command_exists, CommandSpec, Transcript};
use crate::release::{AssetKind, ReleaseClient};
use crate::RuntimeError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const OS_RELEASE: &str = "/etc/os-release";

const DEBIAN_IDS: &[&str] = &["ubuntu", "debian", "linuxmint", "pop"];
const REDHAT_IDS: &[&str] = &["fedora", "rhel", "centos", "rocky", "almalinux"];

/// Package family of the running distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageFamily {
    Debian,
    RedHat,
}

impl PackageFamily {
    pub fn manager(self) -> &'static str {
        match self {
            PackageFamily::Debian => "dpkg",
            PackageFamily::RedHat => "rpm",
        }
    }

    pub fn asset(self) -> AssetKind {
        match self {
            PackageFamily::Debian => AssetKind::Deb,
            PackageFamily::RedHat => AssetKind::Rpm,
        }
    }

    pub fn install_cmd(self, package: &Path) -> CommandSpec {
        CommandSpec::sudo(self.manager())
            .arg("-i")
            .arg(package.to_string_lossy())
    }

    /// Dependency fix-up after a failed low-level install.
    pub fn fix_cmd(self, package: &Path) -> CommandSpec {
        match self {
            PackageFamily::Debian => CommandSpec::sudo("apt-get").args(["install", "-f", "-y"]),
            PackageFamily::RedHat => CommandSpec::sudo("dnf")
                .args(["install", "-y"])
                .arg(package.to_string_lossy()),
        }
    }

    pub fn remove_cmd(self, package: &str) -> CommandSpec {
        match self {
            PackageFamily::Debian => CommandSpec::sudo("dpkg").args(["-r", package]),
            PackageFamily::RedHat => CommandSpec::sudo("rpm").args(["-e", package]),
        }
    }

    pub fn query_cmd(self, package: &str) -> CommandSpec {
        match self {
            PackageFamily::Debian => CommandSpec::new("dpkg").args(["-s", package]),
            PackageFamily::RedHat => {
                CommandSpec::new("rpm").args(["-q", "--qf", "%{VERSION}-%{RELEASE}", package])
            }
        }
    }

    pub fn parse_version(self, query_output: &str) -> Option<String> {
        let version = match self {
            PackageFamily::Debian => query_output
                .lines()
                .find_map(|l| l.strip_prefix("Version:"))
                .map(str::trim)?,
            PackageFamily::RedHat => query_output.trim(),
        };
        (!version.is_empty()).then(|| version.to_owned())
    }
}

pub fn parse_os_release(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .filter(|l| !l.trim_start().starts_with('#'))
        .filter_map(|l| l.split_once('='))
        .map(|(k, v)| {
            (
                k.trim().to_owned(),
                v.trim().trim_matches(|c| c == '"' || c == '\'').to_owned(),
            )
        })
        .collect()
}

/// `ID` first, then each `ID_LIKE` entry.
pub fn detect_family(os_release: &HashMap<String, String>) -> Result<PackageFamily, RuntimeError> {
    let id = os_release
        .get("ID")
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();
    let like = os_release
        .get("ID_LIKE")
        .map(|s| s.to_ascii_lowercase())
        .unwrap_or_default();
    std::iter::once(id.as_str())
        .chain(like.split_whitespace())
        .find_map(|candidate| {
            if DEBIAN_IDS.contains(&candidate) {
                Some(PackageFamily::Debian)
            } else if REDHAT_IDS.contains(&candidate) {
                Some(PackageFamily::RedHat)
            } else {
                None
            }
        })
        .ok_or_else(|| {
            RuntimeError::UnsupportedDistribution(if id.is_empty() {
                "unknown (no ID in os-release)".to_owned()
            } else {
                id.clone()
            })
        })
}

/// Paths that `remove` deletes after the package itself is gone.
pub fn removal_plan(target: &InstallTarget) -> Vec<CommandSpec> {
    target
        .paths
        .existing_remnants()
        .into_iter()
        .map(|p| CommandSpec::sudo("rm").arg("-rf").arg(p.to_string_lossy()))
        .collect()
}

/// Installs the Throne `.deb`/`.rpm` from the latest release.
pub struct LinuxAdapter {
    releases: ReleaseClient,
    os_release: PathBuf,
}

impl LinuxAdapter {
    pub fn new(releases: ReleaseClient) -> Self {
        Self {
            releases,
            os_release: PathBuf::from(OS_RELEASE),
        }
    }

    pub fn family(&self) -> Result<PackageFamily, RuntimeError> {
        let content = std::fs::read_to_string(&self.os_release).map_err(|e| {
            RuntimeError::UnsupportedDistribution(format!(
                "cannot read {}: {e}",
                self.os_release.display()
            ))
        })?;
        detect_family(&parse_os_release(&content))
    }

    fn install_steps(&self, target: &InstallTarget, t: &mut Transcript) -> Result<(), RuntimeError> {
        self.check_install(target)?;
        let family = self.family()?;
        if !command_exists(family.manager()) {
            return Err(RuntimeError::MissingPrereqs(format!(
                "{} is not installed",
                family.manager()
            )));
        }

        let release = self.releases.latest()?;
        let asset = release.require(&family.asset())?;
        t.note(format!("release {}: {}", release.tag_name, asset.name));

        let tmp = tempfile::tempdir()?;
        let package = self.releases.download(asset, tmp.path())?;
        info!("installing {}", asset.name);
        if let Err(e) = t.run(&family.install_cmd(&package)) {
            t.note(format!("{e}; fixing dependencies"));
            t.run(&family.fix_cmd(&package))?;
        }
        Ok(())
    }

    fn remove_steps(&self, target: &InstallTarget, t: &mut Transcript) -> Result<(), RuntimeError> {
        let package = target.app.slug();
        for family in [PackageFamily::Debian, PackageFamily::RedHat] {
            if command_exists(family.manager()) && family.query_cmd(package).capture().is_some() {
                t.note(format!("removing {package} {} package", family.manager()));
                t.run(&family.remove_cmd(package).allow_failure())?;
            }
        }
        for cmd in removal_plan(target) {
            t.run(&cmd)?;
        }
        Ok(())
    }
}

impl PlatformAdapter for LinuxAdapter {
    fn name(&self) -> &'static str {
        "linux"
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
        let outcome = self.remove_steps(target, &mut t);
        t.finish("remove", target.app, outcome)
    }

    fn installed_version(&self, target: &InstallTarget) -> Option<String> {
        let package = target.app.slug();
        [PackageFamily::Debian, PackageFamily::RedHat]
            .into_iter()
            .filter(|f| command_exists(f.manager()))
            .find_map(|f| {
                let out = f.query_cmd(package).capture()?;
                debug!("{} reports {package} installed", f.manager());
                f.parse_version(&out)
            })
    }
}
