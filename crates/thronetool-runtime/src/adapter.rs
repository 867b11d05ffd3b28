use crate::RuntimeError;
use serde::Serialize;
use std::sync::Arc;
use thronetool_schema::{AppIdentity, AppPaths, Platform, ToolConfig};

/// What an adapter operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallTarget {
    pub app: AppIdentity,
    pub platform: Platform,
    pub paths: AppPaths,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdapterOutput {
    /// Captured command lines and their output, for display only.
    pub diagnostics: String,
}

/// Installs and removes an app by whatever means the host offers.
///
/// Both operations report failure through
/// [`RuntimeError::AdapterFailed`], which carries the captured diagnostic
/// text. Callers must not parse that text; the install state is re-probed
/// from disk after every call.
pub trait PlatformAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Refuse up front an install that is certain to fail. Runs before any
    /// destructive step of a reinstall.
    fn check_install(&self, _target: &InstallTarget) -> Result<(), RuntimeError> {
        Ok(())
    }

    fn install(&self, target: &InstallTarget) -> Result<AdapterOutput, RuntimeError>;

    fn remove(&self, target: &InstallTarget) -> Result<AdapterOutput, RuntimeError>;

    fn installed_version(&self, _target: &InstallTarget) -> Option<String> {
        None
    }
}

impl<T: PlatformAdapter + ?Sized> PlatformAdapter for Arc<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn check_install(&self, target: &InstallTarget) -> Result<(), RuntimeError> {
        (**self).check_install(target)
    }

    fn install(&self, target: &InstallTarget) -> Result<AdapterOutput, RuntimeError> {
        (**self).install(target)
    }

    fn remove(&self, target: &InstallTarget) -> Result<AdapterOutput, RuntimeError> {
        (**self).remove(target)
    }

    fn installed_version(&self, target: &InstallTarget) -> Option<String> {
        (**self).installed_version(target)
    }
}

/// Native adapters can only install apps that still publish releases.
pub(crate) fn require_published(target: &InstallTarget) -> Result<(), RuntimeError> {
    if target.app.has_upstream_releases() {
        Ok(())
    } else {
        Err(RuntimeError::NotPublished(target.app))
    }
}

/// `system` picks the native adapter for `platform`, `mock` the
/// filesystem-only adapter used by tests.
pub fn select_adapter(
    name: &str,
    platform: Platform,
    config: &ToolConfig,
) -> Result<Box<dyn PlatformAdapter>, RuntimeError> {
    match name {
        "system" => {
            let releases = crate::release::ReleaseClient::from_config(config);
            Ok(match platform {
                Platform::Linux => Box::new(crate::linux::LinuxAdapter::new(releases)),
                Platform::MacOs => Box::new(crate::macos::MacOsAdapter::new(releases)),
                Platform::Windows => Box::new(crate::windows::WindowsAdapter::new(releases)),
            })
        }
        "mock" => Ok(Box::new(crate::mock::MockAdapter::from_env())),
        other => Err(RuntimeError::AdapterUnavailable(other.to_owned())),
    }
}
