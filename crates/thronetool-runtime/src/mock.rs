use crate::adapter::{AdapterOutput, InstallTarget, PlatformAdapter};
use crate::RuntimeError;
use std::sync::Mutex;
use thronetool_schema::AppIdentity;

/// Comma-separated failure modes for the mock adapter:
/// `install`, `remove`, `remnants`.
pub const MOCK_FAIL_ENV: &str = "THRONETOOL_MOCK_FAIL";
pub const MOCK_VERSION: &str = "0.0.0-mock";
const VERSION_FILE: &str = ".mock-version";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterCall {
    Install(AppIdentity),
    Remove(AppIdentity),
}

#[derive(Debug, Default)]
struct Behavior {
    fail_install: bool,
    fail_remove: bool,
    leave_remnants: bool,
}

/// Adapter that installs by creating files under the resolved paths and
/// records every call.
#[derive(Debug, Default)]
pub struct MockAdapter {
    behavior: Behavior,
    calls: Mutex<Vec<AdapterCall>>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Failure modes taken from `THRONETOOL_MOCK_FAIL`.
    pub fn from_env() -> Self {
        let modes = std::env::var(MOCK_FAIL_ENV).unwrap_or_default();
        let mut adapter = Self::new();
        for mode in modes.split(',').map(str::trim) {
            match mode {
                "install" => adapter.behavior.fail_install = true,
                "remove" => adapter.behavior.fail_remove = true,
                "remnants" => adapter.behavior.leave_remnants = true,
                _ => {}
            }
        }
        adapter
    }

    /// Install creates the install dir, then fails.
    #[must_use]
    pub fn failing_install(mut self) -> Self {
        self.behavior.fail_install = true;
        self
    }

    #[must_use]
    pub fn failing_remove(mut self) -> Self {
        self.behavior.fail_remove = true;
        self
    }

    /// Remove reports success but only deletes the executable.
    #[must_use]
    pub fn leaving_remnants(mut self) -> Self {
        self.behavior.leave_remnants = true;
        self
    }

    pub fn calls(&self) -> Vec<AdapterCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: AdapterCall) -> Result<(), RuntimeError> {
        self.calls
            .lock()
            .map_err(|e| RuntimeError::CommandFailed {
                command: "mock".to_owned(),
                detail: format!("mutex poisoned: {e}"),
            })?
            .push(call);
        Ok(())
    }
}

impl PlatformAdapter for MockAdapter {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn install(&self, target: &InstallTarget) -> Result<AdapterOutput, RuntimeError> {
        self.record(AdapterCall::Install(target.app))?;
        let paths = &target.paths;
        std::fs::create_dir_all(&paths.install_dir)?;
        if self.behavior.fail_install {
            return Err(RuntimeError::AdapterFailed {
                operation: "install",
                app: target.app,
                diagnostics: "mock: simulated install failure".to_owned(),
            });
        }
        if let Some(parent) = paths.executable.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&paths.executable, format!("mock-exe:{}", target.app))?;
        std::fs::write(paths.install_dir.join(VERSION_FILE), MOCK_VERSION)?;
        Ok(AdapterOutput {
            diagnostics: format!("mock: installed {} into {}", target.app, paths.install_dir.display()),
        })
    }

    fn remove(&self, target: &InstallTarget) -> Result<AdapterOutput, RuntimeError> {
        self.record(AdapterCall::Remove(target.app))?;
        if self.behavior.fail_remove {
            return Err(RuntimeError::AdapterFailed {
                operation: "remove",
                app: target.app,
                diagnostics: "mock: simulated remove failure".to_owned(),
            });
        }
        if self.behavior.leave_remnants {
            if target.paths.executable.is_file() {
                std::fs::remove_file(&target.paths.executable)?;
            }
            return Ok(AdapterOutput {
                diagnostics: "mock: removed executable only".to_owned(),
            });
        }
        for path in target.paths.existing_remnants() {
            if path.symlink_metadata()?.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
        }
        Ok(AdapterOutput {
            diagnostics: format!("mock: removed {}", target.app),
        })
    }

    fn installed_version(&self, target: &InstallTarget) -> Option<String> {
        std::fs::read_to_string(target.paths.install_dir.join(VERSION_FILE)).ok()
    }
}
