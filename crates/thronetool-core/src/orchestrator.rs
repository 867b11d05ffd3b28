use crate::inspector::{probe, InstallState, StateInspector};
use crate::lifecycle::{validate, Transition};
use crate::result::{AppInfo, Operation, OperationResult};
use crate::signal::shutdown_requested;
use crate::CoreError;
use std::fs;
use std::path::{Path, PathBuf};
use thronetool_runtime::{select_adapter, InstallTarget, PlatformAdapter};
use thronetool_schema::{AppIdentity, AppPaths, PathResolver, Platform, ToolConfig};
use tracing::{debug, info, warn};

/// Drives lifecycle operations for one host.
///
/// Every operation re-probes the install state from disk before acting and
/// again afterwards, so the reported `state_after` is always what is actually
/// on disk. Operation failures come back as an unsuccessful
/// [`OperationResult`]; `Err` is reserved for failing to resolve paths at all.
pub struct Orchestrator {
    inspector: StateInspector,
    adapter: Box<dyn PlatformAdapter>,
    backup_dir: Option<PathBuf>,
    interrupted: fn() -> bool,
}

impl Orchestrator {
    pub fn new(inspector: StateInspector, adapter: Box<dyn PlatformAdapter>) -> Self {
        Self {
            inspector,
            adapter,
            backup_dir: None,
            interrupted: shutdown_requested,
        }
    }

    /// Orchestrator for the running host, with the adapter picked by name.
    pub fn from_config(config: &ToolConfig, adapter_name: &str) -> Result<Self, CoreError> {
        let platform = Platform::current()?;
        let resolver = PathResolver::from_env()?;
        let adapter = select_adapter(adapter_name, platform, config)?;
        debug!("using {} adapter on {platform}", adapter.name());
        Ok(Self::new(StateInspector::new(resolver, platform), adapter)
            .with_backup_dir(config.backup_dir.clone()))
    }

    /// Default destination for backups without an explicit output path.
    #[must_use]
    pub fn with_backup_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.backup_dir = dir;
        self
    }

    /// Replace the Ctrl-C check consulted between reinstall phases.
    #[must_use]
    pub fn with_interrupt_check(mut self, check: fn() -> bool) -> Self {
        self.interrupted = check;
        self
    }

    pub fn inspector(&self) -> &StateInspector {
        &self.inspector
    }

    pub(crate) fn interrupted(&self) -> bool {
        (self.interrupted)()
    }

    fn target(&self, app: AppIdentity, paths: AppPaths) -> InstallTarget {
        InstallTarget {
            app,
            platform: self.inspector.platform(),
            paths,
        }
    }

    /// Ask the adapter whether installing `app` can succeed at all.
    pub(crate) fn check_install(
        &self,
        app: AppIdentity,
        paths: &AppPaths,
    ) -> Result<(), CoreError> {
        self.adapter.check_install(&self.target(app, paths.clone()))?;
        Ok(())
    }

    /// The other supported apps that are present on this host.
    fn other_installs(&self, app: AppIdentity) -> Vec<(AppIdentity, InstallState)> {
        AppIdentity::ALL
            .into_iter()
            .filter(|other| *other != app)
            .filter_map(|other| {
                let state = probe(&self.inspector.paths(other).ok()?);
                (state != InstallState::Absent).then_some((other, state))
            })
            .collect()
    }

    pub fn install(&self, app: AppIdentity, force: bool) -> Result<OperationResult, CoreError> {
        let paths = self.inspector.paths(app)?;
        let before = probe(&paths);
        let op = Operation::Install;

        let transition = match validate(op, before, app, force) {
            Ok(t) => t,
            Err(e) => return Ok(fail(op, app, before, &paths, &e)),
        };
        if transition == Transition::AlreadySatisfied {
            info!("{app} is already installed");
            return Ok(OperationResult::ok(
                op,
                app,
                before,
                before,
                format!("{app} is already installed"),
            ));
        }
        if let Err(e) = self.check_install(app, &paths) {
            return Ok(fail(op, app, before, &paths, &e));
        }
        if transition == Transition::ReplaceBroken {
            warn!(
                "clearing broken install of {app} at {}",
                paths.install_dir.display()
            );
            if let Err(e) = fs::remove_dir_all(&paths.install_dir) {
                return Ok(fail(op, app, before, &paths, &e.into()));
            }
        }

        info!("installing {app} with the {} adapter", self.adapter.name());
        let target = self.target(app, paths.clone());
        match self.adapter.install(&target) {
            Ok(output) => {
                if let Err(e) = fs::create_dir_all(&paths.config_dir) {
                    return Ok(fail(op, app, before, &paths, &e.into())
                        .with_diagnostics(output.diagnostics));
                }
                let after = probe(&paths);
                if after != InstallState::Installed {
                    let err = CoreError::InstallIncomplete { app, state: after };
                    return Ok(fail(op, app, before, &paths, &err)
                        .with_diagnostics(output.diagnostics));
                }
                let mut message = format!("installed {app}");
                for (other, state) in self.other_installs(app) {
                    warn!("{other} is also {state} on this host");
                    message.push_str(&format!(" ({other} is also {state})"));
                }
                Ok(OperationResult::ok(op, app, before, after, message)
                    .with_diagnostics(output.diagnostics))
            }
            Err(e) => {
                // Nothing existed before this call, so anything there now is ours.
                if paths.install_dir.exists() {
                    debug!("cleaning up {}", paths.install_dir.display());
                    if let Err(cleanup) = fs::remove_dir_all(&paths.install_dir) {
                        warn!(
                            "failed to clean up {}: {cleanup}",
                            paths.install_dir.display()
                        );
                    }
                }
                Ok(fail(op, app, before, &paths, &e.into()))
            }
        }
    }

    pub fn remove(&self, app: AppIdentity) -> Result<OperationResult, CoreError> {
        let paths = self.inspector.paths(app)?;
        let before = probe(&paths);
        let op = Operation::Remove;

        match validate(op, before, app, false) {
            Ok(Transition::AlreadySatisfied) => {
                return Ok(OperationResult::ok(
                    op,
                    app,
                    before,
                    before,
                    format!("{app} is not installed; nothing to remove"),
                ));
            }
            Ok(_) => {}
            Err(e) => return Ok(fail(op, app, before, &paths, &e)),
        }

        info!("removing {app} with the {} adapter", self.adapter.name());
        let target = self.target(app, paths.clone());
        let output = match self.adapter.remove(&target) {
            Ok(output) => output,
            Err(e) => return Ok(fail(op, app, before, &paths, &e.into())),
        };

        let after = probe(&paths);
        if after != InstallState::Absent {
            let err = CoreError::PartialRemoval {
                app,
                remnants: paths.existing_remnants(),
            };
            return Ok(fail(op, app, before, &paths, &err).with_diagnostics(output.diagnostics));
        }
        for leftover in paths.existing_remnants() {
            warn!("{} is still present after removal", leftover.display());
        }
        Ok(
            OperationResult::ok(op, app, before, after, format!("removed {app}"))
                .with_diagnostics(output.diagnostics),
        )
    }

    /// Archive the app's config directory.
    ///
    /// `output` may name a directory or a new file; without it the configured
    /// backup directory is used, then the current directory.
    pub fn backup(
        &self,
        app: AppIdentity,
        output: Option<&Path>,
    ) -> Result<OperationResult, CoreError> {
        let paths = self.inspector.paths(app)?;
        let before = probe(&paths);
        let op = Operation::Backup;

        if let Err(e) = validate(op, before, app, false) {
            return Ok(fail(op, app, before, &paths, &e));
        }
        let destination = match output.map(Path::to_path_buf).or_else(|| self.backup_dir.clone())
        {
            Some(d) => d,
            None => match std::env::current_dir() {
                Ok(d) => d,
                Err(e) => return Ok(fail(op, app, before, &paths, &e.into())),
            },
        };

        info!(
            "backing up {} to {}",
            paths.config_dir.display(),
            destination.display()
        );
        match thronetool_store::pack(&paths.config_dir, &destination, app) {
            Ok(archive) => Ok(OperationResult::ok(
                op,
                app,
                before,
                probe(&paths),
                format!("backed up {app} config to {}", archive.display()),
            )
            .with_archive(archive)),
            Err(e) => Ok(fail(op, app, before, &paths, &e.into())),
        }
    }

    /// Replace the app's config directory with the contents of `archive`.
    pub fn restore(&self, app: AppIdentity, archive: &Path) -> Result<OperationResult, CoreError> {
        let paths = self.inspector.paths(app)?;
        let before = probe(&paths);
        let op = Operation::Restore;

        if let Err(e) = validate(op, before, app, false) {
            return Ok(fail(op, app, before, &paths, &e));
        }

        info!(
            "restoring {} from {}",
            paths.config_dir.display(),
            archive.display()
        );
        match thronetool_store::unpack(archive, &paths.config_dir, app) {
            Ok(snapshot) => Ok(OperationResult::ok(
                op,
                app,
                before,
                probe(&paths),
                format!(
                    "restored {} files into {}",
                    snapshot.file_count(),
                    paths.config_dir.display()
                ),
            )
            .with_archive(archive.to_path_buf())),
            Err(e) => Ok(fail(op, app, before, &paths, &e.into())),
        }
    }

    pub fn info(&self, app: AppIdentity) -> Result<AppInfo, CoreError> {
        let paths = self.inspector.paths(app)?;
        let state = probe(&paths);
        let version = if state == InstallState::Absent {
            None
        } else {
            self.adapter
                .installed_version(&self.target(app, paths.clone()))
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty())
        };
        Ok(AppInfo {
            app,
            platform: self.inspector.platform(),
            state,
            install_dir: paths.install_dir,
            config_dir: paths.config_dir,
            executable: paths.executable,
            version,
        })
    }
}

/// Failed result with `state_after` re-probed from disk.
fn fail(
    op: Operation,
    app: AppIdentity,
    before: InstallState,
    paths: &AppPaths,
    err: &CoreError,
) -> OperationResult {
    debug!("{op} of {app} failed: {err}");
    OperationResult::failed(op, app, before, probe(paths), err)
}
