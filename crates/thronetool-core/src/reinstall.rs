use crate::inspector::{probe, InstallState};
use crate::orchestrator::Orchestrator;
use crate::result::{Operation, OperationResult};
use crate::CoreError;
use std::path::PathBuf;
use thronetool_schema::AppIdentity;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReinstallOptions {
    /// Archive the config first and restore it after the fresh install.
    pub backup: bool,
    /// Backup destination; see [`Orchestrator::backup`].
    pub output: Option<PathBuf>,
    /// Continue without a backup when the backup phase fails.
    pub force: bool,
}

/// Accumulates phase results and the archive path across a reinstall.
struct Pipeline {
    app: AppIdentity,
    before: InstallState,
    phases: Vec<OperationResult>,
    archive: Option<PathBuf>,
}

impl Pipeline {
    fn new(app: AppIdentity, before: InstallState) -> Self {
        Self {
            app,
            before,
            phases: Vec::new(),
            archive: None,
        }
    }

    fn record(&mut self, phase: OperationResult) {
        self.phases.push(phase);
    }

    fn archive_note(&self) -> Option<String> {
        let archive = self.archive.as_ref()?;
        Some(if archive.is_file() {
            format!("config archive kept at {}", archive.display())
        } else {
            format!("config archive {} is missing", archive.display())
        })
    }

    /// Stop at a failed phase. The archive, if any, is never deleted.
    fn abort(mut self, failed: OperationResult, recoverable: bool) -> OperationResult {
        let mut message = format!(
            "reinstall of {} stopped at {}: {}",
            self.app, failed.operation, failed.message
        );
        if let Some(note) = self.archive_note() {
            message.push('\n');
            message.push_str(&note);
        }
        let state_after = failed.state_after;
        let error = failed.error;
        self.record(failed);
        self.into_result(false, state_after, message, recoverable, error)
    }

    fn interrupted(
        self,
        phase: &'static str,
        state_after: InstallState,
        recoverable: bool,
    ) -> OperationResult {
        let err = CoreError::Interrupted(phase);
        warn!("reinstall of {}: {err}", self.app);
        let mut message = err.to_string();
        if let Some(note) = self.archive_note() {
            message.push_str("; ");
            message.push_str(&note);
        }
        self.into_result(false, state_after, message, recoverable, Some(err.kind()))
    }

    fn finish(self, state_after: InstallState) -> OperationResult {
        let message = match &self.archive {
            Some(archive) => format!(
                "reinstalled {} and restored config from {}",
                self.app,
                archive.display()
            ),
            None => format!("reinstalled {}", self.app),
        };
        self.into_result(true, state_after, message, true, None)
    }

    fn into_result(
        self,
        success: bool,
        state_after: InstallState,
        message: String,
        recoverable: bool,
        error: Option<crate::ErrorKind>,
    ) -> OperationResult {
        let mut result =
            OperationResult::ok(Operation::Reinstall, self.app, self.before, state_after, message);
        result.success = success;
        result.recoverable = recoverable;
        result.error = error;
        result.archive = self.archive;
        result.phases = self.phases;
        result
    }
}

impl Orchestrator {
    /// Inspect, optionally back up, remove, install, then restore the backup.
    ///
    /// Phases run strictly in order and the first failure stops the
    /// pipeline. Nothing is removed when the adapter already refuses the
    /// install, or when the archive would sit inside a location the remove
    /// phase deletes. A failed backup prevents any removal unless `force` is set,
    /// in which case the reinstall continues without restoring config. A
    /// Ctrl-C is honored between phases, never inside one.
    pub fn reinstall(
        &self,
        app: AppIdentity,
        opts: &ReinstallOptions,
    ) -> Result<OperationResult, CoreError> {
        let paths = self.inspector().paths(app)?;
        let before = probe(&paths);
        let mut run = Pipeline::new(app, before);
        info!("reinstalling {app} (currently {before})");
        run.record(OperationResult::ok(
            Operation::Inspect,
            app,
            before,
            before,
            format!("{app} is {before}"),
        ));

        if let Err(e) = self.check_install(app, &paths) {
            let refused = OperationResult::failed(Operation::Install, app, before, before, &e);
            return Ok(run.abort(refused, true));
        }

        if opts.backup {
            let backup = self.backup(app, opts.output.as_deref())?;
            if backup.success {
                run.archive.clone_from(&backup.archive);
                if let Some(archive) = backup.archive.clone() {
                    if let Some(location) = paths.enclosing_location(&archive) {
                        let err = CoreError::BackupInsideRemoval {
                            app,
                            location: location.to_path_buf(),
                            archive,
                        };
                        let failed =
                            OperationResult::failed(Operation::Backup, app, before, before, &err);
                        return Ok(run.abort(failed, true));
                    }
                }
                run.record(backup);
            } else if opts.force {
                warn!(
                    "backup of {app} failed, continuing without it: {}",
                    backup.message
                );
                run.record(backup);
            } else {
                return Ok(run.abort(backup, true));
            }
        }

        if self.interrupted() {
            return Ok(run.interrupted("remove", probe(&paths), true));
        }
        let removed = self.remove(app)?;
        if !removed.success {
            let recoverable = removed.recoverable;
            let mut result = run.abort(removed, recoverable);
            // A half-run removal is never trusted as intact.
            result.state_after = InstallState::Broken;
            return Ok(result);
        }
        run.record(removed);

        if self.interrupted() {
            return Ok(run.interrupted("install", probe(&paths), false));
        }
        let installed = self.install(app, opts.force)?;
        if !installed.success {
            return Ok(run.abort(installed, false));
        }
        run.record(installed);

        if let Some(archive) = run.archive.clone() {
            if self.interrupted() {
                return Ok(run.interrupted("restore", probe(&paths), true));
            }
            let restored = self.restore(app, &archive)?;
            if !restored.success {
                return Ok(run.abort(restored, true));
            }
            run.record(restored);
        }

        let after = probe(&paths);
        info!("reinstall of {app} finished ({after})");
        Ok(run.finish(after))
    }
}
