pub mod backup;
pub mod completions;
pub mod doctor;
pub mod hotspot;
pub mod info;
pub mod install;
pub mod man_pages;
pub mod reinstall;
pub mod remove;
pub mod restore;

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use thronetool_core::{CoreError, ErrorKind, InstallState, OperationResult, Orchestrator};
use thronetool_schema::ToolConfig;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_STATE_ERROR: u8 = 2;
pub const EXIT_ARCHIVE_ERROR: u8 = 3;
pub const EXIT_PLATFORM_ERROR: u8 = 4;

/// Settings shared by every lifecycle command.
pub struct Context {
    pub config: ToolConfig,
    pub adapter: String,
    pub json: bool,
}

impl Context {
    pub fn orchestrator(&self) -> Result<Orchestrator, CoreError> {
        Orchestrator::from_config(&self.config, &self.adapter)
    }

    /// Build the orchestrator, run one operation and report it.
    pub fn run_operation(
        &self,
        progress: &str,
        op: impl FnOnce(&Orchestrator) -> Result<OperationResult, CoreError>,
    ) -> Result<u8, String> {
        let orch = match self.orchestrator() {
            Ok(orch) => orch,
            Err(e) => return report_error(&e, self.json),
        };
        match with_spinner(self.json, progress, || op(&orch)) {
            Ok(result) => report(&result, self.json),
            Err(e) => report_error(&e, self.json),
        }
    }
}

pub fn exit_code_for(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::AlreadyBroken | ErrorKind::NothingToBackup | ErrorKind::PartialRemoval => {
            EXIT_STATE_ERROR
        }
        ErrorKind::SourceNotFound
        | ErrorKind::ArchiveWrite
        | ErrorKind::ArchiveMismatch
        | ErrorKind::Extraction => EXIT_ARCHIVE_ERROR,
        ErrorKind::UnsupportedPlatform
        | ErrorKind::HotspotUnsupported
        | ErrorKind::PlatformAdapter => EXIT_PLATFORM_ERROR,
        ErrorKind::Interrupted | ErrorKind::Config | ErrorKind::Io => EXIT_FAILURE,
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

/// Run `op` behind a spinner unless JSON output is requested.
pub fn with_spinner(
    json: bool,
    msg: &str,
    op: impl FnOnce() -> Result<OperationResult, CoreError>,
) -> Result<OperationResult, CoreError> {
    if json {
        return op();
    }
    let pb = spinner(msg);
    let result = op();
    match &result {
        Ok(r) if r.success => spin_ok(&pb, &format!("{} {}", r.operation, r.app)),
        Ok(r) => spin_fail(&pb, &format!("{} {} failed", r.operation, r.app)),
        Err(_) => spin_fail(&pb, msg),
    }
    result
}

pub fn colorize_state(state: InstallState) -> String {
    use console::Style;
    let text = state.to_string();
    match state {
        InstallState::Installed => Style::new().green().apply_to(text).to_string(),
        InstallState::Broken => Style::new().red().bold().apply_to(text).to_string(),
        InstallState::Absent => Style::new().dim().apply_to(text).to_string(),
    }
}

/// Print an operation result and return its exit code.
pub fn report(result: &OperationResult, json: bool) -> Result<u8, String> {
    if json {
        println!("{}", json_pretty(result)?);
    } else {
        for phase in &result.phases {
            let icon = if phase.success { "✓" } else { "✗" };
            println!("  {icon} {}: {}", phase.operation, phase.message);
        }
        if result.success {
            println!("{}", result.message);
        } else {
            eprintln!("error: {}", result.message);
            if !result.diagnostics.is_empty() && !result.message.contains(&result.diagnostics) {
                eprintln!("{}", result.diagnostics);
            }
            if !result.recoverable {
                eprintln!(
                    "warning: {} may need manual cleanup before retrying",
                    result.app
                );
            }
        }
        tracing::debug!("state {} -> {}", result.state_before, result.state_after);
    }
    Ok(result.error.map_or(EXIT_SUCCESS, exit_code_for))
}

/// Print an error that stopped a command before it produced a result.
pub fn report_error(err: &CoreError, json: bool) -> Result<u8, String> {
    let kind = err.kind();
    if json {
        let payload = serde_json::json!({
            "success": false,
            "error": kind,
            "message": err.to_string(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        eprintln!("error: {err}");
    }
    Ok(exit_code_for(kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use thronetool_core::Operation;
    use thronetool_schema::AppIdentity;

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_FAILURE,
            EXIT_STATE_ERROR,
            EXIT_ARCHIVE_ERROR,
            EXIT_PLATFORM_ERROR,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn error_kinds_map_to_exit_classes() {
        assert_eq!(exit_code_for(ErrorKind::PartialRemoval), EXIT_STATE_ERROR);
        assert_eq!(exit_code_for(ErrorKind::NothingToBackup), EXIT_STATE_ERROR);
        assert_eq!(exit_code_for(ErrorKind::ArchiveMismatch), EXIT_ARCHIVE_ERROR);
        assert_eq!(exit_code_for(ErrorKind::Extraction), EXIT_ARCHIVE_ERROR);
        assert_eq!(exit_code_for(ErrorKind::HotspotUnsupported), EXIT_PLATFORM_ERROR);
        assert_eq!(exit_code_for(ErrorKind::Interrupted), EXIT_FAILURE);
    }

    #[test]
    fn report_uses_error_kind() {
        let ok = OperationResult::ok(
            Operation::Install,
            AppIdentity::Throne,
            InstallState::Absent,
            InstallState::Installed,
            "installed throne",
        );
        assert_eq!(report(&ok, true).unwrap(), EXIT_SUCCESS);

        let err = CoreError::AlreadyBroken {
            app: AppIdentity::Throne,
        };
        let failed = OperationResult::failed(
            Operation::Install,
            AppIdentity::Throne,
            InstallState::Broken,
            InstallState::Broken,
            &err,
        );
        assert_eq!(report(&failed, true).unwrap(), EXIT_STATE_ERROR);
    }

    #[test]
    fn colorize_state_keeps_text() {
        assert!(colorize_state(InstallState::Installed).contains("installed"));
        assert!(colorize_state(InstallState::Broken).contains("broken"));
    }

    #[test]
    fn spinner_finishes() {
        let pb = spinner("testing...");
        spin_ok(&pb, "done");
        let pb = spinner("testing...");
        spin_fail(&pb, "failed");
    }
}
