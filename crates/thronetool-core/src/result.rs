use crate::inspector::InstallState;
use crate::CoreError;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thronetool_schema::{AppIdentity, Platform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Install,
    Remove,
    Backup,
    Restore,
    Reinstall,
    Inspect,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::Install => "install",
            Operation::Remove => "remove",
            Operation::Backup => "backup",
            Operation::Restore => "restore",
            Operation::Reinstall => "reinstall",
            Operation::Inspect => "inspect",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    UnsupportedPlatform,
    HotspotUnsupported,
    AlreadyBroken,
    PartialRemoval,
    NothingToBackup,
    ArchiveMismatch,
    SourceNotFound,
    ArchiveWrite,
    Extraction,
    PlatformAdapter,
    Interrupted,
    Config,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Outcome of one lifecycle operation, or of one reinstall phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationResult {
    pub operation: Operation,
    pub app: AppIdentity,
    pub success: bool,
    pub state_before: InstallState,
    pub state_after: InstallState,
    pub message: String,
    /// False when the host may be left half-modified and a retry alone is
    /// not enough.
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<PathBuf>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub diagnostics: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub phases: Vec<OperationResult>,
}

impl OperationResult {
    pub fn ok(
        operation: Operation,
        app: AppIdentity,
        state_before: InstallState,
        state_after: InstallState,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            app,
            success: true,
            state_before,
            state_after,
            message: message.into(),
            recoverable: true,
            error: None,
            archive: None,
            diagnostics: String::new(),
            phases: Vec::new(),
        }
    }

    pub fn failed(
        operation: Operation,
        app: AppIdentity,
        state_before: InstallState,
        state_after: InstallState,
        err: &CoreError,
    ) -> Self {
        Self {
            success: false,
            recoverable: err.is_recoverable(),
            error: Some(err.kind()),
            ..Self::ok(operation, app, state_before, state_after, err.to_string())
        }
    }

    #[must_use]
    pub fn with_archive(mut self, archive: PathBuf) -> Self {
        self.archive = Some(archive);
        self
    }

    #[must_use]
    pub fn with_diagnostics(mut self, diagnostics: String) -> Self {
        self.diagnostics = diagnostics;
        self
    }
}

/// Answer to `info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppInfo {
    pub app: AppIdentity,
    pub platform: Platform,
    pub state: InstallState,
    pub install_dir: PathBuf,
    pub config_dir: PathBuf,
    pub executable: PathBuf,
    pub version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_result_carries_kind_and_message() {
        let err = CoreError::PartialRemoval {
            app: AppIdentity::NekoRay,
            remnants: vec![PathBuf::from("/opt/nekoray")],
        };
        let r = OperationResult::failed(
            Operation::Remove,
            AppIdentity::NekoRay,
            InstallState::Installed,
            InstallState::Broken,
            &err,
        );
        assert!(!r.success);
        assert!(!r.recoverable);
        assert_eq!(r.error, Some(ErrorKind::PartialRemoval));
        assert!(r.message.contains("/opt/nekoray"));
    }

    #[test]
    fn json_omits_empty_fields() {
        let r = OperationResult::ok(
            Operation::Install,
            AppIdentity::Throne,
            InstallState::Absent,
            InstallState::Installed,
            "installed throne",
        );
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["operation"], "install");
        assert_eq!(json["state_after"], "installed");
        assert!(json.get("error").is_none());
        assert!(json.get("phases").is_none());
    }

    #[test]
    fn error_kind_displays_its_name() {
        assert_eq!(ErrorKind::ArchiveMismatch.to_string(), "ArchiveMismatch");
    }
}
