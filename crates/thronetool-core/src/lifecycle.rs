use crate::inspector::InstallState;
use crate::result::Operation;
use crate::CoreError;
use thronetool_schema::AppIdentity;

/// What an allowed operation has to do from the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Proceed,
    /// Target state already holds; succeed without side effects.
    AlreadySatisfied,
    /// Broken install that `--force` allows to be cleared first.
    ReplaceBroken,
}

pub fn validate(
    operation: Operation,
    state: InstallState,
    app: AppIdentity,
    force: bool,
) -> Result<Transition, CoreError> {
    use InstallState::{Absent, Broken, Installed};
    match (operation, state) {
        (Operation::Install, Absent)
        | (Operation::Remove, Installed | Broken)
        | (Operation::Backup | Operation::Restore, Installed | Broken)
        | (Operation::Reinstall | Operation::Inspect, _) => Ok(Transition::Proceed),
        (Operation::Install, Installed) | (Operation::Remove, Absent) => {
            Ok(Transition::AlreadySatisfied)
        }
        (Operation::Install, Broken) if force => Ok(Transition::ReplaceBroken),
        (Operation::Install, Broken) => Err(CoreError::AlreadyBroken { app }),
        (Operation::Backup, Absent) => Err(CoreError::NothingToBackup { app }),
        (Operation::Restore, Absent) => Err(CoreError::NotInstalled {
            app,
            operation: "restore",
        }),
    }
}
