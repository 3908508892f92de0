//! Action execution.
//!
//! The executor is the only stage whose behavior depends on the dry-run
//! flag. Actions run strictly sequentially, in plan order. A failing action
//! does not abort the run: it is logged, recorded in the outcome, and the
//! remaining independent actions still execute. The caller decides exit
//! status from the outcome.

use log::{error, info};

use crate::plan::{Action, RunReport};
use crate::registry::{Package, Registry, RegistryError};

/// What happened during the execution phase.
#[derive(Debug, Default)]
pub struct ExecutionOutcome {
    /// Number of actions that were executed against the registry.
    pub executed: usize,
    /// Actions that failed, with the error each one produced.
    pub failures: Vec<(Action, RegistryError)>,
}

impl ExecutionOutcome {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Apply every planned action through the registry, unless this is a dry run.
pub async fn execute<R: Registry>(
    registry: &R,
    package: &Package,
    report: &RunReport,
) -> ExecutionOutcome {
    let mut outcome = ExecutionOutcome::default();

    if report.dry_run {
        info!(
            "dry run: skipping execution of {} planned action(s)",
            report.actions.len()
        );
        return outcome;
    }

    for action in &report.actions {
        info!("executing: {action}");
        let result = match action {
            Action::DeleteSignature { version_id, .. } => {
                registry.delete_package_version(package, *version_id).await
            }
            Action::AssignTag { digest, new_tag } => {
                registry.tag_manifest(package, digest, new_tag).await
            }
        };
        match result {
            Ok(()) => outcome.executed += 1,
            Err(err) => {
                error!("failed to {action}: {err}");
                outcome.failures.push((action.clone(), err));
            }
        }
    }

    outcome
}
