//! Undo after a fatal failure

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::app::state::{PipelineState, Stage};
use crate::errors::ProvisionError;
use crate::host::units::UnitRegistry;
use crate::storage::target::DeploymentTarget;

/// What a rollback managed to do
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RollbackReport {
    /// Steps that failed, with their error
    pub failures: Vec<String>,
    pub tree_removed: bool,
}

pub struct RollbackController<'a> {
    target: &'a DeploymentTarget,
    units: Arc<dyn UnitRegistry>,
    remove_tree: bool,
}

impl<'a> RollbackController<'a> {
    pub fn new(target: &'a DeploymentTarget, units: Arc<dyn UnitRegistry>, remove_tree: bool) -> Self {
        Self {
            target,
            units,
            remove_tree,
        }
    }

    /// Tear down the unit and, when configured, the install root.
    ///
    /// Every step runs regardless of earlier failures. Nothing is propagated.
    pub async fn rollback(&self, state: &PipelineState) -> RollbackReport {
        let mut report = RollbackReport::default();
        let unit = self.target.unit();
        info!(
            "Rolling back (completed: {:?}, failed in: {:?})",
            state.completed(),
            state.current()
        );

        // The unit may have been registered by an earlier run
        Self::attempt(&mut report, "stop", self.units.stop(&unit).await);
        Self::attempt(&mut report, "disable", self.units.disable(&unit).await);
        Self::attempt(&mut report, "remove unit file", self.target.unit_file().delete().await);
        Self::attempt(&mut report, "daemon-reload", self.units.reload().await);

        if self.remove_tree && state.touched(Stage::Source) {
            let root = self.target.install_dir();
            match root.delete().await {
                Ok(()) => {
                    info!("Removed {}", root.path().display());
                    report.tree_removed = true;
                }
                Err(e) => {
                    error!("Unable to remove {}: {}", root.path().display(), e);
                    report.failures.push(format!("remove install root: {}", e));
                }
            }
        }

        report
    }

    fn attempt(report: &mut RollbackReport, step: &str, result: Result<(), ProvisionError>) {
        if let Err(e) = result {
            warn!("Rollback step '{}' failed: {}", step, e);
            report.failures.push(format!("{}: {}", step, e));
        }
    }
}
