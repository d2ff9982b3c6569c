//! Host preconditions checked before anything is changed

use tracing::{info, warn};

use crate::errors::ProvisionError;
use crate::storage::target::DeploymentTarget;
use crate::utils::HostFacts;

/// Invocation shown to operators who forgot elevated privilege
pub const ELEVATED_INVOCATION: &str = "sudo slotprov";

/// Refuse to run without root
pub fn ensure_privileged(euid: u32) -> Result<(), ProvisionError> {
    if euid != 0 {
        return Err(ProvisionError::PreconditionError(format!(
            "This installer must run as root. Run with: {}",
            ELEVATED_INVOCATION
        )));
    }
    Ok(())
}

/// Verifies host state a run depends on
pub struct PrerequisiteChecker<'a> {
    target: &'a DeploymentTarget,
}

impl<'a> PrerequisiteChecker<'a> {
    pub fn new(target: &'a DeploymentTarget) -> Self {
        Self { target }
    }

    /// Warn on hosts the installer was not written for. Never fatal.
    pub fn check_host(&self, facts: &HostFacts) {
        if facts.is_ubuntu() {
            info!("Host: {}", facts.describe());
        } else {
            warn!(
                "Host is {}; only Ubuntu is supported, continuing anyway",
                facts.describe()
            );
        }
    }

    /// Phase 2 resumes after the operator's manual step, so the tree and venv
    /// built by phase 1 must already be in place.
    pub async fn check_phase_one_artifacts(&self) -> Result<(), ProvisionError> {
        let root = self.target.install_dir();
        if !root.exists().await {
            return Err(self.missing(&format!(
                "install root {} does not exist",
                root.path().display()
            )));
        }

        let entry = self.target.entry_point();
        if !entry.exists().await {
            return Err(self.missing(&format!(
                "entry point {} is missing",
                entry.path().display()
            )));
        }

        let python = self.target.venv_python();
        if tokio::fs::metadata(&python).await.is_err() {
            return Err(self.missing(&format!(
                "runtime interpreter {} is missing",
                python.display()
            )));
        }

        if !self.target.credentials_file().exists().await {
            warn!(
                "{} not found; Google Sheets access will not work",
                self.target.credentials_file().path().display()
            );
        }

        Ok(())
    }

    fn missing(&self, what: &str) -> ProvisionError {
        ProvisionError::PreconditionError(format!(
            "Phase 1 has not completed: {}. Run `slotprov --phase=1` first",
            what
        ))
    }
}
