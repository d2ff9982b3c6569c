//! Isolated Python runtime

use std::sync::Arc;

use tracing::info;

use crate::errors::ProvisionError;
use crate::host::exec::{CommandRunner, CommandSpec};
use crate::storage::target::DeploymentTarget;

/// Installed when the tree has no requirements file
pub const FALLBACK_REQUIREMENTS: &[&str] = &[
    "aiohttp",
    "aiogram",
    "gspread",
    "google-auth",
    "python-dotenv",
];

pub struct RuntimeBuilder {
    target: DeploymentTarget,
    runner: Arc<dyn CommandRunner>,
}

impl RuntimeBuilder {
    pub fn new(target: DeploymentTarget, runner: Arc<dyn CommandRunner>) -> Self {
        Self { target, runner }
    }

    /// Recreate the venv from scratch and install the dependency set
    pub async fn build(&self) -> Result<(), ProvisionError> {
        let venv = self.target.venv();
        info!("Creating virtual environment in {}", venv.path().display());
        venv.delete().await?;

        self.runner
            .run(
                &CommandSpec::new(&self.target.interpreter)
                    .args(["-m", "venv"])
                    .arg(venv.path().to_string_lossy()),
            )
            .await?;

        let pip = self.target.venv_pip().to_string_lossy().into_owned();
        self.runner
            .run(&CommandSpec::new(&pip).args(["install", "--upgrade", "pip", "setuptools", "wheel"]))
            .await?;

        let requirements = self.target.requirements_file();
        let install = if requirements.exists().await {
            info!("Installing dependencies from {}", requirements.path().display());
            CommandSpec::new(&pip)
                .args(["install", "-r"])
                .arg(requirements.path().to_string_lossy())
        } else {
            info!("No requirements file, installing the default dependency set");
            CommandSpec::new(&pip)
                .arg("install")
                .args(FALLBACK_REQUIREMENTS.iter().copied())
        };
        self.runner
            .run(&install.current_dir(&self.target.install_root))
            .await?;

        Ok(())
    }
}
