//! OS packages and the interpreter toolchain

use std::sync::Arc;

use tracing::info;

use crate::errors::ProvisionError;
use crate::host::exec::{CommandRunner, CommandSpec};
use crate::host::packages::PackageManager;

/// Packages every install needs
pub const BASE_PACKAGES: &[&str] = &[
    "git",
    "curl",
    "software-properties-common",
    "build-essential",
    "sqlite3",
    "ca-certificates",
];

/// Source of Python builds newer than the distribution ships
pub const PYTHON_REPOSITORY: &str = "ppa:deadsnakes/ppa";

pub struct PackageInstaller {
    packages: Arc<dyn PackageManager>,
    runner: Arc<dyn CommandRunner>,
    interpreter: String,
}

impl PackageInstaller {
    pub fn new(
        packages: Arc<dyn PackageManager>,
        runner: Arc<dyn CommandRunner>,
        interpreter: impl Into<String>,
    ) -> Self {
        Self {
            packages,
            runner,
            interpreter: interpreter.into(),
        }
    }

    /// Install the base set, then the interpreter if it is missing
    pub async fn ensure(&self) -> Result<(), ProvisionError> {
        info!("Installing system packages...");
        self.packages.update_index().await?;
        self.packages.install(BASE_PACKAGES).await?;

        if self.interpreter_present().await? {
            info!("{} already installed", self.interpreter);
            return Ok(());
        }

        info!("{} not found, adding {}", self.interpreter, PYTHON_REPOSITORY);
        self.packages.add_repository(PYTHON_REPOSITORY).await?;
        self.packages.update_index().await?;

        let venv = format!("{}-venv", self.interpreter);
        let dev = format!("{}-dev", self.interpreter);
        self.packages
            .install(&[self.interpreter.as_str(), venv.as_str(), dev.as_str()])
            .await?;

        if !self.interpreter_present().await? {
            return Err(ProvisionError::ProvisioningError(format!(
                "{} is still unavailable after installation",
                self.interpreter
            )));
        }
        Ok(())
    }

    async fn interpreter_present(&self) -> Result<bool, ProvisionError> {
        let output = self
            .runner
            .output(&CommandSpec::new(&self.interpreter).arg("--version"))
            .await;
        match output {
            Ok(output) => Ok(output.success()),
            // Not on PATH at all
            Err(ProvisionError::ProvisioningError(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
