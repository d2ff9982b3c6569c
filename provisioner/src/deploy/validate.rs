//! Post-configuration checks

use std::sync::Arc;

use tracing::{info, warn};

use crate::deploy::envfile::{EnvFile, MANDATORY_KEYS};
use crate::errors::ProvisionError;
use crate::host::exec::{CommandRunner, CommandSpec};
use crate::storage::target::DeploymentTarget;

/// Modules the bot cannot run without
const CORE_IMPORTS: &str = "import aiohttp, aiogram, gspread";

/// Non-fatal findings of a validation pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// One pass over the installed tree. No retries.
///
/// In strict mode a malformed credentials file or a missing mandatory variable
/// fails the run; otherwise both are reported as warnings.
pub struct Validator<'a> {
    target: &'a DeploymentTarget,
    runner: Arc<dyn CommandRunner>,
    strict: bool,
}

impl<'a> Validator<'a> {
    pub fn new(target: &'a DeploymentTarget, runner: Arc<dyn CommandRunner>, strict: bool) -> Self {
        Self {
            target,
            runner,
            strict,
        }
    }

    pub async fn run(&self) -> Result<ValidationReport, ProvisionError> {
        let mut report = ValidationReport::default();

        if !self.python_ok(&["--version"], false).await {
            return Err(ProvisionError::ValidationError(format!(
                "{} is not runnable",
                self.target.venv_python().display()
            )));
        }

        if !self.python_ok(&["-c", CORE_IMPORTS], false).await {
            report.warn(format!("Dependency check failed: `{}`", CORE_IMPORTS));
        }

        let env_file = self.target.env_file();
        if !env_file.is_non_empty().await {
            return Err(ProvisionError::ValidationError(format!(
                "{} is missing or empty",
                env_file.path().display()
            )));
        }

        let credentials = self.target.credentials_file();
        if credentials.exists().await {
            if let Err(e) = credentials.read_json::<serde_json::Value>().await {
                self.strict_or_warn(
                    &mut report,
                    format!("{} is not valid JSON: {}", credentials.path().display(), e),
                )?;
            }
        } else {
            report.warn(format!(
                "{} not found; Google Sheets access will not work",
                credentials.path().display()
            ));
        }

        let env = EnvFile::parse(&env_file.read_string().await?);
        let missing = env.missing(MANDATORY_KEYS);
        if !missing.is_empty() {
            self.strict_or_warn(
                &mut report,
                format!("{} lacks {}", env_file.path().display(), missing.join(", ")),
            )?;
        }

        let import = format!("import {}", self.target.entry_module());
        if !self.python_ok(&["-c", import.as_str()], true).await {
            report.warn(format!("Entry module check failed: `{}`", import));
        }

        info!("Validation finished with {} warning(s)", report.warnings.len());
        Ok(report)
    }

    fn strict_or_warn(
        &self,
        report: &mut ValidationReport,
        message: String,
    ) -> Result<(), ProvisionError> {
        if self.strict {
            return Err(ProvisionError::ValidationError(message));
        }
        report.warn(message);
        Ok(())
    }

    /// Whether the venv interpreter exits zero. Spawn failures count as no.
    async fn python_ok(&self, args: &[&str], in_root: bool) -> bool {
        let mut cmd = CommandSpec::new(self.target.venv_python().to_string_lossy())
            .args(args.iter().copied());
        if in_root {
            cmd = cmd.current_dir(&self.target.install_root);
        }
        match self.runner.output(&cmd).await {
            Ok(output) => output.success(),
            Err(_) => false,
        }
    }
}
