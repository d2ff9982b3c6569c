//! External command execution

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::errors::ProvisionError;

/// A command to run on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub current_dir: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Shell-like rendering used in logs, errors and test assertions
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external commands. Every host mutation goes through this seam.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command and capture its output, whatever the exit status.
    /// Errors only when the command could not be spawned.
    async fn output(&self, cmd: &CommandSpec) -> Result<CommandOutput, ProvisionError>;

    /// Run the command and fail on a non-zero exit status
    async fn run(&self, cmd: &CommandSpec) -> Result<CommandOutput, ProvisionError> {
        let output = self.output(cmd).await?;
        if !output.success() {
            return Err(ProvisionError::CommandError {
                command: cmd.display(),
                code: output.code.unwrap_or(-1),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

/// Runs commands on the local host with `tokio::process`
#[derive(Debug, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn output(&self, cmd: &CommandSpec) -> Result<CommandOutput, ProvisionError> {
        debug!("Running: {}", cmd.display());

        let mut command = Command::new(&cmd.program);
        command.args(&cmd.args);
        if let Some(dir) = &cmd.current_dir {
            command.current_dir(dir);
        }
        for (key, value) in &cmd.env {
            command.env(key, value);
        }

        let output = command.output().await.map_err(|e| {
            ProvisionError::ProvisioningError(format!("Failed to run {}: {}", cmd.program, e))
        })?;

        let result = CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!("{} exited with {:?}", cmd.program, result.code);
        Ok(result)
    }
}
