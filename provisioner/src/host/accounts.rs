//! System accounts and ownership

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::ProvisionError;
use crate::host::exec::{CommandRunner, CommandSpec};

#[async_trait]
pub trait AccountManager: Send + Sync {
    async fn exists(&self, account: &str) -> Result<bool, ProvisionError>;

    /// Create a system account with `home` as its home and no login shell
    async fn create_system(&self, account: &str, home: &Path) -> Result<(), ProvisionError>;

    /// Give `account` ownership of `path` and everything below it
    async fn chown_recursive(&self, account: &str, path: &Path) -> Result<(), ProvisionError>;
}

/// Shadow-utils backed account manager
pub struct SystemAccounts {
    runner: Arc<dyn CommandRunner>,
}

impl SystemAccounts {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl AccountManager for SystemAccounts {
    async fn exists(&self, account: &str) -> Result<bool, ProvisionError> {
        let output = self
            .runner
            .output(&CommandSpec::new("id").args(["-u", account]))
            .await?;
        Ok(output.success())
    }

    async fn create_system(&self, account: &str, home: &Path) -> Result<(), ProvisionError> {
        let cmd = CommandSpec::new("useradd")
            .arg("--system")
            .arg("--home-dir")
            .arg(home.to_string_lossy())
            .arg("--no-create-home")
            .args(["--shell", "/usr/sbin/nologin"])
            .arg(account);
        self.runner.run(&cmd).await?;
        Ok(())
    }

    async fn chown_recursive(&self, account: &str, path: &Path) -> Result<(), ProvisionError> {
        let cmd = CommandSpec::new("chown")
            .arg("-R")
            .arg(format!("{}:{}", account, account))
            .arg(path.to_string_lossy());
        self.runner.run(&cmd).await?;
        Ok(())
    }
}
