//! OS package manager

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::ProvisionError;
use crate::host::exec::{CommandRunner, CommandSpec};

/// OS-level package database
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Refresh the package index
    async fn update_index(&self) -> Result<(), ProvisionError>;

    /// Install packages. Already-installed packages are left as they are.
    async fn install(&self, packages: &[&str]) -> Result<(), ProvisionError>;

    /// Add a secondary package source
    async fn add_repository(&self, repository: &str) -> Result<(), ProvisionError>;
}

/// `apt-get` on Debian-family hosts
pub struct Apt {
    runner: Arc<dyn CommandRunner>,
}

impl Apt {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    fn apt_get(&self) -> CommandSpec {
        CommandSpec::new("apt-get").env("DEBIAN_FRONTEND", "noninteractive")
    }
}

#[async_trait]
impl PackageManager for Apt {
    async fn update_index(&self) -> Result<(), ProvisionError> {
        self.runner.run(&self.apt_get().arg("update")).await?;
        Ok(())
    }

    async fn install(&self, packages: &[&str]) -> Result<(), ProvisionError> {
        if packages.is_empty() {
            return Ok(());
        }
        let cmd = self
            .apt_get()
            .args(["install", "-y"])
            .args(packages.iter().copied());
        self.runner.run(&cmd).await?;
        Ok(())
    }

    async fn add_repository(&self, repository: &str) -> Result<(), ProvisionError> {
        let cmd = CommandSpec::new("add-apt-repository").args(["-y", repository]);
        self.runner.run(&cmd).await?;
        Ok(())
    }
}
