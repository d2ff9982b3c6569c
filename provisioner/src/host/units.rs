//! Process supervisor unit registry

use std::sync::Arc;

use async_trait::async_trait;

use crate::errors::ProvisionError;
use crate::host::exec::{CommandRunner, CommandSpec};

/// The supervisor's view of installed units. Unit names include the
/// `.service` suffix.
#[async_trait]
pub trait UnitRegistry: Send + Sync {
    /// Re-read unit files from disk
    async fn reload(&self) -> Result<(), ProvisionError>;

    async fn enable(&self, unit: &str) -> Result<(), ProvisionError>;

    async fn disable(&self, unit: &str) -> Result<(), ProvisionError>;

    async fn start(&self, unit: &str) -> Result<(), ProvisionError>;

    async fn stop(&self, unit: &str) -> Result<(), ProvisionError>;

    async fn is_active(&self, unit: &str) -> Result<bool, ProvisionError>;
}

/// systemd through `systemctl`
pub struct Systemctl {
    runner: Arc<dyn CommandRunner>,
}

impl Systemctl {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    async fn systemctl(&self, verb: &str, unit: &str) -> Result<(), ProvisionError> {
        let cmd = CommandSpec::new("systemctl").args([verb, unit]);
        self.runner.run(&cmd).await?;
        Ok(())
    }
}

#[async_trait]
impl UnitRegistry for Systemctl {
    async fn reload(&self) -> Result<(), ProvisionError> {
        self.runner
            .run(&CommandSpec::new("systemctl").arg("daemon-reload"))
            .await?;
        Ok(())
    }

    async fn enable(&self, unit: &str) -> Result<(), ProvisionError> {
        self.systemctl("enable", unit).await
    }

    async fn disable(&self, unit: &str) -> Result<(), ProvisionError> {
        self.systemctl("disable", unit).await
    }

    async fn start(&self, unit: &str) -> Result<(), ProvisionError> {
        self.systemctl("start", unit).await
    }

    async fn stop(&self, unit: &str) -> Result<(), ProvisionError> {
        self.systemctl("stop", unit).await
    }

    async fn is_active(&self, unit: &str) -> Result<bool, ProvisionError> {
        // is-active exits non-zero for every state but "active"
        let output = self
            .runner
            .output(&CommandSpec::new("systemctl").args(["is-active", unit]))
            .await?;
        Ok(output.success() && output.stdout.trim() == "active")
    }
}
