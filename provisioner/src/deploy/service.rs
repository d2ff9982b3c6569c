//! Service activation

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::errors::ProvisionError;
use crate::host::units::UnitRegistry;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Observed state after activation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceStatus {
    Active,
    /// Started but not running after the settle delay
    Inactive { hint: String },
}

impl ServiceStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, ServiceStatus::Active)
    }
}

pub struct ServiceController {
    units: Arc<dyn UnitRegistry>,
    unit: String,
    settle: Duration,
}

impl ServiceController {
    pub fn new(units: Arc<dyn UnitRegistry>, unit: impl Into<String>, settle: Duration) -> Self {
        Self {
            units,
            unit: unit.into(),
            settle,
        }
    }

    /// Enable and start the unit, then report whether it stayed up.
    ///
    /// A unit that is not active afterwards is reported, not failed.
    pub async fn start(&self) -> Result<ServiceStatus, ProvisionError> {
        self.units.enable(&self.unit).await?;
        self.units.start(&self.unit).await?;
        info!("Started {}, waiting {:?} before checking", self.unit, self.settle);

        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }

        if self.units.is_active(&self.unit).await? {
            info!("{} is active", self.unit);
            return Ok(ServiceStatus::Active);
        }

        let hint = format!("journalctl -u {} -n 50", self.unit);
        warn!("{} is not active. Inspect with: {}", self.unit, hint);
        Ok(ServiceStatus::Inactive { hint })
    }
}
