//! Host resources the pipeline mutates.
//!
//! Each resource is a trait so the orchestrator can be driven against a
//! recording fake (`fake::RecordingRunner`, behind the `testing` feature)
//! instead of a real machine.

use std::sync::Arc;

pub mod accounts;
pub mod exec;
#[cfg(any(test, feature = "testing"))]
pub mod fake;
pub mod packages;
pub mod units;

use accounts::{AccountManager, SystemAccounts};
use exec::{CommandRunner, SystemRunner};
use packages::{Apt, PackageManager};
use units::{Systemctl, UnitRegistry};

/// Handles to every host resource
#[derive(Clone)]
pub struct Host {
    pub runner: Arc<dyn CommandRunner>,
    pub packages: Arc<dyn PackageManager>,
    pub accounts: Arc<dyn AccountManager>,
    pub units: Arc<dyn UnitRegistry>,
}

impl Host {
    /// The local machine
    pub fn system() -> Self {
        Self::with_runner(Arc::new(SystemRunner))
    }

    /// apt, shadow-utils and systemctl, all driven through `runner`
    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            packages: Arc::new(Apt::new(runner.clone())),
            accounts: Arc::new(SystemAccounts::new(runner.clone())),
            units: Arc::new(Systemctl::new(runner.clone())),
            runner,
        }
    }
}
