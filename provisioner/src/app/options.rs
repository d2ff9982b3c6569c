//! Options for a provisioning run

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::deploy::service::DEFAULT_SETTLE_DELAY;
use crate::deploy::unit::IsolationProfile;
use crate::logs::LogOptions;
use crate::storage::target::DeploymentTarget;

/// Which part of the pipeline a run covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Everything in one go
    #[default]
    Single,
    /// Packages, account, source and venv. Stops for the operator to upload
    /// credentials.
    PhaseOne,
    /// Configuration through service start, on top of a phase-one install
    PhaseTwo,
}

impl RunMode {
    pub fn provisions_host(&self) -> bool {
        !matches!(self, RunMode::PhaseTwo)
    }

    pub fn configures_service(&self) -> bool {
        !matches!(self, RunMode::PhaseOne)
    }

    /// Phase two keeps the tree so the operator's uploaded credentials survive
    pub fn removes_tree_on_rollback(&self) -> bool {
        !matches!(self, RunMode::PhaseTwo)
    }

    /// Credential and env problems are fatal rather than warnings
    pub fn strict_validation(&self) -> bool {
        matches!(self, RunMode::PhaseTwo)
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(RunMode::PhaseOne),
            "2" => Ok(RunMode::PhaseTwo),
            _ => Err(format!("Invalid phase: {} (expected 1 or 2)", s)),
        }
    }
}

/// Account the service runs as
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdentityMode {
    /// The target's service account, created if missing
    #[default]
    Dedicated,
    /// An account that must already exist, e.g. `root`
    Existing(String),
}

impl IdentityMode {
    pub fn account<'a>(&'a self, target: &'a DeploymentTarget) -> &'a str {
        match self {
            IdentityMode::Dedicated => &target.service_user,
            IdentityMode::Existing(account) => account,
        }
    }

    pub fn isolation(&self) -> IsolationProfile {
        match self {
            IdentityMode::Dedicated => IsolationProfile::Strict,
            IdentityMode::Existing(_) => IsolationProfile::Relaxed,
        }
    }
}

impl FromStr for IdentityMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "dedicated" {
            return Ok(IdentityMode::Dedicated);
        }
        let valid = !s.is_empty()
            && !s.starts_with('-')
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(format!("Invalid identity: {:?}", s));
        }
        Ok(IdentityMode::Existing(s.to_string()))
    }
}

/// Pipeline options
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub run_mode: RunMode,

    pub identity: IdentityMode,

    /// Record file for a non-interactive run
    pub record_file: Option<PathBuf>,

    /// Where a local deploy copies from
    pub working_dir: PathBuf,

    /// Wait between starting the service and checking it
    pub settle_delay: Duration,

    pub log: LogOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            run_mode: RunMode::default(),
            identity: IdentityMode::default(),
            record_file: None,
            working_dir: PathBuf::from("."),
            settle_delay: DEFAULT_SETTLE_DELAY,
            log: LogOptions::default(),
        }
    }
}
