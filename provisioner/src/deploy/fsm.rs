//! Finite state machine for a provisioning run

use serde::{Deserialize, Serialize};

/// Provisioning state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningState {
    /// Asking the operator for configuration
    Collecting,

    /// Packages and service account
    Provisioning,

    /// Placing the source tree
    Deploying,

    /// Creating the venv and installing dependencies
    BuildingRuntime,

    /// Env file, unit file and permissions
    Configuring,

    /// Post-install smoke checks
    Validating,

    /// Enabling and starting the service
    Starting,

    /// Finished successfully
    Done,

    /// Operator declined the configuration; nothing was changed
    Cancelled,

    /// A stage failed and partial state was torn down
    RolledBack,
}

impl ProvisioningState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProvisioningState::Done | ProvisioningState::Cancelled | ProvisioningState::RolledBack
        )
    }
}

/// Provisioning event
#[derive(Debug, Clone)]
pub enum ProvisioningEvent {
    /// Configuration confirmed, start host provisioning
    Provision,

    /// Configuration declined
    Cancel,

    Deploy,

    BuildRuntime,

    Configure,

    Validate,

    Start,

    /// Last stage of the run completed
    Finish,

    /// A stage failed
    Fail(String),
}

/// Provisioning FSM
#[derive(Debug, Clone)]
pub struct ProvisioningFsm {
    state: ProvisioningState,
    error: Option<String>,
    history: Vec<ProvisioningState>,
}

impl ProvisioningFsm {
    /// Create a new FSM in collecting state
    pub fn new() -> Self {
        Self {
            state: ProvisioningState::Collecting,
            error: None,
            history: vec![ProvisioningState::Collecting],
        }
    }

    /// Get current state
    pub fn state(&self) -> ProvisioningState {
        self.state
    }

    /// Get the failure message, if the run failed
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Every state visited, in order
    pub fn history(&self) -> &[ProvisioningState] {
        &self.history
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: ProvisioningEvent) -> Result<ProvisioningState, String> {
        use ProvisioningEvent as E;
        use ProvisioningState as S;

        let new_state = match (self.state, &event) {
            (S::Collecting, E::Provision) => S::Provisioning,
            (S::Collecting, E::Cancel) => S::Cancelled,
            // Phase-2 runs reuse the tree from phase 1
            (S::Collecting, E::Configure) => S::Configuring,

            (S::Provisioning, E::Deploy) => S::Deploying,
            (S::Deploying, E::BuildRuntime) => S::BuildingRuntime,

            (S::BuildingRuntime, E::Configure) => S::Configuring,
            // Phase-1 runs stop once the runtime is built
            (S::BuildingRuntime, E::Finish) => S::Done,

            (S::Configuring, E::Validate) => S::Validating,
            (S::Validating, E::Start) => S::Starting,
            (S::Starting, E::Finish) => S::Done,

            (state, E::Fail(err)) if !state.is_terminal() => {
                self.error = Some(err.clone());
                S::RolledBack
            }

            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        self.history.push(new_state);
        Ok(new_state)
    }
}

impl Default for ProvisioningFsm {
    fn default() -> Self {
        Self::new()
    }
}
