//! Error types for the provisioner

use thiserror::Error;

/// Main error type for a provisioning run
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// The run cannot start: missing privilege, missing phase-1 artifacts
    #[error("Precondition failed: {0}")]
    PreconditionError(String),

    /// Operator input that could not be recovered by re-prompting
    #[error("Input error: {0}")]
    InputError(String),

    #[error("Command `{command}` failed with exit code {code}: {stderr}")]
    CommandError {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("Provisioning error: {0}")]
    ProvisioningError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid state transition: {0}")]
    StateError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ProvisionError {
    /// Errors raised before any host mutation. These never trigger rollback.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ProvisionError::PreconditionError(_) | ProvisionError::InputError(_)
        )
    }
}

impl From<anyhow::Error> for ProvisionError {
    fn from(err: anyhow::Error) -> Self {
        ProvisionError::Internal(err.to_string())
    }
}
