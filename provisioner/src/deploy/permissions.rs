//! Ownership and mode bits of the install root

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::ProvisionError;
use crate::filesys::file;
use crate::host::accounts::AccountManager;
use crate::storage::target::DeploymentTarget;

pub const DIR_MODE: u32 = 0o750;
pub const ENV_FILE_MODE: u32 = 0o640;
pub const CREDENTIALS_MODE: u32 = 0o600;
pub const SCRIPT_MODE: u32 = 0o750;

pub struct PermissionsEnforcer<'a> {
    target: &'a DeploymentTarget,
    accounts: Arc<dyn AccountManager>,
    account: String,
}

impl<'a> PermissionsEnforcer<'a> {
    pub fn new(
        target: &'a DeploymentTarget,
        accounts: Arc<dyn AccountManager>,
        account: impl Into<String>,
    ) -> Self {
        Self {
            target,
            accounts,
            account: account.into(),
        }
    }

    /// Hand the tree to the service account and tighten modes.
    ///
    /// Ownership, the root mode and the env file mode are mandatory. Everything
    /// else is logged and skipped on failure.
    pub async fn enforce(&self) -> Result<(), ProvisionError> {
        let root = self.target.install_dir();

        // The bot writes its database and log file here
        self.target.data_dir().create().await?;
        self.target.logs_dir().create().await?;

        info!("Assigning {} to {}", root.path().display(), self.account);
        self.accounts
            .chown_recursive(&self.account, root.path())
            .await?;

        root.set_mode(DIR_MODE).await?;
        let subdirs = root.walk_dirs().await.unwrap_or_else(|e| {
            warn!("Unable to walk {}: {}", root.path().display(), e);
            Vec::new()
        });
        for dir in subdirs {
            if let Err(e) = file::set_mode(&dir, DIR_MODE).await {
                warn!("Unable to set mode on {}: {}", dir.display(), e);
            }
        }

        self.target.env_file().set_mode(ENV_FILE_MODE).await?;

        let credentials = self.target.credentials_file();
        if credentials.exists().await {
            if let Err(e) = credentials.set_mode(CREDENTIALS_MODE).await {
                warn!(
                    "Unable to restrict {}: {}",
                    credentials.path().display(),
                    e
                );
            }
        } else {
            debug!("{} not present, skipping", credentials.path().display());
        }

        let scripts = root.list_files().await.unwrap_or_else(|e| {
            warn!("Unable to list {}: {}", root.path().display(), e);
            Vec::new()
        });
        for script in scripts
            .iter()
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("py"))
        {
            if let Err(e) = file::set_mode(script, SCRIPT_MODE).await {
                warn!("Unable to set mode on {}: {}", script.display(), e);
            }
        }

        Ok(())
    }
}
