//! Service account

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::app::options::IdentityMode;
use crate::errors::ProvisionError;
use crate::host::accounts::AccountManager;

pub struct ServiceIdentityManager {
    accounts: Arc<dyn AccountManager>,
}

impl ServiceIdentityManager {
    pub fn new(accounts: Arc<dyn AccountManager>) -> Self {
        Self { accounts }
    }

    /// Make sure the account the service runs as exists.
    ///
    /// A dedicated account is created on first run. An existing account is
    /// only checked.
    pub async fn ensure(
        &self,
        identity: &IdentityMode,
        account: &str,
        install_root: &Path,
    ) -> Result<(), ProvisionError> {
        if self.accounts.exists(account).await? {
            info!("Service account {} already exists", account);
            return Ok(());
        }

        match identity {
            IdentityMode::Dedicated => {
                info!("Creating system account {}", account);
                self.accounts.create_system(account, install_root).await
            }
            IdentityMode::Existing(_) => Err(ProvisionError::ProvisioningError(format!(
                "Account {} does not exist",
                account
            ))),
        }
    }
}
