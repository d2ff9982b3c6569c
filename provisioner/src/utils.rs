//! Utility functions

use serde::{Deserialize, Serialize};

/// Version information for the provisioner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Number of leading characters of a secret shown in summaries
pub const MASK_PREFIX_LEN: usize = 8;

/// Mask a secret for display.
///
/// Shows exactly [`MASK_PREFIX_LEN`] characters. A secret that is not longer
/// than the prefix is hidden entirely.
pub fn mask_secret(secret: &str) -> String {
    if secret.chars().nth(MASK_PREFIX_LEN).is_none() {
        return "...".to_string();
    }
    let prefix: String = secret.chars().take(MASK_PREFIX_LEN).collect();
    format!("{}...", prefix)
}

/// Effective user id of the current process
#[cfg(unix)]
pub fn effective_uid() -> u32 {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() }
}

#[cfg(not(unix))]
pub fn effective_uid() -> u32 {
    u32::MAX
}

/// Host facts shown in the run summary
#[derive(Debug, Clone)]
pub struct HostFacts {
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub hostname: Option<String>,
}

impl HostFacts {
    pub fn collect() -> Self {
        Self {
            os_name: sysinfo::System::name(),
            os_version: sysinfo::System::os_version(),
            hostname: sysinfo::System::host_name(),
        }
    }

    pub fn is_ubuntu(&self) -> bool {
        self.os_name
            .as_deref()
            .map(|name| name.to_lowercase().contains("ubuntu"))
            .unwrap_or(false)
    }

    pub fn describe(&self) -> String {
        format!(
            "{} {} ({})",
            self.os_name.as_deref().unwrap_or("unknown OS"),
            self.os_version.as_deref().unwrap_or(""),
            self.hostname.as_deref().unwrap_or("unknown host"),
        )
    }
}
