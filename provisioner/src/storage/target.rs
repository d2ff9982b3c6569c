//! Host-side layout of a deployment

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::ProvisionError;
use crate::filesys::dir::Dir;
use crate::filesys::file::File;

pub const ENV_FILE_NAME: &str = ".env";
pub const CREDENTIALS_FILE_NAME: &str = "credentials.json";
pub const REQUIREMENTS_FILE_NAME: &str = "requirements.txt";

/// Where and as whom the bot is installed.
///
/// Fixed for the whole run. Every field has a default so a target file only
/// needs to name what differs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentTarget {
    /// Install root holding the source tree, venv, data and logs
    #[serde(default = "default_install_root")]
    pub install_root: PathBuf,

    /// Dedicated account that owns and runs the service
    #[serde(default = "default_service_user")]
    pub service_user: String,

    /// systemd unit name, without the `.service` suffix
    #[serde(default = "default_unit_name")]
    pub unit_name: String,

    /// Directory systemd loads unit files from
    #[serde(default = "default_unit_dir")]
    pub unit_dir: PathBuf,

    /// System interpreter used to create the venv
    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Entry-point script, relative to the install root
    #[serde(default = "default_entry_file")]
    pub entry_file: String,

    /// Venv directory name, relative to the install root
    #[serde(default = "default_venv_dir")]
    pub venv_dir: String,
}

fn default_install_root() -> PathBuf {
    PathBuf::from("/opt/wb-slots-bot")
}

fn default_service_user() -> String {
    "wbbot".to_string()
}

fn default_unit_name() -> String {
    "wb-slots-bot".to_string()
}

fn default_unit_dir() -> PathBuf {
    PathBuf::from("/etc/systemd/system")
}

fn default_interpreter() -> String {
    "python3.11".to_string()
}

fn default_entry_file() -> String {
    "run_with_bot.py".to_string()
}

fn default_venv_dir() -> String {
    "venv".to_string()
}

impl Default for DeploymentTarget {
    fn default() -> Self {
        Self {
            install_root: default_install_root(),
            service_user: default_service_user(),
            unit_name: default_unit_name(),
            unit_dir: default_unit_dir(),
            interpreter: default_interpreter(),
            entry_file: default_entry_file(),
            venv_dir: default_venv_dir(),
        }
    }
}

impl DeploymentTarget {
    /// Target with every default except the install root and unit directory
    pub fn new(install_root: impl Into<PathBuf>, unit_dir: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
            unit_dir: unit_dir.into(),
            ..Default::default()
        }
    }

    /// Load a target file. Missing fields fall back to their defaults.
    pub async fn load(path: &Path) -> Result<Self, ProvisionError> {
        let target: Self = File::new(path).read_json().await?;
        target.check()?;
        Ok(target)
    }

    fn check(&self) -> Result<(), ProvisionError> {
        if !self.install_root.is_absolute() {
            return Err(ProvisionError::ConfigError(format!(
                "install_root must be absolute: {}",
                self.install_root.display()
            )));
        }
        if self.install_root == Path::new("/") {
            return Err(ProvisionError::ConfigError(
                "install_root must not be /".to_string(),
            ));
        }
        if self.service_user.is_empty() || self.unit_name.is_empty() {
            return Err(ProvisionError::ConfigError(
                "service_user and unit_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn install_dir(&self) -> Dir {
        Dir::new(&self.install_root)
    }

    pub fn env_file(&self) -> File {
        File::new(self.install_root.join(ENV_FILE_NAME))
    }

    pub fn credentials_file(&self) -> File {
        File::new(self.install_root.join(CREDENTIALS_FILE_NAME))
    }

    pub fn requirements_file(&self) -> File {
        File::new(self.install_root.join(REQUIREMENTS_FILE_NAME))
    }

    pub fn entry_point(&self) -> File {
        File::new(self.install_root.join(&self.entry_file))
    }

    /// Python module name of the entry point (`run_with_bot.py` -> `run_with_bot`)
    pub fn entry_module(&self) -> String {
        Path::new(&self.entry_file)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.entry_file.clone())
    }

    pub fn git_dir(&self) -> Dir {
        Dir::new(self.install_root.join(".git"))
    }

    pub fn venv(&self) -> Dir {
        Dir::new(self.install_root.join(&self.venv_dir))
    }

    pub fn venv_bin(&self) -> PathBuf {
        self.install_root.join(&self.venv_dir).join("bin")
    }

    pub fn venv_python(&self) -> PathBuf {
        self.venv_bin().join("python")
    }

    pub fn venv_pip(&self) -> PathBuf {
        self.venv_bin().join("pip")
    }

    pub fn data_dir(&self) -> Dir {
        Dir::new(self.install_root.join("data"))
    }

    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.install_root.join("logs"))
    }

    /// Full unit name as systemctl expects it
    pub fn unit(&self) -> String {
        format!("{}.service", self.unit_name)
    }

    pub fn unit_file(&self) -> File {
        File::new(self.unit_dir.join(self.unit()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let target = DeploymentTarget::default();
        assert_eq!(target.env_file().path(), Path::new("/opt/wb-slots-bot/.env"));
        assert_eq!(
            target.venv_python(),
            PathBuf::from("/opt/wb-slots-bot/venv/bin/python")
        );
        assert_eq!(
            target.unit_file().path(),
            Path::new("/etc/systemd/system/wb-slots-bot.service")
        );
        assert_eq!(target.entry_module(), "run_with_bot");
    }

    #[tokio::test]
    async fn test_load_partial_target_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.json");
        std::fs::write(
            &path,
            r#"{"install_root": "/srv/bot", "service_user": "slots"}"#,
        )
        .unwrap();

        let target = DeploymentTarget::load(&path).await.unwrap();
        assert_eq!(target.install_root, PathBuf::from("/srv/bot"));
        assert_eq!(target.service_user, "slots");
        assert_eq!(target.unit_name, "wb-slots-bot");
    }

    #[tokio::test]
    async fn test_load_rejects_relative_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("target.json");
        std::fs::write(&path, r#"{"install_root": "bot"}"#).unwrap();

        let err = DeploymentTarget::load(&path).await.unwrap_err();
        assert!(matches!(err, ProvisionError::ConfigError(_)));
    }
}
