//! systemd unit generation

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::app::options::IdentityMode;
use crate::errors::ProvisionError;
use crate::host::units::UnitRegistry;
use crate::storage::target::DeploymentTarget;

pub const RESTART_SEC: u32 = 10;
pub const LIMIT_NOFILE: u32 = 65536;
pub const MEMORY_MAX: &str = "512M";

/// One `[Name]` block. Keys may repeat, as systemd allows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitSection {
    name: String,
    entries: Vec<(String, String)>,
}

impl UnitSection {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.entries.push((key.to_string(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// An INI-style unit document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitFile {
    sections: Vec<UnitSection>,
}

impl UnitFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// The named section, appended if missing
    pub fn section(&mut self, name: &str) -> &mut UnitSection {
        let index = match self.sections.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.sections.push(UnitSection::new(name));
                self.sections.len() - 1
            }
        };
        &mut self.sections[index]
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.name == section)
            .and_then(|s| s.get(key))
    }

    pub fn render(&self) -> Result<String, ProvisionError> {
        let mut out = String::new();
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push('[');
            out.push_str(&section.name);
            out.push_str("]\n");
            for (key, value) in &section.entries {
                if value.contains(['\n', '\r', '\0']) {
                    return Err(ProvisionError::ProvisioningError(format!(
                        "Unit directive {} contains a line break or NUL",
                        key
                    )));
                }
                out.push_str(key);
                out.push('=');
                out.push_str(value);
                out.push('\n');
            }
        }
        Ok(out)
    }
}

/// How tightly the service is sandboxed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationProfile {
    /// Read-only system, no home directories, private tmp. Only the install
    /// root stays writable.
    Strict,
    /// Privilege escalation blocked, nothing else
    Relaxed,
}

impl IsolationProfile {
    fn apply(&self, service: &mut UnitSection, root: &str) {
        service.add("NoNewPrivileges", "true");
        if *self == IsolationProfile::Strict {
            service
                .add("ProtectSystem", "strict")
                .add("ProtectHome", "true")
                .add("PrivateTmp", "true")
                .add("ReadWritePaths", root);
        }
    }
}

/// Everything the unit needs to know about the deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceUnitDescriptor {
    pub unit_name: String,
    pub account: String,
    pub working_dir: PathBuf,
    pub venv_bin: PathBuf,
    pub env_file: PathBuf,
    pub python: PathBuf,
    pub entry_point: PathBuf,
    pub isolation: IsolationProfile,
}

impl ServiceUnitDescriptor {
    pub fn for_target(target: &DeploymentTarget, identity: &IdentityMode) -> Self {
        Self {
            unit_name: target.unit_name.clone(),
            account: identity.account(target).to_string(),
            working_dir: target.install_root.clone(),
            venv_bin: target.venv_bin(),
            env_file: target.env_file().path().to_path_buf(),
            python: target.venv_python(),
            entry_point: target.entry_point().path().to_path_buf(),
            isolation: identity.isolation(),
        }
    }

    pub fn to_unit_file(&self) -> UnitFile {
        let root = self.working_dir.to_string_lossy().into_owned();
        let mut unit = UnitFile::new();

        unit.section("Unit")
            .add("Description", "Wildberries supply slot monitoring bot")
            .add("After", "network-online.target")
            .add("Wants", "network-online.target");

        let service = unit.section("Service");
        service
            .add("Type", "simple")
            .add("User", self.account.as_str())
            .add("Group", self.account.as_str())
            .add("WorkingDirectory", root.as_str())
            .add(
                "Environment",
                format!("PATH={}:/usr/bin:/bin", self.venv_bin.display()),
            )
            .add("EnvironmentFile", self.env_file.to_string_lossy())
            .add(
                "ExecStart",
                format!("{} {}", self.python.display(), self.entry_point.display()),
            )
            .add("Restart", "always")
            .add("RestartSec", RESTART_SEC.to_string())
            .add("StandardOutput", "journal")
            .add("StandardError", "journal")
            .add("SyslogIdentifier", self.unit_name.as_str());
        self.isolation.apply(service, &root);
        service
            .add("LimitNOFILE", LIMIT_NOFILE.to_string())
            .add("MemoryMax", MEMORY_MAX);

        unit.section("Install").add("WantedBy", "multi-user.target");
        unit
    }
}

pub struct UnitGenerator<'a> {
    target: &'a DeploymentTarget,
    units: Arc<dyn UnitRegistry>,
}

impl<'a> UnitGenerator<'a> {
    pub fn new(target: &'a DeploymentTarget, units: Arc<dyn UnitRegistry>) -> Self {
        Self { target, units }
    }

    /// Write the unit file and make systemd pick it up
    pub async fn install(&self, identity: &IdentityMode) -> Result<(), ProvisionError> {
        let descriptor = ServiceUnitDescriptor::for_target(self.target, identity);
        let contents = descriptor.to_unit_file().render()?;

        let file = self.target.unit_file();
        file.write_atomic(contents.as_bytes()).await?;
        file.set_mode(0o644).await?;
        info!(
            "Installed {} ({:?} isolation)",
            file.path().display(),
            descriptor.isolation
        );

        self.units.reload().await
    }
}
