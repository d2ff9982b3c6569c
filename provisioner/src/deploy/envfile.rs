//! The bot's `.env` file

use secrecy::ExposeSecret;
use tracing::info;

use crate::config::record::ConfigurationRecord;
use crate::errors::ProvisionError;
use crate::storage::target::DeploymentTarget;

/// Variables the bot refuses to start without
pub const MANDATORY_KEYS: &[&str] = &["WB_API_KEY", "TELEGRAM_BOT_TOKEN", "TELEGRAM_CHAT_ID"];

const HEADER: &str = "# Managed by slotprov. Manual edits are overwritten on the next run.";

/// Ordered `KEY=value` entries.
///
/// Values are written unquoted, so anything that would split a line is
/// rejected when set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvFile {
    entries: Vec<(String, String)>,
}

impl EnvFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, keeping its position if already present
    pub fn set(&mut self, key: &str, value: impl Into<String>) -> Result<&mut Self, ProvisionError> {
        let value = value.into();
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(ProvisionError::ProvisioningError(format!(
                "Invalid environment variable name: {:?}",
                key
            )));
        }
        if value.contains(['\n', '\r', '\0']) {
            return Err(ProvisionError::ProvisioningError(format!(
                "Value for {} contains a line break or NUL",
                key
            )));
        }

        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key.to_string(), value)),
        }
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Keys from `required` that are absent or blank
    pub fn missing<'k>(&self, required: &[&'k str]) -> Vec<&'k str> {
        required
            .iter()
            .copied()
            .filter(|key| self.get(key).map(|v| v.trim().is_empty()).unwrap_or(true))
            .collect()
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(64 * (self.entries.len() + 1));
        out.push_str(HEADER);
        out.push('\n');
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Lenient reader for files written by hand or by [`EnvFile::render`].
    /// Comments, blank lines and lines without `=` are skipped.
    pub fn parse(text: &str) -> Self {
        let mut entries: Vec<(String, String)> = Vec::new();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_prefix("export ").unwrap_or(line);
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim().to_string();
            let value = unquote(value.trim()).to_string();
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => entries.push((key, value)),
            }
        }
        Self { entries }
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Turns a confirmed record into the bot's `.env`
pub struct ConfigMaterializer<'a> {
    target: &'a DeploymentTarget,
}

impl<'a> ConfigMaterializer<'a> {
    pub fn new(target: &'a DeploymentTarget) -> Self {
        Self { target }
    }

    pub fn render(&self, record: &ConfigurationRecord) -> Result<EnvFile, ProvisionError> {
        let root = self.target.install_root.display();
        let mut env = EnvFile::new();
        env.set("WB_API_KEY", record.wb_api_key().expose_secret())?
            .set("WB_BASE_URL", "https://supplies-api.wildberries.ru")?
            .set("MAX_REQUESTS_PER_MINUTE", "30")?
            .set("REQUEST_DELAY_SECONDS", "2.0")?
            .set("COEFFICIENTS_MAX_REQUESTS_PER_MINUTE", "6")?
            .set("ENABLE_ADAPTIVE_MONITORING", "true")?
            .set("MIN_CHECK_INTERVAL_SECONDS", "10")?
            .set(
                "GOOGLE_CREDENTIALS_FILE",
                self.target.credentials_file().path().to_string_lossy(),
            )?
            .set("GOOGLE_SHEETS_URL", record.sheets_url().unwrap_or(""))?
            .set("TELEGRAM_BOT_TOKEN", record.bot_token().expose_secret())?
            .set("TELEGRAM_CHAT_ID", record.chat_id())?
            .set("DATABASE_URL", format!("sqlite:///{}/data/wb_monitor.db", root))?
            .set("LOG_LEVEL", record.log_level().as_str())?
            .set("LOG_FILE", format!("{}/logs/wb_monitor.log", root))?
            .set("CHECK_INTERVAL_SECONDS", record.check_interval_secs().to_string())?;
        Ok(env)
    }

    /// Render and replace the env file
    pub async fn write(&self, record: &ConfigurationRecord) -> Result<(), ProvisionError> {
        let env = self.render(record)?;
        let file = self.target.env_file();
        file.write_atomic(env.render().as_bytes()).await?;
        info!("Wrote {} ({} variables)", file.path().display(), env.keys().count());
        Ok(())
    }
}
