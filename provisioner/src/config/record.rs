//! Operator configuration record

use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use crate::errors::ProvisionError;
use crate::filesys::file::File;
use crate::utils::mask_secret;

pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 120;

/// Where the application source comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    /// Branch of a git repository
    Remote { url: String, branch: String },
    /// Files in the operator's working directory
    Local,
    /// Tree already deployed by an earlier phase-1 run
    Installed,
}

impl SourceLocation {
    pub fn remote(url: &str, branch: &str) -> Result<Self, ProvisionError> {
        let url = url.trim();
        validate_repo_url(url).map_err(ProvisionError::InputError)?;
        let branch = match branch.trim() {
            "" => DEFAULT_BRANCH,
            b if b.starts_with('-') || b.contains(char::is_whitespace) => {
                return Err(ProvisionError::InputError(format!("Invalid branch: {}", b)));
            }
            b => b,
        };
        Ok(SourceLocation::Remote {
            url: url.to_string(),
            branch: branch.to_string(),
        })
    }

    pub fn describe(&self) -> String {
        match self {
            SourceLocation::Remote { url, branch } => format!("git {} ({})", url, branch),
            SourceLocation::Local => "local copy of the current directory".to_string(),
            SourceLocation::Installed => "existing installation".to_string(),
        }
    }
}

/// Accept `scheme://` URLs git understands and scp-like `user@host:path`
pub fn validate_repo_url(raw: &str) -> Result<(), String> {
    if raw.is_empty() {
        return Err("Repository URL is empty".to_string());
    }
    if raw.starts_with('-') || raw.contains(char::is_whitespace) {
        return Err(format!("Invalid repository URL: {}", raw));
    }
    if raw.contains("://") {
        let url = Url::parse(raw).map_err(|e| format!("Invalid repository URL {}: {}", raw, e))?;
        return match url.scheme() {
            "https" | "http" | "ssh" | "git" | "file" => Ok(()),
            other => Err(format!("Unsupported repository scheme: {}", other)),
        };
    }
    match raw.split_once(':') {
        Some((host, path)) if host.contains('@') && !path.is_empty() => Ok(()),
        _ => Err(format!("Invalid repository URL: {}", raw)),
    }
}

/// Google Sheets links must be https URLs
pub fn validate_sheets_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("Invalid Sheets URL {}: {}", raw, e))?;
    if url.scheme() != "https" {
        return Err(format!("Sheets URL must use https: {}", raw));
    }
    Ok(())
}

/// Log level passed to the bot, in Python `logging` spelling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BotLogLevel {
    Debug,
    #[default]
    Info,
    Warning,
}

impl BotLogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            BotLogLevel::Debug => "DEBUG",
            BotLogLevel::Info => "INFO",
            BotLogLevel::Warning => "WARNING",
        }
    }
}

impl std::str::FromStr for BotLogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "DEBUG" => Ok(BotLogLevel::Debug),
            "INFO" => Ok(BotLogLevel::Info),
            "WARNING" | "WARN" => Ok(BotLogLevel::Warning),
            _ => Err(format!("Invalid log level: {} (expected DEBUG, INFO or WARNING)", s)),
        }
    }
}

/// Unvalidated answers, turned into a [`ConfigurationRecord`] by
/// [`ConfigurationRecord::new`]
#[derive(Debug, Default)]
pub struct RecordDraft {
    pub source: Option<SourceLocation>,
    pub wb_api_key: String,
    pub bot_token: String,
    pub chat_id: String,
    pub sheets_url: Option<String>,
    pub check_interval_secs: Option<u64>,
    pub log_level: Option<BotLogLevel>,
}

/// Everything the operator supplied, confirmed and immutable.
///
/// Mandatory secrets are guaranteed non-empty. There are no setters.
#[derive(Debug)]
pub struct ConfigurationRecord {
    source: SourceLocation,
    wb_api_key: SecretString,
    bot_token: SecretString,
    chat_id: String,
    sheets_url: Option<String>,
    check_interval_secs: u64,
    log_level: BotLogLevel,
}

impl ConfigurationRecord {
    pub fn new(draft: RecordDraft) -> Result<Self, ProvisionError> {
        let wb_api_key = required("WB API key", draft.wb_api_key)?;
        let bot_token = required("Telegram bot token", draft.bot_token)?;
        let chat_id = required("Telegram chat id", draft.chat_id)?;

        let sheets_url = match draft.sheets_url.map(|u| u.trim().to_string()) {
            Some(url) if !url.is_empty() => {
                validate_sheets_url(&url).map_err(ProvisionError::InputError)?;
                Some(url)
            }
            _ => None,
        };

        let check_interval_secs = draft.check_interval_secs.unwrap_or(DEFAULT_CHECK_INTERVAL_SECS);
        if check_interval_secs == 0 {
            return Err(ProvisionError::InputError(
                "Check interval must be a positive number of seconds".to_string(),
            ));
        }

        Ok(Self {
            source: draft.source.unwrap_or(SourceLocation::Local),
            wb_api_key: SecretString::from(wb_api_key),
            bot_token: SecretString::from(bot_token),
            chat_id,
            sheets_url,
            check_interval_secs,
            log_level: draft.log_level.unwrap_or_default(),
        })
    }

    pub fn source(&self) -> &SourceLocation {
        &self.source
    }

    pub fn wb_api_key(&self) -> &SecretString {
        &self.wb_api_key
    }

    pub fn bot_token(&self) -> &SecretString {
        &self.bot_token
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    pub fn sheets_url(&self) -> Option<&str> {
        self.sheets_url.as_deref()
    }

    pub fn check_interval_secs(&self) -> u64 {
        self.check_interval_secs
    }

    pub fn log_level(&self) -> BotLogLevel {
        self.log_level
    }

    /// Operator-facing summary with secrets masked
    pub fn summary(&self) -> Vec<String> {
        vec![
            format!("Source:          {}", self.source.describe()),
            format!("WB API key:      {}", mask_secret(self.wb_api_key.expose_secret())),
            format!("Bot token:       {}", mask_secret(self.bot_token.expose_secret())),
            format!("Chat id:         {}", self.chat_id),
            format!(
                "Sheets URL:      {}",
                self.sheets_url.as_deref().unwrap_or("(not set)")
            ),
            format!("Check interval:  {}s", self.check_interval_secs),
            format!("Log level:       {}", self.log_level.as_str()),
        ]
    }
}

fn required(field: &str, value: String) -> Result<String, ProvisionError> {
    let value = value.trim().to_string();
    if value.is_empty() {
        return Err(ProvisionError::InputError(format!("{} must not be empty", field)));
    }
    Ok(value)
}

/// Record file for non-interactive runs
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordFile {
    /// Git remote; absent means a local copy
    #[serde(default)]
    pub repo_url: Option<String>,

    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default)]
    pub wb_api_key: String,

    #[serde(default)]
    pub telegram_bot_token: String,

    #[serde(default)]
    pub telegram_chat_id: String,

    #[serde(default)]
    pub google_sheets_url: Option<String>,

    #[serde(default)]
    pub check_interval_seconds: Option<u64>,

    #[serde(default)]
    pub log_level: Option<String>,
}

impl RecordFile {
    pub async fn load(path: &Path) -> Result<Self, ProvisionError> {
        File::new(path).read_json().await.map_err(|e| {
            ProvisionError::InputError(format!(
                "Unable to read record file {}: {}",
                path.display(),
                e
            ))
        })
    }

    pub fn source(&self) -> Result<SourceLocation, ProvisionError> {
        match self.repo_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => {
                SourceLocation::remote(url, self.branch.as_deref().unwrap_or(""))
            }
            _ => Ok(SourceLocation::Local),
        }
    }

    /// Validate into a record. `source` overrides the file's own source.
    pub fn into_record(
        self,
        source: Option<SourceLocation>,
    ) -> Result<ConfigurationRecord, ProvisionError> {
        let source = match source {
            Some(source) => source,
            None => self.source()?,
        };
        let log_level = self
            .log_level
            .as_deref()
            .filter(|l| !l.trim().is_empty())
            .map(str::parse::<BotLogLevel>)
            .transpose()
            .map_err(ProvisionError::InputError)?;

        ConfigurationRecord::new(RecordDraft {
            source: Some(source),
            wb_api_key: self.wb_api_key,
            bot_token: self.telegram_bot_token,
            chat_id: self.telegram_chat_id,
            sheets_url: self.google_sheets_url,
            check_interval_secs: self.check_interval_seconds,
            log_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> RecordDraft {
        RecordDraft {
            source: Some(SourceLocation::Local),
            wb_api_key: "wbkey123".to_string(),
            bot_token: "tok:abcdef".to_string(),
            chat_id: "-100555".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_applied() {
        let record = ConfigurationRecord::new(draft()).unwrap();
        assert_eq!(record.check_interval_secs(), 120);
        assert_eq!(record.log_level(), BotLogLevel::Info);
        assert_eq!(record.sheets_url(), None);
    }

    #[test]
    fn test_empty_secret_rejected() {
        for blank in ["", "   "] {
            let mut d = draft();
            d.bot_token = blank.to_string();
            let err = ConfigurationRecord::new(d).unwrap_err();
            assert!(matches!(err, ProvisionError::InputError(_)));
        }
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut d = draft();
        d.check_interval_secs = Some(0);
        assert!(ConfigurationRecord::new(d).is_err());
    }

    #[test]
    fn test_summary_masks_secrets() {
        let mut d = draft();
        d.wb_api_key = "eyJhbGciOiJFUzI1NiIsImtpZCI6".to_string();
        let record = ConfigurationRecord::new(d).unwrap();
        let summary = record.summary().join("\n");
        assert!(summary.contains("eyJhbGci..."));
        assert!(!summary.contains("eyJhbGciOiJFUzI1NiIsImtpZCI6"));
        assert!(!summary.contains("tok:abcdef"));
        assert!(summary.contains("-100555"));
    }

    #[test]
    fn test_repo_url_validation() {
        assert!(validate_repo_url("https://github.com/acme/wb-slots.git").is_ok());
        assert!(validate_repo_url("git@github.com:acme/wb-slots.git").is_ok());
        assert!(validate_repo_url("ftp://example.com/repo").is_err());
        assert!(validate_repo_url("--upload-pack=evil").is_err());
        assert!(validate_repo_url("not a url").is_err());
    }

    #[test]
    fn test_remote_source_default_branch() {
        let source = SourceLocation::remote("https://github.com/acme/bot.git", " ").unwrap();
        assert_eq!(
            source,
            SourceLocation::Remote {
                url: "https://github.com/acme/bot.git".to_string(),
                branch: "main".to_string(),
            }
        );
    }

    #[test]
    fn test_sheets_url_must_be_https() {
        let mut d = draft();
        d.sheets_url = Some("http://docs.google.com/spreadsheets/d/x".to_string());
        assert!(ConfigurationRecord::new(d).is_err());

        let mut d = draft();
        d.sheets_url = Some("https://docs.google.com/spreadsheets/d/x".to_string());
        let record = ConfigurationRecord::new(d).unwrap();
        assert_eq!(
            record.sheets_url(),
            Some("https://docs.google.com/spreadsheets/d/x")
        );
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!("warn".parse::<BotLogLevel>().unwrap(), BotLogLevel::Warning);
        assert_eq!("debug".parse::<BotLogLevel>().unwrap(), BotLogLevel::Debug);
        assert!("TRACE".parse::<BotLogLevel>().is_err());
    }

    #[test]
    fn test_record_file_into_record() {
        let file: RecordFile = serde_json::from_str(
            r#"{
                "repo_url": "https://github.com/acme/bot.git",
                "wb_api_key": "wbkey123",
                "telegram_bot_token": "tok:abcdef",
                "telegram_chat_id": "-100555",
                "log_level": "DEBUG"
            }"#,
        )
        .unwrap();
        let record = file.into_record(None).unwrap();
        assert_eq!(record.log_level(), BotLogLevel::Debug);
        assert!(matches!(record.source(), SourceLocation::Remote { branch, .. } if branch == "main"));
    }

    #[test]
    fn test_record_file_missing_secret() {
        let file: RecordFile =
            serde_json::from_str(r#"{"wb_api_key": "wbkey123", "telegram_chat_id": "1"}"#)
                .unwrap();
        assert!(matches!(
            file.into_record(None),
            Err(ProvisionError::InputError(_))
        ));
    }
}
