//! Interactive configuration collection

use std::collections::VecDeque;
use std::io::{BufRead, Write};

use crate::config::record::{
    validate_repo_url, validate_sheets_url, BotLogLevel, ConfigurationRecord, RecordDraft,
    SourceLocation, DEFAULT_BRANCH, DEFAULT_CHECK_INTERVAL_SECS,
};
use crate::errors::ProvisionError;

/// Terminal the operator answers questions on
pub trait Prompter {
    /// Ask a question and return the raw answer without the line ending.
    /// Fails when input is closed.
    fn ask(&mut self, question: &str) -> Result<String, ProvisionError>;

    /// Show a line of text
    fn show(&mut self, line: &str);
}

/// Prompter over the process's stdin and stdout
pub struct StdioPrompter;

impl Prompter for StdioPrompter {
    fn ask(&mut self, question: &str) -> Result<String, ProvisionError> {
        let mut stdout = std::io::stdout();
        write!(stdout, "{}: ", question)?;
        stdout.flush()?;

        let mut line = String::new();
        let read = std::io::stdin().lock().read_line(&mut line)?;
        if read == 0 {
            return Err(ProvisionError::InputError("Input closed".to_string()));
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }

    fn show(&mut self, line: &str) {
        println!("{}", line);
    }
}

/// Prompter answering from a fixed script, for tests and dry runs
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    questions: Vec<String>,
    shown: Vec<String>,
}

impl ScriptedPrompter {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Questions asked so far
    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    /// Lines shown so far
    pub fn shown(&self) -> &[String] {
        &self.shown
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }
}

impl Prompter for ScriptedPrompter {
    fn ask(&mut self, question: &str) -> Result<String, ProvisionError> {
        self.questions.push(question.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| ProvisionError::InputError("Input closed".to_string()))
    }

    fn show(&mut self, line: &str) {
        self.shown.push(line.to_string());
    }
}

/// Outcome of the confirmation gate
#[derive(Debug)]
pub enum Confirmation<T> {
    Confirmed(T),
    Cancelled,
}

/// Prompts for configuration and gates it behind an explicit confirmation
pub struct ConfigCollector<'a> {
    prompter: &'a mut dyn Prompter,
}

impl<'a> ConfigCollector<'a> {
    pub fn new(prompter: &'a mut dyn Prompter) -> Self {
        Self { prompter }
    }

    /// Collect only the source location (phase-1 runs)
    pub fn collect_source(&mut self) -> Result<Confirmation<SourceLocation>, ProvisionError> {
        let source = self.ask_source()?;
        let summary = vec![format!("Source:          {}", source.describe())];
        if self.confirm(&summary)? {
            Ok(Confirmation::Confirmed(source))
        } else {
            Ok(Confirmation::Cancelled)
        }
    }

    /// Collect a full record. A given `source` skips the source questions.
    pub fn collect_record(
        &mut self,
        source: Option<SourceLocation>,
    ) -> Result<Confirmation<ConfigurationRecord>, ProvisionError> {
        let source = match source {
            Some(source) => source,
            None => self.ask_source()?,
        };

        let draft = RecordDraft {
            source: Some(source),
            wb_api_key: self.ask_required("WB API key")?,
            bot_token: self.ask_required("Telegram bot token")?,
            chat_id: self.ask_required("Telegram chat id")?,
            sheets_url: self.ask_sheets_url()?,
            check_interval_secs: Some(self.ask_interval()?),
            log_level: Some(self.ask_log_level()?),
        };
        let record = ConfigurationRecord::new(draft)?;

        if self.confirm(&record.summary())? {
            Ok(Confirmation::Confirmed(record))
        } else {
            Ok(Confirmation::Cancelled)
        }
    }

    fn ask_source(&mut self) -> Result<SourceLocation, ProvisionError> {
        loop {
            let url = self
                .prompter
                .ask("Git repository URL (empty to copy from the current directory)")?;
            let url = url.trim();
            if url.is_empty() {
                return Ok(SourceLocation::Local);
            }
            if let Err(e) = validate_repo_url(url) {
                self.prompter.show(&e);
                continue;
            }

            let branch = self
                .prompter
                .ask(&format!("Branch [{}]", DEFAULT_BRANCH))?;
            match SourceLocation::remote(url, &branch) {
                Ok(source) => return Ok(source),
                Err(e) => self.prompter.show(&e.to_string()),
            }
        }
    }

    /// Mandatory fields re-prompt until answered. There is no retry limit.
    fn ask_required(&mut self, label: &str) -> Result<String, ProvisionError> {
        loop {
            let answer = self.prompter.ask(label)?;
            let answer = answer.trim();
            if !answer.is_empty() {
                return Ok(answer.to_string());
            }
            self.prompter.show(&format!("{} is required", label));
        }
    }

    fn ask_sheets_url(&mut self) -> Result<Option<String>, ProvisionError> {
        loop {
            let answer = self.prompter.ask("Google Sheets URL (optional)")?;
            let answer = answer.trim();
            if answer.is_empty() {
                return Ok(None);
            }
            match validate_sheets_url(answer) {
                Ok(()) => return Ok(Some(answer.to_string())),
                Err(e) => self.prompter.show(&e),
            }
        }
    }

    fn ask_interval(&mut self) -> Result<u64, ProvisionError> {
        loop {
            let answer = self.prompter.ask(&format!(
                "Check interval in seconds [{}]",
                DEFAULT_CHECK_INTERVAL_SECS
            ))?;
            let answer = answer.trim();
            if answer.is_empty() {
                return Ok(DEFAULT_CHECK_INTERVAL_SECS);
            }
            match answer.parse::<u64>() {
                Ok(secs) if secs > 0 => return Ok(secs),
                _ => self
                    .prompter
                    .show("Check interval must be a positive whole number"),
            }
        }
    }

    fn ask_log_level(&mut self) -> Result<BotLogLevel, ProvisionError> {
        loop {
            let answer = self.prompter.ask("Log level DEBUG/INFO/WARNING [INFO]")?;
            if answer.trim().is_empty() {
                return Ok(BotLogLevel::default());
            }
            match answer.parse::<BotLogLevel>() {
                Ok(level) => return Ok(level),
                Err(e) => self.prompter.show(&e),
            }
        }
    }

    /// Only a single `y` or `Y` confirms
    fn confirm(&mut self, summary: &[String]) -> Result<bool, ProvisionError> {
        self.prompter.show("");
        self.prompter.show("Configuration:");
        for line in summary {
            self.prompter.show(&format!("  {}", line));
        }
        self.prompter.show("");

        let answer = self.prompter.ask("Proceed with installation? [y/N]")?;
        Ok(answer.trim().eq_ignore_ascii_case("y"))
    }
}
