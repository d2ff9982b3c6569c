//! In-memory command runner for tests

use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::ProvisionError;
use crate::host::exec::{CommandOutput, CommandRunner, CommandSpec};

struct Rule {
    pattern: String,
    output: CommandOutput,
}

/// Records every command instead of running it.
///
/// Commands succeed with empty output unless a rule matches. A rule matches
/// when its pattern is a substring of [`CommandSpec::display`]; the first
/// matching rule in insertion order wins.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<CommandSpec>>,
    rules: Mutex<Vec<Rule>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make matching commands exit with `code`
    pub fn fail_on(&self, pattern: &str, code: i32) -> &Self {
        self.push_rule(
            pattern,
            CommandOutput::failed(code, format!("simulated failure: {}", pattern)),
        )
    }

    /// Make matching commands succeed and print `stdout`
    pub fn respond(&self, pattern: &str, stdout: &str) -> &Self {
        self.push_rule(pattern, CommandOutput::ok(stdout))
    }

    fn push_rule(&self, pattern: &str, output: CommandOutput) -> &Self {
        let mut rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
        rules.push(Rule {
            pattern: pattern.to_string(),
            output,
        });
        self
    }

    /// Every command run so far, rendered with [`CommandSpec::display`]
    pub fn calls(&self) -> Vec<String> {
        self.specs().iter().map(CommandSpec::display).collect()
    }

    /// Every command run so far
    pub fn specs(&self) -> Vec<CommandSpec> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Whether any recorded command contains `pattern`
    pub fn called(&self, pattern: &str) -> bool {
        self.position(pattern).is_some()
    }

    /// Index of the first recorded command containing `pattern`
    pub fn position(&self, pattern: &str) -> Option<usize> {
        self.calls().iter().position(|call| call.contains(pattern))
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn output(&self, cmd: &CommandSpec) -> Result<CommandOutput, ProvisionError> {
        let line = cmd.display();
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(cmd.clone());

        let rules = self.rules.lock().unwrap_or_else(|e| e.into_inner());
        let output = rules
            .iter()
            .find(|rule| line.contains(&rule.pattern))
            .map(|rule| rule.output.clone())
            .unwrap_or_else(|| CommandOutput::ok(""));
        Ok(output)
    }
}
