//! Progress of a pipeline run

use std::fmt;

/// A unit of host mutation, in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Packages,
    Identity,
    Source,
    Runtime,
    Configure,
    Unit,
    Permissions,
    Validate,
    Start,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Packages => "packages",
            Stage::Identity => "identity",
            Stage::Source => "source",
            Stage::Runtime => "runtime",
            Stage::Configure => "configure",
            Stage::Unit => "unit",
            Stage::Permissions => "permissions",
            Stage::Validate => "validate",
            Stage::Start => "start",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stages finished and which one is in flight.
///
/// Rollback reads this to decide what to undo: a stage that started may have
/// left partial state even if it failed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PipelineState {
    completed: Vec<Stage>,
    current: Option<Stage>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, stage: Stage) {
        self.current = Some(stage);
    }

    /// Mark the in-flight stage as finished
    pub fn complete(&mut self) {
        if let Some(stage) = self.current.take() {
            self.completed.push(stage);
        }
    }

    pub fn completed(&self) -> &[Stage] {
        &self.completed
    }

    /// The stage that was running when the pipeline stopped, if any
    pub fn current(&self) -> Option<Stage> {
        self.current
    }

    /// Whether `stage` started, finished or not
    pub fn touched(&self, stage: Stage) -> bool {
        self.current == Some(stage) || self.completed.contains(&stage)
    }

    /// Whether anything on the host may have changed
    pub fn mutated(&self) -> bool {
        self.current.is_some() || !self.completed.is_empty()
    }
}
