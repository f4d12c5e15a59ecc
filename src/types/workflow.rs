use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Context key that always holds the most recent artifact.
pub const LAST_ARTIFACT_KEY: &str = "lastArtifact";

/// Named, ordered steps of a guided workflow (e.g. "epic" → vision, epics, stories).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub kind: String,
    #[serde(default)]
    pub steps: Vec<String>,
}

impl WorkflowDefinition {
    pub fn new(kind: impl Into<String>, steps: Vec<String>) -> Self {
        Self {
            kind: kind.into(),
            steps,
        }
    }

    /// Workflow without named steps; it never completes on its own.
    pub fn open_ended(kind: impl Into<String>) -> Self {
        Self::new(kind, Vec::new())
    }

    /// Context key for the artifact produced by step `index`.
    pub fn step_key(&self, index: u32) -> String {
        self.steps
            .get(index as usize)
            .cloned()
            .unwrap_or_else(|| format!("step_{index}"))
    }

    /// Whether reaching `step` means every defined step is done.
    pub fn is_finished_at(&self, step: u32) -> bool {
        !self.steps.is_empty() && step as usize >= self.steps.len()
    }
}

/// Progress of the active workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub kind: String,
    pub current_step: u32,
    #[serde(default)]
    pub completed_steps: Vec<String>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl WorkflowState {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            current_step: 0,
            completed_steps: Vec::new(),
            context: Map::new(),
        }
    }

    /// Start at a later step, e.g. when resuming a saved session.
    pub fn at_step(mut self, step: u32) -> Self {
        self.current_step = step;
        self
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = context;
        self
    }
}

/// Proposal handed to the `on_step_complete` callback.
#[derive(Debug, Clone, PartialEq)]
pub struct StepAdvance {
    pub next_step: u32,
    /// Only the keys written by this advance
    pub context_delta: Map<String, Value>,
    /// Prior context with the delta merged over it
    pub context: Map<String, Value>,
    /// Set when `next_step` runs past the last defined step
    pub completed: bool,
}
