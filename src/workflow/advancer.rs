//! Turns count-increase signals into step advances.

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::types::{
    CountIncrease, StepAdvance, WorkflowDefinition, WorkflowState, LAST_ARTIFACT_KEY,
};

/// Completion callback registered by the UI layer.
pub type StepCallback = Box<dyn FnMut(&StepAdvance) + Send>;

pub struct WorkflowStepAdvancer {
    definition: WorkflowDefinition,
    state: WorkflowState,
    on_step_complete: Option<StepCallback>,
}

impl WorkflowStepAdvancer {
    /// Start a fresh workflow at step 0.
    pub fn new(definition: WorkflowDefinition) -> Self {
        let state = WorkflowState::new(definition.kind.clone());
        Self::resume(definition, state)
    }

    /// Continue from a previously saved state.
    pub fn resume(definition: WorkflowDefinition, mut state: WorkflowState) -> Self {
        state.kind = definition.kind.clone();
        Self {
            definition,
            state,
            on_step_complete: None,
        }
    }

    pub fn on_step_complete(&mut self, callback: impl FnMut(&StepAdvance) + Send + 'static) {
        self.on_step_complete = Some(Box::new(callback));
    }

    pub fn with_callback(mut self, callback: impl FnMut(&StepAdvance) + Send + 'static) -> Self {
        self.on_step_complete(callback);
        self
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn definition(&self) -> &WorkflowDefinition {
        &self.definition
    }

    pub fn is_finished(&self) -> bool {
        self.definition.is_finished_at(self.state.current_step)
    }

    /// Apply one signal against the current step and notify the callback.
    ///
    /// Returns `None` without touching state when no callback is registered
    /// or the workflow already ran past its last step.
    pub fn advance(&mut self, signal: &CountIncrease) -> Option<StepAdvance> {
        if self.is_finished() {
            debug!(kind = %self.state.kind, "Ignoring artifact signal for finished workflow");
            return None;
        }
        let Some(callback) = self.on_step_complete.as_mut() else {
            debug!(kind = %self.state.kind, "No step callback registered, ignoring signal");
            return None;
        };

        let current = self.state.current_step;
        let step_key = self.definition.step_key(current);
        let artifact = signal.artifact.to_context_value();

        let mut delta = Map::new();
        delta.insert(step_key.clone(), artifact.clone());
        delta.insert(LAST_ARTIFACT_KEY.to_string(), artifact);

        let mut context = self.state.context.clone();
        merge_into(&mut context, &delta);

        let next_step = current + 1;
        let advance = StepAdvance {
            next_step,
            context_delta: delta,
            context: context.clone(),
            completed: self.definition.is_finished_at(next_step),
        };

        self.state.current_step = next_step;
        self.state.completed_steps.push(step_key);
        self.state.context = context;

        info!(
            kind = %self.state.kind,
            step = next_step,
            artifact = %signal.artifact.id,
            "Workflow step completed"
        );
        callback(&advance);

        Some(advance)
    }

    /// Discard all progress and start `definition` from step 0.
    pub fn reset(&mut self, definition: WorkflowDefinition) {
        info!(from = %self.state.kind, to = %definition.kind, "Workflow reset");
        self.state = WorkflowState::new(definition.kind.clone());
        self.definition = definition;
    }
}

fn merge_into(target: &mut Map<String, Value>, delta: &Map<String, Value>) {
    for (key, value) in delta {
        target.insert(key.clone(), value.clone());
    }
}
