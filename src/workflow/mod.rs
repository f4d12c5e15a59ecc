//! Workflow progress inferred from artifact creation.
//!
//! `ArtifactCountWatcher` polls, `WorkflowStepAdvancer` turns increases into
//! step advances, and `ActiveWorkflow` owns both for the lifetime of one
//! workflow run.

mod advancer;
mod driver;
mod watcher;

pub use advancer::{StepCallback, WorkflowStepAdvancer};
pub use driver::ActiveWorkflow;
pub use watcher::{ArtifactCountWatcher, DEFAULT_POLL_INTERVAL};
