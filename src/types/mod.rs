//! Domain types shared by the workflow, notification and session layers.
//!
//! These types are plain serde data; the backend traits exchange them and the
//! UI layer receives them through callbacks and `watch` channels.

mod artifact;
mod review;
mod session;
mod workflow;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use artifact::{Artifact, ArtifactSnapshot, CountIncrease};
pub use review::{ChangeEvent, PendingReviewCount, ReviewStatus};
pub use session::{ResumeTarget, SessionRecord, SessionUpdate};
pub use workflow::{StepAdvance, WorkflowDefinition, WorkflowState, LAST_ARTIFACT_KEY};

/// The authenticated user on whose behalf polling, subscriptions and
/// session records operate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

impl ActorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ActorId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_id_serializes_as_plain_string() {
        let actor = ActorId::new("user-42");
        assert_eq!(serde_json::to_string(&actor).unwrap(), "\"user-42\"");
        assert_eq!(actor.to_string(), "user-42");
    }
}
