use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A deliverable produced by workflow progress (a generated epic, story,
/// canvas...). The engine never looks inside `payload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(id: impl Into<String>, kind: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            payload,
            created_at: Utc::now(),
        }
    }

    /// JSON form stored in workflow context.
    pub fn to_context_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

/// Result of one poll: how many artifacts the actor owns and the newest one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactSnapshot {
    pub count: u64,
    pub most_recent_id: Option<String>,
}

/// Signal emitted by the watcher when the observed count strictly increased.
#[derive(Debug, Clone, PartialEq)]
pub struct CountIncrease {
    pub from: u64,
    pub to: u64,
    /// Newest artifact at the time of the increasing read
    pub artifact: Artifact,
}

impl CountIncrease {
    /// Number of artifacts that appeared since the previous observation.
    /// Greater than one when several were created inside one polling window.
    pub fn delta(&self) -> u64 {
        self.to - self.from
    }
}
