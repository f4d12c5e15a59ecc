use std::fmt;

use serde::{Deserialize, Serialize};

use super::ActorId;

/// Status of a backend-owned queue row (a generation run awaiting review).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Running => "running",
            ReviewStatus::Completed => "completed",
            ReviewStatus::Failed => "failed",
            ReviewStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One update pushed by the status channel. Delivery is at-least-once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub actor_id: ActorId,
    pub subject_id: String,
    pub new_status: ReviewStatus,
    #[serde(default)]
    pub linked_run_id: Option<String>,
}

impl ChangeEvent {
    /// A real completion: terminal `completed` status with a result attached.
    pub fn is_completion(&self) -> bool {
        self.new_status == ReviewStatus::Completed && self.linked_run_id.is_some()
    }

    /// Identity of the logical event, used to collapse redeliveries.
    pub fn dedupe_key(&self) -> Option<(String, String)> {
        self.linked_run_id
            .as_ref()
            .map(|run| (self.subject_id.clone(), run.clone()))
    }
}

/// Number of items waiting for the actor's review, bounded by the scan limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingReviewCount {
    pub count: u32,
    pub limit: u32,
}

impl PendingReviewCount {
    pub fn new(count: u32, limit: u32) -> Self {
        Self {
            count: count.min(limit),
            limit,
        }
    }

    pub fn empty(limit: u32) -> Self {
        Self { count: 0, limit }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// True when the scan hit the limit and the real count may be higher.
    pub fn is_capped(&self) -> bool {
        self.limit > 0 && self.count >= self.limit
    }

    /// Badge text: the exact count, or `"{limit - 1}+"` once capped.
    /// A limit of 1 renders a capped count as `"1+"`.
    pub fn display(&self) -> String {
        if self.is_capped() {
            format!("{}+", self.limit.saturating_sub(1).max(1))
        } else {
            self.count.to_string()
        }
    }
}

impl fmt::Display for PendingReviewCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}
