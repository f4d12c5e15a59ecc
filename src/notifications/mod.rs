//! Review notifications: the push channel, the pending-review badge count and
//! the user-visible alerts raised when a generation run completes.
//!
//! Alerts fan out through `AlertService` to every registered `AlertSink`
//! (the log, a channel read by the UI layer).

use serde::{Deserialize, Serialize};

mod channel;
mod integration;
mod pending;
mod service;
mod view;

pub use channel::{ChangeNotificationChannel, DedupeWindow};
pub use integration::{AlertSink, ChannelSink, LogSink};
pub use pending::PendingCountAggregator;
pub use service::AlertService;
pub use view::ReviewsView;

use crate::types::{ActorId, ChangeEvent};

/// A user-visible alert raised once per completed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub actor_id: ActorId,
    pub title: String,
    pub message: String,
    pub subject_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
}

impl Alert {
    /// Alert for a run that finished and is waiting for review.
    pub fn review_ready(event: &ChangeEvent) -> Self {
        Self {
            actor_id: event.actor_id.clone(),
            title: "Ready for review".to_string(),
            message: format!("{} finished generating", event.subject_id),
            subject_id: event.subject_id.clone(),
            run_id: event.linked_run_id.clone(),
        }
    }
}
