use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ActorId;

/// The single "where the user left off" record kept per actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub actor_id: ActorId,
    #[serde(default)]
    pub last_workflow_type: Option<String>,
    #[serde(default)]
    pub last_squad_id: Option<String>,
    #[serde(default)]
    pub last_context_id: Option<String>,
    #[serde(default)]
    pub last_tab: Option<String>,
    /// Opaque blob owned by the UI (e.g. partially-filled workflow inputs)
    #[serde(default)]
    pub freeform_payload: serde_json::Value,
    pub last_active_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Create a record from a first write.
    pub fn from_update(actor_id: ActorId, update: SessionUpdate) -> Self {
        let at = update.at.unwrap_or_else(Utc::now);
        let mut record = Self {
            actor_id,
            last_workflow_type: None,
            last_squad_id: None,
            last_context_id: None,
            last_tab: None,
            freeform_payload: serde_json::Value::Null,
            last_active_at: at,
        };
        record.apply(update);
        record
    }

    /// Overwrite only the fields present in `update` and refresh the timestamp.
    pub fn apply(&mut self, update: SessionUpdate) {
        if let Some(v) = update.last_workflow_type {
            self.last_workflow_type = Some(v);
        }
        if let Some(v) = update.last_squad_id {
            self.last_squad_id = Some(v);
        }
        if let Some(v) = update.last_context_id {
            self.last_context_id = Some(v);
        }
        if let Some(v) = update.last_tab {
            self.last_tab = Some(v);
        }
        if let Some(v) = update.freeform_payload {
            self.freeform_payload = v;
        }
        self.last_active_at = update.at.unwrap_or_else(Utc::now);
    }

    /// What a "continue where you left off" affordance should offer, if anything.
    pub fn resume_target(&self) -> Option<ResumeTarget> {
        let workflow_type = self.last_workflow_type.clone()?;
        Some(ResumeTarget {
            workflow_type,
            squad_id: self.last_squad_id.clone(),
            context_id: self.last_context_id.clone(),
            tab: self.last_tab.clone(),
            last_active_at: self.last_active_at,
        })
    }
}

/// Partial update for a session record. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_workflow_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_squad_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_context_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_tab: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub freeform_payload: Option<serde_json::Value>,
    /// Write timestamp; stamped by the session store when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<DateTime<Utc>>,
}

impl SessionUpdate {
    pub fn workflow_type(mut self, value: impl Into<String>) -> Self {
        self.last_workflow_type = Some(value.into());
        self
    }

    pub fn squad(mut self, value: impl Into<String>) -> Self {
        self.last_squad_id = Some(value.into());
        self
    }

    pub fn context(mut self, value: impl Into<String>) -> Self {
        self.last_context_id = Some(value.into());
        self
    }

    pub fn tab(mut self, value: impl Into<String>) -> Self {
        self.last_tab = Some(value.into());
        self
    }

    pub fn payload(mut self, value: serde_json::Value) -> Self {
        self.freeform_payload = Some(value);
        self
    }

    pub fn stamped(mut self, at: DateTime<Utc>) -> Self {
        self.at = Some(at);
        self
    }
}

/// Where a resumed session should land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeTarget {
    pub workflow_type: String,
    pub squad_id: Option<String>,
    pub context_id: Option<String>,
    pub tab: Option<String>,
    pub last_active_at: DateTime<Utc>,
}
