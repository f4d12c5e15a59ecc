//! "Continue where you left off" records, one per actor.
//!
//! Writes are upserts keyed by actor id; concurrent writers (several tabs,
//! several devices) resolve last-write-wins on the write timestamp. Reads
//! always go to the repository.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::backend::{BackendError, SessionRepository};
use crate::types::{ActorId, ResumeTarget, SessionRecord, SessionUpdate, WorkflowState};

#[derive(Clone)]
pub struct SessionContinuityStore {
    repo: Arc<dyn SessionRepository>,
}

impl SessionContinuityStore {
    pub fn new(repo: Arc<dyn SessionRepository>) -> Self {
        Self { repo }
    }

    /// The actor's record, or `None` on a first visit.
    pub async fn read(&self, actor: &ActorId) -> Result<Option<SessionRecord>, BackendError> {
        self.repo.get_session_record(actor).await
    }

    /// Upsert the supplied fields. Unstamped updates are stamped now.
    pub async fn write(
        &self,
        actor: &ActorId,
        mut update: SessionUpdate,
    ) -> Result<SessionRecord, BackendError> {
        if update.at.is_none() {
            update.at = Some(Utc::now());
        }
        let record = self.repo.upsert_session_record(actor, update).await?;
        debug!(actor = %actor, at = %record.last_active_at, "Session record written");
        Ok(record)
    }

    /// Bind to one actor for the lifetime of a UI session.
    pub fn bind(&self, actor: ActorId) -> ActorSession {
        let (tx, _) = watch::channel(None);
        ActorSession {
            store: self.clone(),
            actor,
            tx,
        }
    }
}

/// The session record of one actor, exposed as a reactive value.
pub struct ActorSession {
    store: SessionContinuityStore,
    actor: ActorId,
    tx: watch::Sender<Option<SessionRecord>>,
}

impl ActorSession {
    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    pub fn session(&self) -> watch::Receiver<Option<SessionRecord>> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Option<SessionRecord> {
        self.tx.borrow().clone()
    }

    /// Read once at session start. A failed read is logged and treated as
    /// "nothing to resume".
    pub async fn load(&self) -> Option<SessionRecord> {
        match self.store.read(&self.actor).await {
            Ok(record) => {
                self.tx.send_replace(record.clone());
                record
            }
            Err(e) => {
                warn!(actor = %self.actor, error = %e, "Session read failed");
                None
            }
        }
    }

    /// Write a partial update and publish the stored record.
    pub async fn update_session(&self, update: SessionUpdate) -> Option<SessionRecord> {
        match self.store.write(&self.actor, update).await {
            Ok(record) => {
                self.tx.send_replace(Some(record.clone()));
                Some(record)
            }
            Err(e) => {
                warn!(actor = %self.actor, error = %e, "Session write failed");
                None
            }
        }
    }

    /// Remember the active workflow and its progress.
    pub async fn record_workflow(&self, state: &WorkflowState) -> Option<SessionRecord> {
        let update = SessionUpdate::default()
            .workflow_type(state.kind.clone())
            .payload(json!({
                "current_step": state.current_step,
                "completed_steps": state.completed_steps,
                "context": state.context,
            }));
        self.update_session(update).await
    }

    pub fn resume_target(&self) -> Option<ResumeTarget> {
        self.tx.borrow().as_ref().and_then(SessionRecord::resume_target)
    }

    /// Workflow state saved by `record_workflow`, if the payload holds one.
    pub fn saved_workflow(&self) -> Option<WorkflowState> {
        let record = self.tx.borrow().clone()?;
        let kind = record.last_workflow_type?;
        let payload = record.freeform_payload;
        let current_step = u32::try_from(payload.get("current_step")?.as_u64()?).ok()?;
        let completed_steps = payload
            .get("completed_steps")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let context = payload
            .get("context")
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default();
        Some(WorkflowState {
            kind,
            current_step,
            completed_steps,
            context,
        })
    }
}
