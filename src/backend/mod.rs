//! Contract with the hosted backend.
//!
//! The engine only talks to the backend through these traits, so the hosted
//! service, the in-memory test double and the JSON file store are
//! interchangeable.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::types::{ActorId, Artifact, ChangeEvent, SessionRecord, SessionUpdate};

mod error;
pub mod file;
pub mod memory;

pub use error::BackendError;
pub use file::JsonFileSessions;
pub use memory::InMemoryBackend;

/// Read access to the artifacts generated for an actor.
#[async_trait]
pub trait ArtifactSource: Send + Sync {
    /// Number of artifacts owned by the actor
    async fn count_artifacts(&self, actor: &ActorId) -> Result<u64, BackendError>;

    /// Most recent artifacts, newest first
    async fn list_recent_artifacts(
        &self,
        actor: &ActorId,
        limit: usize,
    ) -> Result<Vec<Artifact>, BackendError>;
}

/// The queue of generation results awaiting the actor's review.
#[async_trait]
pub trait ReviewQueue: Send + Sync {
    /// Count of review-pending items, scanning at most `limit` rows
    async fn count_pending_review_items(
        &self,
        actor: &ActorId,
        limit: u32,
    ) -> Result<u32, BackendError>;
}

/// Identifier of an open status subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An open push subscription. Events stop when the backend drops its sender.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub events: mpsc::UnboundedReceiver<ChangeEvent>,
}

/// Push channel for status transitions on the review queue.
#[async_trait]
pub trait StatusFeed: Send + Sync {
    /// Subscribe to transitions of rows owned by `actor`
    async fn subscribe(&self, actor: &ActorId) -> Result<Subscription, BackendError>;

    /// Close a subscription. Must not block: it is called from teardown paths.
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Storage for the per-actor session record.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn get_session_record(
        &self,
        actor: &ActorId,
    ) -> Result<Option<SessionRecord>, BackendError>;

    /// Insert or merge, keyed by actor. Returns the stored record.
    async fn upsert_session_record(
        &self,
        actor: &ActorId,
        update: SessionUpdate,
    ) -> Result<SessionRecord, BackendError>;
}

/// Upsert with last-write-wins on the write timestamp.
///
/// An update stamped earlier than the stored `last_active_at` lost the race
/// to a newer write from another tab and leaves the record untouched.
pub(crate) fn upsert_session(
    sessions: &mut HashMap<ActorId, SessionRecord>,
    actor: &ActorId,
    update: SessionUpdate,
) -> SessionRecord {
    match sessions.get_mut(actor) {
        Some(existing) => {
            if let Some(at) = update.at {
                if at < existing.last_active_at {
                    tracing::debug!(
                        actor = %actor,
                        stale_at = %at,
                        stored_at = %existing.last_active_at,
                        "Ignoring stale session write"
                    );
                    return existing.clone();
                }
            }
            existing.apply(update);
            existing.clone()
        }
        None => {
            let record = SessionRecord::from_update(actor.clone(), update);
            sessions.insert(actor.clone(), record.clone());
            record
        }
    }
}
