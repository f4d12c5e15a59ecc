//! In-memory backend used by tests and the `demo` command.
//!
//! Mirrors the hosted backend's observable behaviour: counts, newest-first
//! listings, an actor-filtered push feed with at-least-once delivery, and
//! keyed session upserts. Failures and latency can be injected per operation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{
    upsert_session, ArtifactSource, BackendError, ReviewQueue, SessionRepository, StatusFeed,
    Subscription, SubscriptionId,
};
use crate::types::{ActorId, Artifact, ChangeEvent, ReviewStatus, SessionRecord, SessionUpdate};

/// A row in the simulated review queue.
#[derive(Debug, Clone)]
pub struct ReviewItem {
    pub subject_id: String,
    pub status: ReviewStatus,
    pub run_id: Option<String>,
    pub reviewed: bool,
}

#[derive(Default)]
struct Inner {
    artifacts: HashMap<ActorId, Vec<Artifact>>,
    reviews: HashMap<ActorId, Vec<ReviewItem>>,
    sessions: HashMap<ActorId, SessionRecord>,
    subscribers: HashMap<SubscriptionId, (ActorId, mpsc::UnboundedSender<ChangeEvent>)>,
    /// Remaining injected failures per operation
    fail_artifact_counts: u32,
    fail_review_counts: u32,
    fail_subscribe: bool,
    latency: Option<Duration>,
    artifact_count_calls: usize,
    review_count_calls: usize,
}

/// Shared, cloneable in-memory backend.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a test panicked mid-update; keep serving.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn simulate_latency(&self) {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }

    // ─── Artifacts ───────────────────────────────────────────────────────

    /// Record a newly generated artifact for the actor.
    pub fn add_artifact(&self, actor: &ActorId, artifact: Artifact) {
        self.lock()
            .artifacts
            .entry(actor.clone())
            .or_default()
            .push(artifact);
    }

    /// Delete the newest artifact, if any.
    pub fn remove_latest_artifact(&self, actor: &ActorId) -> Option<Artifact> {
        self.lock().artifacts.get_mut(actor).and_then(Vec::pop)
    }

    pub fn artifact_count(&self, actor: &ActorId) -> usize {
        self.lock().artifacts.get(actor).map_or(0, Vec::len)
    }

    // ─── Review queue ────────────────────────────────────────────────────

    /// Insert a pending queue row and announce it on the feed.
    pub fn enqueue_review(&self, actor: &ActorId, subject_id: impl Into<String>) {
        let subject_id = subject_id.into();
        self.lock()
            .reviews
            .entry(actor.clone())
            .or_default()
            .push(ReviewItem {
                subject_id: subject_id.clone(),
                status: ReviewStatus::Pending,
                run_id: None,
                reviewed: false,
            });
        self.publish(ChangeEvent {
            actor_id: actor.clone(),
            subject_id,
            new_status: ReviewStatus::Pending,
            linked_run_id: None,
        });
    }

    /// Transition a row to `status`, attaching `run_id`, and push the change.
    pub fn transition_review(
        &self,
        actor: &ActorId,
        subject_id: &str,
        status: ReviewStatus,
        run_id: Option<&str>,
    ) {
        {
            let mut inner = self.lock();
            let items = inner.reviews.entry(actor.clone()).or_default();
            match items.iter_mut().find(|i| i.subject_id == subject_id) {
                Some(item) => {
                    item.status = status;
                    item.run_id = run_id.map(String::from);
                }
                None => items.push(ReviewItem {
                    subject_id: subject_id.to_string(),
                    status,
                    run_id: run_id.map(String::from),
                    reviewed: false,
                }),
            }
        }
        self.publish(ChangeEvent {
            actor_id: actor.clone(),
            subject_id: subject_id.to_string(),
            new_status: status,
            linked_run_id: run_id.map(String::from),
        });
    }

    /// Shorthand for a completed run awaiting review.
    pub fn complete_review(&self, actor: &ActorId, subject_id: &str, run_id: &str) {
        self.transition_review(actor, subject_id, ReviewStatus::Completed, Some(run_id));
    }

    /// Insert `n` completed, unreviewed rows without pushing events.
    pub fn seed_completed_reviews(&self, actor: &ActorId, n: usize) {
        let mut inner = self.lock();
        let items = inner.reviews.entry(actor.clone()).or_default();
        let start = items.len();
        for i in start..start + n {
            items.push(ReviewItem {
                subject_id: format!("seed-{i}"),
                status: ReviewStatus::Completed,
                run_id: Some(format!("run-{i}")),
                reviewed: false,
            });
        }
    }

    pub fn mark_reviewed(&self, actor: &ActorId, subject_id: &str) {
        if let Some(item) = self
            .lock()
            .reviews
            .get_mut(actor)
            .and_then(|items| items.iter_mut().find(|i| i.subject_id == subject_id))
        {
            item.reviewed = true;
        }
    }

    /// Push an event to every live subscriber of its actor. Calling this
    /// twice with the same event simulates redelivery.
    pub fn publish(&self, event: ChangeEvent) {
        let mut inner = self.lock();
        inner.subscribers.retain(|_, (actor, tx)| {
            if *actor != event.actor_id {
                return true;
            }
            tx.send(event.clone()).is_ok()
        });
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    // ─── Fault injection ─────────────────────────────────────────────────

    pub fn fail_next_artifact_counts(&self, n: u32) {
        self.lock().fail_artifact_counts = n;
    }

    pub fn fail_next_review_counts(&self, n: u32) {
        self.lock().fail_review_counts = n;
    }

    pub fn fail_subscriptions(&self, fail: bool) {
        self.lock().fail_subscribe = fail;
    }

    /// Delay every read by `latency` before it observes state.
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    pub fn artifact_count_calls(&self) -> usize {
        self.lock().artifact_count_calls
    }

    pub fn review_count_calls(&self) -> usize {
        self.lock().review_count_calls
    }
}

#[async_trait]
impl ArtifactSource for InMemoryBackend {
    async fn count_artifacts(&self, actor: &ActorId) -> Result<u64, BackendError> {
        self.simulate_latency().await;
        let mut inner = self.lock();
        inner.artifact_count_calls += 1;
        if inner.fail_artifact_counts > 0 {
            inner.fail_artifact_counts -= 1;
            return Err(BackendError::unavailable(
                "count_artifacts",
                "injected failure",
            ));
        }
        Ok(inner.artifacts.get(actor).map_or(0, Vec::len) as u64)
    }

    async fn list_recent_artifacts(
        &self,
        actor: &ActorId,
        limit: usize,
    ) -> Result<Vec<Artifact>, BackendError> {
        self.simulate_latency().await;
        let inner = self.lock();
        Ok(inner
            .artifacts
            .get(actor)
            .map(|all| all.iter().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ReviewQueue for InMemoryBackend {
    async fn count_pending_review_items(
        &self,
        actor: &ActorId,
        limit: u32,
    ) -> Result<u32, BackendError> {
        self.simulate_latency().await;
        let mut inner = self.lock();
        inner.review_count_calls += 1;
        if inner.fail_review_counts > 0 {
            inner.fail_review_counts -= 1;
            return Err(BackendError::unavailable(
                "count_pending_review_items",
                "injected failure",
            ));
        }
        let pending = inner.reviews.get(actor).map_or(0, |items| {
            items
                .iter()
                .filter(|i| i.status == ReviewStatus::Completed && !i.reviewed)
                .take(limit as usize)
                .count()
        });
        Ok(pending as u32)
    }
}

#[async_trait]
impl StatusFeed for InMemoryBackend {
    async fn subscribe(&self, actor: &ActorId) -> Result<Subscription, BackendError> {
        let mut inner = self.lock();
        if inner.fail_subscribe {
            return Err(BackendError::rejected("subscribe", "injected refusal"));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let id = SubscriptionId::new();
        inner.subscribers.insert(id, (actor.clone(), tx));
        Ok(Subscription { id, events: rx })
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().subscribers.remove(&id);
    }
}

#[async_trait]
impl SessionRepository for InMemoryBackend {
    async fn get_session_record(
        &self,
        actor: &ActorId,
    ) -> Result<Option<SessionRecord>, BackendError> {
        Ok(self.lock().sessions.get(actor).cloned())
    }

    async fn upsert_session_record(
        &self,
        actor: &ActorId,
        update: SessionUpdate,
    ) -> Result<SessionRecord, BackendError> {
        let mut inner = self.lock();
        Ok(upsert_session(&mut inner.sessions, actor, update))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts_and_lists_newest_first() {
        let backend = InMemoryBackend::new();
        let actor = ActorId::new("a");
        backend.add_artifact(&actor, Artifact::new("a1", "epic", serde_json::json!({})));
        backend.add_artifact(&actor, Artifact::new("a2", "story", serde_json::json!({})));

        assert_eq!(backend.count_artifacts(&actor).await.unwrap(), 2);
        let recent = backend.list_recent_artifacts(&actor, 1).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, "a2");
    }

    #[tokio::test]
    async fn test_injected_failures_are_consumed() {
        let backend = InMemoryBackend::new();
        let actor = ActorId::new("a");
        backend.fail_next_artifact_counts(1);

        assert!(backend.count_artifacts(&actor).await.is_err());
        assert_eq!(backend.count_artifacts(&actor).await.unwrap(), 0);
        assert_eq!(backend.artifact_count_calls(), 2);
    }

    #[tokio::test]
    async fn test_feed_filters_by_actor() {
        let backend = InMemoryBackend::new();
        let alice = ActorId::new("alice");
        let bob = ActorId::new("bob");
        let mut sub = backend.subscribe(&alice).await.unwrap();

        backend.complete_review(&bob, "item-1", "run-1");
        backend.complete_review(&alice, "item-2", "run-2");

        let event = sub.events.recv().await.unwrap();
        assert_eq!(event.subject_id, "item-2");
        assert!(sub.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_closes_stream() {
        let backend = InMemoryBackend::new();
        let actor = ActorId::new("a");
        let mut sub = backend.subscribe(&actor).await.unwrap();
        assert_eq!(backend.subscriber_count(), 1);

        backend.unsubscribe(sub.id);
        assert_eq!(backend.subscriber_count(), 0);
        assert!(sub.events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_pending_count_respects_limit_and_reviewed() {
        let backend = InMemoryBackend::new();
        let actor = ActorId::new("a");
        backend.seed_completed_reviews(&actor, 150);
        assert_eq!(
            backend.count_pending_review_items(&actor, 100).await.unwrap(),
            100
        );

        backend.mark_reviewed(&actor, "seed-0");
        assert_eq!(
            backend.count_pending_review_items(&actor, 200).await.unwrap(),
            149
        );
    }
}
