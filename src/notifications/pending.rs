//! Pending-review count, always re-derived from the backend.
//!
//! The count is never adjusted from an event payload; every trigger re-runs
//! the capped count query and overwrites the published value. That keeps
//! duplicate or reordered push deliveries from drifting the badge.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, error, warn};

use crate::backend::{BackendError, ReviewQueue};
use crate::lifecycle::Liveness;
use crate::types::{ActorId, PendingReviewCount};

pub struct PendingCountAggregator {
    queue: Arc<dyn ReviewQueue>,
    actor: ActorId,
    limit: u32,
    tx: watch::Sender<PendingReviewCount>,
    /// Generation handed to the most recently started recompute
    issued: AtomicU64,
    /// Generation of the value currently published
    applied: Mutex<u64>,
    live: Liveness,
}

impl PendingCountAggregator {
    pub fn new(queue: Arc<dyn ReviewQueue>, actor: ActorId, limit: u32, live: Liveness) -> Self {
        let (tx, _) = watch::channel(PendingReviewCount::empty(limit));
        Self {
            queue,
            actor,
            limit,
            tx,
            issued: AtomicU64::new(0),
            applied: Mutex::new(0),
            live,
        }
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    /// Reactive badge value.
    pub fn subscribe(&self) -> watch::Receiver<PendingReviewCount> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> PendingReviewCount {
        *self.tx.borrow()
    }

    /// Query the backend without publishing.
    pub async fn fetch(&self) -> Result<PendingReviewCount, BackendError> {
        let count = self
            .queue
            .count_pending_review_items(&self.actor, self.limit)
            .await?;
        Ok(PendingReviewCount::new(count, self.limit))
    }

    /// Re-derive the count and publish it.
    ///
    /// Returns the published value, or `None` when the fetch failed, the view
    /// was torn down meanwhile, or a newer recompute already published.
    pub async fn recompute(&self) -> Option<PendingReviewCount> {
        let generation = self.issued.fetch_add(1, Ordering::AcqRel) + 1;

        let count = match self.fetch().await {
            Ok(count) => count,
            Err(e) if e.is_transient() => {
                warn!(actor = %self.actor, error = %e, "Pending review count failed, keeping last value");
                return None;
            }
            Err(e) => {
                error!(actor = %self.actor, error = %e, "Pending review count rejected, keeping last value");
                return None;
            }
        };

        let published = self.live.run_if_live(|| self.publish(generation, count));
        if published.is_none() {
            debug!(actor = %self.actor, "Discarding pending count that landed after teardown");
        }
        published.flatten()
    }

    /// Overwrite the published value unless a newer generation already did.
    fn publish(&self, generation: u64, count: PendingReviewCount) -> Option<PendingReviewCount> {
        let mut applied = self.applied.lock().unwrap_or_else(|e| e.into_inner());
        if *applied > generation {
            debug!(actor = %self.actor, generation, newer = *applied, "Discarding stale pending count");
            return None;
        }
        *applied = generation;
        self.tx.send_replace(count);
        debug!(actor = %self.actor, count = count.count, "Pending review count updated");
        Some(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Answers each count call with the next scripted (delay, result).
    struct ScriptedQueue {
        replies: Mutex<VecDeque<(Duration, Result<u32, BackendError>)>>,
    }

    impl ScriptedQueue {
        fn new(replies: Vec<(Duration, Result<u32, BackendError>)>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
            })
        }
    }

    #[async_trait]
    impl ReviewQueue for ScriptedQueue {
        async fn count_pending_review_items(
            &self,
            _actor: &ActorId,
            _limit: u32,
        ) -> Result<u32, BackendError> {
            let (delay, reply) = self
                .replies
                .lock()
                .unwrap()
                .pop_front()
                .expect("unscripted count call");
            tokio::time::sleep(delay).await;
            reply
        }
    }

    fn aggregator(backend: &InMemoryBackend, limit: u32, live: Liveness) -> PendingCountAggregator {
        PendingCountAggregator::new(Arc::new(backend.clone()), ActorId::new("a"), limit, live)
    }

    #[tokio::test]
    async fn test_recompute_publishes_capped_count() {
        let backend = InMemoryBackend::new();
        backend.seed_completed_reviews(&ActorId::new("a"), 150);
        let agg = aggregator(&backend, 100, Liveness::new());
        let rx = agg.subscribe();

        let count = agg.recompute().await.unwrap();
        assert_eq!(count.display(), "99+");
        assert_eq!(rx.borrow().display(), "99+");
    }

    #[tokio::test]
    async fn test_recompute_is_idempotent() {
        let backend = InMemoryBackend::new();
        backend.seed_completed_reviews(&ActorId::new("a"), 3);
        let agg = aggregator(&backend, 100, Liveness::new());

        agg.recompute().await;
        agg.recompute().await;
        agg.recompute().await;
        assert_eq!(agg.current().count, 3);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_last_value() {
        let backend = InMemoryBackend::new();
        backend.seed_completed_reviews(&ActorId::new("a"), 2);
        let agg = aggregator(&backend, 100, Liveness::new());
        agg.recompute().await;

        backend.seed_completed_reviews(&ActorId::new("a"), 5);
        backend.fail_next_review_counts(1);
        assert!(agg.recompute().await.is_none());
        assert_eq!(agg.current().count, 2);

        assert_eq!(agg.recompute().await.unwrap().count, 7);
    }

    #[tokio::test]
    async fn test_result_after_teardown_is_discarded() {
        let backend = InMemoryBackend::new();
        backend.seed_completed_reviews(&ActorId::new("a"), 4);
        let live = Liveness::new();
        let agg = aggregator(&backend, 100, live.clone());

        live.revoke();
        assert!(agg.recompute().await.is_none());
        assert!(agg.current().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_older_recompute_never_overwrites_newer() {
        let queue = ScriptedQueue::new(vec![
            (Duration::from_millis(100), Ok(5)),
            (Duration::ZERO, Ok(7)),
        ]);
        let agg = PendingCountAggregator::new(queue, ActorId::new("a"), 100, Liveness::new());

        // First recompute is issued first but resolves last
        let (older, newer) = tokio::join!(agg.recompute(), agg.recompute());

        assert!(older.is_none());
        assert_eq!(newer.unwrap().count, 7);
        assert_eq!(agg.current().count, 7);
    }

    #[tokio::test]
    async fn test_rejected_fetch_keeps_last_value() {
        let queue = ScriptedQueue::new(vec![
            (Duration::ZERO, Ok(3)),
            (
                Duration::ZERO,
                Err(BackendError::rejected("count_pending_review_items", "policy")),
            ),
        ]);
        let agg = PendingCountAggregator::new(queue, ActorId::new("a"), 100, Liveness::new());

        agg.recompute().await;
        assert!(agg.recompute().await.is_none());
        assert_eq!(agg.current().count, 3);
    }
}
