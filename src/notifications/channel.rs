//! Push channel consumer for review-queue status transitions.
//!
//! The feed delivers at-least-once, so the same completion may arrive several
//! times. Each logical completion `(subject, run)` triggers one recompute of
//! the pending count and one alert; repeats are dropped.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, instrument};

use super::pending::PendingCountAggregator;
use super::service::AlertService;
use super::Alert;
use crate::lifecycle::Liveness;
use crate::types::{ActorId, ChangeEvent};

/// Bounded memory of recently handled completions.
#[derive(Debug)]
pub struct DedupeWindow {
    seen: HashSet<(String, String)>,
    order: VecDeque<(String, String)>,
    capacity: usize,
}

impl DedupeWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Returns false if `key` was already seen.
    pub fn insert(&mut self, key: (String, String)) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.seen.insert(key.clone());
        self.order.push_back(key);
        true
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

pub struct ChangeNotificationChannel {
    actor: ActorId,
    aggregator: Arc<PendingCountAggregator>,
    alerts: Arc<AlertService>,
    dedupe: DedupeWindow,
    live: Liveness,
}

impl ChangeNotificationChannel {
    pub fn new(
        aggregator: Arc<PendingCountAggregator>,
        alerts: Arc<AlertService>,
        dedupe_window: usize,
        live: Liveness,
    ) -> Self {
        Self {
            actor: aggregator.actor().clone(),
            aggregator,
            alerts,
            dedupe: DedupeWindow::new(dedupe_window),
            live,
        }
    }

    /// Handle one pushed event. Returns true if it was a new completion.
    pub async fn handle_event(&mut self, event: ChangeEvent) -> bool {
        if event.actor_id != self.actor {
            debug!(other = %event.actor_id, "Ignoring event for another actor");
            return false;
        }
        if !event.is_completion() {
            debug!(
                subject = %event.subject_id,
                status = %event.new_status,
                "Ignoring non-completion update"
            );
            return false;
        }
        let Some(key) = event.dedupe_key() else {
            return false;
        };
        if !self.dedupe.insert(key) {
            debug!(subject = %event.subject_id, "Ignoring redelivered completion");
            return false;
        }

        info!(
            subject = %event.subject_id,
            run = event.linked_run_id.as_deref().unwrap_or("-"),
            "Generation completed"
        );
        self.aggregator.recompute().await;

        // Dispatch inside the gate so teardown cannot return mid-dispatch
        let alerts = &self.alerts;
        self.live
            .run_if_live(|| alerts.notify(Alert::review_ready(&event)))
            .is_some()
    }

    /// Consume the subscription until it closes or the view is torn down.
    #[instrument(skip_all, fields(actor = %self.actor))]
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<ChangeEvent>) {
        while let Some(event) = events.recv().await {
            if !self.live.is_live() {
                break;
            }
            self.handle_event(event).await;
        }
        debug!("Change notification channel closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use crate::config::AlertsConfig;
    use crate::notifications::ChannelSink;
    use crate::types::ReviewStatus;

    struct Fixture {
        backend: InMemoryBackend,
        channel: ChangeNotificationChannel,
        aggregator: Arc<PendingCountAggregator>,
        alerts: mpsc::UnboundedReceiver<Alert>,
        live: Liveness,
    }

    fn fixture() -> Fixture {
        let backend = InMemoryBackend::new();
        let live = Liveness::new();
        let aggregator = Arc::new(PendingCountAggregator::new(
            Arc::new(backend.clone()),
            ActorId::new("a"),
            100,
            live.clone(),
        ));
        let (tx, alerts) = mpsc::unbounded_channel();
        let service = AlertService::from_config(&AlertsConfig {
            enabled: true,
            log_alerts: false,
        })
        .with_sink(Arc::new(ChannelSink::new(tx)));
        let channel =
            ChangeNotificationChannel::new(aggregator.clone(), Arc::new(service), 16, live.clone());
        Fixture {
            backend,
            channel,
            aggregator,
            alerts,
            live,
        }
    }

    fn completed(subject: &str, run: &str) -> ChangeEvent {
        ChangeEvent {
            actor_id: ActorId::new("a"),
            subject_id: subject.into(),
            new_status: ReviewStatus::Completed,
            linked_run_id: Some(run.into()),
        }
    }

    #[test]
    fn test_dedupe_window_evicts_oldest() {
        let mut window = DedupeWindow::new(2);
        assert!(window.insert(("a".into(), "1".into())));
        assert!(!window.insert(("a".into(), "1".into())));
        assert!(window.insert(("b".into(), "1".into())));
        assert!(window.insert(("c".into(), "1".into())));
        assert_eq!(window.len(), 2);
        // "a" fell out of the window
        assert!(window.insert(("a".into(), "1".into())));
    }

    #[tokio::test]
    async fn test_duplicate_completion_alerts_once() {
        let mut f = fixture();
        f.backend.seed_completed_reviews(&ActorId::new("a"), 1);

        assert!(f.channel.handle_event(completed("epic-1", "run-1")).await);
        let after_first = f.aggregator.current();
        assert!(!f.channel.handle_event(completed("epic-1", "run-1")).await);

        assert_eq!(f.aggregator.current(), after_first);
        assert_eq!(f.backend.review_count_calls(), 1);
        assert_eq!(f.alerts.recv().await.unwrap().subject_id, "epic-1");
        tokio::task::yield_now().await;
        assert!(f.alerts.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_partial_updates_are_ignored() {
        let mut f = fixture();
        let mut running = completed("epic-1", "run-1");
        running.new_status = ReviewStatus::Running;
        let mut no_result = completed("epic-1", "run-1");
        no_result.linked_run_id = None;
        let mut foreign = completed("epic-1", "run-1");
        foreign.actor_id = ActorId::new("b");

        assert!(!f.channel.handle_event(running).await);
        assert!(!f.channel.handle_event(no_result).await);
        assert!(!f.channel.handle_event(foreign).await);
        assert_eq!(f.backend.review_count_calls(), 0);
    }

    #[tokio::test]
    async fn test_new_run_for_same_subject_counts_again() {
        let mut f = fixture();
        assert!(f.channel.handle_event(completed("epic-1", "run-1")).await);
        assert!(f.channel.handle_event(completed("epic-1", "run-2")).await);
        assert_eq!(f.backend.review_count_calls(), 2);
    }

    #[tokio::test]
    async fn test_no_alert_after_teardown() {
        let mut f = fixture();
        f.live.revoke();

        assert!(!f.channel.handle_event(completed("epic-1", "run-1")).await);
        tokio::task::yield_now().await;
        assert!(f.alerts.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_stops_after_teardown() {
        let f = fixture();
        let (tx, rx) = mpsc::unbounded_channel();
        let backend = f.backend.clone();
        let live = f.live.clone();
        let task = tokio::spawn(f.channel.run(rx));

        live.revoke();
        tx.send(completed("epic-1", "run-1")).unwrap();
        task.await.unwrap();
        assert_eq!(backend.review_count_calls(), 0);
    }
}
