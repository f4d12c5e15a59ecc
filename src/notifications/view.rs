//! A mounted pending-reviews view: one subscription and one badge count per actor.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::channel::ChangeNotificationChannel;
use super::pending::PendingCountAggregator;
use super::service::AlertService;
use crate::backend::{ReviewQueue, StatusFeed, SubscriptionId};
use crate::config::ReviewsConfig;
use crate::lifecycle::Liveness;
use crate::types::{ActorId, PendingReviewCount};

pub struct ReviewsView {
    feed: Arc<dyn StatusFeed>,
    queue: Arc<dyn ReviewQueue>,
    alerts: Arc<AlertService>,
    config: ReviewsConfig,
    actor: ActorId,
    live: Liveness,
    aggregator: Arc<PendingCountAggregator>,
    subscription: Option<SubscriptionId>,
    channel_task: Option<JoinHandle<()>>,
}

impl ReviewsView {
    /// Subscribe for `actor` and compute the initial count.
    ///
    /// A failed subscription is logged and the view stays mounted without
    /// real-time updates; `refresh` still works.
    pub async fn mount(
        feed: Arc<dyn StatusFeed>,
        queue: Arc<dyn ReviewQueue>,
        alerts: Arc<AlertService>,
        config: ReviewsConfig,
        actor: ActorId,
    ) -> Self {
        let live = Liveness::new();
        let aggregator = Arc::new(PendingCountAggregator::new(
            queue.clone(),
            actor.clone(),
            config.scan_limit,
            live.clone(),
        ));

        let mut view = Self {
            feed,
            queue,
            alerts,
            config,
            actor,
            live,
            aggregator,
            subscription: None,
            channel_task: None,
        };

        // Subscribe before the first count so no completion falls in between
        match view.feed.subscribe(&view.actor).await {
            Ok(subscription) => {
                let channel = ChangeNotificationChannel::new(
                    view.aggregator.clone(),
                    view.alerts.clone(),
                    view.config.dedupe_window,
                    view.live.clone(),
                );
                view.subscription = Some(subscription.id);
                view.channel_task = Some(tokio::spawn(channel.run(subscription.events)));
            }
            Err(e) => {
                warn!(
                    actor = %view.actor,
                    error = %e,
                    "Status subscription failed, pending count will not update in real time"
                );
            }
        }

        view.aggregator.recompute().await;
        info!(actor = %view.actor, subscribed = view.is_subscribed(), "Reviews view mounted");
        view
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    /// Reactive badge value.
    pub fn pending_count(&self) -> watch::Receiver<PendingReviewCount> {
        self.aggregator.subscribe()
    }

    pub fn current(&self) -> PendingReviewCount {
        self.aggregator.current()
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn is_mounted(&self) -> bool {
        self.live.is_live()
    }

    /// Re-derive the count on demand (e.g. after the user reviewed an item).
    pub async fn refresh(&self) -> Option<PendingReviewCount> {
        self.aggregator.recompute().await
    }

    /// Close the subscription. No handler runs after this returns.
    pub fn teardown(&mut self) {
        if self.live.revoke() {
            info!(actor = %self.actor, "Reviews view torn down");
        }
        if let Some(task) = self.channel_task.take() {
            task.abort();
        }
        if let Some(id) = self.subscription.take() {
            self.feed.unsubscribe(id);
        }
    }

    /// Tear down and mount again for a different actor.
    pub async fn switch_actor(&mut self, actor: ActorId) {
        self.teardown();
        *self = Self::mount(
            self.feed.clone(),
            self.queue.clone(),
            self.alerts.clone(),
            self.config.clone(),
            actor,
        )
        .await;
    }
}

impl Drop for ReviewsView {
    fn drop(&mut self) {
        self.teardown();
    }
}
