//! Artifact count watcher - polls the artifact store and detects new artifacts.
//!
//! Step completion is never signalled directly; it is inferred from the
//! actor's artifact count going up:
//! - One baseline read on activation, before any comparison
//! - Every tick compares against the last observed count
//! - Only a strict increase emits a `CountIncrease`
//! - Failed reads skip the tick; the loop keeps running
//! - A read that outlives one poll interval fails with `BackendError::Timeout`

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

use crate::backend::{ArtifactSource, BackendError};
use crate::lifecycle::Liveness;
use crate::types::{ActorId, ArtifactSnapshot, CountIncrease};

/// Default poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Per-workflow watcher. Each instance owns its own baseline.
pub struct ArtifactCountWatcher {
    source: Arc<dyn ArtifactSource>,
    actor: ActorId,
    poll_interval: Duration,
    /// Last observed snapshot; `None` until a read has succeeded
    last: Option<ArtifactSnapshot>,
}

impl ArtifactCountWatcher {
    pub fn new(source: Arc<dyn ArtifactSource>, actor: ActorId) -> Self {
        Self {
            source,
            actor,
            poll_interval: DEFAULT_POLL_INTERVAL,
            last: None,
        }
    }

    /// Create with custom poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Count the next comparison runs against, if a read has succeeded yet.
    pub fn baseline(&self) -> Option<u64> {
        self.last.as_ref().map(|s| s.count)
    }

    /// Seed the baseline. A failed read leaves the watcher armed without one;
    /// the first successful poll then becomes the baseline instead.
    pub async fn arm(&mut self) {
        match self.count().await {
            Ok(count) => {
                debug!(actor = %self.actor, count, "Artifact baseline established");
                self.last = Some(ArtifactSnapshot {
                    count,
                    most_recent_id: None,
                });
            }
            Err(e) => {
                warn!(actor = %self.actor, error = %e, "Baseline artifact count failed");
            }
        }
    }

    /// Read the count once and compare it with the last observation.
    pub async fn poll_once(&mut self) -> Result<Option<CountIncrease>, BackendError> {
        let count = self.count().await?;

        let Some(previous) = self.last.as_ref().map(|s| s.count) else {
            debug!(actor = %self.actor, count, "Late artifact baseline established");
            self.last = Some(ArtifactSnapshot {
                count,
                most_recent_id: None,
            });
            return Ok(None);
        };

        if count <= previous {
            if count < previous {
                debug!(actor = %self.actor, previous, count, "Artifact count decreased");
                if let Some(last) = self.last.as_mut() {
                    last.count = count;
                }
            }
            return Ok(None);
        }

        let artifact = tokio::time::timeout(
            self.poll_interval,
            self.source.list_recent_artifacts(&self.actor, 1),
        )
        .await
        .map_err(|_| BackendError::timeout("list_recent_artifacts"))??
        .into_iter()
        .next();

        // Count and listing disagree; keep the old baseline and retry next tick
        let Some(artifact) = artifact else {
            warn!(actor = %self.actor, count, "Count increased but no artifact listed");
            return Ok(None);
        };

        self.last = Some(ArtifactSnapshot {
            count,
            most_recent_id: Some(artifact.id.clone()),
        });

        Ok(Some(CountIncrease {
            from: previous,
            to: count,
            artifact,
        }))
    }

    async fn count(&self) -> Result<u64, BackendError> {
        tokio::time::timeout(self.poll_interval, self.source.count_artifacts(&self.actor))
            .await
            .map_err(|_| BackendError::timeout("count_artifacts"))?
    }

    /// Run the polling loop until `live` is revoked or the receiver is dropped.
    #[instrument(skip_all, fields(actor = %self.actor))]
    pub async fn run(mut self, tx: mpsc::UnboundedSender<CountIncrease>, live: Liveness) {
        info!(
            "Artifact watcher started, poll interval: {:?}",
            self.poll_interval
        );

        self.arm().await;

        // First comparison happens one period after activation
        let mut interval =
            tokio::time::interval_at(Instant::now() + self.poll_interval, self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if !live.is_live() {
                break;
            }

            match self.poll_once().await {
                Ok(Some(signal)) => {
                    if !live.is_live() {
                        debug!("Discarding count increase observed after deactivation");
                        break;
                    }
                    debug!(from = signal.from, to = signal.to, artifact = %signal.artifact.id, "Artifact count increased");
                    if tx.send(signal).is_err() {
                        debug!("Signal receiver dropped, stopping watcher");
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) if e.is_transient() => {
                    warn!(error = %e, "Artifact poll failed, skipping tick");
                }
                Err(e) => {
                    error!(error = %e, "Artifact poll rejected, skipping tick");
                }
            }
        }

        info!("Artifact watcher stopped");
    }
}
