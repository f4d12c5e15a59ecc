//! Active workflow handle: one watcher feeding one advancer.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::advancer::WorkflowStepAdvancer;
use super::watcher::ArtifactCountWatcher;
use crate::backend::ArtifactSource;
use crate::lifecycle::Liveness;
use crate::types::{ActorId, CountIncrease, WorkflowState};

/// Handle to a running workflow. Dropping it deactivates the workflow.
pub struct ActiveWorkflow {
    actor: ActorId,
    kind: String,
    live: Liveness,
    watcher_task: JoinHandle<()>,
    driver_task: JoinHandle<()>,
    state_rx: watch::Receiver<WorkflowState>,
}

impl ActiveWorkflow {
    /// Arm a watcher for `actor` and start feeding its signals to `advancer`.
    pub fn start(
        source: Arc<dyn ArtifactSource>,
        actor: ActorId,
        advancer: WorkflowStepAdvancer,
        poll_interval: Duration,
    ) -> Self {
        let live = Liveness::new();
        let kind = advancer.state().kind.clone();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(advancer.state().clone());

        let watcher =
            ArtifactCountWatcher::new(source, actor.clone()).with_poll_interval(poll_interval);
        let watcher_task = tokio::spawn(watcher.run(signal_tx, live.clone()));
        let driver_task = tokio::spawn(drive(advancer, signal_rx, state_tx, live.clone()));

        info!(actor = %actor, kind = %kind, "Workflow activated");

        Self {
            actor,
            kind,
            live,
            watcher_task,
            driver_task,
            state_rx,
        }
    }

    pub fn actor(&self) -> &ActorId {
        &self.actor
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Reactive view of the workflow's progress.
    pub fn state(&self) -> watch::Receiver<WorkflowState> {
        self.state_rx.clone()
    }

    pub fn current_step(&self) -> u32 {
        self.state_rx.borrow().current_step
    }

    /// False once deactivated or after the last defined step completed.
    pub fn is_active(&self) -> bool {
        self.live.is_live()
    }

    /// Stop polling. No step callback runs after this returns; one already
    /// running on another thread finishes first. Do not call this from inside
    /// the step callback.
    pub fn deactivate(&self) {
        if self.live.revoke() {
            info!(actor = %self.actor, kind = %self.kind, "Workflow deactivated");
        }
        self.watcher_task.abort();
        self.driver_task.abort();
    }
}

impl Drop for ActiveWorkflow {
    fn drop(&mut self) {
        self.deactivate();
    }
}

/// Apply signals in arrival order, each against the then-current step.
async fn drive(
    mut advancer: WorkflowStepAdvancer,
    mut signals: mpsc::UnboundedReceiver<CountIncrease>,
    state_tx: watch::Sender<WorkflowState>,
    live: Liveness,
) {
    while let Some(signal) = signals.recv().await {
        // The callback runs inside the gate so `deactivate` cannot return mid-callback
        let Some(outcome) = live.run_if_live(|| advancer.advance(&signal)) else {
            debug!("Dropping signal received after deactivation");
            break;
        };
        let Some(advance) = outcome else {
            continue;
        };
        state_tx.send_replace(advancer.state().clone());

        if advance.completed {
            info!(kind = %advancer.state().kind, "Workflow finished");
            live.revoke();
            break;
        }
    }
}
