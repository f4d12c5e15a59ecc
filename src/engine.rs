//! Entry point for the UI layer: owns the backend collaborators and hands out
//! workflow, review and session handles.

use std::sync::Arc;

use crate::backend::{ArtifactSource, InMemoryBackend, ReviewQueue, SessionRepository, StatusFeed};
use crate::config::Config;
use crate::notifications::{AlertService, ReviewsView};
use crate::session::{ActorSession, SessionContinuityStore};
use crate::types::ActorId;
use crate::workflow::{ActiveWorkflow, WorkflowStepAdvancer};

/// The backend collaborators the engine reads and writes through.
#[derive(Clone)]
pub struct Backends {
    pub artifacts: Arc<dyn ArtifactSource>,
    pub reviews: Arc<dyn ReviewQueue>,
    pub feed: Arc<dyn StatusFeed>,
    pub sessions: Arc<dyn SessionRepository>,
}

impl Backends {
    /// Every collaborator served by one in-memory backend.
    pub fn in_memory(backend: &InMemoryBackend) -> Self {
        let shared = Arc::new(backend.clone());
        Self {
            artifacts: shared.clone(),
            reviews: shared.clone(),
            feed: shared.clone(),
            sessions: shared,
        }
    }

    /// Replace the session repository (e.g. with a file-backed one).
    pub fn with_sessions(mut self, sessions: Arc<dyn SessionRepository>) -> Self {
        self.sessions = sessions;
        self
    }
}

pub struct ContinuityEngine {
    config: Config,
    backends: Backends,
    alerts: Arc<AlertService>,
    sessions: SessionContinuityStore,
}

impl ContinuityEngine {
    pub fn new(config: Config, backends: Backends) -> Self {
        let alerts = Arc::new(AlertService::from_config(&config.alerts));
        let sessions = SessionContinuityStore::new(backends.sessions.clone());
        Self {
            config,
            backends,
            alerts,
            sessions,
        }
    }

    /// Use a custom alert service (e.g. one with a UI channel sink).
    pub fn with_alerts(mut self, alerts: AlertService) -> Self {
        self.alerts = Arc::new(alerts);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Activate a workflow for `actor`. Drop or deactivate the handle to stop it;
    /// starting a new workflow means dropping the previous handle.
    pub fn start_workflow(&self, actor: ActorId, advancer: WorkflowStepAdvancer) -> ActiveWorkflow {
        ActiveWorkflow::start(
            self.backends.artifacts.clone(),
            actor,
            advancer,
            self.config.poll_interval(),
        )
    }

    /// Mount the pending-reviews badge for `actor`.
    pub async fn mount_reviews(&self, actor: ActorId) -> ReviewsView {
        ReviewsView::mount(
            self.backends.feed.clone(),
            self.backends.reviews.clone(),
            self.alerts.clone(),
            self.config.reviews.clone(),
            actor,
        )
        .await
    }

    pub fn sessions(&self) -> &SessionContinuityStore {
        &self.sessions
    }

    /// Session record of `actor` as a reactive value.
    pub fn session(&self, actor: ActorId) -> ActorSession {
        self.sessions.bind(actor)
    }
}
