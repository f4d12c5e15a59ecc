//! Central alert service that dispatches alerts to all sinks.

use std::sync::Arc;

use super::integration::{AlertSink, LogSink};
use super::Alert;
use crate::config::AlertsConfig;

/// Central alert dispatcher.
///
/// Receives alerts and dispatches them to every enabled sink.
pub struct AlertService {
    sinks: Vec<Arc<dyn AlertSink>>,
    enabled: bool,
}

impl AlertService {
    /// Create from config. The log sink is registered when `log_alerts` is set.
    pub fn from_config(config: &AlertsConfig) -> Self {
        let mut sinks: Vec<Arc<dyn AlertSink>> = Vec::new();
        if config.log_alerts {
            sinks.push(Arc::new(LogSink::new(true)));
        }
        Self {
            sinks,
            enabled: config.enabled,
        }
    }

    /// Create a disabled alert service (for testing).
    pub fn disabled() -> Self {
        Self {
            sinks: Vec::new(),
            enabled: false,
        }
    }

    /// Register an additional sink.
    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Dispatch an alert to all enabled sinks.
    ///
    /// This is fire-and-forget - each sink is spawned as a separate task
    /// and errors are logged but not propagated.
    pub fn notify(&self, alert: Alert) {
        if !self.enabled {
            return;
        }

        for sink in &self.sinks {
            if sink.is_enabled() {
                let sink = sink.clone();
                let alert = alert.clone();

                tokio::spawn(async move {
                    if let Err(e) = sink.send(&alert).await {
                        tracing::warn!(
                            sink = %sink.name(),
                            subject = %alert.subject_id,
                            error = %e,
                            "Alert delivery failed"
                        );
                    }
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::ChannelSink;
    use crate::types::ActorId;
    use tokio::sync::mpsc;

    fn alert() -> Alert {
        Alert {
            actor_id: ActorId::new("a"),
            title: "t".into(),
            message: "m".into(),
            subject_id: "s".into(),
            run_id: None,
        }
    }

    #[test]
    fn test_service_from_config() {
        let service = AlertService::from_config(&AlertsConfig::default());
        assert!(service.is_enabled());
        assert_eq!(service.sink_count(), 1);

        let quiet = AlertService::from_config(&AlertsConfig {
            enabled: true,
            log_alerts: false,
        });
        assert_eq!(quiet.sink_count(), 0);
    }

    #[test]
    fn test_service_disabled() {
        let service = AlertService::disabled();
        assert!(!service.is_enabled());
        assert_eq!(service.sink_count(), 0);
    }

    #[tokio::test]
    async fn test_notify_reaches_channel_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let service = AlertService::from_config(&AlertsConfig::default())
            .with_sink(Arc::new(ChannelSink::new(tx)));

        service.notify(alert());
        assert_eq!(rx.recv().await.unwrap().subject_id, "s");
    }

    #[tokio::test]
    async fn test_disabled_service_drops_alerts() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let service = AlertService::disabled().with_sink(Arc::new(ChannelSink::new(tx)));

        service.notify(alert());
        tokio::task::yield_now().await;
        assert!(rx.try_recv().is_err());
    }
}
