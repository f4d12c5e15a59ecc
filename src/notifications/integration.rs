//! Alert sink trait and the built-in sinks.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::Alert;

/// Trait for alert destinations.
///
/// Each sink (log, UI channel, ...) implements this trait to receive alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Sink name (for logging)
    fn name(&self) -> &str;

    /// Check if this sink is enabled.
    fn is_enabled(&self) -> bool;

    /// Deliver an alert.
    ///
    /// Delivery is fire-and-forget - implementations return errors for
    /// logging but never fail the overall dispatch.
    async fn send(&self, alert: &Alert) -> Result<()>;
}

/// Writes every alert to the tracing log.
pub struct LogSink {
    enabled: bool,
}

impl LogSink {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

#[async_trait]
impl AlertSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        tracing::info!(
            actor = %alert.actor_id,
            subject = %alert.subject_id,
            run = alert.run_id.as_deref().unwrap_or("-"),
            "{}: {}",
            alert.title,
            alert.message
        );
        Ok(())
    }
}

/// Forwards alerts to the UI layer over an mpsc channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Alert>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<Alert>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl AlertSink for ChannelSink {
    fn name(&self) -> &str {
        "channel"
    }

    fn is_enabled(&self) -> bool {
        !self.tx.is_closed()
    }

    async fn send(&self, alert: &Alert) -> Result<()> {
        self.tx
            .send(alert.clone())
            .map_err(|_| anyhow!("alert receiver dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActorId;

    fn alert() -> Alert {
        Alert {
            actor_id: ActorId::new("a"),
            title: "Ready for review".into(),
            message: "epic-1 finished generating".into(),
            subject_id: "epic-1".into(),
            run_id: Some("run-1".into()),
        }
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);
        assert!(sink.is_enabled());

        sink.send(&alert()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().subject_id, "epic-1");
    }

    #[tokio::test]
    async fn test_channel_sink_disabled_when_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = ChannelSink::new(tx);
        drop(rx);

        assert!(!sink.is_enabled());
        assert!(sink.send(&alert()).await.is_err());
    }

    #[tokio::test]
    async fn test_log_sink_respects_flag() {
        assert!(LogSink::new(true).is_enabled());
        assert!(!LogSink::new(false).is_enabled());
        assert!(LogSink::new(true).send(&alert()).await.is_ok());
    }
}
