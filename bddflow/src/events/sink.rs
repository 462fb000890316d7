//! Event sink trait and implementations.

use crate::core::{EventStatus, PipelineEvent, RunStatus, StageStatus};
use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, info, warn, Level};

/// Receives stage and run transition events.
///
/// Sinks must not fail the run: errors are logged and swallowed.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event.
    async fn emit(&self, event: &PipelineEvent) {
        self.try_emit(event);
    }

    /// Emits an event without awaiting.
    fn try_emit(&self, event: &PipelineEvent);
}

/// Discards all events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

impl EventSink for NoOpEventSink {
    fn try_emit(&self, _event: &PipelineEvent) {}
}

/// Logs events through `tracing`.
///
/// Failures are logged at `WARN` regardless of the configured level.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink with the specified level.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// Creates an info-level logging sink.
    #[must_use]
    pub fn info() -> Self {
        Self::new(Level::INFO)
    }
}

impl EventSink for LoggingEventSink {
    fn try_emit(&self, event: &PipelineEvent) {
        let event_type = event.event_type();
        let stage = event.stage_id.as_deref().unwrap_or("-");
        let detail = event.detail.as_deref().unwrap_or("");

        let is_failure = matches!(
            event.status,
            EventStatus::Stage(StageStatus::Failed) | EventStatus::Run(RunStatus::PartiallyFailed)
        );
        if is_failure {
            warn!(run_id = %event.run_id, stage, detail, "Event: {}", event_type);
            return;
        }

        if self.level == Level::DEBUG {
            debug!(run_id = %event.run_id, stage, detail, "Event: {}", event_type);
        } else {
            info!(run_id = %event.run_id, stage, detail, "Event: {}", event_type);
        }
    }
}

/// Keeps every event in memory.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<PipelineEvent>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.read().clone()
    }

    /// Returns the dotted event names in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.read().iter().map(PipelineEvent::event_type).collect()
    }

    /// Returns the statuses a stage went through, in order.
    #[must_use]
    pub fn stage_history(&self, stage_id: &str) -> Vec<StageStatus> {
        self.events
            .read()
            .iter()
            .filter(|e| e.stage_id.as_deref() == Some(stage_id))
            .filter_map(PipelineEvent::stage_status)
            .collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Returns events whose type starts with `type_prefix`.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<PipelineEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type().starts_with(type_prefix))
            .cloned()
            .collect()
    }
}

impl EventSink for CollectingEventSink {
    fn try_emit(&self, event: &PipelineEvent) {
        self.events.write().push(event.clone());
    }
}

/// Forwards events to an unbounded channel, for progress reporting.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl ChannelEventSink {
    /// Creates a sink and the receiver that observes it.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelEventSink {
    fn try_emit(&self, event: &PipelineEvent) {
        if self.tx.send(event.clone()).is_err() {
            debug!(event_type = %event.event_type(), "Event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stage_event(stage: &str, status: StageStatus) -> PipelineEvent {
        PipelineEvent::stage("run-1", stage, status)
    }

    #[tokio::test]
    async fn test_noop_and_logging_sinks_accept_events() {
        let event = stage_event("a", StageStatus::Failed).with_detail("boom");
        NoOpEventSink.emit(&event).await;
        LoggingEventSink::default().emit(&event).await;
        LoggingEventSink::debug().try_emit(&PipelineEvent::run("run-1", RunStatus::Completed));
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(&stage_event("a", StageStatus::Running)).await;
        sink.try_emit(&stage_event("a", StageStatus::Succeeded));
        sink.try_emit(&PipelineEvent::run("run-1", RunStatus::Completed));

        assert_eq!(sink.len(), 3);
        assert_eq!(
            sink.event_types(),
            vec!["stage.running", "stage.succeeded", "run.completed"]
        );
        assert_eq!(
            sink.stage_history("a"),
            vec![StageStatus::Running, StageStatus::Succeeded]
        );
        assert_eq!(sink.events_of_type("stage.").len(), 2);

        sink.clear();
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelEventSink::new();
        sink.emit(&stage_event("b", StageStatus::Skipped)).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.stage_id.as_deref(), Some("b"));
        assert_eq!(received.stage_status(), Some(StageStatus::Skipped));
    }

    #[test]
    fn test_channel_sink_with_dropped_receiver() {
        let (sink, rx) = ChannelEventSink::new();
        drop(rx);
        sink.try_emit(&stage_event("c", StageStatus::Running));
    }
}
