//! Event sinks for cancellation lifecycle events.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, info, Level};

/// Receives cancellation lifecycle events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Records one event. Must never fail the request that emits it.
    async fn emit(&self, event_type: &str, data: Option<Value>);
}

/// Forwards events to `tracing`. This is the coordinator's default sink.
#[derive(Debug, Clone, Copy)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self::debug()
    }
}

impl LoggingEventSink {
    /// Logs events at `level`. Only `INFO` and `DEBUG` are distinguished;
    /// anything else logs at `DEBUG`.
    #[must_use]
    pub const fn new(level: Level) -> Self {
        Self { level }
    }

    /// Logs events at `DEBUG`, below the coordinator's own `info!` lines.
    #[must_use]
    pub const fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    /// The level events are logged at.
    #[must_use]
    pub const fn level(&self) -> Level {
        self.level
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        let data = data.unwrap_or(Value::Null);
        if self.level == Level::INFO {
            info!(event_type, %data, "Cancellation event");
        } else {
            debug!(event_type, %data, "Cancellation event");
        }
    }
}

/// Keeps every event in memory, for assertions.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<(String, Option<Value>)>>,
}

impl CollectingEventSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events, in emission order.
    #[must_use]
    pub fn events(&self) -> Vec<(String, Option<Value>)> {
        self.events.read().clone()
    }

    /// Event types, in emission order.
    #[must_use]
    pub fn event_types(&self) -> Vec<String> {
        self.events.read().iter().map(|(t, _)| t.clone()).collect()
    }

    /// Number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// True if nothing was emitted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Events whose type starts with `type_prefix`.
    #[must_use]
    pub fn events_of_type(&self, type_prefix: &str) -> Vec<(String, Option<Value>)> {
        self.events
            .read()
            .iter()
            .filter(|(t, _)| t.starts_with(type_prefix))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.events.write().push((event_type.to_string(), data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_logging_sink_defaults_to_debug() {
        let sink = LoggingEventSink::default();
        assert_eq!(sink.level(), Level::DEBUG);
        sink.emit("cancellation.rejected", Some(serde_json::json!({"status": "FAILED"})))
            .await;
        LoggingEventSink::new(Level::INFO)
            .emit("cancellation.dispatched", None)
            .await;
    }

    #[tokio::test]
    async fn test_collecting_sink_filter() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit("cancellation.dispatched", None).await;
        sink.emit("cancellation.converged", None).await;
        sink.emit("store.read", None).await;

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.events_of_type("cancellation.").len(), 2);
        assert_eq!(sink.event_types()[2], "store.read");
    }
}
