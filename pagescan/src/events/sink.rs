//! Where lifecycle events go.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::utils::{now_utc, Timestamp};

/// One lifecycle event as a sink receives it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifecycleEvent {
    /// Event name, e.g. `phase.completed`.
    pub name: String,
    /// When the sink received it.
    pub at: Timestamp,
    /// Payload; `null` when none was given.
    pub data: serde_json::Value,
}

impl LifecycleEvent {
    /// Stamps an event with the current time.
    #[must_use]
    pub fn new(name: &str, data: Option<serde_json::Value>) -> Self {
        Self {
            name: name.to_string(),
            at: now_utc(),
            data: data.unwrap_or(serde_json::Value::Null),
        }
    }

    /// Whether this is a per-phase event rather than an analysis-level one.
    #[must_use]
    pub fn is_phase_event(&self) -> bool {
        self.name.starts_with("phase.")
    }
}

/// Receives analysis lifecycle events.
///
/// Emitting never fails; a sink that cannot deliver drops the event.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Delivers one event.
    async fn emit(&self, name: &str, data: Option<serde_json::Value>);
}

/// Drops every event. The coordinator's default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _name: &str, _data: Option<serde_json::Value>) {}
}

/// Writes events to `tracing`.
///
/// Analysis-level events log at info. Phase events log at debug unless
/// [`LoggingEventSink::with_phase_events`] raises them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventSink {
    phases_at_info: bool,
}

impl LoggingEventSink {
    /// Phase events at debug.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs phase events at info as well.
    #[must_use]
    pub fn with_phase_events(mut self) -> Self {
        self.phases_at_info = true;
        self
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, name: &str, data: Option<serde_json::Value>) {
        let event = LifecycleEvent::new(name, data);
        if event.is_phase_event() && !self.phases_at_info {
            debug!(event = %event.name, data = %event.data, "Lifecycle event");
        } else {
            info!(event = %event.name, data = %event.data, "Lifecycle event");
        }
    }
}

/// Records every event in arrival order. Used by tests and embedders that
/// want to inspect a finished run.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl CollectingEventSink {
    /// An empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies of every event so far.
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().clone()
    }

    /// Event names in arrival order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.events.lock().iter().map(|e| e.name.clone()).collect()
    }

    /// Events called exactly `name`.
    #[must_use]
    pub fn named(&self, name: &str) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.name == name)
            .cloned()
            .collect()
    }

    /// Number of events received.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing was received yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, name: &str, data: Option<serde_json::Value>) {
        self.events.lock().push(LifecycleEvent::new(name, data));
    }
}
