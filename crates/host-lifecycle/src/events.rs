//! Host lifecycle events
//!
//! Post-transition handlers record transitions through an [`EventSink`].
//! Emission is fire-and-forget for the engine, but a failed emission is
//! reported back as a [`HandlerError`].

use crate::error::HandlerError;
use crate::host::HostId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Severity attached to a host event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    /// Normal transition
    Info,
    /// Host degraded
    Warning,
    /// Host unusable
    Error,
}

/// A recorded lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostEvent {
    /// Host the event refers to
    pub host_id: HostId,
    /// Event severity
    pub severity: EventSeverity,
    /// Human-readable message
    pub message: String,
    /// Time the event was produced
    pub event_time: DateTime<Utc>,
}

impl HostEvent {
    /// Creates an event stamped with the current time.
    pub fn new(host_id: HostId, severity: EventSeverity, message: impl Into<String>) -> Self {
        Self {
            host_id,
            severity,
            message: message.into(),
            event_time: Utc::now(),
        }
    }
}

/// Destination for host lifecycle events.
#[async_trait::async_trait]
pub trait EventSink: Send + Sync {
    /// Records one event.
    async fn emit(&self, event: HostEvent) -> Result<(), HandlerError>;
}

/// Event sink that writes events to the tracing log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

#[async_trait::async_trait]
impl EventSink for TracingEventSink {
    async fn emit(&self, event: HostEvent) -> Result<(), HandlerError> {
        match event.severity {
            EventSeverity::Info => info!("Host {}: {}", event.host_id, event.message),
            EventSeverity::Warning => warn!("Host {}: {}", event.host_id, event.message),
            EventSeverity::Error => error!("Host {}: {}", event.host_id, event.message),
        }
        Ok(())
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use recording::RecordingEventSink;

#[cfg(any(test, feature = "test-util"))]
mod recording {
    use super::{EventSink, HostEvent};
    use crate::error::HandlerError;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory event sink for tests.
    ///
    /// Stores every emitted event and can be switched into a failing mode to
    /// exercise handler error paths.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingEventSink {
        events: Arc<Mutex<Vec<HostEvent>>>,
        failing: Arc<AtomicBool>,
    }

    impl RecordingEventSink {
        /// Creates an empty sink.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes subsequent emissions fail (or succeed again).
        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        /// Events recorded so far.
        #[must_use]
        pub fn events(&self) -> Vec<HostEvent> {
            self.events
                .lock()
                .map(|events| events.clone())
                .unwrap_or_default()
        }

        /// Number of events recorded so far.
        #[must_use]
        pub fn len(&self) -> usize {
            self.events.lock().map(|events| events.len()).unwrap_or_default()
        }

        /// Whether no events were recorded.
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }

    #[async_trait::async_trait]
    impl EventSink for RecordingEventSink {
        async fn emit(&self, event: HostEvent) -> Result<(), HandlerError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(HandlerError::EventSink("recording sink set to fail".to_string()));
            }
            self.events
                .lock()
                .map_err(|e| HandlerError::EventSink(e.to_string()))?
                .push(event);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_tracing_sink_accepts_events() {
        let sink = TracingEventSink;
        let event = HostEvent::new(HostId::new(), EventSeverity::Warning, "lost contact");
        assert!(sink.emit(event).await.is_ok());
    }

    #[tokio::test]
    async fn test_recording_sink_records_and_fails_on_demand() {
        let sink = RecordingEventSink::new();
        let host_id = HostId::new();

        sink.emit(HostEvent::new(host_id, EventSeverity::Info, "one")).await.unwrap();
        assert_eq!(sink.len(), 1);

        sink.set_failing(true);
        let result = sink.emit(HostEvent::new(host_id, EventSeverity::Info, "two")).await;
        assert!(matches!(result, Err(HandlerError::EventSink(_))));
        assert_eq!(sink.events()[0].message, "one");
    }

    #[test]
    fn test_event_serializes_camel_case() {
        let event = HostEvent::new(HostId::new(), EventSeverity::Error, "boom");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["severity"], "error");
        assert!(json.get("hostId").is_some());
        assert!(json.get("eventTime").is_some());
    }
}
