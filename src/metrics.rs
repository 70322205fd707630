/// Metrics surface: one fire-once event per inbound gateway request.
///
/// The front door creates an event and threads it down the pipeline; the
/// innermost component that recognises the outcome fires it. The sink is
/// taken out of the event on fire, so a second fire is a programming bug and
/// panics.
use std::sync::{Arc, Mutex};

/// Event name used for every request on an encapsulation endpoint.
pub const GATEWAY_REQUEST_EVENT: &str = "gateway_request";

/// Outcome classes reported for a gateway request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsResult {
    Success,
    InvalidMethod,
    InvalidContentType,
    DecapsulationFailed,
    ConfigurationMismatch,
    TargetRequestForbidden,
}

impl MetricsResult {
    pub fn as_str(self) -> &'static str {
        match self {
            MetricsResult::Success => "success",
            MetricsResult::InvalidMethod => "invalid_method",
            MetricsResult::InvalidContentType => "invalid_content_type",
            MetricsResult::DecapsulationFailed => "decapsulation_failed",
            MetricsResult::ConfigurationMismatch => "configuration_mismatch",
            MetricsResult::TargetRequestForbidden => "target_request_forbidden",
        }
    }
}

/// Where a fired event lands. Consumed on emit.
pub trait EventSink: Send {
    fn emit(self: Box<Self>, event_name: &'static str, result: MetricsResult);
}

/// A one-shot metrics event.
pub struct MetricsEvent {
    name: &'static str,
    sink: Option<Box<dyn EventSink>>,
}

impl MetricsEvent {
    pub fn new(name: &'static str, sink: Box<dyn EventSink>) -> Self {
        Self {
            name,
            sink: Some(sink),
        }
    }

    /// Report the outcome. Panics if called twice on the same event.
    pub fn fire(&mut self, result: MetricsResult) {
        let sink = self.sink.take().expect("metrics event fired twice");
        sink.emit(self.name, result);
    }

    pub fn is_fired(&self) -> bool {
        self.sink.is_none()
    }
}

/// Creates events. `create` must be safe under concurrent callers.
pub trait MetricsFactory: Send + Sync {
    fn create(&self, event_name: &'static str) -> MetricsEvent;
}

/// Production factory: fired events become structured log lines.
pub struct LogMetricsFactory;

struct LogSink;

impl EventSink for LogSink {
    fn emit(self: Box<Self>, event_name: &'static str, result: MetricsResult) {
        tracing::info!(target: "gateway_metrics", event = event_name, result = result.as_str());
    }
}

impl MetricsFactory for LogMetricsFactory {
    fn create(&self, event_name: &'static str) -> MetricsEvent {
        MetricsEvent::new(event_name, Box::new(LogSink))
    }
}

/// A created event as seen by [`RecordingMetricsFactory`]; `result` stays
/// `None` until the event fires.
#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub name: &'static str,
    pub result: Option<MetricsResult>,
}

/// Factory that records every created event and its fired result.
///
/// The assertion backend for tests; mirrors what an embedder's real metrics
/// pipeline would observe.
#[derive(Clone, Default)]
pub struct RecordingMetricsFactory {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

struct RecordingSink {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
    index: usize,
}

impl EventSink for RecordingSink {
    fn emit(self: Box<Self>, _event_name: &'static str, result: MetricsResult) {
        self.events.lock().unwrap()[self.index].result = Some(result);
    }
}

impl RecordingMetricsFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every event created so far.
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl MetricsFactory for RecordingMetricsFactory {
    fn create(&self, event_name: &'static str) -> MetricsEvent {
        let mut events = self.events.lock().unwrap();
        let index = events.len();
        events.push(RecordedEvent {
            name: event_name,
            result: None,
        });
        drop(events);
        MetricsEvent::new(
            event_name,
            Box::new(RecordingSink {
                events: self.events.clone(),
                index,
            }),
        )
    }
}
