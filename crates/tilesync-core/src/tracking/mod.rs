//! Diagnostic tracking events emitted during reconciliation passes.
//!
//! Tracking is fire-and-forget: the engine never waits on a sink and a
//! failing sink must swallow its own errors. The production surface emits
//! structured `tracing` records; transport to an actual telemetry backend
//! is a downstream concern.

use std::sync::Mutex;

/// Category every engine event is reported under.
pub const TRACKING_CATEGORY: &str = "chinaNewtab";

/// Subject every engine event is reported under.
pub const TRACKING_SUBJECT: &str = "topSites";

/// One reported diagnostic event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingEvent {
    /// Reporting category.
    pub category: String,
    /// Event name, e.g. `update` or `backfill`.
    pub event: String,
    /// Reporting subject.
    pub subject: String,
    /// Event value; counters are joined with `|`.
    pub value: String,
    /// Free-form extra payload, often empty.
    pub extra: String,
}

/// Sink for diagnostic events.
pub trait TrackingSink: Send + Sync {
    /// Records one event. Implementations must not block and must not
    /// surface failures to the caller.
    fn record(&self, category: &str, event: &str, subject: &str, value: &str, extra: &str);
}

/// Emits tracking events as structured `tracing` records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TrackingSink for TracingSink {
    fn record(&self, category: &str, event: &str, subject: &str, value: &str, extra: &str) {
        tracing::info!(
            target: "tilesync_tracking",
            category,
            event,
            subject,
            value,
            extra,
            "tracking sample"
        );
    }
}

/// Test sink capturing every event in order.
#[derive(Debug, Default)]
pub struct CapturingSink {
    events: Mutex<Vec<TrackingEvent>>,
}

impl CapturingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event recorded so far, in order.
    #[must_use]
    pub fn events(&self) -> Vec<TrackingEvent> {
        self.lock().clone()
    }

    /// `(value, extra)` pairs of every event with the given name, in order.
    #[must_use]
    pub fn values_for(&self, event: &str) -> Vec<(String, String)> {
        self.lock()
            .iter()
            .filter(|recorded| recorded.event == event)
            .map(|recorded| (recorded.value.clone(), recorded.extra.clone()))
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TrackingEvent>> {
        self.events
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl TrackingSink for CapturingSink {
    fn record(&self, category: &str, event: &str, subject: &str, value: &str, extra: &str) {
        self.lock().push(TrackingEvent {
            category: category.to_string(),
            event: event.to_string(),
            subject: subject.to_string(),
            value: value.to_string(),
            extra: extra.to_string(),
        });
    }
}
