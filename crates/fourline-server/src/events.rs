//! Telemetry boundary.
//!
//! Gameplay emits events at game start, each accepted move, and game end.
//! Publication is fire-and-forget: a sink failure is the sink's problem and
//! never reaches the players or rolls back a committed state change.

use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Event kinds emitted by the session engine.
pub mod kind {
    pub const GAME_STARTED: &str = "GAME_STARTED";
    pub const MOVE_MADE: &str = "MOVE_MADE";
    pub const GAME_ENDED: &str = "GAME_ENDED";
}

/// One gameplay event bound for offline analytics.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryEvent {
    pub kind: &'static str,
    pub payload: serde_json::Value,
    pub timestamp_ms: u64,
}

impl TelemetryEvent {
    pub fn new(kind: &'static str, payload: serde_json::Value) -> Self {
        Self {
            kind,
            payload,
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
        }
    }
}

/// Publish-only sink for gameplay telemetry.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: TelemetryEvent);
}

/// Default sink: writes events to the log at debug level. Stands in for an
/// external event bus in single-process deployments.
pub struct LogSink;

impl EventSink for LogSink {
    fn publish(&self, event: TelemetryEvent) {
        debug!(
            kind = event.kind,
            payload = %event.payload,
            timestamp_ms = event.timestamp_ms,
            "gameplay event"
        );
    }
}
