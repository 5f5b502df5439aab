use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::events::EventKind;

/// Free-form, kind-specific payload. Never validated by the engine.
pub type Metadata = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct TrackingEvent {
    pub event: EventKind,
    pub timestamp: u64,
    pub session_id: String,
    pub tenant_id: String,
    pub guest_id: Option<String>,
    pub metadata: Option<Metadata>,
}

impl TrackingEvent {
    /// Stamp an event with the current wall-clock time.
    pub fn new(
        event: EventKind,
        session_id: String,
        tenant_id: String,
        guest_id: Option<String>,
        metadata: Option<Metadata>,
    ) -> Self {
        Self {
            event,
            timestamp: now_millis(),
            session_id,
            tenant_id,
            guest_id,
            metadata,
        }
    }
}

/// Milliseconds since the Unix epoch. A clock set before 1970 reads as 0.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// One element of the collector payload. The tenant travels in the URL.
#[derive(Debug, Serialize)]
pub struct WireEvent<'a> {
    pub event: EventKind,
    pub timestamp: u64,
    pub session_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guest_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<&'a Metadata>,
}

#[derive(Debug, Serialize)]
pub struct WireBatch<'a> {
    pub events: Vec<WireEvent<'a>>,
}

impl<'a> WireBatch<'a> {
    pub fn from_events(events: &'a [TrackingEvent]) -> Self {
        Self {
            events: events
                .iter()
                .map(|e| WireEvent {
                    event: e.event,
                    timestamp: e.timestamp,
                    session_id: &e.session_id,
                    guest_id: e.guest_id.as_deref(),
                    metadata: e.metadata.as_ref(),
                })
                .collect(),
        }
    }
}
