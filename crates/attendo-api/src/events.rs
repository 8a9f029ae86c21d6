//! Event types for attendod -> client streaming

use attendo_util::{InternId, RecordId};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{API_VERSION, InternStatus, RecordKind, RecordStatus};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: attendo_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    RecordCheckedIn {
        record_id: RecordId,
        intern_id: InternId,
        kind: RecordKind,
        time_in: DateTime<Local>,
    },

    /// Intern checked out; awaiting evaluation
    RecordSubmitted {
        record_id: RecordId,
        intern_id: InternId,
        time_out: DateTime<Local>,
    },

    RecordEvaluated {
        record_id: RecordId,
        intern_id: InternId,
        status: RecordStatus,
        work_duration: Duration,
    },

    /// Closed by the sweeper
    RecordTimedOut {
        record_id: RecordId,
        intern_id: InternId,
        kind: RecordKind,
        time_out: DateTime<Local>,
    },

    /// Rendered time or derived status changed
    InternTotalsChanged {
        intern_id: InternId,
        rendered: Duration,
        status: InternStatus,
    },

    InternChanged { intern_id: InternId },

    InternRemoved { intern_id: InternId },

    SweepCompleted {
        kind: Option<RecordKind>,
        closed: usize,
        skipped: usize,
        failed: usize,
    },

    /// Service is shutting down
    Shutdown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization() {
        let event = Event::new(EventPayload::RecordEvaluated {
            record_id: RecordId::new(),
            intern_id: InternId::new(),
            status: RecordStatus::Validated,
            work_duration: Duration::from_secs(3 * 3600),
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("record_evaluated"));

        let parsed: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.api_version, API_VERSION);
        assert!(matches!(
            parsed.payload,
            EventPayload::RecordEvaluated { status: RecordStatus::Validated, .. }
        ));
    }
}
