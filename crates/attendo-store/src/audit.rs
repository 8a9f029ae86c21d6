//! Audit event types

use attendo_api::{CheckAction, InternStatus, RecordKind, RecordStatus};
use attendo_util::{InternId, RecordId};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Types of audit events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    ServiceStarted,

    ServiceStopped,

    /// Policy loaded at startup
    PolicyLoaded {
        face_to_face: String,
        asynchronous: String,
    },

    InternCreated {
        intern_id: InternId,
        email: String,
    },

    InternUpdated { intern_id: InternId },

    /// Evaluator locked (or released) an intern's status
    InternStatusSet {
        intern_id: InternId,
        status: Option<InternStatus>,
        by: String,
    },

    InternDeleted {
        intern_id: InternId,
        records: usize,
    },

    RecordCheckedIn {
        record_id: RecordId,
        intern_id: InternId,
        kind: RecordKind,
    },

    RecordSubmitted {
        record_id: RecordId,
        intern_id: InternId,
        elapsed: Duration,
    },

    /// Feedback or re-evaluation
    RecordEvaluated {
        record_id: RecordId,
        status: RecordStatus,
        work_duration: Duration,
        by: String,
    },

    RecordTimedOut {
        record_id: RecordId,
        intern_id: InternId,
        kind: RecordKind,
        time_out: DateTime<Local>,
    },

    TotalsRecomputed {
        intern_id: InternId,
        rendered: Duration,
        status: InternStatus,
    },

    /// Check-in or check-out refused by the time-window policy
    CheckRejected {
        intern_id: InternId,
        kind: RecordKind,
        action: CheckAction,
        reasons: Vec<String>,
    },

    SweepCompleted {
        kind: Option<RecordKind>,
        closed: usize,
        skipped: usize,
        failed: usize,
    },

    /// Client connected
    ClientConnected {
        client_id: String,
        role: String,
        uid: Option<u32>,
    },

    /// Client disconnected
    ClientDisconnected { client_id: String },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self::at(attendo_util::now(), event)
    }

    /// Event stamped with the time of the operation that produced it
    pub fn at(timestamp: DateTime<Local>, event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp,
            event,
        }
    }
}
