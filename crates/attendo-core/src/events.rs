//! Core events emitted by the engine

use attendo_api::{InternStatus, RecordKind, RecordStatus};
use attendo_util::{InternId, RecordId};
use chrono::{DateTime, Local};
use std::time::Duration;

/// Events emitted by the core engine after a commit
#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    RecordCheckedIn {
        record_id: RecordId,
        intern_id: InternId,
        kind: RecordKind,
        time_in: DateTime<Local>,
    },

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

    InternChanged {
        intern_id: InternId,
    },

    InternRemoved {
        intern_id: InternId,
    },

    SweepCompleted {
        kind: Option<RecordKind>,
        closed: usize,
        skipped: usize,
        failed: usize,
    },
}
