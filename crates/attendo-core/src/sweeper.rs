//! Auto-timeout sweeper
//!
//! Closes records nobody checked out of. Each kind has its own daily
//! trigger; every record is closed in its own transaction, so one failure
//! leaves the rest of the batch alone and a second run finds nothing to do.

use attendo_api::{AttendanceRecord, RecordKind, SweepFailure, SweepReport};
use attendo_store::{AuditEvent, AuditEventType};
use attendo_util::{Clock, WallClock};
use chrono::{DateTime, Local};
use std::sync::Arc;
use tracing::{info, warn};

use crate::{AttendanceEngine, CoreEvent, CoreResult, Outcome};

/// Source of firing instants for a periodic job
pub trait PeriodicTrigger: Send + Sync {
    /// First firing strictly after `after`
    fn next_after(&self, after: DateTime<Local>) -> Option<DateTime<Local>>;
}

/// Fires once a day at a wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTrigger {
    pub at: WallClock,
}

impl DailyTrigger {
    pub fn new(at: WallClock) -> Self {
        Self { at }
    }
}

impl PeriodicTrigger for DailyTrigger {
    fn next_after(&self, after: DateTime<Local>) -> Option<DateTime<Local>> {
        let mut day = after.date_naive();
        // Today, tomorrow, or the day after if tomorrow's time falls in a DST gap
        for _ in 0..3 {
            if let Some(fire) = self.at.on(day)
                && fire > after
            {
                return Some(fire);
            }
            day = day.succ_opt()?;
        }
        None
    }
}

/// Drives the timeout sweeps from a clock and two triggers
pub struct AutoTimeoutSweeper {
    engine: Arc<AttendanceEngine>,
    clock: Arc<dyn Clock>,
    face_to_face: Box<dyn PeriodicTrigger>,
    asynchronous: Box<dyn PeriodicTrigger>,
}

impl AutoTimeoutSweeper {
    /// Triggers at the configured `sweep_at` of each kind
    pub fn new(engine: Arc<AttendanceEngine>, clock: Arc<dyn Clock>) -> Self {
        let face_to_face = DailyTrigger::new(engine.policy().schedule(RecordKind::FaceToFace).sweep_at);
        let asynchronous = DailyTrigger::new(engine.policy().schedule(RecordKind::Async).sweep_at);
        Self::with_triggers(engine, clock, Box::new(face_to_face), Box::new(asynchronous))
    }

    pub fn with_triggers(
        engine: Arc<AttendanceEngine>,
        clock: Arc<dyn Clock>,
        face_to_face: Box<dyn PeriodicTrigger>,
        asynchronous: Box<dyn PeriodicTrigger>,
    ) -> Self {
        Self {
            engine,
            clock,
            face_to_face,
            asynchronous,
        }
    }

    pub fn engine(&self) -> &Arc<AttendanceEngine> {
        &self.engine
    }

    fn trigger(&self, kind: RecordKind) -> &dyn PeriodicTrigger {
        match kind {
            RecordKind::FaceToFace => self.face_to_face.as_ref(),
            RecordKind::Async => self.asynchronous.as_ref(),
        }
    }

    /// Next time the sweep for `kind` is due
    pub fn next_run(&self, kind: RecordKind) -> Option<DateTime<Local>> {
        self.trigger(kind).next_after(self.clock.now())
    }

    /// Run the sweep for `kind` as of the clock's current time. Records
    /// left over from earlier days (a failed timeout, say) are retried first.
    pub fn on_tick(&self, kind: RecordKind) -> CoreResult<Outcome<SweepReport>> {
        let now = self.clock.now();
        let mut outcome = self.engine.sweep_overdue(now)?;
        let today = self.engine.sweep_timeouts(kind, now)?;
        outcome.value.merge(today.value);
        outcome.events.extend(today.events);
        Ok(outcome)
    }

    /// Close what a stopped service missed: open records from earlier days,
    /// and today's records of a kind whose sweep time has already passed.
    pub fn catch_up(&self) -> CoreResult<Outcome<SweepReport>> {
        let now = self.clock.now();
        let mut outcome = self.engine.sweep_overdue(now)?;

        for kind in RecordKind::ALL {
            let due = self
                .engine
                .policy()
                .schedule(*kind)
                .sweep_at
                .on(now.date_naive());
            if let Some(due) = due
                && due <= now
            {
                let today = self.engine.sweep_timeouts(*kind, due)?;
                outcome.value.merge(today.value);
                outcome.events.extend(today.events);
            }
        }

        Ok(outcome)
    }
}

/// Time out the ongoing `kind` records opened on `as_of`'s day
pub(crate) fn sweep_kind(
    engine: &AttendanceEngine,
    kind: RecordKind,
    as_of: DateTime<Local>,
) -> CoreResult<Outcome<SweepReport>> {
    let records = engine.store().ongoing_records(kind, as_of.date_naive())?;
    Ok(run_batch(engine, Some(kind), &records, as_of, |_| as_of))
}

/// Time out records left open on earlier days at their window end
pub(crate) fn sweep_overdue(
    engine: &AttendanceEngine,
    now: DateTime<Local>,
) -> CoreResult<Outcome<SweepReport>> {
    let records = engine.store().ongoing_records_before(now.date_naive())?;
    if records.is_empty() {
        return Ok(Outcome::new(SweepReport::default(), Vec::new()));
    }
    Ok(run_batch(engine, None, &records, now, |record| {
        engine.overdue_close_time(record)
    }))
}

fn run_batch(
    engine: &AttendanceEngine,
    kind: Option<RecordKind>,
    records: &[AttendanceRecord],
    now: DateTime<Local>,
    close_at: impl Fn(&AttendanceRecord) -> DateTime<Local>,
) -> Outcome<SweepReport> {
    let mut report = SweepReport::default();
    let mut events = Vec::new();

    for record in records {
        match engine.time_out_record(&record.id, close_at(record)) {
            Ok(Some(closed)) => {
                events.push(CoreEvent::RecordTimedOut {
                    record_id: closed.id,
                    intern_id: closed.intern_id,
                    kind: closed.kind,
                    time_out: closed.time_out.unwrap_or(now),
                });
                report.closed.push(closed.id);
            }
            Ok(None) => report.skipped += 1,
            Err(e) => {
                warn!(record_id = %record.id, error = %e, "Failed to time out record");
                report.failures.push(SweepFailure {
                    record_id: record.id,
                    message: e.to_string(),
                });
            }
        }
    }

    let (closed, skipped, failed) = (report.closed.len(), report.skipped, report.failures.len());
    let _ = engine.store().append_audit(AuditEvent::at(
        now,
        AuditEventType::SweepCompleted {
            kind,
            closed,
            skipped,
            failed,
        },
    ));

    info!(kind = ?kind, closed, skipped, failed, "Sweep completed");

    events.push(CoreEvent::SweepCompleted {
        kind,
        closed,
        skipped,
        failed,
    });
    Outcome::new(report, events)
}
