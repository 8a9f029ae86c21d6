//! Attendance engine
//!
//! Composes the time-window policy, the record lifecycle and rendered-time
//! accounting on top of a [`Store`]. Every mutating operation runs in one
//! store transaction; the record is re-read inside it, so two callers
//! racing on the same record serialize and the loser sees the new state.

use attendo_api::{
    Actor, AttendanceRecord, CheckAction, CheckInRequest, CheckOutRequest, CreateInternRequest,
    Evaluation, Evidence, ExportSnapshot, FeedbackRequest, Image, Intern, InternStatus,
    ReasonCode, RecordDetail, RecordKind, RecordStatus, ReevaluateRequest, SetInternStatusRequest,
    SweepReport, Task, UpdateInternRequest, Validate, Verdict, non_blank,
};
use attendo_config::{EvidenceTiming, Policy};
use attendo_store::{AuditEvent, AuditEventType, Store, StoreTx};
use attendo_util::{InternId, RecordId};
use chrono::{DateTime, Local, NaiveDate};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    CheckContext, CoreError, CoreEvent, CoreResult, InternNotice, InternNotifier, PolicyDecision,
    TimeWindowPolicy, Transition, accounting, lifecycle, sweeper,
};

/// Description of the task created for every face-to-face record
pub const PRESENCE_TASK: &str = "On-site attendance";

/// Result of a committed operation plus the events it produced
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub events: Vec<CoreEvent>,
}

impl<T> Outcome<T> {
    pub fn new(value: T, events: Vec<CoreEvent>) -> Self {
        Self { value, events }
    }
}

/// The attendance engine
pub struct AttendanceEngine {
    policy: Policy,
    windows: TimeWindowPolicy,
    store: Arc<dyn Store>,
    notifier: Arc<dyn InternNotifier>,
}

impl AttendanceEngine {
    pub fn new(policy: Policy, store: Arc<dyn Store>, notifier: Arc<dyn InternNotifier>) -> Self {
        let windows = TimeWindowPolicy::from_policy(&policy);
        let face_to_face = windows.window(RecordKind::FaceToFace).to_string();
        let asynchronous = windows.window(RecordKind::Async).to_string();

        info!(
            face_to_face = %face_to_face,
            asynchronous = %asynchronous,
            evidence = ?policy.evidence_timing(),
            "Attendance engine initialized"
        );

        let _ = store.append_audit(AuditEvent::new(AuditEventType::PolicyLoaded {
            face_to_face,
            asynchronous,
        }));

        Self {
            policy,
            windows,
            store,
            notifier,
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn windows(&self) -> &TimeWindowPolicy {
        &self.windows
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn is_healthy(&self) -> bool {
        self.store.is_healthy()
    }

    // Intern operations

    /// Open a record for the calling intern
    pub fn check_in(
        &self,
        actor: &Actor,
        req: &CheckInRequest,
        now: DateTime<Local>,
    ) -> CoreResult<Outcome<RecordDetail>> {
        let intern_id = require_intern(actor)?;

        let tx = self.store.begin()?;
        let intern = tx
            .get_intern(&intern_id)?
            .ok_or_else(|| intern_not_found(&intern_id))?;
        let todays = tx.records_for_day(&intern_id, now.date_naive())?;
        let mut open = tx.open_record(&intern_id)?;
        // A record left open on an earlier day is timed out by this check-in
        let stale = open.take_if(|r| r.day() < now.date_naive());

        let decision = self.windows.evaluate(&CheckContext {
            action: CheckAction::CheckIn,
            kind: req.kind,
            now,
            intern: &intern,
            todays_records: &todays,
            open_record: open.as_ref(),
        });
        if let PolicyDecision::Rejected { reasons } = decision {
            drop(tx);
            return Err(self.rejected(intern_id, req.kind, CheckAction::CheckIn, reasons, now));
        }

        req.validate()?;
        let evidence =
            self.presence_evidence(req.kind, CheckAction::CheckIn, req.evidence.as_ref())?;

        let mut events = Vec::new();
        if let Some(mut stale) = stale {
            let closed_at = self.overdue_close_time(&stale);
            lifecycle::time_out(&mut stale, closed_at)?;
            tx.update_record(&stale)?;
            let _ = tx.append_audit(AuditEvent::at(
                now,
                AuditEventType::RecordTimedOut {
                    record_id: stale.id,
                    intern_id,
                    kind: stale.kind,
                    time_out: closed_at,
                },
            ));
            info!(record_id = %stale.id, intern_id = %intern_id, "Stale record timed out at check-in");
            events.push(CoreEvent::RecordTimedOut {
                record_id: stale.id,
                intern_id,
                kind: stale.kind,
                time_out: closed_at,
            });
        }

        let record = AttendanceRecord::open(intern_id, req.kind, now);
        tx.insert_record(&record)?;

        let tasks: Vec<Task> = match req.kind {
            RecordKind::FaceToFace => vec![Task::for_record(&record, PRESENCE_TASK, now)],
            RecordKind::Async => req
                .tasks
                .iter()
                .map(|description| Task::for_record(&record, description.trim(), now))
                .collect(),
        };
        for task in &tasks {
            tx.insert_task(task)?;
        }
        if let (Some(evidence), Some(presence)) = (evidence, tasks.first()) {
            tx.insert_image(&Image::attach(presence.id, evidence, now))?;
        }

        let _ = tx.append_audit(AuditEvent::at(
            now,
            AuditEventType::RecordCheckedIn {
                record_id: record.id,
                intern_id,
                kind: record.kind,
            },
        ));
        tx.commit()?;

        info!(
            record_id = %record.id,
            intern_id = %intern_id,
            kind = %record.kind,
            tasks = tasks.len(),
            "Checked in"
        );

        events.push(CoreEvent::RecordCheckedIn {
            record_id: record.id,
            intern_id,
            kind: record.kind,
            time_in: record.time_in,
        });
        Ok(Outcome::new(RecordDetail { record, tasks }, events))
    }

    /// Close the calling intern's open record
    pub fn check_out(
        &self,
        actor: &Actor,
        req: &CheckOutRequest,
        now: DateTime<Local>,
    ) -> CoreResult<Outcome<AttendanceRecord>> {
        let intern_id = require_intern(actor)?;

        let tx = self.store.begin()?;
        let mut record = owned_record(tx.as_ref(), &req.record_id, Some(intern_id))?;
        if record.status != RecordStatus::Ongoing {
            return Err(CoreError::InvalidTransition {
                record_id: record.id,
                from: record.status,
                transition: Transition::Submit,
            });
        }

        let intern = tx
            .get_intern(&intern_id)?
            .ok_or_else(|| intern_not_found(&intern_id))?;
        let todays = tx.records_for_day(&intern_id, now.date_naive())?;

        let decision = self.windows.evaluate(&CheckContext {
            action: CheckAction::CheckOut,
            kind: record.kind,
            now,
            intern: &intern,
            todays_records: &todays,
            open_record: Some(&record),
        });
        if let PolicyDecision::Rejected { reasons } = decision {
            drop(tx);
            return Err(self.rejected(intern_id, record.kind, CheckAction::CheckOut, reasons, now));
        }

        req.validate()?;
        let evidence =
            self.presence_evidence(record.kind, CheckAction::CheckOut, req.evidence.as_ref())?;

        let mut tasks = tx.tasks_for_record(&record.id)?;
        for update in &req.task_updates {
            let task = tasks
                .iter_mut()
                .find(|t| t.id == update.task_id)
                .ok_or_else(|| {
                    CoreError::ValidationFailed(format!(
                        "task {} is not part of record {}",
                        update.task_id, record.id
                    ))
                })?;

            if let Some(remark) = non_blank(update.remark.as_deref()) {
                task.remark = Some(remark.to_string());
                tx.update_task(task)?;
            }
            for evidence in &update.evidence {
                tx.insert_image(&Image::attach(task.id, evidence, now))?;
            }
        }

        for description in &req.new_tasks {
            tx.insert_task(&Task::for_record(&record, description.trim(), now))?;
        }

        if let Some(evidence) = evidence {
            let presence = tasks.first().ok_or_else(|| {
                CoreError::ValidationFailed(format!("record {} has no presence task", record.id))
            })?;
            tx.insert_image(&Image::attach(presence.id, evidence, now))?;
        }

        lifecycle::submit(&mut record, now)?;
        tx.update_record(&record)?;

        let elapsed = record.elapsed().unwrap_or_default();
        let _ = tx.append_audit(AuditEvent::at(
            now,
            AuditEventType::RecordSubmitted {
                record_id: record.id,
                intern_id,
                elapsed,
            },
        ));
        tx.commit()?;

        info!(
            record_id = %record.id,
            intern_id = %intern_id,
            elapsed_secs = elapsed.as_secs(),
            "Checked out"
        );

        let events = vec![CoreEvent::RecordSubmitted {
            record_id: record.id,
            intern_id,
            time_out: record.time_out.unwrap_or(now),
        }];
        Ok(Outcome::new(record, events))
    }

    // Evaluator operations

    /// Validate or flag a sent record
    pub fn give_feedback(
        &self,
        actor: &Actor,
        req: &FeedbackRequest,
        now: DateTime<Local>,
    ) -> CoreResult<Outcome<Evaluation>> {
        let evaluator = require_evaluator(actor)?;
        req.validate()?;

        let tx = self.store.begin()?;
        let mut record = owned_record(tx.as_ref(), &req.record_id, None)?;
        match req.verdict {
            Verdict::Validate => {
                lifecycle::validate(&mut record, non_blank(req.remark.as_deref()))?;
            }
            Verdict::Flag => {
                lifecycle::flag(&mut record, req.remark.as_deref().unwrap_or_default())?;
            }
        }

        self.finish_evaluation(tx, record, evaluator, now)
    }

    /// Credit a flagged record with a chosen duration
    pub fn reevaluate(
        &self,
        actor: &Actor,
        req: &ReevaluateRequest,
        now: DateTime<Local>,
    ) -> CoreResult<Outcome<Evaluation>> {
        let evaluator = require_evaluator(actor)?;
        let duration = req.duration()?;

        let tx = self.store.begin()?;
        let mut record = owned_record(tx.as_ref(), &req.record_id, None)?;
        lifecycle::reevaluate(&mut record, duration, non_blank(req.remark.as_deref()))?;

        self.finish_evaluation(tx, record, evaluator, now)
    }

    fn finish_evaluation(
        &self,
        tx: Box<dyn StoreTx + '_>,
        record: AttendanceRecord,
        evaluator: &str,
        now: DateTime<Local>,
    ) -> CoreResult<Outcome<Evaluation>> {
        tx.update_record(&record)?;
        let _ = tx.append_audit(AuditEvent::at(
            now,
            AuditEventType::RecordEvaluated {
                record_id: record.id,
                status: record.status,
                work_duration: record.work_duration,
                by: evaluator.to_string(),
            },
        ));

        let mut events = vec![CoreEvent::RecordEvaluated {
            record_id: record.id,
            intern_id: record.intern_id,
            status: record.status,
            work_duration: record.work_duration,
        }];

        let intern = if record.status == RecordStatus::Validated {
            let totals = accounting::recompute(tx.as_ref(), &record.intern_id, now)?;
            if totals.changed {
                events.push(totals_changed(&totals.intern));
            }
            totals.intern
        } else {
            tx.get_intern(&record.intern_id)?
                .ok_or_else(|| intern_not_found(&record.intern_id))?
        };

        tx.commit()?;

        info!(
            record_id = %record.id,
            intern_id = %record.intern_id,
            status = %record.status,
            work_secs = record.work_duration.as_secs(),
            rendered_secs = intern.rendered.as_secs(),
            evaluator,
            "Record evaluated"
        );

        Ok(Outcome::new(Evaluation { record, intern }, events))
    }

    // Sweeps

    /// Force-close every ongoing record of `kind` opened on `as_of`'s day
    pub fn sweep_timeouts(
        &self,
        kind: RecordKind,
        as_of: DateTime<Local>,
    ) -> CoreResult<Outcome<SweepReport>> {
        sweeper::sweep_kind(self, kind, as_of)
    }

    /// Force-close ongoing records left over from days before `now`
    pub fn sweep_overdue(&self, now: DateTime<Local>) -> CoreResult<Outcome<SweepReport>> {
        sweeper::sweep_overdue(self, now)
    }

    /// Close time for a record left open past its day: that day's window end
    pub(crate) fn overdue_close_time(&self, record: &AttendanceRecord) -> DateTime<Local> {
        self.windows
            .window(record.kind)
            .end
            .on(record.day())
            .map_or(record.time_in, |end| end.max(record.time_in))
    }

    /// Time out one record in its own transaction.
    /// Returns `None` if it was already closed (or removed) by someone else.
    pub fn time_out_record(
        &self,
        record_id: &RecordId,
        at: DateTime<Local>,
    ) -> CoreResult<Option<AttendanceRecord>> {
        let tx = self.store.begin()?;
        let Some(mut record) = tx.get_record(record_id)? else {
            return Ok(None);
        };
        if record.status != RecordStatus::Ongoing {
            debug!(record_id = %record_id, status = %record.status, "Record already closed");
            return Ok(None);
        }

        lifecycle::time_out(&mut record, at)?;
        tx.update_record(&record)?;

        let time_out = record.time_out.unwrap_or(at);
        let _ = tx.append_audit(AuditEvent::at(
            at,
            AuditEventType::RecordTimedOut {
                record_id: record.id,
                intern_id: record.intern_id,
                kind: record.kind,
                time_out,
            },
        ));
        tx.commit()?;

        info!(
            record_id = %record.id,
            intern_id = %record.intern_id,
            kind = %record.kind,
            time_out = %time_out,
            "Record timed out"
        );
        Ok(Some(record))
    }

    // Intern administration

    pub fn create_intern(
        &self,
        actor: &Actor,
        req: &CreateInternRequest,
        now: DateTime<Local>,
    ) -> CoreResult<Outcome<Intern>> {
        let evaluator = require_evaluator(actor)?;
        req.validate()?;

        let email = req.email.trim();
        let tx = self.store.begin()?;
        if tx.find_intern_by_email(email)?.is_some() {
            return Err(CoreError::ValidationFailed(format!(
                "email {} is already registered",
                email
            )));
        }

        let intern = Intern::new(email, req.full_name.trim(), req.start_date, req.quota, now);
        tx.insert_intern(&intern)?;
        let _ = tx.append_audit(AuditEvent::at(
            now,
            AuditEventType::InternCreated {
                intern_id: intern.id,
                email: intern.email.clone(),
            },
        ));
        tx.commit()?;

        info!(intern_id = %intern.id, evaluator, "Intern created");
        self.notify(InternNotice::Welcome(intern.clone()));

        let events = vec![CoreEvent::InternChanged {
            intern_id: intern.id,
        }];
        Ok(Outcome::new(intern, events))
    }

    pub fn update_intern(
        &self,
        actor: &Actor,
        req: &UpdateInternRequest,
        now: DateTime<Local>,
    ) -> CoreResult<Outcome<Intern>> {
        let evaluator = require_evaluator(actor)?;
        req.validate()?;

        let tx = self.store.begin()?;
        let mut intern = tx
            .get_intern(&req.intern_id)?
            .ok_or_else(|| intern_not_found(&req.intern_id))?;

        if let Some(email) = &req.email {
            let email = email.trim();
            if let Some(other) = tx.find_intern_by_email(email)?
                && other.id != intern.id
            {
                return Err(CoreError::ValidationFailed(format!(
                    "email {} is already registered",
                    email
                )));
            }
            intern.email = email.to_string();
        }
        if let Some(name) = &req.full_name {
            intern.full_name = name.trim().to_string();
        }
        if let Some(start_date) = req.start_date {
            intern.start_date = start_date;
        }
        if let Some(quota) = req.quota {
            intern.quota = quota;
        }
        if let Some(remark) = &req.admin_remark {
            intern.admin_remark = non_blank(Some(remark)).map(str::to_string);
        }
        tx.update_intern(&intern)?;

        let mut events = vec![CoreEvent::InternChanged {
            intern_id: intern.id,
        }];
        if req.quota.is_some() {
            let totals = accounting::recompute(tx.as_ref(), &intern.id, now)?;
            if totals.changed {
                events.push(totals_changed(&totals.intern));
            }
            intern = totals.intern;
        }

        let _ = tx.append_audit(AuditEvent::at(
            now,
            AuditEventType::InternUpdated {
                intern_id: intern.id,
            },
        ));
        tx.commit()?;

        info!(intern_id = %intern.id, evaluator, "Intern updated");
        self.notify(InternNotice::Updated(intern.clone()));

        Ok(Outcome::new(intern, events))
    }

    /// Lock an intern's status to a value, or release the lock and derive it
    /// from the totals again. Releasing also lifts a drop.
    pub fn set_intern_status(
        &self,
        actor: &Actor,
        req: &SetInternStatusRequest,
        now: DateTime<Local>,
    ) -> CoreResult<Outcome<Intern>> {
        let evaluator = require_evaluator(actor)?;

        let tx = self.store.begin()?;
        let mut intern = tx
            .get_intern(&req.intern_id)?
            .ok_or_else(|| intern_not_found(&req.intern_id))?;

        let mut events = vec![CoreEvent::InternChanged {
            intern_id: intern.id,
        }];
        match req.status {
            Some(status) => {
                intern.status = status;
                intern.status_locked = true;
                tx.update_intern(&intern)?;
            }
            None => {
                intern.status_locked = false;
                if intern.status == InternStatus::Dropped {
                    intern.status = InternStatus::Ongoing;
                }
                tx.update_intern(&intern)?;

                let totals = accounting::recompute(tx.as_ref(), &intern.id, now)?;
                if totals.changed {
                    events.push(totals_changed(&totals.intern));
                }
                intern = totals.intern;
            }
        }

        let _ = tx.append_audit(AuditEvent::at(
            now,
            AuditEventType::InternStatusSet {
                intern_id: intern.id,
                status: req.status,
                by: evaluator.to_string(),
            },
        ));
        tx.commit()?;

        info!(
            intern_id = %intern.id,
            status = %intern.status,
            locked = intern.status_locked,
            evaluator,
            "Intern status set"
        );
        self.notify(InternNotice::Updated(intern.clone()));

        Ok(Outcome::new(intern, events))
    }

    /// Delete a completed or dropped intern with all their records
    pub fn delete_intern(
        &self,
        actor: &Actor,
        intern_id: &InternId,
        now: DateTime<Local>,
    ) -> CoreResult<Outcome<()>> {
        let evaluator = require_evaluator(actor)?;

        let tx = self.store.begin()?;
        let intern = tx
            .get_intern(intern_id)?
            .ok_or_else(|| intern_not_found(intern_id))?;
        if !intern.status.may_be_deleted() {
            return Err(CoreError::PolicyRejected {
                reasons: vec![ReasonCode::InternNotRemovable {
                    status: intern.status,
                }],
            });
        }

        let records = tx.delete_intern(intern_id)?;
        let _ = tx.append_audit(AuditEvent::at(
            now,
            AuditEventType::InternDeleted {
                intern_id: *intern_id,
                records,
            },
        ));
        tx.commit()?;

        info!(intern_id = %intern_id, records, evaluator, "Intern deleted");

        let events = vec![CoreEvent::InternRemoved {
            intern_id: *intern_id,
        }];
        Ok(Outcome::new((), events))
    }

    // Reads

    /// Interns may only read themselves
    pub fn get_intern(&self, actor: &Actor, intern_id: &InternId) -> CoreResult<Intern> {
        check_owner(actor, intern_id)?;
        self.store
            .get_intern(intern_id)?
            .ok_or_else(|| intern_not_found(intern_id))
    }

    pub fn list_interns(&self, actor: &Actor) -> CoreResult<Vec<Intern>> {
        require_evaluator(actor)?;
        Ok(self.store.list_interns()?)
    }

    pub fn list_records(
        &self,
        actor: &Actor,
        intern_id: &InternId,
        day: Option<NaiveDate>,
    ) -> CoreResult<Vec<AttendanceRecord>> {
        check_owner(actor, intern_id)?;
        if self.store.get_intern(intern_id)?.is_none() {
            return Err(intern_not_found(intern_id));
        }
        Ok(self.store.list_records(intern_id, day)?)
    }

    pub fn export_snapshot(&self, actor: &Actor, now: DateTime<Local>) -> CoreResult<ExportSnapshot> {
        require_evaluator(actor)?;
        Ok(self.store.export(now)?)
    }

    // Helpers

    /// Enforce face-to-face presence evidence at the configured moment
    fn presence_evidence<'a>(
        &self,
        kind: RecordKind,
        action: CheckAction,
        supplied: Option<&'a Evidence>,
    ) -> CoreResult<Option<&'a Evidence>> {
        if kind != RecordKind::FaceToFace {
            return match supplied {
                Some(_) => Err(CoreError::ValidationFailed(
                    "presence evidence only applies to face-to-face records".into(),
                )),
                None => Ok(None),
            };
        }

        let expected = match self.policy.evidence_timing() {
            EvidenceTiming::CheckIn => CheckAction::CheckIn,
            EvidenceTiming::CheckOut => CheckAction::CheckOut,
        };

        match (supplied, action == expected) {
            (Some(evidence), true) => Ok(Some(evidence)),
            (None, true) => Err(CoreError::ValidationFailed(format!(
                "face-to-face {} needs a presence photo",
                action
            ))),
            (Some(_), false) => Err(CoreError::ValidationFailed(format!(
                "the presence photo is taken at {}",
                expected
            ))),
            (None, false) => Ok(None),
        }
    }

    fn rejected(
        &self,
        intern_id: InternId,
        kind: RecordKind,
        action: CheckAction,
        reasons: Vec<ReasonCode>,
        now: DateTime<Local>,
    ) -> CoreError {
        let _ = self.store.append_audit(AuditEvent::at(
            now,
            AuditEventType::CheckRejected {
                intern_id,
                kind,
                action,
                reasons: reasons.iter().map(ToString::to_string).collect(),
            },
        ));

        debug!(intern_id = %intern_id, kind = %kind, %action, ?reasons, "Check rejected");
        CoreError::PolicyRejected { reasons }
    }

    fn notify(&self, notice: InternNotice) {
        if let Err(e) = self.notifier.notify(&notice) {
            warn!(intern_id = %notice.intern().id, error = %e, "Intern notification failed");
        }
    }
}

fn require_intern(actor: &Actor) -> CoreResult<InternId> {
    actor
        .intern_id()
        .ok_or_else(|| CoreError::PermissionDenied("only interns check in and out".into()))
}

fn require_evaluator(actor: &Actor) -> CoreResult<&str> {
    match actor {
        Actor::Evaluator { name } => Ok(name),
        Actor::Intern { .. } => Err(CoreError::PermissionDenied(
            "evaluator operation".into(),
        )),
    }
}

fn check_owner(actor: &Actor, intern_id: &InternId) -> CoreResult<()> {
    match actor {
        Actor::Intern { intern_id: own } if own != intern_id => Err(intern_not_found(intern_id)),
        _ => Ok(()),
    }
}

/// Load a record; a record owned by someone else is reported as missing
fn owned_record(
    tx: &dyn StoreTx,
    record_id: &RecordId,
    owner: Option<InternId>,
) -> CoreResult<AttendanceRecord> {
    tx.get_record(record_id)?
        .filter(|r| owner.is_none_or(|owner| r.intern_id == owner))
        .ok_or_else(|| CoreError::NotFound(format!("record {}", record_id)))
}

fn intern_not_found(intern_id: &InternId) -> CoreError {
    CoreError::NotFound(format!("intern {}", intern_id))
}

fn totals_changed(intern: &Intern) -> CoreEvent {
    CoreEvent::InternTotalsChanged {
        intern_id: intern.id,
        rendered: intern.rendered,
        status: intern.status,
    }
}
