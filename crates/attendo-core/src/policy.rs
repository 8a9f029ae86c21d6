//! Time-window policy
//!
//! Decides whether a check-in or check-out may happen. Pure: every input is
//! passed in by the caller, nothing is read or written.

use attendo_api::{AttendanceRecord, CheckAction, Intern, ReasonCode, RecordKind};
use attendo_config::Policy;
use attendo_util::TimeWindow;
use chrono::{DateTime, Local};

use crate::{CoreError, CoreResult};

/// Decision for one check-in/check-out attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Allowed,
    /// Every violated rule, in evaluation order
    Rejected { reasons: Vec<ReasonCode> },
}

impl PolicyDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, PolicyDecision::Allowed)
    }

    pub fn into_result(self) -> CoreResult<()> {
        match self {
            PolicyDecision::Allowed => Ok(()),
            PolicyDecision::Rejected { reasons } => Err(CoreError::PolicyRejected { reasons }),
        }
    }
}

/// Everything the policy looks at for one attempt
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    pub action: CheckAction,
    pub kind: RecordKind,
    pub now: DateTime<Local>,
    pub intern: &'a Intern,
    /// The intern's records for `now`'s calendar day
    pub todays_records: &'a [AttendanceRecord],
    /// The intern's ongoing record, if any; for check-out, the record being closed
    pub open_record: Option<&'a AttendanceRecord>,
}

/// Allowed hours per record kind plus the per-day submission rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindowPolicy {
    face_to_face: TimeWindow,
    asynchronous: TimeWindow,
}

impl TimeWindowPolicy {
    pub fn new(face_to_face: TimeWindow, asynchronous: TimeWindow) -> Self {
        Self {
            face_to_face,
            asynchronous,
        }
    }

    pub fn from_policy(policy: &Policy) -> Self {
        Self::new(
            policy.window(RecordKind::FaceToFace),
            policy.window(RecordKind::Async),
        )
    }

    pub fn window(&self, kind: RecordKind) -> TimeWindow {
        match kind {
            RecordKind::FaceToFace => self.face_to_face,
            RecordKind::Async => self.asynchronous,
        }
    }

    pub fn evaluate(&self, ctx: &CheckContext<'_>) -> PolicyDecision {
        let mut reasons = Vec::new();
        let today = ctx.now.date_naive();

        let window = self.window(ctx.kind);
        if !window.contains(&ctx.now) {
            reasons.push(ReasonCode::OutsideTimeWindow {
                kind: ctx.kind,
                action: ctx.action,
                window,
            });
        }

        if today < ctx.intern.start_date {
            reasons.push(ReasonCode::BeforeStartDate {
                start_date: ctx.intern.start_date,
            });
        }

        match ctx.action {
            CheckAction::CheckIn => {
                if !ctx.intern.status.may_check_in() {
                    reasons.push(ReasonCode::InternIneligible {
                        status: ctx.intern.status,
                    });
                }

                if let Some(open) = ctx.open_record {
                    reasons.push(ReasonCode::RecordAlreadyOpen { record_id: open.id });
                }

                if let Some(submitted) = ctx
                    .todays_records
                    .iter()
                    .find(|r| r.status.is_closed() && r.day() == today)
                {
                    reasons.push(ReasonCode::AlreadySubmittedToday {
                        record_id: submitted.id,
                    });
                }
            }
            CheckAction::CheckOut => {
                if let Some(record) = ctx.open_record
                    && record.day() != today
                {
                    reasons.push(ReasonCode::RecordFromPreviousDay { day: record.day() });
                }
            }
        }

        if reasons.is_empty() {
            PolicyDecision::Allowed
        } else {
            PolicyDecision::Rejected { reasons }
        }
    }
}

impl Default for TimeWindowPolicy {
    fn default() -> Self {
        Self::from_policy(&Policy::default())
    }
}
