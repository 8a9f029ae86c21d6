//! Attendance record state machine
//!
//! ```text
//! ongoing --submit--> sent --validate--> validated
//!    |                  \--flag--> flagged --reevaluate--> validated
//!    \--time_out--> flagged
//! ```
//!
//! Nothing returns to `ongoing`. A transition from the wrong state is an
//! error; it is never coerced.

use attendo_api::{AttendanceRecord, RecordStatus};
use attendo_util::format_duration;
use chrono::{DateTime, Local};
use std::fmt;
use std::time::Duration;

use crate::{CoreError, CoreResult};

/// Remark written on records closed by the sweeper
pub const AUTO_TIMEOUT_REMARK: &str = "Did not time out.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Intern checks out
    Submit,
    Validate,
    Flag,
    /// Evaluator credits a flagged record
    Reevaluate,
    /// Sweeper closes an abandoned record
    TimeOut,
}

impl Transition {
    /// Target state, or `None` if the transition is not legal from `from`
    pub fn target(self, from: RecordStatus) -> Option<RecordStatus> {
        use RecordStatus::*;
        use Transition::*;

        match (from, self) {
            (Ongoing, Submit) => Some(Sent),
            (Ongoing, TimeOut) => Some(Flagged),
            (Sent, Validate) => Some(Validated),
            (Sent, Flag) => Some(Flagged),
            (Flagged, Reevaluate) => Some(Validated),

            (Ongoing, Validate | Flag | Reevaluate)
            | (Sent, Submit | Reevaluate | TimeOut)
            | (Flagged, Submit | Validate | Flag | TimeOut)
            | (Validated, Submit | Validate | Flag | Reevaluate | TimeOut) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Transition::Submit => "submit",
            Transition::Validate => "validate",
            Transition::Flag => "flag",
            Transition::Reevaluate => "reevaluate",
            Transition::TimeOut => "time out",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn target(record: &AttendanceRecord, transition: Transition) -> CoreResult<RecordStatus> {
    transition
        .target(record.status)
        .ok_or(CoreError::InvalidTransition {
            record_id: record.id,
            from: record.status,
            transition,
        })
}

/// Close the record at `now` (`ongoing -> sent`)
pub fn submit(record: &mut AttendanceRecord, now: DateTime<Local>) -> CoreResult<()> {
    let next = target(record, Transition::Submit)?;
    record.time_out = Some(now.max(record.time_in));
    record.status = next;
    Ok(())
}

/// Credit the full elapsed time (`sent -> validated`)
pub fn validate(record: &mut AttendanceRecord, remark: Option<&str>) -> CoreResult<Duration> {
    let next = target(record, Transition::Validate)?;
    let elapsed = record.elapsed().ok_or_else(|| {
        CoreError::ValidationFailed(format!("record {} has no check-out time", record.id))
    })?;

    record.work_duration = elapsed;
    record.status = next;
    if let Some(remark) = remark {
        record.admin_remark = Some(remark.to_string());
    }
    Ok(elapsed)
}

/// Reject pending correction (`sent -> flagged`); the remark is required
pub fn flag(record: &mut AttendanceRecord, remark: &str) -> CoreResult<()> {
    let next = target(record, Transition::Flag)?;
    if remark.trim().is_empty() {
        return Err(CoreError::ValidationFailed("a flag needs a remark".into()));
    }

    record.status = next;
    record.work_duration = Duration::ZERO;
    record.admin_remark = Some(remark.trim().to_string());
    Ok(())
}

/// Credit an evaluator-chosen duration (`flagged -> validated`).
/// The duration must lie within `[0, time_out - time_in]`.
pub fn reevaluate(
    record: &mut AttendanceRecord,
    duration: Duration,
    remark: Option<&str>,
) -> CoreResult<()> {
    let next = target(record, Transition::Reevaluate)?;
    let elapsed = record.elapsed().ok_or_else(|| {
        CoreError::ValidationFailed(format!("record {} has no check-out time", record.id))
    })?;

    if duration > elapsed {
        return Err(CoreError::ValidationFailed(format!(
            "duration {} exceeds the {} between check-in and check-out",
            format_duration(duration),
            format_duration(elapsed)
        )));
    }

    record.work_duration = duration;
    record.status = next;
    if let Some(remark) = remark {
        record.admin_remark = Some(remark.to_string());
    }
    Ok(())
}

/// Force-close an abandoned record (`ongoing -> flagged`), crediting nothing
pub fn time_out(record: &mut AttendanceRecord, at: DateTime<Local>) -> CoreResult<()> {
    let next = target(record, Transition::TimeOut)?;
    record.time_out = Some(at.max(record.time_in));
    record.status = next;
    record.work_duration = Duration::ZERO;
    record.admin_remark = Some(AUTO_TIMEOUT_REMARK.to_string());
    Ok(())
}
