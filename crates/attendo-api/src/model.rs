//! Entities exchanged with clients and persisted by the store

use attendo_util::{ImageId, InternId, RecordId, TaskId};
use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{InternStatus, RecordKind, RecordStatus};

/// An intern with a time quota to render
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intern {
    pub id: InternId,
    pub email: String,
    pub full_name: String,
    pub start_date: NaiveDate,
    /// Time owed
    pub quota: Duration,
    /// Sum of validated work; maintained by recomputation only
    pub rendered: Duration,
    pub status: InternStatus,
    /// Evaluator override; recomputation leaves `status` alone while set
    pub status_locked: bool,
    pub admin_remark: Option<String>,
    pub created_at: DateTime<Local>,
}

impl Intern {
    pub fn new(
        email: impl Into<String>,
        full_name: impl Into<String>,
        start_date: NaiveDate,
        quota: Duration,
        now: DateTime<Local>,
    ) -> Self {
        Self {
            id: InternId::new(),
            email: email.into(),
            full_name: full_name.into(),
            start_date,
            quota,
            rendered: Duration::ZERO,
            status: InternStatus::Ongoing,
            status_locked: false,
            admin_remark: None,
            created_at: now,
        }
    }

    /// Time still owed (zero once the quota is met)
    pub fn remaining(&self) -> Duration {
        self.quota.saturating_sub(self.rendered)
    }
}

/// One check-in/check-out session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: RecordId,
    pub intern_id: InternId,
    pub kind: RecordKind,
    pub time_in: DateTime<Local>,
    pub time_out: Option<DateTime<Local>>,
    pub status: RecordStatus,
    /// Credited time; zero unless validated
    pub work_duration: Duration,
    pub admin_remark: Option<String>,
}

impl AttendanceRecord {
    pub fn open(intern_id: InternId, kind: RecordKind, time_in: DateTime<Local>) -> Self {
        Self {
            id: RecordId::new(),
            intern_id,
            kind,
            time_in,
            time_out: None,
            status: RecordStatus::Ongoing,
            work_duration: Duration::ZERO,
            admin_remark: None,
        }
    }

    /// Local calendar day the record belongs to
    pub fn day(&self) -> NaiveDate {
        self.time_in.date_naive()
    }

    /// `time_out - time_in`, once closed
    pub fn elapsed(&self) -> Option<Duration> {
        self.time_out
            .map(|out| out.signed_duration_since(self.time_in).to_std().unwrap_or(Duration::ZERO))
    }
}

/// A reported piece of work (or the face-to-face presence task)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub intern_id: InternId,
    /// `None` for legacy standalone tasks
    pub record_id: Option<RecordId>,
    pub description: String,
    pub remark: Option<String>,
    pub created_at: DateTime<Local>,
}

impl Task {
    pub fn for_record(
        record: &AttendanceRecord,
        description: impl Into<String>,
        now: DateTime<Local>,
    ) -> Self {
        Self {
            id: TaskId::new(),
            intern_id: record.intern_id,
            record_id: Some(record.id),
            description: description.into(),
            remark: None,
            created_at: now,
        }
    }
}

/// Opaque reference to a stored evidence file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub handle: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

/// Evidence attached to a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub id: ImageId,
    pub task_id: TaskId,
    pub handle: String,
    pub content_type: Option<String>,
    pub created_at: DateTime<Local>,
}

impl Image {
    pub fn attach(task_id: TaskId, evidence: &Evidence, now: DateTime<Local>) -> Self {
        Self {
            id: ImageId::new(),
            task_id,
            handle: evidence.handle.clone(),
            content_type: evidence.content_type.clone(),
            created_at: now,
        }
    }
}

/// A record with its tasks, as returned by check-in
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDetail {
    pub record: AttendanceRecord,
    pub tasks: Vec<Task>,
}

/// Result of feedback or re-evaluation: the record and the intern's new totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub record: AttendanceRecord,
    pub intern: Intern,
}

/// A record the sweeper could not close
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepFailure {
    pub record_id: RecordId,
    pub message: String,
}

/// Outcome of one sweeper run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SweepReport {
    pub closed: Vec<RecordId>,
    /// Records that were already closed when the sweep reached them
    pub skipped: usize,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    pub fn merge(&mut self, other: SweepReport) {
        self.closed.extend(other.closed);
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
    }
}

/// Read-only dump for reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSnapshot {
    pub generated_at: DateTime<Local>,
    pub interns: Vec<Intern>,
    pub records: Vec<AttendanceRecord>,
    pub tasks: Vec<Task>,
    pub images: Vec<Image>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn record_day_and_elapsed() {
        let time_in = Local.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let mut record = AttendanceRecord::open(InternId::new(), RecordKind::Async, time_in);

        assert_eq!(record.day(), NaiveDate::from_ymd_opt(2025, 3, 3).unwrap());
        assert_eq!(record.elapsed(), None);

        record.time_out = Some(Local.with_ymd_and_hms(2025, 3, 3, 13, 0, 0).unwrap());
        assert_eq!(record.elapsed(), Some(Duration::from_secs(4 * 3600)));
    }

    #[test]
    fn remaining_saturates() {
        let now = Local.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap();
        let mut intern = Intern::new(
            "a@example.com",
            "A",
            now.date_naive(),
            Duration::from_secs(8 * 3600),
            now,
        );
        assert_eq!(intern.remaining(), Duration::from_secs(8 * 3600));

        intern.rendered = Duration::from_secs(9 * 3600);
        assert_eq!(intern.remaining(), Duration::ZERO);
    }
}
