//! Store trait definitions

use attendo_api::{AttendanceRecord, ExportSnapshot, Image, Intern, RecordKind, Task};
use attendo_util::{InternId, RecordId, TaskId};
use chrono::{DateTime, Local, NaiveDate};
use std::time::Duration;

use crate::{AuditEvent, StoreResult};

/// Main store trait
///
/// Reads outside a transaction see only committed data. Every mutation goes
/// through [`Store::begin`].
pub trait Store: Send + Sync {
    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Transactions

    /// Start a write transaction. Other writers wait until it commits or is
    /// dropped; dropping without commit rolls back.
    ///
    /// Do not call other `Store` methods on the same thread while the
    /// transaction is alive.
    fn begin(&self) -> StoreResult<Box<dyn StoreTx + '_>>;

    // Reads

    fn get_intern(&self, id: &InternId) -> StoreResult<Option<Intern>>;

    fn list_interns(&self) -> StoreResult<Vec<Intern>>;

    fn get_record(&self, id: &RecordId) -> StoreResult<Option<AttendanceRecord>>;

    /// Records of an intern, optionally limited to one day, oldest first
    fn list_records(
        &self,
        intern_id: &InternId,
        day: Option<NaiveDate>,
    ) -> StoreResult<Vec<AttendanceRecord>>;

    /// Ongoing records of a kind opened on `day`
    fn ongoing_records(&self, kind: RecordKind, day: NaiveDate) -> StoreResult<Vec<AttendanceRecord>>;

    /// Ongoing records of any kind opened before `day`
    fn ongoing_records_before(&self, day: NaiveDate) -> StoreResult<Vec<AttendanceRecord>>;

    fn tasks_for_record(&self, record_id: &RecordId) -> StoreResult<Vec<Task>>;

    fn images_for_task(&self, task_id: &TaskId) -> StoreResult<Vec<Image>>;

    /// Everything, for reporting
    fn export(&self, generated_at: DateTime<Local>) -> StoreResult<ExportSnapshot>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}

/// An open write transaction
pub trait StoreTx {
    // Interns

    fn get_intern(&self, id: &InternId) -> StoreResult<Option<Intern>>;

    fn find_intern_by_email(&self, email: &str) -> StoreResult<Option<Intern>>;

    fn insert_intern(&self, intern: &Intern) -> StoreResult<()>;

    fn update_intern(&self, intern: &Intern) -> StoreResult<()>;

    /// Delete an intern with their records, tasks and images.
    /// Returns the number of records removed.
    fn delete_intern(&self, id: &InternId) -> StoreResult<usize>;

    // Records

    fn get_record(&self, id: &RecordId) -> StoreResult<Option<AttendanceRecord>>;

    fn records_for_day(&self, intern_id: &InternId, day: NaiveDate) -> StoreResult<Vec<AttendanceRecord>>;

    /// The intern's ongoing record, if any (any day)
    fn open_record(&self, intern_id: &InternId) -> StoreResult<Option<AttendanceRecord>>;

    fn insert_record(&self, record: &AttendanceRecord) -> StoreResult<()>;

    fn update_record(&self, record: &AttendanceRecord) -> StoreResult<()>;

    /// Sum of `work_duration` over the intern's validated records
    fn sum_validated(&self, intern_id: &InternId) -> StoreResult<Duration>;

    // Tasks and evidence

    fn tasks_for_record(&self, record_id: &RecordId) -> StoreResult<Vec<Task>>;

    fn insert_task(&self, task: &Task) -> StoreResult<()>;

    fn update_task(&self, task: &Task) -> StoreResult<()>;

    fn insert_image(&self, image: &Image) -> StoreResult<()>;

    // Audit

    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Make every write visible
    fn commit(self: Box<Self>) -> StoreResult<()>;
}
