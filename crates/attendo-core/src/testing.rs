//! Shared test fixtures

use attendo_api::{
    Actor, AttendanceRecord, CheckInRequest, Evidence, ExportSnapshot, Image, Intern, RecordKind,
    Task,
};
use attendo_store::{AuditEvent, SqliteStore, Store, StoreError, StoreResult, StoreTx};
use attendo_util::{InternId, RecordId, TaskId};
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Monday 2025-03-03 at the given time
pub fn at(h: u32, m: u32, s: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 3, 3, h, m, s).unwrap()
}

pub fn day_at(day: u32, h: u32, m: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 3, day, h, m, 0).unwrap()
}

pub fn evaluator() -> Actor {
    Actor::Evaluator {
        name: "hr-office".into(),
    }
}

pub fn photo() -> Evidence {
    Evidence {
        handle: "uploads/presence.jpg".into(),
        content_type: Some("image/jpeg".into()),
    }
}

pub fn face_to_face_check_in(evidence: Option<Evidence>) -> CheckInRequest {
    CheckInRequest {
        kind: RecordKind::FaceToFace,
        evidence,
        tasks: vec![],
    }
}

/// SQLite store that fails selected writes on demand
pub struct FailingStore {
    inner: SqliteStore,
    fail_sums: AtomicBool,
    fail_record: Mutex<Option<RecordId>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteStore::in_memory().unwrap(),
            fail_sums: AtomicBool::new(false),
            fail_record: Mutex::new(None),
        }
    }

    /// Make `sum_validated` fail inside transactions
    pub fn fail_sums(&self, fail: bool) {
        self.fail_sums.store(fail, Ordering::SeqCst);
    }

    /// Make `update_record` fail for one record
    pub fn fail_updates_of(&self, record_id: RecordId) {
        *self.fail_record.lock().unwrap() = Some(record_id);
    }

    pub fn stop_failing_updates(&self) {
        *self.fail_record.lock().unwrap() = None;
    }
}

impl Store for FailingStore {
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()> {
        self.inner.append_audit(event)
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        self.inner.get_recent_audits(limit)
    }

    fn begin(&self) -> StoreResult<Box<dyn StoreTx + '_>> {
        Ok(Box::new(FailingTx {
            inner: self.inner.begin()?,
            store: self,
        }))
    }

    fn get_intern(&self, id: &InternId) -> StoreResult<Option<Intern>> {
        self.inner.get_intern(id)
    }

    fn list_interns(&self) -> StoreResult<Vec<Intern>> {
        self.inner.list_interns()
    }

    fn get_record(&self, id: &RecordId) -> StoreResult<Option<AttendanceRecord>> {
        self.inner.get_record(id)
    }

    fn list_records(
        &self,
        intern_id: &InternId,
        day: Option<NaiveDate>,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        self.inner.list_records(intern_id, day)
    }

    fn ongoing_records(&self, kind: RecordKind, day: NaiveDate) -> StoreResult<Vec<AttendanceRecord>> {
        self.inner.ongoing_records(kind, day)
    }

    fn ongoing_records_before(&self, day: NaiveDate) -> StoreResult<Vec<AttendanceRecord>> {
        self.inner.ongoing_records_before(day)
    }

    fn tasks_for_record(&self, record_id: &RecordId) -> StoreResult<Vec<Task>> {
        self.inner.tasks_for_record(record_id)
    }

    fn images_for_task(&self, task_id: &TaskId) -> StoreResult<Vec<Image>> {
        self.inner.images_for_task(task_id)
    }

    fn export(&self, generated_at: DateTime<Local>) -> StoreResult<ExportSnapshot> {
        self.inner.export(generated_at)
    }

    fn is_healthy(&self) -> bool {
        self.inner.is_healthy()
    }
}

struct FailingTx<'a> {
    inner: Box<dyn StoreTx + 'a>,
    store: &'a FailingStore,
}

impl StoreTx for FailingTx<'_> {
    fn get_intern(&self, id: &InternId) -> StoreResult<Option<Intern>> {
        self.inner.get_intern(id)
    }

    fn find_intern_by_email(&self, email: &str) -> StoreResult<Option<Intern>> {
        self.inner.find_intern_by_email(email)
    }

    fn insert_intern(&self, intern: &Intern) -> StoreResult<()> {
        self.inner.insert_intern(intern)
    }

    fn update_intern(&self, intern: &Intern) -> StoreResult<()> {
        self.inner.update_intern(intern)
    }

    fn delete_intern(&self, id: &InternId) -> StoreResult<usize> {
        self.inner.delete_intern(id)
    }

    fn get_record(&self, id: &RecordId) -> StoreResult<Option<AttendanceRecord>> {
        self.inner.get_record(id)
    }

    fn records_for_day(&self, intern_id: &InternId, day: NaiveDate) -> StoreResult<Vec<AttendanceRecord>> {
        self.inner.records_for_day(intern_id, day)
    }

    fn open_record(&self, intern_id: &InternId) -> StoreResult<Option<AttendanceRecord>> {
        self.inner.open_record(intern_id)
    }

    fn insert_record(&self, record: &AttendanceRecord) -> StoreResult<()> {
        self.inner.insert_record(record)
    }

    fn update_record(&self, record: &AttendanceRecord) -> StoreResult<()> {
        if *self.store.fail_record.lock().unwrap() == Some(record.id) {
            return Err(StoreError::Database("injected update failure".into()));
        }
        self.inner.update_record(record)
    }

    fn sum_validated(&self, intern_id: &InternId) -> StoreResult<Duration> {
        if self.store.fail_sums.load(Ordering::SeqCst) {
            return Err(StoreError::Database("injected sum failure".into()));
        }
        self.inner.sum_validated(intern_id)
    }

    fn tasks_for_record(&self, record_id: &RecordId) -> StoreResult<Vec<Task>> {
        self.inner.tasks_for_record(record_id)
    }

    fn insert_task(&self, task: &Task) -> StoreResult<()> {
        self.inner.insert_task(task)
    }

    fn update_task(&self, task: &Task) -> StoreResult<()> {
        self.inner.update_task(task)
    }

    fn insert_image(&self, image: &Image) -> StoreResult<()> {
        self.inner.insert_image(image)
    }

    fn append_audit(&self, event: AuditEvent) -> StoreResult<()> {
        self.inner.append_audit(event)
    }

    fn commit(self: Box<Self>) -> StoreResult<()> {
        self.inner.commit()
    }
}
