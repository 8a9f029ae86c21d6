//! SQLite-based store implementation

use attendo_api::{
    AttendanceRecord, ExportSnapshot, Image, Intern, RecordKind, RecordStatus, Task,
};
use attendo_util::{InternId, RecordId, TaskId, format_day};
use chrono::{DateTime, Local, NaiveDate};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Params, Row, params};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, warn};

use crate::{AuditEvent, AuditEventType, Store, StoreError, StoreResult, StoreTx};

const INTERN_COLUMNS: &str = "id, email, full_name, start_date, quota_secs, rendered_secs, \
                              status, status_locked, admin_remark, created_at";
const RECORD_COLUMNS: &str =
    "id, intern_id, kind, time_in, time_out, status, work_secs, admin_remark";
const TASK_COLUMNS: &str = "id, intern_id, record_id, description, remark, created_at";
const IMAGE_COLUMNS: &str = "id, task_id, handle, content_type, created_at";

/// SQLite-based store
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory store (for testing)
    pub fn in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("store lock poisoned".into()))
    }

    fn init_schema(&self) -> StoreResult<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Audit log (append-only, outlives deleted interns)
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS interns (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                full_name TEXT NOT NULL,
                start_date TEXT NOT NULL,
                quota_secs INTEGER NOT NULL CHECK (quota_secs >= 0),
                rendered_secs INTEGER NOT NULL DEFAULT 0 CHECK (rendered_secs >= 0),
                status TEXT NOT NULL
                    CHECK (status IN ('ongoing', 'passed', 'completed', 'dropped')),
                status_locked INTEGER NOT NULL DEFAULT 0,
                admin_remark TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                intern_id TEXT NOT NULL REFERENCES interns(id) ON DELETE CASCADE,
                kind TEXT NOT NULL CHECK (kind IN ('face_to_face', 'async')),
                day TEXT NOT NULL,
                time_in TEXT NOT NULL,
                time_out TEXT,
                status TEXT NOT NULL
                    CHECK (status IN ('ongoing', 'sent', 'validated', 'flagged')),
                work_secs INTEGER NOT NULL DEFAULT 0 CHECK (work_secs >= 0),
                admin_remark TEXT,
                CHECK ((status = 'ongoing') = (time_out IS NULL)),
                CHECK (work_secs = 0 OR status = 'validated')
            );

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                intern_id TEXT NOT NULL REFERENCES interns(id) ON DELETE CASCADE,
                record_id TEXT REFERENCES records(id) ON DELETE CASCADE,
                description TEXT NOT NULL,
                remark TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS images (
                id TEXT PRIMARY KEY,
                task_id TEXT NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                handle TEXT NOT NULL,
                content_type TEXT,
                created_at TEXT NOT NULL
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_audit_timestamp ON audit_log(timestamp);
            CREATE INDEX IF NOT EXISTS idx_records_intern_day ON records(intern_id, day);
            CREATE INDEX IF NOT EXISTS idx_records_status ON records(status, kind, day);
            CREATE INDEX IF NOT EXISTS idx_tasks_record ON tasks(record_id);
            CREATE INDEX IF NOT EXISTS idx_images_task ON images(task_id);
            "#,
        )?;

        debug!("Store schema initialized");
        Ok(())
    }
}

impl Store for SqliteStore {
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()> {
        let conn = self.lock()?;
        insert_audit(&conn, event)
    }

    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id, timestamp, event_json FROM audit_log ORDER BY id DESC LIMIT ?",
        )?;

        let rows = stmt.query_map([limit], |row| {
            let id: i64 = row.get(0)?;
            let timestamp = timestamp(row, 1)?;
            let event_json: String = row.get(2)?;
            Ok((id, timestamp, event_json))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (id, timestamp, event_json) = row?;
            let event: AuditEventType = serde_json::from_str(&event_json)?;

            events.push(AuditEvent {
                id,
                timestamp,
                event,
            });
        }

        Ok(events)
    }

    fn begin(&self) -> StoreResult<Box<dyn StoreTx + '_>> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Box::new(SqliteTx {
            conn,
            finished: false,
        }))
    }

    fn get_intern(&self, id: &InternId) -> StoreResult<Option<Intern>> {
        let conn = self.lock()?;
        select_intern(&conn, id)
    }

    fn list_interns(&self) -> StoreResult<Vec<Intern>> {
        let conn = self.lock()?;
        query_interns(&conn, "ORDER BY created_at, email", params![])
    }

    fn get_record(&self, id: &RecordId) -> StoreResult<Option<AttendanceRecord>> {
        let conn = self.lock()?;
        select_record(&conn, id)
    }

    fn list_records(
        &self,
        intern_id: &InternId,
        day: Option<NaiveDate>,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let conn = self.lock()?;
        match day {
            Some(day) => records_on(&conn, intern_id, day),
            None => query_records(
                &conn,
                "WHERE intern_id = ? ORDER BY time_in",
                params![intern_id.to_string()],
            ),
        }
    }

    fn ongoing_records(
        &self,
        kind: RecordKind,
        day: NaiveDate,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        let conn = self.lock()?;
        query_records(
            &conn,
            "WHERE status = ? AND kind = ? AND day = ? ORDER BY time_in",
            params![RecordStatus::Ongoing.as_str(), kind.as_str(), format_day(day)],
        )
    }

    fn ongoing_records_before(&self, day: NaiveDate) -> StoreResult<Vec<AttendanceRecord>> {
        let conn = self.lock()?;
        query_records(
            &conn,
            "WHERE status = ? AND day < ? ORDER BY time_in",
            params![RecordStatus::Ongoing.as_str(), format_day(day)],
        )
    }

    fn tasks_for_record(&self, record_id: &RecordId) -> StoreResult<Vec<Task>> {
        let conn = self.lock()?;
        select_tasks(&conn, record_id)
    }

    fn images_for_task(&self, task_id: &TaskId) -> StoreResult<Vec<Image>> {
        let conn = self.lock()?;
        query_images(
            &conn,
            "WHERE task_id = ? ORDER BY created_at",
            params![task_id.to_string()],
        )
    }

    fn export(&self, generated_at: DateTime<Local>) -> StoreResult<ExportSnapshot> {
        let conn = self.lock()?;
        Ok(ExportSnapshot {
            generated_at,
            interns: query_interns(&conn, "ORDER BY created_at, email", params![])?,
            records: query_records(&conn, "ORDER BY time_in", params![])?,
            tasks: query_tasks(&conn, "ORDER BY created_at", params![])?,
            images: query_images(&conn, "ORDER BY created_at", params![])?,
        })
    }

    fn is_healthy(&self) -> bool {
        match self.conn.lock() {
            Ok(conn) => conn.query_row("SELECT 1", [], |_| Ok(())).is_ok(),
            Err(_) => {
                warn!("Store lock poisoned");
                false
            }
        }
    }
}

/// Write transaction holding the connection lock until commit or drop
pub struct SqliteTx<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl StoreTx for SqliteTx<'_> {
    fn get_intern(&self, id: &InternId) -> StoreResult<Option<Intern>> {
        select_intern(&self.conn, id)
    }

    fn find_intern_by_email(&self, email: &str) -> StoreResult<Option<Intern>> {
        let mut found = query_interns(
            &self.conn,
            "WHERE lower(email) = lower(?)",
            params![email],
        )?;
        Ok(found.pop())
    }

    fn insert_intern(&self, intern: &Intern) -> StoreResult<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO interns ({INTERN_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
            ),
            params![
                intern.id.to_string(),
                intern.email,
                intern.full_name,
                format_day(intern.start_date),
                to_secs(intern.quota),
                to_secs(intern.rendered),
                intern.status.as_str(),
                intern.status_locked,
                intern.admin_remark,
                intern.created_at.to_rfc3339(),
            ],
        )?;
        debug!(intern_id = %intern.id, "Intern inserted");
        Ok(())
    }

    fn update_intern(&self, intern: &Intern) -> StoreResult<()> {
        let changed = self.conn.execute(
            r#"
            UPDATE interns
            SET email = ?, full_name = ?, start_date = ?, quota_secs = ?, rendered_secs = ?,
                status = ?, status_locked = ?, admin_remark = ?
            WHERE id = ?
            "#,
            params![
                intern.email,
                intern.full_name,
                format_day(intern.start_date),
                to_secs(intern.quota),
                to_secs(intern.rendered),
                intern.status.as_str(),
                intern.status_locked,
                intern.admin_remark,
                intern.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("intern {}", intern.id)));
        }
        Ok(())
    }

    fn delete_intern(&self, id: &InternId) -> StoreResult<usize> {
        let records: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE intern_id = ?",
            [id.to_string()],
            |row| row.get(0),
        )?;
        let changed = self
            .conn
            .execute("DELETE FROM interns WHERE id = ?", [id.to_string()])?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("intern {}", id)));
        }
        debug!(intern_id = %id, records, "Intern deleted");
        Ok(usize::try_from(records).unwrap_or_default())
    }

    fn get_record(&self, id: &RecordId) -> StoreResult<Option<AttendanceRecord>> {
        select_record(&self.conn, id)
    }

    fn records_for_day(
        &self,
        intern_id: &InternId,
        day: NaiveDate,
    ) -> StoreResult<Vec<AttendanceRecord>> {
        records_on(&self.conn, intern_id, day)
    }

    fn open_record(&self, intern_id: &InternId) -> StoreResult<Option<AttendanceRecord>> {
        let mut open = query_records(
            &self.conn,
            "WHERE intern_id = ? AND status = ? ORDER BY time_in DESC LIMIT 1",
            params![intern_id.to_string(), RecordStatus::Ongoing.as_str()],
        )?;
        Ok(open.pop())
    }

    fn insert_record(&self, record: &AttendanceRecord) -> StoreResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO records
                (id, intern_id, kind, day, time_in, time_out, status, work_secs, admin_remark)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.id.to_string(),
                record.intern_id.to_string(),
                record.kind.as_str(),
                format_day(record.day()),
                record.time_in.to_rfc3339(),
                record.time_out.map(|t| t.to_rfc3339()),
                record.status.as_str(),
                to_secs(record.work_duration),
                record.admin_remark,
            ],
        )?;
        debug!(record_id = %record.id, kind = %record.kind, "Record inserted");
        Ok(())
    }

    fn update_record(&self, record: &AttendanceRecord) -> StoreResult<()> {
        let changed = self.conn.execute(
            r#"
            UPDATE records
            SET time_out = ?, status = ?, work_secs = ?, admin_remark = ?
            WHERE id = ?
            "#,
            params![
                record.time_out.map(|t| t.to_rfc3339()),
                record.status.as_str(),
                to_secs(record.work_duration),
                record.admin_remark,
                record.id.to_string(),
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("record {}", record.id)));
        }
        debug!(record_id = %record.id, status = %record.status, "Record updated");
        Ok(())
    }

    fn sum_validated(&self, intern_id: &InternId) -> StoreResult<Duration> {
        let secs: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(work_secs), 0) FROM records WHERE intern_id = ? AND status = ?",
            params![intern_id.to_string(), RecordStatus::Validated.as_str()],
            |row| row.get(0),
        )?;
        u64::try_from(secs)
            .map(Duration::from_secs)
            .map_err(|_| StoreError::Corrupt(format!("negative work total for intern {}", intern_id)))
    }

    fn tasks_for_record(&self, record_id: &RecordId) -> StoreResult<Vec<Task>> {
        select_tasks(&self.conn, record_id)
    }

    fn insert_task(&self, task: &Task) -> StoreResult<()> {
        self.conn.execute(
            &format!("INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"),
            params![
                task.id.to_string(),
                task.intern_id.to_string(),
                task.record_id.map(|r| r.to_string()),
                task.description,
                task.remark,
                task.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn update_task(&self, task: &Task) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE tasks SET description = ?, remark = ? WHERE id = ?",
            params![task.description, task.remark, task.id.to_string()],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound(format!("task {}", task.id)));
        }
        Ok(())
    }

    fn insert_image(&self, image: &Image) -> StoreResult<()> {
        self.conn.execute(
            &format!("INSERT INTO images ({IMAGE_COLUMNS}) VALUES (?, ?, ?, ?, ?)"),
            params![
                image.id.to_string(),
                image.task_id.to_string(),
                image.handle,
                image.content_type,
                image.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn append_audit(&self, event: AuditEvent) -> StoreResult<()> {
        insert_audit(&self.conn, event)
    }

    fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteTx<'_> {
    fn drop(&mut self) {
        if !self.finished
            && let Err(e) = self.conn.execute_batch("ROLLBACK")
        {
            warn!(error = %e, "Failed to roll back transaction");
        }
    }
}

fn insert_audit(conn: &Connection, mut event: AuditEvent) -> StoreResult<()> {
    let event_json = serde_json::to_string(&event.event)?;

    conn.execute(
        "INSERT INTO audit_log (timestamp, event_json) VALUES (?, ?)",
        params![event.timestamp.to_rfc3339(), event_json],
    )?;

    event.id = conn.last_insert_rowid();
    debug!(event_id = event.id, "Audit event appended");

    Ok(())
}

fn select_intern(conn: &Connection, id: &InternId) -> StoreResult<Option<Intern>> {
    let intern = conn
        .query_row(
            &format!("SELECT {INTERN_COLUMNS} FROM interns WHERE id = ?"),
            [id.to_string()],
            intern_from_row,
        )
        .optional()?;
    Ok(intern)
}

fn select_record(conn: &Connection, id: &RecordId) -> StoreResult<Option<AttendanceRecord>> {
    let record = conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM records WHERE id = ?"),
            [id.to_string()],
            record_from_row,
        )
        .optional()?;
    Ok(record)
}

fn records_on(
    conn: &Connection,
    intern_id: &InternId,
    day: NaiveDate,
) -> StoreResult<Vec<AttendanceRecord>> {
    query_records(
        conn,
        "WHERE intern_id = ? AND day = ? ORDER BY time_in",
        params![intern_id.to_string(), format_day(day)],
    )
}

fn select_tasks(conn: &Connection, record_id: &RecordId) -> StoreResult<Vec<Task>> {
    query_tasks(
        conn,
        "WHERE record_id = ? ORDER BY created_at",
        params![record_id.to_string()],
    )
}

fn query_interns(conn: &Connection, filter: &str, params: impl Params) -> StoreResult<Vec<Intern>> {
    let mut stmt = conn.prepare(&format!("SELECT {INTERN_COLUMNS} FROM interns {filter}"))?;
    let interns = stmt
        .query_map(params, intern_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(interns)
}

fn query_records(
    conn: &Connection,
    filter: &str,
    params: impl Params,
) -> StoreResult<Vec<AttendanceRecord>> {
    let mut stmt = conn.prepare(&format!("SELECT {RECORD_COLUMNS} FROM records {filter}"))?;
    let records = stmt
        .query_map(params, record_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(records)
}

fn query_tasks(conn: &Connection, filter: &str, params: impl Params) -> StoreResult<Vec<Task>> {
    let mut stmt = conn.prepare(&format!("SELECT {TASK_COLUMNS} FROM tasks {filter}"))?;
    let tasks = stmt
        .query_map(params, task_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(tasks)
}

fn query_images(conn: &Connection, filter: &str, params: impl Params) -> StoreResult<Vec<Image>> {
    let mut stmt = conn.prepare(&format!("SELECT {IMAGE_COLUMNS} FROM images {filter}"))?;
    let images = stmt
        .query_map(params, image_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(images)
}

fn intern_from_row(row: &Row<'_>) -> rusqlite::Result<Intern> {
    Ok(Intern {
        id: parsed(row, 0)?,
        email: row.get(1)?,
        full_name: row.get(2)?,
        start_date: parsed(row, 3)?,
        quota: secs(row, 4)?,
        rendered: secs(row, 5)?,
        status: parsed(row, 6)?,
        status_locked: row.get(7)?,
        admin_remark: row.get(8)?,
        created_at: timestamp(row, 9)?,
    })
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<AttendanceRecord> {
    Ok(AttendanceRecord {
        id: parsed(row, 0)?,
        intern_id: parsed(row, 1)?,
        kind: parsed(row, 2)?,
        time_in: timestamp(row, 3)?,
        time_out: optional_timestamp(row, 4)?,
        status: parsed(row, 5)?,
        work_duration: secs(row, 6)?,
        admin_remark: row.get(7)?,
    })
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let record_id: Option<String> = row.get(2)?;
    Ok(Task {
        id: parsed(row, 0)?,
        intern_id: parsed(row, 1)?,
        record_id: record_id
            .map(|r| RecordId::from_str(&r).map_err(|e| conversion_error(2, e)))
            .transpose()?,
        description: row.get(3)?,
        remark: row.get(4)?,
        created_at: timestamp(row, 5)?,
    })
}

fn image_from_row(row: &Row<'_>) -> rusqlite::Result<Image> {
    Ok(Image {
        id: parsed(row, 0)?,
        task_id: parsed(row, 1)?,
        handle: row.get(2)?,
        content_type: row.get(3)?,
        created_at: timestamp(row, 4)?,
    })
}

fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let text: String = row.get(idx)?;
    text.parse().map_err(|e| conversion_error(idx, e))
}

fn timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Local>> {
    let text: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(|e| conversion_error(idx, e))
}

fn optional_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Local>>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| {
        DateTime::parse_from_rfc3339(&t)
            .map(|dt| dt.with_timezone(&Local))
            .map_err(|e| conversion_error(idx, e))
    })
    .transpose()
}

fn secs(row: &Row<'_>, idx: usize) -> rusqlite::Result<Duration> {
    let value: i64 = row.get(idx)?;
    u64::try_from(value)
        .map(Duration::from_secs)
        .map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

fn to_secs(d: Duration) -> i64 {
    i64::try_from(d.as_secs()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use attendo_api::{Evidence, InternStatus};
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, 3, h, m, 0).unwrap()
    }

    fn seed_intern(store: &SqliteStore) -> Intern {
        let intern = Intern::new(
            "ada@example.com",
            "Ada Intern",
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
            Duration::from_secs(8 * 3600),
            at(8, 0),
        );
        let tx = store.begin().unwrap();
        tx.insert_intern(&intern).unwrap();
        tx.commit().unwrap();
        intern
    }

    #[test]
    fn test_in_memory_store() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store.is_healthy());
    }

    #[test]
    fn test_audit_log() {
        let store = SqliteStore::in_memory().unwrap();

        let event = AuditEvent::new(AuditEventType::ServiceStarted);
        store.append_audit(event).unwrap();

        let events = store.get_recent_audits(10).unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].event, AuditEventType::ServiceStarted));
    }

    #[test]
    fn test_intern_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let mut intern = seed_intern(&store);

        assert_eq!(store.get_intern(&intern.id).unwrap(), Some(intern.clone()));

        intern.status = InternStatus::Dropped;
        intern.status_locked = true;
        let tx = store.begin().unwrap();
        tx.update_intern(&intern).unwrap();
        assert_eq!(
            tx.find_intern_by_email("ADA@example.com").unwrap().map(|i| i.id),
            Some(intern.id)
        );
        tx.commit().unwrap();

        let loaded = store.get_intern(&intern.id).unwrap().unwrap();
        assert_eq!(loaded.status, InternStatus::Dropped);
        assert!(loaded.status_locked);
    }

    #[test]
    fn test_email_is_unique() {
        let store = SqliteStore::in_memory().unwrap();
        let first = seed_intern(&store);

        let mut dup = first.clone();
        dup.id = InternId::new();
        let tx = store.begin().unwrap();
        assert!(tx.insert_intern(&dup).is_err());
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let store = SqliteStore::in_memory().unwrap();
        let intern = seed_intern(&store);

        {
            let tx = store.begin().unwrap();
            let record = AttendanceRecord::open(intern.id, RecordKind::Async, at(9, 0));
            tx.insert_record(&record).unwrap();
            assert!(tx.open_record(&intern.id).unwrap().is_some());
        }

        assert!(store.list_records(&intern.id, None).unwrap().is_empty());
        assert!(store.is_healthy());
    }

    #[test]
    fn test_schema_rejects_inconsistent_records() {
        let store = SqliteStore::in_memory().unwrap();
        let intern = seed_intern(&store);
        let tx = store.begin().unwrap();

        let mut open_with_time_out = AttendanceRecord::open(intern.id, RecordKind::Async, at(9, 0));
        open_with_time_out.time_out = Some(at(10, 0));
        assert!(tx.insert_record(&open_with_time_out).is_err());

        let mut credited_but_sent = AttendanceRecord::open(intern.id, RecordKind::Async, at(9, 0));
        credited_but_sent.status = RecordStatus::Sent;
        credited_but_sent.time_out = Some(at(10, 0));
        credited_but_sent.work_duration = Duration::from_secs(3600);
        assert!(tx.insert_record(&credited_but_sent).is_err());
    }

    #[test]
    fn test_sum_validated_counts_only_validated() {
        let store = SqliteStore::in_memory().unwrap();
        let intern = seed_intern(&store);
        let tx = store.begin().unwrap();

        let mut validated = AttendanceRecord::open(intern.id, RecordKind::Async, at(9, 0));
        validated.status = RecordStatus::Validated;
        validated.time_out = Some(at(12, 0));
        validated.work_duration = Duration::from_secs(3 * 3600);
        tx.insert_record(&validated).unwrap();

        let mut flagged = AttendanceRecord::open(intern.id, RecordKind::FaceToFace, at(13, 0));
        flagged.status = RecordStatus::Flagged;
        flagged.time_out = Some(at(17, 0));
        tx.insert_record(&flagged).unwrap();

        assert_eq!(tx.sum_validated(&intern.id).unwrap(), Duration::from_secs(3 * 3600));
    }

    #[test]
    fn test_ongoing_queries() {
        let store = SqliteStore::in_memory().unwrap();
        let intern = seed_intern(&store);
        let yesterday = Local.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap();

        let tx = store.begin().unwrap();
        let old = AttendanceRecord::open(intern.id, RecordKind::Async, yesterday);
        let today = AttendanceRecord::open(intern.id, RecordKind::FaceToFace, at(9, 0));
        tx.insert_record(&old).unwrap();
        tx.insert_record(&today).unwrap();
        tx.commit().unwrap();

        let day = at(9, 0).date_naive();
        let ongoing = store.ongoing_records(RecordKind::FaceToFace, day).unwrap();
        assert_eq!(ongoing.len(), 1);
        assert_eq!(ongoing[0].id, today.id);
        assert!(store.ongoing_records(RecordKind::Async, day).unwrap().is_empty());

        let overdue = store.ongoing_records_before(day).unwrap();
        assert_eq!(overdue.len(), 1);
        assert_eq!(overdue[0].id, old.id);
        assert_eq!(overdue[0].time_in, yesterday);
    }

    #[test]
    fn test_delete_intern_cascades() {
        let store = SqliteStore::in_memory().unwrap();
        let intern = seed_intern(&store);

        let tx = store.begin().unwrap();
        let record = AttendanceRecord::open(intern.id, RecordKind::FaceToFace, at(9, 0));
        tx.insert_record(&record).unwrap();
        let task = Task::for_record(&record, "Presence", at(9, 0));
        tx.insert_task(&task).unwrap();
        let evidence = Evidence {
            handle: "uploads/ada.jpg".into(),
            content_type: None,
        };
        tx.insert_image(&Image::attach(task.id, &evidence, at(9, 0))).unwrap();
        tx.commit().unwrap();

        assert_eq!(store.images_for_task(&task.id).unwrap().len(), 1);

        let tx = store.begin().unwrap();
        assert_eq!(tx.delete_intern(&intern.id).unwrap(), 1);
        tx.commit().unwrap();

        let snapshot = store.export(at(18, 0)).unwrap();
        assert!(snapshot.interns.is_empty());
        assert!(snapshot.records.is_empty());
        assert!(snapshot.tasks.is_empty());
        assert!(snapshot.images.is_empty());
    }

    #[test]
    fn test_on_disk_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attendod.db");

        let intern_id = {
            let store = SqliteStore::open(&path).unwrap();
            seed_intern(&store).id
        };

        let store = SqliteStore::open(&path).unwrap();
        assert!(store.get_intern(&intern_id).unwrap().is_some());
    }
}
