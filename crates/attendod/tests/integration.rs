//! Integration tests for attendod
//!
//! End-to-end flows over an on-disk store: configuration, engine, sweeper.

use attendo_api::{
    Actor, AttendanceRecord, CheckInRequest, CheckOutRequest, CreateInternRequest, Evidence,
    FeedbackRequest, InternStatus, ReasonCode, RecordKind, RecordStatus, ReevaluateRequest,
    Verdict,
};
use attendo_config::{Policy, parse_config};
use attendo_core::{
    AUTO_TIMEOUT_REMARK, AttendanceEngine, AutoTimeoutSweeper, CoreError, NoopNotifier,
};
use attendo_store::{SqliteStore, Store};
use attendo_util::{FixedClock, InternId, database_path};
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(3600);

fn at(h: u32, m: u32) -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 3, 3, h, m, 0).unwrap()
}

fn hr() -> Actor {
    Actor::Evaluator {
        name: "hr-office".into(),
    }
}

fn photo() -> Evidence {
    Evidence {
        handle: "uploads/desk.jpg".into(),
        content_type: Some("image/jpeg".into()),
    }
}

fn open_engine(data_dir: &Path, policy: Policy) -> Arc<AttendanceEngine> {
    let store = SqliteStore::open(database_path(data_dir)).unwrap();
    Arc::new(AttendanceEngine::new(policy, Arc::new(store), Arc::new(NoopNotifier)))
}

fn enroll(engine: &AttendanceEngine, email: &str, quota: Duration) -> (Actor, InternId) {
    let intern = engine
        .create_intern(
            &hr(),
            &CreateInternRequest {
                email: email.into(),
                full_name: "Test Intern".into(),
                start_date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                quota,
            },
            at(7, 0),
        )
        .unwrap()
        .value;
    (
        Actor::Intern {
            intern_id: intern.id,
        },
        intern.id,
    )
}

fn face_to_face(evidence: Option<Evidence>) -> CheckInRequest {
    CheckInRequest {
        kind: RecordKind::FaceToFace,
        evidence,
        tasks: vec![],
    }
}

fn submit(
    engine: &AttendanceEngine,
    intern: &Actor,
    from: DateTime<Local>,
    to: DateTime<Local>,
) -> AttendanceRecord {
    let record = engine
        .check_in(intern, &face_to_face(Some(photo())), from)
        .unwrap()
        .value
        .record;
    engine
        .check_out(
            intern,
            &CheckOutRequest {
                record_id: record.id,
                task_updates: vec![],
                new_tasks: vec![],
                evidence: None,
            },
            to,
        )
        .unwrap()
        .value
}

fn assert_record_invariants(record: &AttendanceRecord) {
    assert_eq!(record.time_out.is_some(), record.status != RecordStatus::Ongoing);
    if let Some(elapsed) = record.elapsed() {
        assert!(record.work_duration <= elapsed);
    }
    if record.status != RecordStatus::Validated {
        assert_eq!(record.work_duration, Duration::ZERO);
    }
}

#[test]
fn eight_hour_day_passes_eight_hour_quota() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_engine(dir.path(), Policy::default());
    let (intern, intern_id) = enroll(&engine, "ada@example.com", 8 * HOUR);

    let record = submit(&engine, &intern, at(8, 30), at(16, 30));
    let evaluation = engine
        .give_feedback(
            &hr(),
            &FeedbackRequest {
                record_id: record.id,
                verdict: Verdict::Validate,
                remark: Some("good work".into()),
            },
            at(17, 30),
        )
        .unwrap()
        .value;

    assert_eq!(evaluation.intern.status, InternStatus::Passed);
    assert_eq!(evaluation.intern.rendered, 8 * HOUR);

    // Totals survive a restart
    drop(engine);
    let reopened = open_engine(dir.path(), Policy::default());
    let stored = reopened.get_intern(&hr(), &intern_id).unwrap();
    assert_eq!(stored.status, InternStatus::Passed);
    assert_eq!(stored.rendered, 8 * HOUR);
}

#[test]
fn check_in_before_window_leaves_no_record() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_engine(dir.path(), Policy::default());
    let (intern, intern_id) = enroll(&engine, "ada@example.com", 8 * HOUR);

    let result = engine.check_in(&intern, &face_to_face(Some(photo())), at(7, 59));
    match result {
        Err(CoreError::PolicyRejected { reasons }) => {
            assert!(matches!(reasons[..], [ReasonCode::OutsideTimeWindow { .. }]))
        }
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("check-in at 07:59 was accepted"),
    }

    assert!(engine.list_records(&intern, &intern_id, None).unwrap().is_empty());
}

#[test]
fn scheduled_sweep_flags_abandoned_record() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_engine(dir.path(), Policy::default());
    let (intern, intern_id) = enroll(&engine, "ada@example.com", 8 * HOUR);

    engine
        .check_in(&intern, &face_to_face(Some(photo())), at(9, 0))
        .unwrap();

    let clock = Arc::new(FixedClock::new(at(17, 5)));
    let sweeper = AutoTimeoutSweeper::new(engine.clone(), clock);
    let first = sweeper.on_tick(RecordKind::FaceToFace).unwrap().value;
    assert_eq!(first.closed.len(), 1);

    let records = engine.list_records(&intern, &intern_id, None).unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.status, RecordStatus::Flagged);
    assert_eq!(record.time_out, Some(at(17, 5)));
    assert_eq!(record.admin_remark.as_deref(), Some(AUTO_TIMEOUT_REMARK));
    assert_record_invariants(record);

    let second = sweeper.on_tick(RecordKind::FaceToFace).unwrap().value;
    assert!(second.closed.is_empty());
}

#[test]
fn partial_credit_after_flag() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_engine(dir.path(), Policy::default());
    let (intern, _) = enroll(&engine, "ada@example.com", 486 * HOUR);

    // A validated earlier day, so rendered starts above zero
    let earlier = Local.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap();
    let first = submit(&engine, &intern, earlier, earlier + chrono::Duration::hours(2));
    let before = engine
        .give_feedback(
            &hr(),
            &FeedbackRequest {
                record_id: first.id,
                verdict: Verdict::Validate,
                remark: None,
            },
            at(8, 0),
        )
        .unwrap()
        .value
        .intern
        .rendered;
    assert_eq!(before, 2 * HOUR);

    let record = submit(&engine, &intern, at(9, 0), at(13, 0));
    engine
        .give_feedback(
            &hr(),
            &FeedbackRequest {
                record_id: record.id,
                verdict: Verdict::Flag,
                remark: Some("left early without notice".into()),
            },
            at(14, 0),
        )
        .unwrap();

    let over = engine.reevaluate(
        &hr(),
        &ReevaluateRequest {
            record_id: record.id,
            hours: 4.0 + 1.0 / 3600.0,
            remark: None,
        },
        at(15, 0),
    );
    assert!(matches!(over, Err(CoreError::ValidationFailed(_))));

    let evaluation = engine
        .reevaluate(
            &hr(),
            &ReevaluateRequest {
                record_id: record.id,
                hours: 3.0,
                remark: Some("three hours confirmed".into()),
            },
            at(15, 0),
        )
        .unwrap()
        .value;

    assert_eq!(evaluation.record.status, RecordStatus::Validated);
    assert_eq!(evaluation.record.work_duration, 3 * HOUR);
    assert_eq!(evaluation.intern.rendered, before + 3 * HOUR);
    assert_record_invariants(&evaluation.record);
}

#[test]
fn rendered_matches_validated_sum() {
    let dir = tempfile::tempdir().unwrap();
    let engine = open_engine(dir.path(), Policy::default());
    let (intern, intern_id) = enroll(&engine, "ada@example.com", 20 * HOUR);

    for day in 3..=6 {
        let from = Local.with_ymd_and_hms(2025, 3, day, 9, 0, 0).unwrap();
        let to = Local.with_ymd_and_hms(2025, 3, day, 9 + day, 0, 0).unwrap();
        let record = submit(&engine, &intern, from, to);
        let verdict = if day % 2 == 0 { Verdict::Flag } else { Verdict::Validate };
        engine
            .give_feedback(
                &hr(),
                &FeedbackRequest {
                    record_id: record.id,
                    verdict,
                    remark: Some("reviewed".into()),
                },
                to,
            )
            .unwrap();
    }

    let records = engine.list_records(&hr(), &intern_id, None).unwrap();
    let expected: Duration = records
        .iter()
        .filter(|r| r.status == RecordStatus::Validated)
        .map(|r| r.work_duration)
        .sum();
    records.iter().for_each(assert_record_invariants);

    let stored = engine.get_intern(&intern, &intern_id).unwrap();
    assert_eq!(stored.rendered, expected);
    assert_eq!(expected, 3 * HOUR + 5 * HOUR);
    assert_eq!(stored.status, InternStatus::Ongoing);
}

#[test]
fn configured_evidence_at_check_out() {
    let policy = parse_config(
        r#"
config_version = 1

[schedule.face_to_face]
start = "07:30"
end = "16:00"
sweep_at = "16:30"
evidence = "check_out"
"#,
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let engine = open_engine(dir.path(), policy);
    let (intern, _) = enroll(&engine, "ada@example.com", 8 * HOUR);

    // 07:45 is inside the configured window; the photo belongs to check-out
    let with_photo = engine.check_in(&intern, &face_to_face(Some(photo())), at(7, 45));
    assert!(matches!(with_photo, Err(CoreError::ValidationFailed(_))));

    let record = engine
        .check_in(&intern, &face_to_face(None), at(7, 45))
        .unwrap()
        .value
        .record;

    let mut check_out = CheckOutRequest {
        record_id: record.id,
        task_updates: vec![],
        new_tasks: vec![],
        evidence: None,
    };
    assert!(matches!(
        engine.check_out(&intern, &check_out, at(15, 0)),
        Err(CoreError::ValidationFailed(_))
    ));

    check_out.evidence = Some(photo());
    let sent = engine.check_out(&intern, &check_out, at(15, 0)).unwrap().value;
    assert_eq!(sent.status, RecordStatus::Sent);

    let tasks = engine.store().tasks_for_record(&sent.id).unwrap();
    assert_eq!(engine.store().images_for_task(&tasks[0].id).unwrap().len(), 1);
}

#[test]
fn catch_up_after_downtime() {
    let dir = tempfile::tempdir().unwrap();
    let yesterday = Local.with_ymd_and_hms(2025, 3, 2, 10, 0, 0).unwrap();

    let record_id = {
        let engine = open_engine(dir.path(), Policy::default());
        let (intern, _) = enroll(&engine, "ada@example.com", 8 * HOUR);
        engine
            .check_in(
                &intern,
                &CheckInRequest {
                    kind: RecordKind::Async,
                    evidence: None,
                    tasks: vec!["api docs".into()],
                },
                yesterday,
            )
            .unwrap()
            .value
            .record
            .id
    };

    // Service restarts the next morning
    let engine = open_engine(dir.path(), Policy::default());
    let sweeper = AutoTimeoutSweeper::new(engine.clone(), Arc::new(FixedClock::new(at(7, 0))));
    let report = sweeper.catch_up().unwrap().value;
    assert_eq!(report.closed, vec![record_id]);

    let record = engine.store().get_record(&record_id).unwrap().unwrap();
    assert_eq!(record.status, RecordStatus::Flagged);
    assert_eq!(
        record.time_out,
        Some(Local.with_ymd_and_hms(2025, 3, 2, 19, 0, 0).unwrap())
    );
    assert_record_invariants(&record);
}
