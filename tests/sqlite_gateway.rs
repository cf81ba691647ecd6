use attendanced::gateway::{GatewayError, PersistenceGateway, SqliteGateway};
use attendanced::model::{
    AttendanceStatus, BimesterConfig, ClassGroup, EnrollmentStatus, PartialSnapshot,
    PendingChange, Student,
};
use chrono::NaiveDate;
use serde_json::json;

fn d(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").expect("date")
}

fn class(id: &str, name: &str) -> ClassGroup {
    ClassGroup {
        id: id.to_string(),
        name: name.to_string(),
    }
}

fn student(id: &str, class_id: &str) -> Student {
    Student {
        id: id.to_string(),
        name: format!("Student {}", id),
        class_id: class_id.to_string(),
        status: EnrollmentStatus::Active,
    }
}

fn cell(student_id: &str, date: &str, lesson_index: u32, status: AttendanceStatus) -> PendingChange {
    PendingChange {
        student_id: student_id.to_string(),
        date: d(date),
        lesson_index,
        status,
        subject: String::new(),
        topic: String::new(),
    }
}

#[test]
fn written_rows_come_back_from_load_all() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gw = SqliteGateway::open(dir.path()).expect("open gateway");
    assert!(gw.db_path().exists());

    gw.save_class(&class("c1", "7A")).expect("save class");
    gw.save_student(&student("s1", "c1")).expect("save student");
    gw.save_bimesters(&[BimesterConfig {
        id: "b1".to_string(),
        name: "1st".to_string(),
        start: d("2024-02-01"),
        end: d("2024-04-15"),
    }])
    .expect("save bimesters");
    gw.save_attendance_cell(&cell("s1", "2024-03-05", 1, AttendanceStatus::Excused))
        .expect("save cell");
    gw.save_config("lessonConfig", &json!({ "2024-03-05": [0, 1] }))
        .expect("save config");

    let snap = gw.load_all().expect("load all");
    assert_eq!(snap.classes, vec![class("c1", "7A")]);
    assert_eq!(snap.students.len(), 1);
    assert_eq!(snap.bimesters.len(), 1);
    assert_eq!(
        snap.attendance["s1"][&d("2024-03-05")],
        vec![AttendanceStatus::Undefined, AttendanceStatus::Excused]
    );
    assert_eq!(snap.config["lessonConfig"], json!({ "2024-03-05": [0, 1] }));
}

#[test]
fn rewriting_a_cell_replaces_its_status() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gw = SqliteGateway::open(dir.path()).expect("open gateway");
    gw.save_attendance_cell(&cell("s1", "2024-03-05", 0, AttendanceStatus::Present))
        .expect("first write");
    gw.save_attendance_cell(&cell("s1", "2024-03-05", 0, AttendanceStatus::Absent))
        .expect("second write");

    let snap = gw.load_all().expect("load all");
    assert_eq!(
        snap.attendance["s1"][&d("2024-03-05")],
        vec![AttendanceStatus::Absent]
    );
}

#[test]
fn student_for_missing_class_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gw = SqliteGateway::open(dir.path()).expect("open gateway");
    match gw.save_student(&student("s1", "nope")) {
        Err(GatewayError::Rejected(_)) => {}
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[test]
fn deleting_a_class_removes_its_students_and_cells() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gw = SqliteGateway::open(dir.path()).expect("open gateway");
    gw.save_class(&class("c1", "7A")).expect("class c1");
    gw.save_class(&class("c2", "8B")).expect("class c2");
    gw.save_student(&student("s1", "c1")).expect("s1");
    gw.save_student(&student("s2", "c2")).expect("s2");
    gw.save_attendance_cell(&cell("s1", "2024-03-05", 0, AttendanceStatus::Present))
        .expect("cell s1");
    gw.save_attendance_cell(&cell("s2", "2024-03-05", 0, AttendanceStatus::Absent))
        .expect("cell s2");

    gw.delete_class("c1").expect("delete class");
    let snap = gw.load_all().expect("load all");
    assert_eq!(snap.classes, vec![class("c2", "8B")]);
    assert_eq!(snap.students.len(), 1);
    assert!(!snap.attendance.contains_key("s1"));
    assert!(snap.attendance.contains_key("s2"));

    assert!(matches!(
        gw.delete_class("c1"),
        Err(GatewayError::Rejected(_))
    ));
}

#[test]
fn sync_all_replaces_only_the_sections_it_carries() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gw = SqliteGateway::open(dir.path()).expect("open gateway");
    gw.save_class(&class("c1", "7A")).expect("class");
    gw.save_student(&student("s1", "c1")).expect("student");
    gw.save_attendance_cell(&cell("s1", "2024-03-05", 0, AttendanceStatus::Present))
        .expect("cell");

    gw.sync_all(&PartialSnapshot {
        classes: Some(vec![class("c1", "7A"), class("c9", "9Z")]),
        ..PartialSnapshot::default()
    })
    .expect("sync classes");

    let snap = gw.load_all().expect("load all");
    assert_eq!(snap.classes.len(), 2);
    assert_eq!(snap.students.len(), 1);
    assert_eq!(
        snap.attendance["s1"][&d("2024-03-05")],
        vec![AttendanceStatus::Present]
    );
}

#[test]
fn sync_all_attendance_keeps_lesson_notes_and_drops_missing_cells() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gw = SqliteGateway::open(dir.path()).expect("open gateway");
    let mut noted = cell("s1", "2024-03-05", 0, AttendanceStatus::Present);
    noted.subject = "Math".to_string();
    noted.topic = "Fractions".to_string();
    gw.save_attendance_cell(&noted).expect("noted cell");
    gw.save_attendance_cell(&cell("s2", "2024-03-05", 0, AttendanceStatus::Absent))
        .expect("second cell");

    let mut attendance = std::collections::HashMap::new();
    attendance.insert(
        "s1".to_string(),
        std::collections::BTreeMap::from([(d("2024-03-05"), vec![AttendanceStatus::Excused])]),
    );
    gw.sync_all(&PartialSnapshot {
        attendance: Some(attendance),
        ..PartialSnapshot::default()
    })
    .expect("sync attendance");

    let conn = rusqlite::Connection::open(gw.db_path()).expect("open db");
    let (status, subject, topic): (String, String, String) = conn
        .query_row(
            "SELECT status, subject, topic FROM attendance_cells
             WHERE student_id = 's1' AND date = '2024-03-05' AND lesson_index = 0",
            [],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .expect("s1 cell");
    assert_eq!(status, AttendanceStatus::Excused.as_str());
    assert_eq!(subject, "Math");
    assert_eq!(topic, "Fractions");

    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM attendance_cells", [], |r| r.get(0))
        .expect("count");
    assert_eq!(remaining, 1);
}

#[test]
fn out_of_range_lesson_rows_are_skipped_on_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gw = SqliteGateway::open(dir.path()).expect("open gateway");
    gw.save_attendance_cell(&cell("s1", "2024-03-05", 1, AttendanceStatus::Absent))
        .expect("cell");
    let conn = rusqlite::Connection::open(gw.db_path()).expect("open db");
    conn.execute(
        "INSERT INTO attendance_cells(student_id, date, lesson_index, status, subject, topic, updated_at)
         VALUES('s1', '2024-03-05', 4000000000, 'PRESENT', '', '', '')",
        [],
    )
    .expect("insert oversized row");

    let snap = gw.load_all().expect("load all");
    assert_eq!(
        snap.attendance["s1"][&d("2024-03-05")],
        vec![AttendanceStatus::Undefined, AttendanceStatus::Absent]
    );
}
