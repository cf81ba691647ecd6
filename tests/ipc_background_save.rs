use attendanced::config::AppConfig;
use attendanced::gateway::SqliteGateway;
use attendanced::ipc::{complete_flush, handle_request, AppState, IpcEvent, Request};
use serde_json::json;
use std::sync::{mpsc, Arc};
use std::time::Duration;

fn call(state: &mut AppState, id: &str, method: &str, params: serde_json::Value) -> Option<serde_json::Value> {
    handle_request(
        state,
        Request {
            id: id.to_string(),
            method: method.to_string(),
            params,
        },
    )
}

fn call_now(state: &mut AppState, id: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
    call(state, id, method, params).expect("immediate reply")
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

fn attached_state(dir: &std::path::Path) -> (AppState, String) {
    let mut state = AppState::new(AppConfig::default());
    let gateway = SqliteGateway::open(dir).expect("open gateway");
    state
        .attach(Arc::new(gateway), dir.to_string_lossy().to_string())
        .expect("attach");
    let class = call_now(&mut state, "1", "classes.create", json!({ "name": "7A" }));
    let class_id = class["result"]["classId"].as_str().expect("classId").to_string();
    let student = call_now(
        &mut state,
        "2",
        "students.create",
        json!({ "classId": class_id, "name": "Ana" }),
    );
    let student_id = student["result"]["studentId"]
        .as_str()
        .expect("studentId")
        .to_string();
    (state, student_id)
}

#[test]
fn save_replies_later_and_keeps_edits_made_meanwhile() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut state, student_id) = attached_state(dir.path());
    let (tx, rx) = mpsc::channel();
    state.events = Some(tx);
    let cell = json!({ "studentId": student_id, "date": "2024-03-05", "lessonIndex": 0 });

    let first = call_now(&mut state, "3", "attendance.toggle", cell.clone());
    assert_eq!(first["result"]["status"], "PRESENT");

    assert!(call(&mut state, "save-1", "attendance.save", json!({})).is_none());
    assert_eq!(state.flush_in_flight.as_deref(), Some("save-1"));

    // The loop keeps answering while the batch is written.
    let second = call_now(&mut state, "4", "attendance.toggle", cell);
    assert_eq!(second["result"]["status"], "ABSENT");
    assert_eq!(second["result"]["pendingCount"], 1);

    let again = call_now(&mut state, "5", "attendance.save", json!({}));
    assert_eq!(error_code(&again), Some("flush_in_progress"));
    let reload = call_now(&mut state, "6", "data.reload", json!({}));
    assert_eq!(error_code(&reload), Some("flush_in_progress"));

    let done = match rx.recv_timeout(Duration::from_secs(5)).expect("flush event") {
        IpcEvent::FlushFinished(done) => done,
        other => panic!("unexpected event: {other:?}"),
    };
    let resp = complete_flush(&mut state, done);
    assert_eq!(resp["id"], "save-1");
    assert_eq!(resp["ok"], true, "{}", resp);
    assert_eq!(resp["result"]["written"], 1);
    assert_eq!(resp["result"]["pendingCount"], 1);
    assert!(state.flush_in_flight.is_none());

    let pending = call_now(&mut state, "7", "attendance.pending", json!({}));
    assert_eq!(pending["result"]["changes"][0]["status"], "ABSENT");
}

#[test]
fn save_with_nothing_queued_answers_at_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut state, _student_id) = attached_state(dir.path());
    let (tx, _rx) = mpsc::channel();
    state.events = Some(tx);

    let resp = call_now(&mut state, "3", "attendance.save", json!({}));
    assert_eq!(resp["result"]["written"], 0);
    assert!(state.flush_in_flight.is_none());
}

#[test]
fn oversized_lesson_params_are_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut state, student_id) = attached_state(dir.path());

    let toggle = call_now(
        &mut state,
        "3",
        "attendance.toggle",
        json!({ "studentId": student_id, "date": "2024-03-05", "lessonIndex": 4294967295u64 }),
    );
    assert_eq!(error_code(&toggle), Some("bad_params"));

    let bulk = call_now(
        &mut state,
        "4",
        "attendance.bulkSet",
        json!({ "date": "2024-03-05", "lessonIndex": 32, "status": "ABSENT", "studentIds": [student_id] }),
    );
    assert_eq!(error_code(&bulk), Some("bad_params"));

    let count = call_now(
        &mut state,
        "5",
        "lessons.setSlots",
        json!({ "date": "2024-03-05", "slots": 4000000000u64 }),
    );
    assert_eq!(error_code(&count), Some("bad_params"));

    let indices = call_now(
        &mut state,
        "6",
        "lessons.setSlots",
        json!({ "date": "2024-03-05", "slots": [0, 4294967295u64] }),
    );
    assert_eq!(error_code(&indices), Some("bad_params"));

    let topic = call_now(
        &mut state,
        "7",
        "lessons.setTopic",
        json!({ "date": "2024-03-05", "lessonIndex": 99, "topic": "Fractions" }),
    );
    assert_eq!(error_code(&topic), Some("bad_params"));

    let pending = call_now(&mut state, "8", "attendance.pending", json!({}));
    assert_eq!(pending["result"]["count"], 0);
    let day = call_now(&mut state, "9", "lessons.get", json!({ "date": "2024-03-05" }));
    assert_eq!(day["result"]["configured"], false);
}
