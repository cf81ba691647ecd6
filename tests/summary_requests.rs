use attendanced::config::AppConfig;
use attendanced::gateway::SqliteGateway;
use attendanced::ipc::{handle_request, AppState, Request};
use attendanced::summary::{SummaryError, TextSummarizer};
use serde_json::json;
use std::sync::{Arc, Mutex};

struct CannedSummarizer {
    reply: Option<String>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl TextSummarizer for CannedSummarizer {
    fn summarize(&self, prompt: &str) -> Result<String, SummaryError> {
        self.prompts.lock().expect("lock").push(prompt.to_string());
        self.reply.clone().ok_or(SummaryError::Call {
            kind: "http_non_200",
            status: Some(502),
        })
    }
}

fn call(state: &mut AppState, id: &str, method: &str, params: serde_json::Value) -> serde_json::Value {
    handle_request(
        state,
        Request {
            id: id.to_string(),
            method: method.to_string(),
            params,
        },
    )
    .expect("immediate reply")
}

fn state_with_student(dir: &std::path::Path) -> (AppState, String) {
    let mut state = AppState::new(AppConfig::default());
    let gateway = SqliteGateway::open(dir).expect("open gateway");
    state
        .attach(Arc::new(gateway), dir.to_string_lossy().to_string())
        .expect("attach");
    let class = call(&mut state, "1", "classes.create", json!({ "name": "7A" }));
    let class_id = class["result"]["classId"].as_str().expect("classId").to_string();
    let student = call(
        &mut state,
        "2",
        "students.create",
        json!({ "classId": class_id, "name": "Ana" }),
    );
    let student_id = student["result"]["studentId"]
        .as_str()
        .expect("studentId")
        .to_string();
    call(
        &mut state,
        "3",
        "attendance.toggle",
        json!({ "studentId": student_id, "date": "2024-03-05", "lessonIndex": 0, "status": "ABSENT" }),
    );
    (state, student_id)
}

#[test]
fn summary_without_service_is_unavailable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut state, student_id) = state_with_student(dir.path());
    let resp = call(
        &mut state,
        "4",
        "reports.studentSummary",
        json!({ "studentId": student_id }),
    );
    assert_eq!(resp["error"]["code"], "summary_unavailable");
}

#[test]
fn summary_text_is_returned_with_the_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut state, student_id) = state_with_student(dir.path());
    let prompts = Arc::new(Mutex::new(Vec::new()));
    state.summarizer = Some(Box::new(CannedSummarizer {
        reply: Some("Ana missed one lesson in March.".to_string()),
        prompts: prompts.clone(),
    }));

    let resp = call(
        &mut state,
        "4",
        "reports.studentSummary",
        json!({ "studentId": student_id }),
    );
    assert_eq!(resp["ok"], true, "{}", resp);
    assert_eq!(resp["result"]["summary"], "Ana missed one lesson in March.");
    assert_eq!(resp["result"]["report"]["absences"][0]["date"], "2024-03-05");

    let sent = prompts.lock().expect("lock").clone();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].contains("Student: Ana"));
    assert!(sent[0].contains("Absences: 2024-03-05"));
}

#[test]
fn summary_service_failure_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let (mut state, student_id) = state_with_student(dir.path());
    state.summarizer = Some(Box::new(CannedSummarizer {
        reply: None,
        prompts: Arc::new(Mutex::new(Vec::new())),
    }));

    let resp = call(
        &mut state,
        "4",
        "reports.studentSummary",
        json!({ "studentId": student_id }),
    );
    assert_eq!(resp["error"]["code"], "summary_failed");
    assert_eq!(resp["error"]["details"]["status"], 502);
}
