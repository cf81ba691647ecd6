use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_attendanced");
    let mut child = Command::new(exe)
        .env_remove("ATTENDANCED_WORKSPACE")
        .env_remove("ATTENDANCED_ENDPOINT")
        .env_remove("ATTENDANCED_SUMMARY_ENDPOINT")
        .env_remove("ATTENDANCED_SUMMARY_API_KEY")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn attendanced");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn send_line(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, line: &str) -> serde_json::Value {
    writeln!(stdin, "{}", line).expect("write request");
    stdin.flush().expect("flush request");
    let mut out = String::new();
    reader.read_line(&mut out).expect("read response line");
    serde_json::from_str(out.trim()).expect("parse response json")
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    let value = send_line(stdin, reader, &payload.to_string());
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

#[test]
fn data_requests_without_a_source_ask_for_setup() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["ok"], true);
    assert_eq!(health["result"]["loaded"], false);
    assert_eq!(health["result"]["summaryAvailable"], false);

    for (i, method) in ["snapshot.get", "attendance.save", "bimesters.list", "data.reload"]
        .iter()
        .enumerate()
    {
        let resp = request(&mut stdin, &mut reader, &format!("m{}", i), method, json!({}));
        assert_eq!(resp["ok"], false, "{} should fail", method);
        assert_eq!(error_code(&resp), Some("configuration_missing"), "{}", method);
    }

    let listed = request(&mut stdin, &mut reader, "2", "classes.list", json!({}));
    assert_eq!(listed["result"]["classes"], json!([]));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn malformed_lines_and_unknown_methods_get_error_responses() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let garbage = send_line(&mut stdin, &mut reader, "{not json");
    assert_eq!(error_code(&garbage), Some("bad_json"));

    let no_method = send_line(&mut stdin, &mut reader, r#"{"id":"x1"}"#);
    assert_eq!(error_code(&no_method), Some("bad_json"));
    assert_eq!(no_method["id"], "x1");

    let unknown = request(&mut stdin, &mut reader, "3", "grades.compute", json!({}));
    assert_eq!(error_code(&unknown), Some("not_implemented"));

    // The loop keeps serving after errors.
    let health = request(&mut stdin, &mut reader, "4", "health", json!({}));
    assert_eq!(health["ok"], true);

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn invalid_params_are_reported_before_touching_state() {
    let workspace = tempfile::tempdir().expect("tempdir");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let selected = request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    assert_eq!(selected["ok"], true);

    let bad_status = request(
        &mut stdin,
        &mut reader,
        "2",
        "attendance.bulkSet",
        json!({ "date": "2024-03-05", "lessonIndex": 0, "status": "LATE", "studentIds": [] }),
    );
    assert_eq!(error_code(&bad_status), Some("bad_params"));

    let bad_date = request(
        &mut stdin,
        &mut reader,
        "3",
        "lessons.get",
        json!({ "date": "05/03/2024" }),
    );
    assert_eq!(error_code(&bad_date), Some("bad_params"));

    let bad_month = request(
        &mut stdin,
        &mut reader,
        "4",
        "attendance.monthOpen",
        json!({ "classId": "c1", "month": "2024-13" }),
    );
    assert_eq!(error_code(&bad_month), Some("bad_params"));

    let blank_class = request(&mut stdin, &mut reader, "5", "classes.create", json!({ "name": "  " }));
    assert_eq!(error_code(&blank_class), Some("bad_params"));

    let no_summary = request(
        &mut stdin,
        &mut reader,
        "6",
        "reports.studentSummary",
        json!({ "studentId": "missing" }),
    );
    assert_eq!(error_code(&no_summary), Some("not_found"));

    let pending = request(&mut stdin, &mut reader, "7", "attendance.pending", json!({}));
    assert_eq!(pending["result"]["count"], 0);

    drop(stdin);
    let _ = child.wait();
}
