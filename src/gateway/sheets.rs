//! Spreadsheet-backed web-app endpoint.
//!
//! Reads are `GET <endpoint>?action=loadAll`; writes are `POST <endpoint>` with a
//! JSON body `{ "action": ..., "payload": ... }`. Every answer is wrapped in an
//! envelope `{ "status": "success" | "error", "data"?: ..., "message"?: ... }`.

use super::{GatewayError, PersistenceGateway};
use crate::model::{BimesterConfig, ClassGroup, PartialSnapshot, PendingChange, Snapshot, Student};
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct SheetsOptions {
    pub timeout_ms: u32,
    pub user_agent: String,
}

impl Default for SheetsOptions {
    fn default() -> Self {
        SheetsOptions {
            timeout_ms: 15_000,
            user_agent: format!("attendanced/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

pub struct SheetsGateway {
    endpoint: String,
    agent: ureq::Agent,
}

impl SheetsGateway {
    pub fn new(endpoint: &str, options: &SheetsOptions) -> Result<Self, GatewayError> {
        let endpoint = endpoint.trim();
        if !(endpoint.starts_with("https://") || endpoint.starts_with("http://")) {
            return Err(GatewayError::Rejected(
                "endpoint must be an http(s) url".to_string(),
            ));
        }
        if options.timeout_ms == 0 {
            return Err(GatewayError::Rejected("timeout must be > 0".to_string()));
        }
        let timeout = Duration::from_millis(u64::from(options.timeout_ms).max(100));
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .user_agent(&options.user_agent)
            .build();
        Ok(SheetsGateway {
            endpoint: endpoint.to_string(),
            agent,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn post(&self, action: &str, payload: Value) -> Result<Value, GatewayError> {
        let response = self
            .agent
            .post(&self.endpoint)
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
            .send_json(action_body(action, payload))
            .map_err(error_from_ureq)?;
        let body: Value = serde_json::from_reader(response.into_reader())
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        unwrap_envelope(body)
    }
}

pub(crate) fn action_body(action: &str, payload: Value) -> Value {
    json!({ "action": action, "payload": payload })
}

pub(crate) fn unwrap_envelope(body: Value) -> Result<Value, GatewayError> {
    match body.get("status").and_then(|v| v.as_str()) {
        Some("success") => Ok(body.get("data").cloned().unwrap_or(Value::Null)),
        Some("error") => Err(GatewayError::Rejected(
            body.get("message")
                .and_then(|v| v.as_str())
                .unwrap_or("unspecified error")
                .to_string(),
        )),
        _ => Err(GatewayError::Decode(
            "response envelope has no status".to_string(),
        )),
    }
}

fn error_from_ureq(err: ureq::Error) -> GatewayError {
    match err {
        ureq::Error::Status(status, _) => GatewayError::Status(status),
        ureq::Error::Transport(transport) => {
            let combined = format!("{:?} {}", transport.kind(), transport);
            GatewayError::Transport {
                kind: classify_transport_error_kind(&combined),
                detail: transport.to_string(),
            }
        }
    }
}

fn classify_transport_error_kind(raw: &str) -> &'static str {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") || lower.contains("timed out") {
        "timeout"
    } else if lower.contains("tls") || lower.contains("ssl") {
        "tls"
    } else if lower.contains("dns") {
        "dns"
    } else if lower.contains("connection") || lower.contains("connect") {
        "connection"
    } else {
        "transport"
    }
}

impl PersistenceGateway for SheetsGateway {
    fn kind(&self) -> &'static str {
        "sheets"
    }

    fn load_all(&self) -> Result<Snapshot, GatewayError> {
        let response = self
            .agent
            .get(&self.endpoint)
            .query("action", "loadAll")
            .set("Accept", "application/json")
            .call()
            .map_err(error_from_ureq)?;
        let body: Value = serde_json::from_reader(response.into_reader())
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        let data = unwrap_envelope(body)?;
        serde_json::from_value(data).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    fn save_attendance_cell(&self, change: &PendingChange) -> Result<(), GatewayError> {
        self.post("saveAttendance", json!(change)).map(|_| ())
    }

    fn save_config(&self, key: &str, value: &Value) -> Result<(), GatewayError> {
        self.post("saveConfig", json!({ "key": key, "value": value }))
            .map(|_| ())
    }

    fn save_class(&self, class: &ClassGroup) -> Result<(), GatewayError> {
        self.post("saveClass", json!(class)).map(|_| ())
    }

    fn save_student(&self, student: &Student) -> Result<(), GatewayError> {
        self.post("saveStudent", json!(student)).map(|_| ())
    }

    fn save_bimesters(&self, bimesters: &[BimesterConfig]) -> Result<(), GatewayError> {
        self.post("saveBimesters", json!(bimesters)).map(|_| ())
    }

    fn delete_class(&self, class_id: &str) -> Result<(), GatewayError> {
        self.post("deleteClass", json!({ "id": class_id })).map(|_| ())
    }

    fn delete_student(&self, student_id: &str) -> Result<(), GatewayError> {
        self.post("deleteStudent", json!({ "id": student_id }))
            .map(|_| ())
    }

    fn sync_all(&self, snapshot: &PartialSnapshot) -> Result<(), GatewayError> {
        self.post("syncAll", json!(snapshot)).map(|_| ())
    }
}
