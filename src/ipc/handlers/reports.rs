use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};
use crate::summary::{build_prompt, SummaryError};
use log::warn;
use serde_json::json;

fn reports_student_stats(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let stats = state.app()?.student_stats(&student_id)?;
    Ok(json!(stats))
}

fn reports_class_stats(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let stats = state.app()?.class_stats(&class_id)?;
    Ok(json!(stats))
}

fn reports_student_summary(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let report = state.app()?.student_report(&student_id)?;
    let Some(summarizer) = state.summarizer.as_ref() else {
        return Err(HandlerErr::new(
            "summary_unavailable",
            "no summary service configured",
        ));
    };

    let prompt = build_prompt(&report);
    let text = summarizer.summarize(&prompt).map_err(|e| {
        warn!(
            "event=student_summary module=reports status=failed error={}",
            e
        );
        let details = match &e {
            SummaryError::Call { kind, status } => json!({ "kind": kind, "status": status }),
            SummaryError::Empty => json!({ "kind": "empty" }),
        };
        HandlerErr::new("summary_failed", e.to_string()).with_details(details)
    })?;

    Ok(json!({
        "studentId": report.student.id,
        "summary": text,
        "report": report,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.studentStats" => Some(respond(&req.id, reports_student_stats(state, &req.params))),
        "reports.classStats" => Some(respond(&req.id, reports_class_stats(state, &req.params))),
        "reports.studentSummary" => {
            Some(respond(&req.id, reports_student_summary(state, &req.params)))
        }
        _ => None,
    }
}
