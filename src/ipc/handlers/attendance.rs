use crate::error::AppError;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_date, get_lesson_index, get_required_str, get_status, parse_month_key};
use crate::ipc::types::{AppState, FlushFinished, IpcEvent, Request};
use crate::pending::flush_batch;
use log::{info, warn};
use serde_json::json;
use std::thread;

fn attendance_month_open(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let (year, month) = parse_month_key(&get_required_str(params, "month")?)?;
    let grid = state.app()?.month_grid(&class_id, year, month)?;
    Ok(json!(grid))
}

fn attendance_toggle(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let date = get_date(params, "date")?;
    let lesson_index = get_lesson_index(params, "lessonIndex")?;
    let forced = get_status(params, "status")?;

    let app = state.app_mut()?;
    if app.data().student(&student_id).is_none() {
        return Err(AppError::not_found("student", student_id).into());
    }
    let change = app.toggle_attendance(&student_id, date, lesson_index, forced)?;
    let status = app.data().attendance.status_at(&student_id, date, lesson_index);
    Ok(json!({
        "status": status,
        "changed": change.is_some(),
        "pendingCount": app.data().pending.len(),
    }))
}

fn attendance_bulk_set(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date = get_date(params, "date")?;
    let lesson_index = get_lesson_index(params, "lessonIndex")?;
    let Some(target) = get_status(params, "status")? else {
        return Err(HandlerErr::bad_params("missing status"));
    };
    let student_ids: Vec<String> = match params.get("studentIds") {
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(|s| s.to_string())
                    .ok_or_else(|| HandlerErr::bad_params("studentIds must be strings"))
            })
            .collect::<Result<_, _>>()?,
        _ => return Err(HandlerErr::bad_params("missing studentIds")),
    };

    let app = state.app_mut()?;
    let updated = app.bulk_update(date, lesson_index, target, &student_ids)?;
    Ok(json!({
        "updated": updated,
        "pendingCount": app.data().pending.len(),
    }))
}

fn attendance_pending(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let pending = &state.app()?.data().pending;
    Ok(json!({
        "count": pending.len(),
        "changes": pending.entries(),
    }))
}

fn attendance_save(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let app = state.app_mut()?;
    let written = app.save_pending()?;
    Ok(json!({
        "written": written,
        "pendingCount": app.data().pending.len(),
    }))
}

/// Hands the queued batch to a worker thread. Returns `false` when the save
/// should run inline instead: no event channel, nothing queued, or no thread.
fn start_background_save(state: &mut AppState, request_id: &str) -> Result<bool, HandlerErr> {
    let Some(events) = state.events.clone() else {
        return Ok(false);
    };
    let app = state.app()?;
    state.ensure_no_flush()?;
    let Some(batch) = app.begin_flush() else {
        return Ok(false);
    };
    let gateway = app.gateway();
    let size = batch.len();
    let id = request_id.to_string();
    let spawned = thread::Builder::new()
        .name("attendance-flush".to_string())
        .spawn(move || {
            let outcome = flush_batch(gateway.as_ref(), &batch);
            let _ = events.send(IpcEvent::FlushFinished(FlushFinished {
                request_id: id,
                batch,
                outcome,
            }));
        });
    if let Err(e) = spawned {
        warn!(
            "event=attendance_flush module=ipc status=inline reason=spawn_failed error={}",
            e
        );
        return Ok(false);
    }
    state.flush_in_flight = Some(request_id.to_string());
    info!(
        "event=attendance_flush module=ipc status=started request_id={} batch={}",
        request_id, size
    );
    Ok(true)
}

/// `attendance.save`. `None` means the reply is sent when the worker reports
/// back through [`complete_flush`].
pub fn handle_save(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match start_background_save(state, &req.id) {
        Ok(true) => None,
        Ok(false) => Some(respond(&req.id, attendance_save(state))),
        Err(e) => Some(e.response(&req.id)),
    }
}

/// Settles a background save and builds the reply to its request.
pub fn complete_flush(state: &mut AppState, done: FlushFinished) -> serde_json::Value {
    state.flush_in_flight = None;
    let result = state.app_mut().and_then(|app| {
        let written = app.finish_flush(&done.batch, done.outcome)?;
        Ok(json!({
            "written": written,
            "pendingCount": app.data().pending.len(),
        }))
    });
    respond(&done.request_id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.monthOpen" => Some(respond(&req.id, attendance_month_open(state, &req.params))),
        "attendance.toggle" => Some(respond(&req.id, attendance_toggle(state, &req.params))),
        "attendance.bulkSet" => Some(respond(&req.id, attendance_bulk_set(state, &req.params))),
        "attendance.pending" => Some(respond(&req.id, attendance_pending(state))),
        _ => None,
    }
}
