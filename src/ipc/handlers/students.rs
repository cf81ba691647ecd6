use crate::app::StudentPatch;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_enrollment, get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::error::AppError;
use serde_json::json;

fn students_list(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let data = state.app()?.data();
    if data.class(&class_id).is_none() {
        return Err(AppError::not_found("class", class_id).into());
    }
    Ok(json!({ "students": data.students_in_class(&class_id) }))
}

fn students_create(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let name = get_required_str(params, "name")?;
    let status = get_enrollment(params, "status")?.unwrap_or_default();
    let student = state.app_mut()?.create_student(&class_id, &name, status)?;
    Ok(json!({ "studentId": student.id, "student": student }))
}

fn students_update(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    let patch = StudentPatch {
        name: get_optional_str(params, "name"),
        class_id: get_optional_str(params, "classId"),
        status: get_enrollment(params, "status")?,
    };
    let student = state.app_mut()?.update_student(&student_id, patch)?;
    Ok(json!({ "student": student }))
}

fn students_delete(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(params, "studentId")?;
    state.app_mut()?.delete_student(&student_id)?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(respond(&req.id, students_list(state, &req.params))),
        "students.create" => Some(respond(&req.id, students_create(state, &req.params))),
        "students.update" => Some(respond(&req.id, students_update(state, &req.params))),
        "students.delete" => Some(respond(&req.id, students_delete(state, &req.params))),
        _ => None,
    }
}
