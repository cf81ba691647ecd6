use crate::ipc::error::{ok, respond, HandlerErr};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(app) = state.app.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };
    let data = app.data();

    // Counts let the shell show a dashboard without a second round trip.
    let classes: Vec<serde_json::Value> = data
        .classes
        .iter()
        .map(|c| {
            let students = data.students_in_class(&c.id);
            json!({
                "id": c.id,
                "name": c.name,
                "studentCount": students.len(),
                "activeCount": students.iter().filter(|s| s.status.is_active()).count(),
            })
        })
        .collect();
    ok(&req.id, json!({ "classes": classes }))
}

fn classes_create(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(params, "name")?;
    let class = state.app_mut()?.create_class(&name)?;
    Ok(json!({ "classId": class.id, "name": class.name }))
}

fn classes_rename(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let name = get_required_str(params, "name")?;
    let class = state.app_mut()?.rename_class(&class_id, &name)?;
    Ok(json!({ "classId": class.id, "name": class.name }))
}

fn classes_delete(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    let removed = state.app_mut()?.delete_class(&class_id)?;
    Ok(json!({ "ok": true, "studentsRemoved": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_classes_list(state, req)),
        "classes.create" => Some(respond(&req.id, classes_create(state, &req.params))),
        "classes.rename" => Some(respond(&req.id, classes_rename(state, &req.params))),
        "classes.delete" => Some(respond(&req.id, classes_delete(state, &req.params))),
        _ => None,
    }
}
