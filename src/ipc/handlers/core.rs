use crate::gateway::{SheetsGateway, SqliteGateway};
use crate::ipc::error::{ok, respond, HandlerErr};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "source": state.source,
            "gateway": state.app.as_ref().map(|a| a.gateway_kind()),
            "loaded": state.app.as_ref().map(|a| a.is_loaded()).unwrap_or(false),
            "summaryAvailable": state.summarizer.is_some(),
        }),
    )
}

fn workspace_select(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    state.ensure_no_flush()?;
    let path = PathBuf::from(get_required_str(params, "path")?);
    let gateway = SqliteGateway::open(&path)
        .map_err(|e| HandlerErr::new("load_failed", format!("{e:?}")))?;
    state.attach(Arc::new(gateway), path.to_string_lossy().to_string())?;
    Ok(json!({ "workspacePath": path.to_string_lossy() }))
}

fn gateway_connect(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    state.ensure_no_flush()?;
    let endpoint = get_required_str(params, "endpoint")?;
    let gateway = SheetsGateway::new(&endpoint, &state.config.sheets_options())
        .map_err(|e| HandlerErr::bad_params(e.to_string()))?;
    let label = gateway.endpoint().to_string();
    state.attach(Arc::new(gateway), label.clone())?;
    Ok(json!({ "endpoint": label }))
}

fn data_reload(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    state.ensure_no_flush()?;
    let app = state.app_mut()?;
    app.reload()?;
    Ok(json!({
        "classes": app.data().classes.len(),
        "students": app.data().students.len(),
    }))
}

fn snapshot_get(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let app = state.app()?;
    let data = app.data();
    Ok(json!({
        "classes": data.classes,
        "students": data.students,
        "bimesters": data.bimesters,
        "attendance": data.attendance,
        "lessonConfig": data.lessons.to_config(),
        "pending": data.pending.entries(),
    }))
}

fn sync_push_all(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    state.ensure_no_flush()?;
    state.app()?.push_all()?;
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(respond(&req.id, workspace_select(state, &req.params))),
        "gateway.connect" => Some(respond(&req.id, gateway_connect(state, &req.params))),
        "data.reload" => Some(respond(&req.id, data_reload(state))),
        "snapshot.get" => Some(respond(&req.id, snapshot_get(state))),
        "sync.pushAll" => Some(respond(&req.id, sync_push_all(state))),
        _ => None,
    }
}
