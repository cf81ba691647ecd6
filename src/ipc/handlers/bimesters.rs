use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::model::BimesterConfig;
use serde_json::json;

fn bimesters_list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    Ok(json!({ "bimesters": state.app()?.data().bimesters }))
}

fn bimesters_save(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let Some(raw) = params.get("bimesters") else {
        return Err(HandlerErr::bad_params("missing bimesters"));
    };
    let bimesters: Vec<BimesterConfig> = serde_json::from_value(raw.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid bimesters: {}", e)))?;
    let count = bimesters.len();
    state.app_mut()?.save_bimesters(bimesters)?;
    Ok(json!({ "ok": true, "count": count }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "bimesters.list" => Some(respond(&req.id, bimesters_list(state))),
        "bimesters.save" => Some(respond(&req.id, bimesters_save(state, &req.params))),
        _ => None,
    }
}
