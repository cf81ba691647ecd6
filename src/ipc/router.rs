use super::handlers;
use super::types::{AppState, Request};
use crate::ipc::error::err;
use log::debug;

/// Answers one request. `None` means the reply is deferred until a background
/// save reports back.
pub fn handle_request(state: &mut AppState, req: Request) -> Option<serde_json::Value> {
    debug!("event=ipc_request module=router method={}", req.method);
    if req.method == "attendance.save" {
        return handlers::attendance::handle_save(state, &req);
    }
    Some(dispatch(state, &req))
}

fn dispatch(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Some(resp) = handlers::core::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::classes::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::students::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::bimesters::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::lessons::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::attendance::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::reports::try_handle(state, req) {
        return resp;
    }
    if let Some(resp) = handlers::backup::try_handle(state, req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
