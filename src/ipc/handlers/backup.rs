use crate::backup;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};
use log::info;
use serde_json::json;
use std::path::PathBuf;

fn backup_failed(e: anyhow::Error) -> HandlerErr {
    HandlerErr::new("backup_failed", format!("{e:?}"))
}

fn backup_export_bundle(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let out_path = PathBuf::from(get_required_str(params, "outPath")?);
    let app = state.app()?;
    if !app.data().pending.is_empty() {
        info!(
            "event=backup_export module=backup status=ok unsaved_pending={}",
            app.data().pending.len()
        );
    }
    let summary = backup::export_snapshot_bundle(&app.snapshot(), &out_path).map_err(backup_failed)?;
    Ok(json!({
        "outPath": out_path.to_string_lossy(),
        "bundleFormat": summary.bundle_format,
        "entryCount": summary.entry_count,
        "sha256": summary.sha256,
    }))
}

fn backup_import_bundle(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    state.ensure_no_flush()?;
    let in_path = PathBuf::from(get_required_str(params, "inPath")?);
    let app = state.app_mut()?;
    let snapshot = backup::import_snapshot_bundle(&in_path).map_err(backup_failed)?;
    app.restore(snapshot)?;
    Ok(json!({
        "ok": true,
        "classes": app.data().classes.len(),
        "students": app.data().students.len(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "backup.exportBundle" => Some(respond(&req.id, backup_export_bundle(state, &req.params))),
        "backup.importBundle" => Some(respond(&req.id, backup_import_bundle(state, &req.params))),
        _ => None,
    }
}
