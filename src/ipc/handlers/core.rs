use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::store::SlotStore;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "sections": state.dataset.len(),
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    if let Err(e) = std::fs::create_dir_all(&path) {
        return err(
            &req.id,
            "workspace_open_failed",
            format!(
                "failed to create workspace {}: {}",
                path.to_string_lossy(),
                e
            ),
            None,
        );
    }

    let store = SlotStore::load(&path);
    tracing::info!(
        path = %path.to_string_lossy(),
        slots = store.slots.len(),
        "workspace selected"
    );

    let slot_count = store.slots.len();
    state.workspace = Some(path.clone());
    state.slots = Some(store);

    ok(
        &req.id,
        json!({
            "workspacePath": path.to_string_lossy(),
            "timeSlots": slot_count,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
