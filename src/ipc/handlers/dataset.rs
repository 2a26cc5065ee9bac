use crate::derive;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request, ViewId};
use crate::model::SectionEntry;
use crate::xlsx;
use serde_json::json;
use std::path::PathBuf;

const DATASET_GET_MAX_ROWS: usize = 5000;

/// Blank level-terms read as `N/A`, matching the import fallback, so the
/// filter options never grow an empty bucket.
pub(crate) fn normalize_entries(entries: &mut [SectionEntry]) {
    for entry in entries {
        if entry.level_term.trim().is_empty() {
            entry.level_term = "N/A".to_string();
        }
    }
}

fn handle_replace(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(entries_val) = req.params.get("entries") else {
        return err(&req.id, "bad_params", "missing params.entries", None);
    };
    if !entries_val.is_array() {
        return err(&req.id, "bad_params", "params.entries must be an array", None);
    }
    let mut entries: Vec<SectionEntry> = match serde_json::from_value(entries_val.clone()) {
        Ok(v) => v,
        Err(e) => {
            return err(&req.id, "bad_params", format!("invalid entries: {e}"), None);
        }
    };
    normalize_entries(&mut entries);
    if let Some(id) = derive::duplicate_section_id(&entries) {
        return err(
            &req.id,
            "bad_params",
            "duplicate sectionId in entries",
            Some(json!({ "sectionId": id })),
        );
    }

    state.dataset = entries;
    state.reconcile_after_replace();
    ok(&req.id, json!({ "sections": state.dataset.len() }))
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let offset = match req.params.get("offset") {
        None => 0usize,
        Some(v) => match v.as_u64() {
            Some(n) => n as usize,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "params.offset must be a non-negative integer",
                    None,
                )
            }
        },
    };
    let limit = match req.params.get("limit") {
        None => DATASET_GET_MAX_ROWS,
        Some(v) => match v.as_u64() {
            Some(n) => (n as usize).min(DATASET_GET_MAX_ROWS),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "params.limit must be a non-negative integer",
                    None,
                )
            }
        },
    };

    let total = state.dataset.len();
    let start = offset.min(total);
    let end = (start + limit).min(total);
    ok(
        &req.id,
        json!({
            "total": total,
            "offset": start,
            "entries": &state.dataset[start..end],
        }),
    )
}

fn handle_import_xlsx(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(path) = req.params.get("path").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };
    let path = PathBuf::from(path);

    match xlsx::import_entries(&path) {
        Ok(mut entries) => {
            normalize_entries(&mut entries);
            let count = entries.len();
            state.dataset = entries;
            state.reconcile_after_replace();
            tracing::info!(sections = count, path = %path.to_string_lossy(), "imported course data");
            ok(
                &req.id,
                json!({ "sections": count, "path": path.to_string_lossy() }),
            )
        }
        Err(e) => err(&req.id, "import_failed", format!("{e:#}"), None),
    }
}

fn handle_export_xlsx(state: &mut AppState, req: &Request) -> serde_json::Value {
    let scope = req
        .params
        .get("scope")
        .and_then(|v| v.as_str())
        .unwrap_or("all");
    let filtered = match scope {
        "all" => false,
        "filtered" => true,
        other => {
            return err(
                &req.id,
                "bad_params",
                format!("scope must be \"all\" or \"filtered\", got {other:?}"),
                None,
            )
        }
    };

    let entries: Vec<SectionEntry> = if filtered {
        let Some(view) = req
            .params
            .get("view")
            .and_then(|v| v.as_str())
            .and_then(ViewId::parse)
        else {
            return err(
                &req.id,
                "bad_params",
                "filtered export requires params.view (listings|master|list)",
                None,
            );
        };
        derive::derive_view(&state.dataset, &state.view(view).filter)
            .into_iter()
            .flat_map(|g| g.sections)
            .collect()
    } else {
        state.dataset.clone()
    };

    if entries.is_empty() {
        return err(&req.id, "empty_export", "no course data to export", None);
    }

    let out_path: PathBuf = if let Some(p) = req.params.get("path").and_then(|v| v.as_str()) {
        PathBuf::from(p)
    } else if let Some(dir) = req.params.get("dir").and_then(|v| v.as_str()) {
        PathBuf::from(dir).join(xlsx::export_file_name(
            filtered,
            chrono::Utc::now().date_naive(),
        ))
    } else {
        return err(&req.id, "bad_params", "missing params.path or params.dir", None);
    };

    match xlsx::export_entries(&entries, &out_path) {
        Ok(()) => {
            tracing::info!(rows = entries.len(), path = %out_path.to_string_lossy(), "exported course data");
            ok(
                &req.id,
                json!({
                    "path": out_path.to_string_lossy(),
                    "fileName": out_path.file_name().map(|n| n.to_string_lossy().to_string()),
                    "rows": entries.len(),
                }),
            )
        }
        Err(e) => err(&req.id, "export_failed", format!("{e:#}"), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dataset.replace" => Some(handle_replace(state, req)),
        "dataset.get" => Some(handle_get(state, req)),
        "dataset.importXlsx" => Some(handle_import_xlsx(state, req)),
        "dataset.exportXlsx" => Some(handle_export_xlsx(state, req)),
        _ => None,
    }
}
