use std::path::Path;

use crate::derive::duplicate_section_id;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::RoutineVersion;
use crate::snapshot;
use crate::store::validate_slot;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

fn version_summary(version: &RoutineVersion) -> serde_json::Value {
    json!({
        "id": version.id,
        "name": version.name,
        "savedAt": version.saved_at,
        "sectionCount": version.entries.len(),
    })
}

fn handle_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let name = req
        .params
        .get("name")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .unwrap_or("");
    if name.is_empty() {
        return err(&req.id, "bad_params", "missing or empty params.name", None);
    }

    let version = RoutineVersion {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        saved_at: Utc::now().to_rfc3339(),
        entries: state.dataset.clone(),
    };
    let summary = version_summary(&version);
    state.versions.push(version);
    tracing::info!(name, "saved routine version");
    ok(&req.id, summary)
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let versions = state
        .versions
        .iter()
        .rev()
        .map(version_summary)
        .collect::<Vec<_>>();
    ok(&req.id, json!({ "versions": versions }))
}

fn handle_restore(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(id) = req.params.get("id").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.id", None);
    };
    let Some(version) = state.versions.iter().find(|v| v.id == id) else {
        return err(
            &req.id,
            "not_found",
            "version not found",
            Some(json!({ "id": id })),
        );
    };

    state.dataset = version.entries.clone();
    state.reconcile_after_replace();
    tracing::info!(id, sections = state.dataset.len(), "restored routine version");
    ok(&req.id, json!({ "sections": state.dataset.len() }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(id) = req.params.get("id").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.id", None);
    };
    let before = state.versions.len();
    state.versions.retain(|v| v.id != id);
    if state.versions.len() == before {
        return err(
            &req.id,
            "not_found",
            "version not found",
            Some(json!({ "id": id })),
        );
    }
    ok(&req.id, json!({ "removed": id, "versions": state.versions.len() }))
}

fn handle_export_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(path) = req.params.get("path").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };
    if state.dataset.is_empty() {
        return err(&req.id, "empty_export", "no sections to export", None);
    }

    let slots = state
        .slots
        .as_ref()
        .map(|store| store.slots.clone())
        .unwrap_or_default();
    match snapshot::export_snapshot_bundle(&state.dataset, &slots, Path::new(path)) {
        Ok(summary) => {
            tracing::info!(path, sections = summary.sections, "exported snapshot bundle");
            ok(
                &req.id,
                json!({
                    "path": path,
                    "bundleFormat": summary.bundle_format,
                    "sections": summary.sections,
                    "slots": summary.slots,
                    "sha256": summary.checksum,
                }),
            )
        }
        Err(e) => err(&req.id, "snapshot_failed", format!("{e:#}"), None),
    }
}

fn handle_import_bundle(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(path) = req.params.get("path").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    let imported = match snapshot::import_snapshot_bundle(Path::new(path)) {
        Ok(imported) => imported,
        Err(e) => return err(&req.id, "snapshot_failed", format!("{e:#}"), None),
    };
    if let Some(dup) = duplicate_section_id(&imported.entries) {
        return err(
            &req.id,
            "snapshot_failed",
            format!("duplicate sectionId in bundle: {dup:?}"),
            Some(json!({ "sectionId": dup })),
        );
    }

    let mut entries = imported.entries;
    super::dataset::normalize_entries(&mut entries);
    state.dataset = entries;
    state.reconcile_after_replace();

    // The dataset is already committed at this point; a slot-store problem is
    // reported inside the ok result rather than failing the whole import.
    let mut slots_restored = false;
    let mut slot_store_error: Option<String> = None;
    if let Some(bundle_slots) = imported.slots {
        if let Some(slot_store) = state.slots.as_mut() {
            let mut valid = Vec::with_capacity(bundle_slots.len());
            let mut dropped = 0usize;
            for slot in bundle_slots {
                if !slot.id.is_empty() && validate_slot(&slot).is_ok() {
                    valid.push(slot);
                } else {
                    dropped += 1;
                }
            }
            if dropped > 0 {
                tracing::warn!(dropped, "dropped invalid bundled time slots");
            }
            slot_store.slots = valid;
            slot_store.editing = None;
            match slot_store.save() {
                Ok(()) => slots_restored = true,
                Err(e) => {
                    tracing::warn!(error = %format!("{e:#}"), "slot store write failed");
                    slot_store_error = Some(format!("{e:#}"));
                }
            }
        }
    }

    tracing::info!(path, sections = state.dataset.len(), "imported snapshot bundle");
    let mut result = json!({
        "sections": state.dataset.len(),
        "bundleFormat": imported.bundle_format_detected,
        "slotsRestored": slots_restored,
    });
    if let (Some(message), Some(map)) = (slot_store_error, result.as_object_mut()) {
        map.insert("slotStoreError".to_string(), json!(message));
    }
    ok(&req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "versions.save" => Some(handle_save(state, req)),
        "versions.list" => Some(handle_list(state, req)),
        "versions.restore" => Some(handle_restore(state, req)),
        "versions.delete" => Some(handle_delete(state, req)),
        "snapshot.exportBundle" => Some(handle_export_bundle(state, req)),
        "snapshot.importBundle" => Some(handle_import_bundle(state, req)),
        _ => None,
    }
}
