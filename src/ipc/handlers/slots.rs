use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{DefaultTimeSlot, SlotKind};
use crate::store;
use serde_json::json;

fn slot_json(slot: &DefaultTimeSlot) -> serde_json::Value {
    serde_json::to_value(slot).unwrap_or(serde_json::Value::Null)
}

/// Shared by add and update: the form submits kind + both times; every
/// failure is an inline validation message, not a protocol error.
fn resolve_slot_fields(params: &serde_json::Value) -> Result<(SlotKind, String, String), String> {
    let kind = match params.get("kind").and_then(|v| v.as_str()) {
        None => return Err("slot kind is required".to_string()),
        Some(s) => match SlotKind::parse(s) {
            Some(k) => k,
            None => return Err(format!("slot kind must be Theory or Lab, got {s:?}")),
        },
    };
    let start = params
        .get("startTime")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    let end = params
        .get("endTime")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    Ok((kind, start, end))
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(slot_store) = state.slots.as_ref() else {
        return err(&req.id, "no_workspace", "no workspace selected", None);
    };
    ok(
        &req.id,
        json!({
            "slots": slot_store.slots.iter().map(slot_json).collect::<Vec<_>>(),
            "editingId": slot_store.editing,
        }),
    )
}

fn handle_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(slot_store) = state.slots.as_mut() else {
        return err(&req.id, "no_workspace", "no workspace selected", None);
    };
    let (kind, start_time, end_time) = match resolve_slot_fields(&req.params) {
        Ok(fields) => fields,
        Err(message) => return err(&req.id, "invalid_slot", message, None),
    };

    let slot = DefaultTimeSlot {
        id: store::new_slot_id(),
        kind,
        start_time,
        end_time,
    };
    if let Err(message) = store::validate_slot(&slot) {
        return err(&req.id, "invalid_slot", message, None);
    }

    slot_store.slots.push(slot.clone());
    if let Err(e) = slot_store.save() {
        tracing::warn!(error = %format!("{e:#}"), "slot store write failed");
        return err(&req.id, "slot_store_write_failed", format!("{e:#}"), None);
    }
    ok(&req.id, json!({ "slot": slot_json(&slot) }))
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(slot_store) = state.slots.as_mut() else {
        return err(&req.id, "no_workspace", "no workspace selected", None);
    };
    let Some(id) = req.params.get("id").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.id", None);
    };
    let (kind, start_time, end_time) = match resolve_slot_fields(&req.params) {
        Ok(fields) => fields,
        Err(message) => return err(&req.id, "invalid_slot", message, None),
    };

    let Some(pos) = slot_store.slots.iter().position(|s| s.id == id) else {
        return err(
            &req.id,
            "not_found",
            "time slot not found",
            Some(json!({ "id": id })),
        );
    };
    let slot = DefaultTimeSlot {
        id: id.to_string(),
        kind,
        start_time,
        end_time,
    };
    if let Err(message) = store::validate_slot(&slot) {
        return err(&req.id, "invalid_slot", message, None);
    }

    slot_store.slots[pos] = slot.clone();
    if slot_store.editing.as_deref() == Some(id) {
        slot_store.editing = None;
    }
    if let Err(e) = slot_store.save() {
        tracing::warn!(error = %format!("{e:#}"), "slot store write failed");
        return err(&req.id, "slot_store_write_failed", format!("{e:#}"), None);
    }
    ok(&req.id, json!({ "slot": slot_json(&slot) }))
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(slot_store) = state.slots.as_mut() else {
        return err(&req.id, "no_workspace", "no workspace selected", None);
    };
    let Some(id) = req.params.get("id").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.id", None);
    };

    let Some(pos) = slot_store.slots.iter().position(|s| s.id == id) else {
        return err(
            &req.id,
            "not_found",
            "time slot not found",
            Some(json!({ "id": id })),
        );
    };
    slot_store.slots.remove(pos);
    // Deleting the slot under edit also leaves edit mode.
    if slot_store.editing.as_deref() == Some(id) {
        slot_store.editing = None;
    }
    if let Err(e) = slot_store.save() {
        tracing::warn!(error = %format!("{e:#}"), "slot store write failed");
        return err(&req.id, "slot_store_write_failed", format!("{e:#}"), None);
    }
    ok(
        &req.id,
        json!({ "removed": id, "slots": slot_store.slots.len() }),
    )
}

fn handle_begin_edit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(slot_store) = state.slots.as_mut() else {
        return err(&req.id, "no_workspace", "no workspace selected", None);
    };
    let Some(id) = req.params.get("id").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.id", None);
    };
    if !slot_store.slots.iter().any(|s| s.id == id) {
        return err(
            &req.id,
            "not_found",
            "time slot not found",
            Some(json!({ "id": id })),
        );
    }
    slot_store.editing = Some(id.to_string());
    ok(&req.id, json!({ "editingId": slot_store.editing }))
}

fn handle_cancel_edit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(slot_store) = state.slots.as_mut() else {
        return err(&req.id, "no_workspace", "no workspace selected", None);
    };
    slot_store.editing = None;
    ok(&req.id, json!({ "editingId": serde_json::Value::Null }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "slots.list" => Some(handle_list(state, req)),
        "slots.add" => Some(handle_add(state, req)),
        "slots.update" => Some(handle_update(state, req)),
        "slots.delete" => Some(handle_delete(state, req)),
        "slots.beginEdit" => Some(handle_begin_edit(state, req)),
        "slots.cancelEdit" => Some(handle_cancel_edit(state, req)),
        _ => None,
    }
}
