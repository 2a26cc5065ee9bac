use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, DropdownPanel, Request, ViewId};
use serde_json::json;

fn panel_hit(panel: &DropdownPanel, x: f64, y: f64) -> bool {
    // The anchor counts as inside: its own click handler decides whether
    // to toggle, and must not race the outside-close.
    panel.rect.map(|r| r.contains(x, y)).unwrap_or(false)
        || panel.anchor.map(|r| r.contains(x, y)).unwrap_or(false)
}

/// One document-level pointer-down, forwarded with viewport coordinates.
/// Every open overlay whose rect excludes the point closes; the response
/// reports what closed so the shell can mirror it.
fn handle_pointer_down(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(x) = req.params.get("x").and_then(|v| v.as_f64()) else {
        return err(&req.id, "bad_params", "missing params.x", None);
    };
    let Some(y) = req.params.get("y").and_then(|v| v.as_f64()) else {
        return err(&req.id, "bad_params", "missing params.y", None);
    };

    let mut closed_editors: Vec<&'static str> = Vec::new();
    for view in ViewId::ALL {
        let outside = state
            .view(view)
            .editor
            .as_ref()
            .map(|ed| !ed.placement.rect.contains(x, y))
            .unwrap_or(false);
        if outside {
            state.view_mut(view).editor = None;
            closed_editors.push(view.as_str());
        }
    }

    let mut closed_dropdowns: Vec<&'static str> = Vec::new();
    let dropdowns = [
        ("teacher", &mut state.dropdowns.teacher),
        ("program", &mut state.dropdowns.program),
        ("courseSection", &mut state.dropdowns.course_section),
    ];
    for (name, panel) in dropdowns {
        if panel.open && !panel_hit(panel, x, y) {
            panel.open = false;
            closed_dropdowns.push(name);
        }
    }

    ok(
        &req.id,
        json!({
            "closedEditors": closed_editors,
            "closedDropdowns": closed_dropdowns,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "overlay.pointerDown" => Some(handle_pointer_down(state, req)),
        _ => None,
    }
}
