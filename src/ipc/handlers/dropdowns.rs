use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, DropdownPanel, Request};
use crate::layout::{place_panel, visible_window};
use serde_json::json;

const DROPDOWN_ROW_HEIGHT: f64 = 36.0;
const DROPDOWN_PANEL_MAX_HEIGHT: f64 = 288.0;
const COURSE_SECTION_OVERSCAN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Teacher,
    Program,
    CourseSection,
}

impl Kind {
    fn parse(s: &str) -> Option<Kind> {
        match s {
            "teacher" => Some(Kind::Teacher),
            "program" => Some(Kind::Program),
            "courseSection" => Some(Kind::CourseSection),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Kind::Teacher => "teacher",
            Kind::Program => "program",
            Kind::CourseSection => "courseSection",
        }
    }
}

#[derive(Debug, Clone)]
struct Item {
    value: String,
    label: String,
}

fn teacher_items(state: &AppState) -> Vec<Item> {
    let mut items: Vec<Item> = Vec::new();
    for entry in &state.dataset {
        if entry.teacher_id.is_empty() {
            continue;
        }
        if items.iter().any(|i| i.value == entry.teacher_id) {
            continue;
        }
        let label = if entry.designation.is_empty() {
            entry.teacher_name.clone()
        } else {
            format!("{} ({})", entry.teacher_name, entry.designation)
        };
        items.push(Item {
            value: entry.teacher_id.clone(),
            label,
        });
    }
    items.sort_by(|a, b| a.label.to_lowercase().cmp(&b.label.to_lowercase()));
    items
}

fn program_items(state: &AppState) -> Vec<Item> {
    let mut items: Vec<Item> = Vec::new();
    for entry in &state.dataset {
        if entry.p_id.is_empty() || items.iter().any(|i| i.value == entry.p_id) {
            continue;
        }
        items.push(Item {
            value: entry.p_id.clone(),
            label: entry.p_id.clone(),
        });
    }
    items.sort_by(|a, b| a.value.cmp(&b.value));
    items
}

fn course_section_items(state: &AppState) -> Vec<Item> {
    let mut items: Vec<Item> = state
        .dataset
        .iter()
        .map(|entry| {
            let mut label = format!("{} [{}]", entry.course_code, entry.section);
            if !entry.teacher_name.is_empty() {
                label.push_str(" - ");
                label.push_str(&entry.teacher_name);
            }
            Item {
                value: entry.section_id.clone(),
                label,
            }
        })
        .collect();
    items.sort_by(|a, b| a.label.to_lowercase().cmp(&b.label.to_lowercase()));
    items
}

fn items_for(state: &AppState, kind: Kind) -> Vec<Item> {
    match kind {
        Kind::Teacher => teacher_items(state),
        Kind::Program => program_items(state),
        Kind::CourseSection => course_section_items(state),
    }
}

fn filtered_items(state: &AppState, kind: Kind) -> Vec<Item> {
    let query = panel(state, kind).query.trim().to_lowercase();
    let mut items = items_for(state, kind);
    if !query.is_empty() {
        items.retain(|i| {
            i.label.to_lowercase().contains(&query) || i.value.to_lowercase().contains(&query)
        });
    }
    items
}

fn panel<'a>(state: &'a AppState, kind: Kind) -> &'a DropdownPanel {
    match kind {
        Kind::Teacher => &state.dropdowns.teacher,
        Kind::Program => &state.dropdowns.program,
        Kind::CourseSection => &state.dropdowns.course_section,
    }
}

fn panel_mut<'a>(state: &'a mut AppState, kind: Kind) -> &'a mut DropdownPanel {
    match kind {
        Kind::Teacher => &mut state.dropdowns.teacher,
        Kind::Program => &mut state.dropdowns.program,
        Kind::CourseSection => &mut state.dropdowns.course_section,
    }
}

fn selection_json(state: &AppState, kind: Kind) -> serde_json::Value {
    match kind {
        Kind::Teacher => json!(state.dropdowns.selected_teacher),
        Kind::Program => json!(state.dropdowns.selected_programs),
        Kind::CourseSection => json!(state.dropdowns.selected_course_section),
    }
}

fn items_json(items: &[Item]) -> Vec<serde_json::Value> {
    items
        .iter()
        .map(|i| json!({ "value": i.value, "label": i.label }))
        .collect()
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(kind) = req
        .params
        .get("kind")
        .and_then(|v| v.as_str())
        .and_then(Kind::parse)
    else {
        return err(
            &req.id,
            "bad_params",
            "missing or unknown params.kind (teacher|program|courseSection)",
            None,
        );
    };
    let anchor = match req.params.get("anchor") {
        Some(v) => match serde_json::from_value::<crate::layout::Rect>(v.clone()) {
            Ok(r) => r,
            Err(e) => {
                return err(&req.id, "bad_params", format!("invalid params.anchor: {e}"), None)
            }
        },
        None => return err(&req.id, "bad_params", "missing params.anchor", None),
    };

    // Opening starts from an empty query.
    {
        let p = panel_mut(state, kind);
        p.query = String::new();
        p.anchor = Some(anchor);
    }
    let total = filtered_items(state, kind).len();
    let rect = place_panel(&anchor, total, DROPDOWN_ROW_HEIGHT, DROPDOWN_PANEL_MAX_HEIGHT);
    let p = panel_mut(state, kind);
    p.open = true;
    p.rect = Some(rect);

    ok(
        &req.id,
        json!({
            "kind": kind.as_str(),
            "total": total,
            "panel": serde_json::to_value(rect).unwrap_or(serde_json::Value::Null),
        }),
    )
}

fn handle_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(kind) = req
        .params
        .get("kind")
        .and_then(|v| v.as_str())
        .and_then(Kind::parse)
    else {
        return err(
            &req.id,
            "bad_params",
            "missing or unknown params.kind (teacher|program|courseSection)",
            None,
        );
    };
    let p = panel_mut(state, kind);
    let was_open = p.open;
    p.open = false;
    ok(
        &req.id,
        json!({ "kind": kind.as_str(), "closed": was_open }),
    )
}

fn handle_set_query(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(kind) = req
        .params
        .get("kind")
        .and_then(|v| v.as_str())
        .and_then(Kind::parse)
    else {
        return err(
            &req.id,
            "bad_params",
            "missing or unknown params.kind (teacher|program|courseSection)",
            None,
        );
    };
    let Some(query) = req.params.get("query").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.query", None);
    };

    panel_mut(state, kind).query = query.to_string();
    let total = filtered_items(state, kind).len();

    // A narrowed list shrinks the open panel.
    let anchor = panel(state, kind).anchor;
    let p = panel_mut(state, kind);
    if p.open {
        if let Some(anchor) = anchor {
            p.rect = Some(place_panel(
                &anchor,
                total,
                DROPDOWN_ROW_HEIGHT,
                DROPDOWN_PANEL_MAX_HEIGHT,
            ));
        }
    }

    ok(&req.id, json!({ "kind": kind.as_str(), "total": total }))
}

fn handle_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(kind) = req
        .params
        .get("kind")
        .and_then(|v| v.as_str())
        .and_then(Kind::parse)
    else {
        return err(
            &req.id,
            "bad_params",
            "missing or unknown params.kind (teacher|program|courseSection)",
            None,
        );
    };
    let Some(value) = req.params.get("value").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.value", None);
    };

    if !items_for(state, kind).iter().any(|i| i.value == value) {
        return err(
            &req.id,
            "not_found",
            "value not present in this dropdown",
            Some(json!({ "kind": kind.as_str(), "value": value })),
        );
    }

    match kind {
        Kind::Teacher => {
            state.dropdowns.selected_teacher = Some(value.to_string());
            state.dropdowns.teacher.open = false;
        }
        Kind::CourseSection => {
            state.dropdowns.selected_course_section = Some(value.to_string());
            state.dropdowns.course_section.open = false;
        }
        Kind::Program => {
            // Multi-select: toggling keeps the panel open.
            let selected = &mut state.dropdowns.selected_programs;
            if let Some(pos) = selected.iter().position(|p| p == value) {
                selected.remove(pos);
            } else {
                selected.push(value.to_string());
            }
        }
    }

    ok(
        &req.id,
        json!({ "kind": kind.as_str(), "selected": selection_json(state, kind) }),
    )
}

fn handle_clear_selection(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(kind) = req
        .params
        .get("kind")
        .and_then(|v| v.as_str())
        .and_then(Kind::parse)
    else {
        return err(
            &req.id,
            "bad_params",
            "missing or unknown params.kind (teacher|program|courseSection)",
            None,
        );
    };

    match kind {
        Kind::Teacher => state.dropdowns.selected_teacher = None,
        Kind::Program => state.dropdowns.selected_programs.clear(),
        Kind::CourseSection => state.dropdowns.selected_course_section = None,
    }
    ok(
        &req.id,
        json!({ "kind": kind.as_str(), "selected": selection_json(state, kind) }),
    )
}

fn handle_items(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(kind) = req
        .params
        .get("kind")
        .and_then(|v| v.as_str())
        .and_then(Kind::parse)
    else {
        return err(
            &req.id,
            "bad_params",
            "missing or unknown params.kind (teacher|program|courseSection)",
            None,
        );
    };

    let items = filtered_items(state, kind);
    let total = items.len();

    if kind == Kind::CourseSection {
        // The section list can run to thousands of rows; only the visible
        // window crosses the wire.
        let scroll_top = req
            .params
            .get("scrollTop")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.0);
        let viewport_height = req
            .params
            .get("viewportHeight")
            .and_then(|v| v.as_f64())
            .unwrap_or(DROPDOWN_PANEL_MAX_HEIGHT);
        let window = visible_window(
            scroll_top,
            viewport_height,
            DROPDOWN_ROW_HEIGHT,
            COURSE_SECTION_OVERSCAN,
            total,
        );
        let slice = &items[window.start..window.end];
        return ok(
            &req.id,
            json!({
                "kind": kind.as_str(),
                "total": total,
                "window": serde_json::to_value(window).unwrap_or(serde_json::Value::Null),
                "items": items_json(slice),
            }),
        );
    }

    ok(
        &req.id,
        json!({
            "kind": kind.as_str(),
            "total": total,
            "items": items_json(&items),
        }),
    )
}

fn handle_state(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(kind) = req
        .params
        .get("kind")
        .and_then(|v| v.as_str())
        .and_then(Kind::parse)
    else {
        return err(
            &req.id,
            "bad_params",
            "missing or unknown params.kind (teacher|program|courseSection)",
            None,
        );
    };

    let p = panel(state, kind);
    ok(
        &req.id,
        json!({
            "kind": kind.as_str(),
            "open": p.open,
            "query": p.query,
            "panel": p.rect.map(|r| serde_json::to_value(r).unwrap_or(serde_json::Value::Null)),
            "selected": selection_json(state, kind),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "dropdown.open" => Some(handle_open(state, req)),
        "dropdown.close" => Some(handle_close(state, req)),
        "dropdown.setQuery" => Some(handle_set_query(state, req)),
        "dropdown.select" => Some(handle_select(state, req)),
        "dropdown.clearSelection" => Some(handle_clear_selection(state, req)),
        "dropdown.items" => Some(handle_items(state, req)),
        "dropdown.state" => Some(handle_state(state, req)),
        _ => None,
    }
}
