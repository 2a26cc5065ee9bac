use std::collections::HashMap;

use crate::derive::dataset_stats;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::layout::visible_window;
use serde::Serialize;
use serde_json::json;

const REQUIREMENT_ROW_HEIGHT: f64 = 44.0;
const REQUIREMENT_OVERSCAN: usize = 6;
const REQUIREMENT_VIEWPORT_FALLBACK: f64 = 480.0;

const SORT_FIELDS: &[&str] = &[
    "courseCode",
    "teacherName",
    "levelTerm",
    "ciw",
    "cr",
    "deficit",
];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct RequirementRow {
    section_id: String,
    course_code: String,
    section: String,
    teacher_name: String,
    level_term: String,
    ciw: i64,
    cr: i64,
    deficit: i64,
}

/// One row per section; sections absent from a count map read as zero so a
/// half-filled import still renders a complete table.
fn requirement_rows(state: &AppState) -> Vec<RequirementRow> {
    state
        .dataset
        .iter()
        .map(|entry| {
            let ciw = state
                .counts
                .ciw
                .get(&entry.section_id)
                .copied()
                .unwrap_or(0);
            let cr = state
                .counts
                .class_requirement
                .get(&entry.section_id)
                .copied()
                .unwrap_or(0);
            RequirementRow {
                section_id: entry.section_id.clone(),
                course_code: entry.course_code.clone(),
                section: entry.section.clone(),
                teacher_name: entry.teacher_name.clone(),
                level_term: entry.level_term.clone(),
                ciw,
                cr,
                deficit: cr - ciw,
            }
        })
        .collect()
}

fn parse_count_map(field: &str, value: &serde_json::Value) -> Result<HashMap<String, i64>, String> {
    let Some(object) = value.as_object() else {
        return Err(format!("{field} must be an object of sectionId to count"));
    };
    let mut counts = HashMap::with_capacity(object.len());
    for (section_id, raw) in object {
        let Some(count) = raw.as_i64().filter(|n| *n >= 0) else {
            return Err(format!(
                "{field}[{section_id:?}] must be a non-negative integer"
            ));
        };
        counts.insert(section_id.clone(), count);
    }
    Ok(counts)
}

fn handle_counts_set(state: &mut AppState, req: &Request) -> serde_json::Value {
    // Validate both maps before touching either so a bad request leaves the
    // previous counts intact.
    let ciw = match req.params.get("ciwCounts") {
        None => None,
        Some(value) => match parse_count_map("ciwCounts", value) {
            Ok(map) => Some(map),
            Err(message) => return err(&req.id, "bad_params", message, None),
        },
    };
    let class_requirement = match req.params.get("classRequirementCounts") {
        None => None,
        Some(value) => match parse_count_map("classRequirementCounts", value) {
            Ok(map) => Some(map),
            Err(message) => return err(&req.id, "bad_params", message, None),
        },
    };

    if let Some(map) = ciw {
        state.counts.ciw = map;
    }
    if let Some(map) = class_requirement {
        state.counts.class_requirement = map;
    }
    ok(
        &req.id,
        json!({
            "ciwCounts": state.counts.ciw.len(),
            "classRequirementCounts": state.counts.class_requirement.len(),
        }),
    )
}

fn handle_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let stats = dataset_stats(&state.dataset);
    ok(
        &req.id,
        serde_json::to_value(stats).unwrap_or(serde_json::Value::Null),
    )
}

fn handle_slot_requirements(state: &mut AppState, req: &Request) -> serde_json::Value {
    let sort_by = req
        .params
        .get("sortBy")
        .and_then(|v| v.as_str())
        .unwrap_or("deficit");
    if !SORT_FIELDS.contains(&sort_by) {
        return err(
            &req.id,
            "bad_params",
            format!("unknown sortBy {sort_by:?}"),
            Some(json!({ "allowed": SORT_FIELDS })),
        );
    }
    let sort_dir = req
        .params
        .get("sortDir")
        .and_then(|v| v.as_str())
        .unwrap_or("desc");
    if sort_dir != "asc" && sort_dir != "desc" {
        return err(
            &req.id,
            "bad_params",
            format!("sortDir must be asc or desc, got {sort_dir:?}"),
            None,
        );
    }
    let scroll_top = req
        .params
        .get("scrollTop")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    let viewport_height = req
        .params
        .get("viewportHeight")
        .and_then(|v| v.as_f64())
        .unwrap_or(REQUIREMENT_VIEWPORT_FALLBACK);

    let mut rows = requirement_rows(state);
    rows.sort_by(|a, b| {
        let ordering = match sort_by {
            "courseCode" => a.course_code.cmp(&b.course_code),
            "teacherName" => a.teacher_name.cmp(&b.teacher_name),
            "levelTerm" => a.level_term.cmp(&b.level_term),
            "ciw" => a.ciw.cmp(&b.ciw),
            "cr" => a.cr.cmp(&b.cr),
            _ => a.deficit.cmp(&b.deficit),
        };
        let ordering = if sort_dir == "desc" {
            ordering.reverse()
        } else {
            ordering
        };
        // Ties stay in a stable course order whatever the sort direction.
        ordering
            .then_with(|| a.course_code.cmp(&b.course_code))
            .then_with(|| a.section.cmp(&b.section))
    });

    let total = rows.len();
    let window = visible_window(
        scroll_top,
        viewport_height,
        REQUIREMENT_ROW_HEIGHT,
        REQUIREMENT_OVERSCAN,
        total,
    );
    let slice = rows[window.start..window.end]
        .iter()
        .map(|row| serde_json::to_value(row).unwrap_or(serde_json::Value::Null))
        .collect::<Vec<_>>();
    ok(
        &req.id,
        json!({
            "total": total,
            "window": serde_json::to_value(window).unwrap_or(serde_json::Value::Null),
            "rows": slice,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "counts.set" => Some(handle_counts_set(state, req)),
        "sidebar.stats" => Some(handle_stats(state, req)),
        "sidebar.slotRequirements" => Some(handle_slot_requirements(state, req)),
        _ => None,
    }
}
