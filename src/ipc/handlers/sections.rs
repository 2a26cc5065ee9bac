use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::{is_valid_level_term, CourseKind};
use serde_json::json;

fn handle_update_level_term(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(section_id) = req.params.get("sectionId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.sectionId", None);
    };
    let Some(level_term) = req.params.get("levelTerm").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.levelTerm", None);
    };
    if !is_valid_level_term(level_term) {
        return err(
            &req.id,
            "bad_params",
            "levelTerm must be N/A or L{digits}T{digits}",
            Some(json!({ "levelTerm": level_term })),
        );
    }

    let section_id = section_id.to_string();
    let Some(entry) = state.find_entry_mut(&section_id) else {
        return err(
            &req.id,
            "not_found",
            "section not found",
            Some(json!({ "sectionId": section_id })),
        );
    };
    entry.level_term = level_term.to_string();
    ok(
        &req.id,
        json!({ "sectionId": section_id, "levelTerm": level_term }),
    )
}

fn handle_update_weekly_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(section_id) = req.params.get("sectionId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.sectionId", None);
    };
    let weekly = match req.params.get("weeklyClass") {
        None => {
            return err(&req.id, "bad_params", "missing params.weeklyClass", None);
        }
        Some(serde_json::Value::Null) => None,
        Some(v) => match v.as_i64() {
            Some(n) if n >= 0 => Some(n),
            _ => {
                return err(
                    &req.id,
                    "bad_params",
                    "weeklyClass must be null or an integer >= 0",
                    Some(json!({ "weeklyClass": v })),
                )
            }
        },
    };

    let section_id = section_id.to_string();
    let Some(entry) = state.find_entry_mut(&section_id) else {
        return err(
            &req.id,
            "not_found",
            "section not found",
            Some(json!({ "sectionId": section_id })),
        );
    };
    entry.weekly_class = weekly;
    ok(
        &req.id,
        json!({ "sectionId": section_id, "weeklyClass": weekly }),
    )
}

fn handle_update_course_type(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(section_id) = req.params.get("sectionId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.sectionId", None);
    };
    let Some(label) = req.params.get("courseType").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.courseType", None);
    };
    let Some(kind) = CourseKind::parse(label) else {
        return err(
            &req.id,
            "bad_params",
            "unknown courseType",
            Some(json!({ "courseType": label })),
        );
    };

    let section_id = section_id.to_string();
    let Some(entry) = state.find_entry_mut(&section_id) else {
        return err(
            &req.id,
            "not_found",
            "section not found",
            Some(json!({ "sectionId": section_id })),
        );
    };
    entry.course_type = Some(kind);
    ok(
        &req.id,
        json!({ "sectionId": section_id, "courseType": kind.as_str() }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sections.updateLevelTerm" => Some(handle_update_level_term(state, req)),
        "sections.updateWeeklyClass" => Some(handle_update_weekly_class(state, req)),
        "sections.updateCourseType" => Some(handle_update_course_type(state, req)),
        _ => None,
    }
}
