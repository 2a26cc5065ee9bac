use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, EditorDraft, EditorMode, EditorState, Request, ViewId};
use crate::layout::{place_popover, Rect, Viewport};
use crate::model::{is_valid_level_term, CourseKind, SectionEntry};
use serde_json::json;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    fn bad_params(message: impl Into<String>) -> HandlerErr {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }
}

fn resolve_view(req: &Request) -> Result<ViewId, HandlerErr> {
    req.params
        .get("view")
        .and_then(|v| v.as_str())
        .and_then(ViewId::parse)
        .ok_or_else(|| {
            HandlerErr::bad_params("missing or unknown params.view (listings|master|list)")
        })
}

fn resolve_rect(params: &serde_json::Value, key: &str) -> Result<Rect, HandlerErr> {
    let Some(v) = params.get(key) else {
        return Err(HandlerErr::bad_params(format!("missing params.{key}")));
    };
    serde_json::from_value::<Rect>(v.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid params.{key}: {e}")))
}

fn resolve_viewport(params: &serde_json::Value) -> Result<Viewport, HandlerErr> {
    let Some(v) = params.get("viewport") else {
        return Err(HandlerErr::bad_params("missing params.viewport"));
    };
    serde_json::from_value::<Viewport>(v.clone())
        .map_err(|e| HandlerErr::bad_params(format!("invalid params.viewport: {e}")))
}

/// The draft mirrors the entry the way the inputs render it: weekly count
/// as a string with absent shown empty, course type as its label with
/// absent shown as `N/A`.
fn seed_draft(entry: &SectionEntry) -> EditorDraft {
    EditorDraft {
        level_term: entry.level_term.clone(),
        weekly_class: entry
            .weekly_class
            .map(|w| w.to_string())
            .unwrap_or_default(),
        course_type: entry
            .course_type
            .map(|k| k.as_str().to_string())
            .unwrap_or_else(|| "N/A".to_string()),
    }
}

fn dirty_flags(draft: &EditorDraft, entry: &SectionEntry) -> (bool, bool, bool) {
    let source = seed_draft(entry);
    (
        draft.level_term != source.level_term,
        draft.weekly_class != source.weekly_class,
        draft.course_type != source.course_type,
    )
}

fn can_save(mode: EditorMode, dirty: (bool, bool, bool)) -> bool {
    let (level_term, weekly, course_type) = dirty;
    match mode {
        EditorMode::Full => level_term || weekly || course_type,
        EditorMode::LevelTerm => level_term,
        EditorMode::Weekly => weekly,
    }
}

fn editor_payload(editor: &EditorState, entry: &SectionEntry) -> serde_json::Value {
    let dirty = dirty_flags(&editor.draft, entry);
    json!({
        "sectionId": editor.section_id,
        "mode": editor.mode.as_str(),
        "draft": {
            "levelTerm": editor.draft.level_term,
            "weeklyClass": editor.draft.weekly_class,
            "courseType": editor.draft.course_type,
        },
        "dirty": {
            "levelTerm": dirty.0,
            "weeklyClass": dirty.1,
            "courseType": dirty.2,
        },
        "canSave": can_save(editor.mode, dirty),
        "placement": serde_json::to_value(&editor.placement).unwrap_or(serde_json::Value::Null),
    })
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let view = match resolve_view(req) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(section_id) = req.params.get("sectionId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing params.sectionId", None);
    };
    let mode = match req.params.get("mode").and_then(|v| v.as_str()) {
        None => EditorMode::Full,
        Some(s) => match EditorMode::parse(s) {
            Some(m) => m,
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "mode must be one of: full, levelTerm, weekly",
                    Some(json!({ "mode": s })),
                )
            }
        },
    };
    let anchor = match resolve_rect(&req.params, "anchor") {
        Ok(r) => r,
        Err(e) => return e.response(&req.id),
    };
    let viewport = match resolve_viewport(&req.params) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let Some(entry) = state.find_entry(section_id).cloned() else {
        return err(
            &req.id,
            "not_found",
            "section not found",
            Some(json!({ "sectionId": section_id })),
        );
    };

    // Opening replaces whatever editor this view had, so switching the
    // edited section always reseeds the draft from the current entry.
    let editor = EditorState {
        section_id: entry.section_id.clone(),
        mode,
        draft: seed_draft(&entry),
        placement: place_popover(&anchor, &viewport),
    };
    let payload = editor_payload(&editor, &entry);
    state.view_mut(view).editor = Some(editor);
    ok(&req.id, payload)
}

fn handle_state(state: &mut AppState, req: &Request) -> serde_json::Value {
    let view = match resolve_view(req) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let Some(entry) = state
        .view(view)
        .editor
        .as_ref()
        .and_then(|ed| state.find_entry(&ed.section_id))
        .cloned()
    else {
        return err(&req.id, "not_found", "no editor open for this view", None);
    };
    let Some(editor) = state.view(view).editor.as_ref() else {
        return err(&req.id, "not_found", "no editor open for this view", None);
    };
    ok(&req.id, editor_payload(editor, &entry))
}

fn handle_stage(state: &mut AppState, req: &Request) -> serde_json::Value {
    let view = match resolve_view(req) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "missing params.patch object", None);
    };

    let Some(entry) = state
        .view(view)
        .editor
        .as_ref()
        .and_then(|ed| state.find_entry(&ed.section_id))
        .cloned()
    else {
        return err(&req.id, "not_found", "no editor open for this view", None);
    };
    let Some(editor) = state.view(view).editor.as_ref() else {
        return err(&req.id, "not_found", "no editor open for this view", None);
    };
    let mode = editor.mode;

    // Validate the whole patch before touching the draft.
    let mut staged: Vec<(&'static str, String)> = Vec::new();
    for (key, value) in patch {
        let field: &'static str = match key.as_str() {
            "levelTerm" => "levelTerm",
            "weeklyClass" => "weeklyClass",
            "courseType" => "courseType",
            other => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("unknown patch field {other:?}"),
                    None,
                )
            }
        };
        if !mode.fields().contains(&field) {
            return err(
                &req.id,
                "bad_params",
                format!("{} is not editable in {} mode", field, mode.as_str()),
                None,
            );
        }
        let Some(text) = value.as_str() else {
            return err(
                &req.id,
                "bad_params",
                format!("patch field {field:?} must be a string"),
                None,
            );
        };
        let staged_value = match field {
            // The weekly input is digits-only; anything else is dropped
            // the way an input filter would drop it.
            "weeklyClass" => text.chars().filter(|c| c.is_ascii_digit()).collect(),
            "courseType" => match CourseKind::parse(text) {
                Some(kind) => kind.as_str().to_string(),
                None => {
                    return err(
                        &req.id,
                        "bad_params",
                        "unknown courseType",
                        Some(json!({ "courseType": text })),
                    )
                }
            },
            _ => text.to_string(),
        };
        staged.push((field, staged_value));
    }

    let Some(editor) = state.view_mut(view).editor.as_mut() else {
        return err(&req.id, "not_found", "no editor open for this view", None);
    };
    for (field, value) in staged {
        match field {
            "levelTerm" => editor.draft.level_term = value,
            "weeklyClass" => editor.draft.weekly_class = value,
            _ => editor.draft.course_type = value,
        }
    }
    let payload = editor_payload(editor, &entry);
    ok(&req.id, payload)
}

fn handle_adjust_weekly(state: &mut AppState, req: &Request) -> serde_json::Value {
    let view = match resolve_view(req) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let Some(delta) = req.params.get("delta").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing params.delta", None);
    };

    let Some(entry) = state
        .view(view)
        .editor
        .as_ref()
        .and_then(|ed| state.find_entry(&ed.section_id))
        .cloned()
    else {
        return err(&req.id, "not_found", "no editor open for this view", None);
    };
    let Some(editor) = state.view_mut(view).editor.as_mut() else {
        return err(&req.id, "not_found", "no editor open for this view", None);
    };
    if editor.mode == EditorMode::LevelTerm {
        return err(
            &req.id,
            "bad_params",
            "weeklyClass is not editable in levelTerm mode",
            None,
        );
    }

    let current: i64 = if editor.draft.weekly_class.is_empty() {
        0
    } else {
        editor.draft.weekly_class.parse().unwrap_or(0)
    };
    let next = (current + delta).max(0);
    editor.draft.weekly_class = next.to_string();

    let payload = editor_payload(editor, &entry);
    ok(&req.id, payload)
}

fn handle_save(state: &mut AppState, req: &Request) -> serde_json::Value {
    let view = match resolve_view(req) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };

    let Some(editor) = state.view(view).editor.as_ref().cloned() else {
        return err(&req.id, "not_found", "no editor open for this view", None);
    };
    let Some(entry) = state.find_entry(&editor.section_id).cloned() else {
        return err(&req.id, "not_found", "no editor open for this view", None);
    };

    let source = seed_draft(&entry);
    let fields = editor.mode.fields();

    let level_term_changed =
        fields.contains(&"levelTerm") && editor.draft.level_term != source.level_term;
    let weekly_changed =
        fields.contains(&"weeklyClass") && editor.draft.weekly_class != source.weekly_class;
    let course_type_changed =
        fields.contains(&"courseType") && editor.draft.course_type != source.course_type;

    if !level_term_changed && !weekly_changed && !course_type_changed {
        return err(&req.id, "no_changes", "no staged changes to save", None);
    }

    // Validate everything before applying anything.
    if level_term_changed && !is_valid_level_term(&editor.draft.level_term) {
        return err(
            &req.id,
            "bad_params",
            "levelTerm must be N/A or L{digits}T{digits}",
            Some(json!({ "levelTerm": editor.draft.level_term })),
        );
    }
    let weekly_value: Option<i64> = if weekly_changed && !editor.draft.weekly_class.is_empty() {
        match editor.draft.weekly_class.parse() {
            Ok(n) => Some(n),
            Err(_) => {
                return err(
                    &req.id,
                    "bad_params",
                    "weekly count out of range",
                    Some(json!({ "weeklyClass": editor.draft.weekly_class })),
                )
            }
        }
    } else {
        None
    };
    let course_type_value = if course_type_changed {
        match CourseKind::parse(&editor.draft.course_type) {
            Some(kind) => Some(kind),
            None => {
                return err(
                    &req.id,
                    "bad_params",
                    "unknown courseType",
                    Some(json!({ "courseType": editor.draft.course_type })),
                )
            }
        }
    } else {
        None
    };

    let Some(target) = state.find_entry_mut(&editor.section_id) else {
        return err(&req.id, "not_found", "no editor open for this view", None);
    };
    let mut updated: Vec<&str> = Vec::new();
    if level_term_changed {
        target.level_term = editor.draft.level_term.clone();
        updated.push("levelTerm");
    }
    if weekly_changed {
        // An empty staged value commits as "no weekly count".
        target.weekly_class = weekly_value;
        updated.push("weeklyClass");
    }
    if course_type_changed {
        target.course_type = course_type_value;
        updated.push("courseType");
    }

    state.view_mut(view).editor = None;
    ok(
        &req.id,
        json!({ "sectionId": editor.section_id, "updated": updated }),
    )
}

fn handle_cancel(state: &mut AppState, req: &Request) -> serde_json::Value {
    let view = match resolve_view(req) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    // Tolerant: an outside pointer-down may already have closed it.
    let closed = state.view_mut(view).editor.take().is_some();
    ok(&req.id, json!({ "view": view.as_str(), "closed": closed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "editor.open" => Some(handle_open(state, req)),
        "editor.state" => Some(handle_state(state, req)),
        "editor.stage" => Some(handle_stage(state, req)),
        "editor.adjustWeekly" => Some(handle_adjust_weekly(state, req)),
        "editor.save" => Some(handle_save(state, req)),
        "editor.cancel" => Some(handle_cancel(state, req)),
        _ => None,
    }
}
