use crate::derive::{self, CourseGroup, PAGE_SIZE};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request, ViewId};
use crate::model::CourseFilter;
use serde_json::json;

fn listings_row(group: &CourseGroup) -> serde_json::Value {
    json!({
        "pId": group.p_id,
        "courseCode": group.course_code,
        "courseTitle": group.course_title,
        "sectionCount": group.section_count,
        "levelTerm": group.level_term,
        "weeklyClass": group.weekly_class,
        "courseType": group.course_type.map(|k| k.as_str()),
    })
}

fn full_row(group: &CourseGroup) -> serde_json::Value {
    serde_json::to_value(group).unwrap_or(serde_json::Value::Null)
}

fn handle_query(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(view) = req
        .params
        .get("view")
        .and_then(|v| v.as_str())
        .and_then(ViewId::parse)
    else {
        return err(
            &req.id,
            "bad_params",
            "missing or unknown params.view (listings|master|list)",
            None,
        );
    };

    let groups = derive::derive_view(&state.dataset, &state.view(view).filter);
    let keys = derive::group_keys(&groups);
    {
        let vs = state.view_mut(view);
        // A different set (or order) of matching courses invalidates the
        // current page; identical results keep it.
        if keys != vs.last_keys {
            vs.page = 1;
            vs.last_keys = keys;
        }
    }

    let vs = state.view(view);
    let total = groups.len();
    let filter_active = vs.filter.is_active();

    match view {
        ViewId::Listings => {
            let rows: Vec<serde_json::Value> = groups.iter().map(listings_row).collect();
            ok(
                &req.id,
                json!({
                    "view": view.as_str(),
                    "total": total,
                    "filterActive": filter_active,
                    "rows": rows,
                }),
            )
        }
        ViewId::Master => {
            let rows: Vec<serde_json::Value> = groups.iter().map(full_row).collect();
            ok(
                &req.id,
                json!({
                    "view": view.as_str(),
                    "total": total,
                    "filterActive": filter_active,
                    "rows": rows,
                }),
            )
        }
        ViewId::List => {
            let page_count = derive::page_count(total, PAGE_SIZE);
            let page = vs.page.min(page_count);
            let start = (page - 1) * PAGE_SIZE;
            let end = (start + PAGE_SIZE).min(total);
            let rows: Vec<serde_json::Value> = groups[start..end].iter().map(full_row).collect();
            ok(
                &req.id,
                json!({
                    "view": view.as_str(),
                    "total": total,
                    "filterActive": filter_active,
                    "page": page,
                    "pageCount": page_count,
                    "pageSize": PAGE_SIZE,
                    "rows": rows,
                }),
            )
        }
    }
}

fn handle_set_filters(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(view) = req
        .params
        .get("view")
        .and_then(|v| v.as_str())
        .and_then(ViewId::parse)
    else {
        return err(
            &req.id,
            "bad_params",
            "missing or unknown params.view (listings|master|list)",
            None,
        );
    };
    let Some(filters_val) = req.params.get("filters") else {
        return err(&req.id, "bad_params", "missing params.filters", None);
    };
    let Some(patch) = filters_val.as_object() else {
        return err(&req.id, "bad_params", "params.filters must be an object", None);
    };

    // Partial patch: untouched fields keep their current values.
    let mut merged = serde_json::to_value(&state.view(view).filter)
        .unwrap_or_else(|_| json!({}));
    if let Some(target) = merged.as_object_mut() {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
    let filter: CourseFilter = match serde_json::from_value(merged) {
        Ok(f) => f,
        Err(e) => {
            return err(&req.id, "bad_params", format!("invalid filters: {e}"), None);
        }
    };

    let active = filter.is_active();
    state.view_mut(view).filter = filter;
    ok(
        &req.id,
        json!({ "view": view.as_str(), "filterActive": active }),
    )
}

fn handle_clear_filters(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(view) = req
        .params
        .get("view")
        .and_then(|v| v.as_str())
        .and_then(ViewId::parse)
    else {
        return err(
            &req.id,
            "bad_params",
            "missing or unknown params.view (listings|master|list)",
            None,
        );
    };

    let vs = state.view_mut(view);
    vs.filter = CourseFilter::default();
    vs.page = 1;
    ok(
        &req.id,
        json!({ "view": view.as_str(), "filterActive": false }),
    )
}

fn handle_set_page(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(view) = req
        .params
        .get("view")
        .and_then(|v| v.as_str())
        .and_then(ViewId::parse)
    else {
        return err(
            &req.id,
            "bad_params",
            "missing or unknown params.view (listings|master|list)",
            None,
        );
    };
    let page = match req.params.get("page").and_then(|v| v.as_u64()) {
        Some(p) if p >= 1 => p as usize,
        _ => {
            return err(
                &req.id,
                "bad_params",
                "params.page must be a positive integer",
                None,
            )
        }
    };

    let total = derive::derive_view(&state.dataset, &state.view(view).filter).len();
    let page_count = derive::page_count(total, PAGE_SIZE);
    let clamped = page.min(page_count);
    state.view_mut(view).page = clamped;
    ok(
        &req.id,
        json!({ "view": view.as_str(), "page": clamped, "pageCount": page_count }),
    )
}

fn handle_filter_options(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(view) = req
        .params
        .get("view")
        .and_then(|v| v.as_str())
        .and_then(ViewId::parse)
    else {
        return err(
            &req.id,
            "bad_params",
            "missing or unknown params.view (listings|master|list)",
            None,
        );
    };

    // Options always reflect the whole dataset, not the filtered subset,
    // so narrowing one field never hides the other fields' choices.
    let groups = derive::group_courses(&state.dataset);
    let options = derive::filter_options(&groups);
    ok(
        &req.id,
        json!({
            "view": view.as_str(),
            "options": serde_json::to_value(&options).unwrap_or(serde_json::Value::Null),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "view.query" => Some(handle_query(state, req)),
        "view.setFilters" => Some(handle_set_filters(state, req)),
        "view.clearFilters" => Some(handle_clear_filters(state, req)),
        "view.setPage" => Some(handle_set_page(state, req)),
        "view.filterOptions" => Some(handle_filter_options(state, req)),
        _ => None,
    }
}
