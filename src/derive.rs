//! Pure derivations over the section dataset: unique-course grouping,
//! filtering, sort order, pagination arithmetic, filter options and the
//! sidebar statistics. Everything here is recomputed from scratch per
//! request; nothing is cached between calls.

use serde::Serialize;
use std::collections::HashMap;

use crate::model::{CourseFilter, CourseKind, SectionEntry};

pub const PAGE_SIZE: usize = 20;

/// One unique course: every section sharing `(pId, courseCode)`. Display
/// fields come from the first section encountered; the dataset is assumed
/// (not enforced) to keep them consistent within a course. Aggregates are
/// summed over all constituent sections.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseGroup {
    pub p_id: String,
    pub course_code: String,
    pub course_title: String,
    pub credit: f64,
    #[serde(rename = "type")]
    pub category: String,
    pub level_term: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_class: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_type: Option<CourseKind>,
    pub section_count: usize,
    pub total_students: i64,
    pub total_classes_taken: i64,
    pub sections: Vec<SectionEntry>,
}

/// Composite filter label for one section: `"{courseType} ({type})"`, or
/// the bare `type` when the course type is absent, `N/A` or `Others`.
pub fn delivery_label(entry: &SectionEntry) -> String {
    match entry.course_type {
        Some(CourseKind::Na) | Some(CourseKind::Others) | None => entry.category.clone(),
        Some(kind) => format!("{} ({})", kind.as_str(), entry.category),
    }
}

/// Groups sections into unique courses, sorted by `pId` then `courseCode`
/// (lexicographic). The union of all `sections` is the input, each entry
/// exactly once.
pub fn group_courses(entries: &[SectionEntry]) -> Vec<CourseGroup> {
    let mut index: HashMap<(String, String), usize> = HashMap::new();
    let mut groups: Vec<CourseGroup> = Vec::new();

    for entry in entries {
        let key = (entry.p_id.clone(), entry.course_code.clone());
        match index.get(&key) {
            Some(&i) => {
                let group = &mut groups[i];
                group.section_count += 1;
                group.total_students += entry.student_count;
                group.total_classes_taken += entry.class_taken;
                group.sections.push(entry.clone());
            }
            None => {
                index.insert(key, groups.len());
                groups.push(CourseGroup {
                    p_id: entry.p_id.clone(),
                    course_code: entry.course_code.clone(),
                    course_title: entry.course_title.clone(),
                    credit: entry.credit,
                    category: entry.category.clone(),
                    level_term: entry.level_term.clone(),
                    weekly_class: entry.weekly_class,
                    course_type: entry.course_type,
                    section_count: 1,
                    total_students: entry.student_count,
                    total_classes_taken: entry.class_taken,
                    sections: vec![entry.clone()],
                });
            }
        }
    }

    groups.sort_by(|a, b| {
        a.p_id
            .cmp(&b.p_id)
            .then_with(|| a.course_code.cmp(&b.course_code))
    });
    groups
}

fn in_range(value: i64, min: Option<i64>, max: Option<i64>) -> bool {
    if let Some(min) = min {
        if value < min {
            return false;
        }
    }
    if let Some(max) = max {
        if value > max {
            return false;
        }
    }
    true
}

/// Conjunction of the active criteria. Multi-selects are OR within the
/// field; the course-type selection matches when ANY section's composite
/// label was selected. Range criteria apply to the whole-course aggregates.
pub fn course_matches(group: &CourseGroup, filter: &CourseFilter) -> bool {
    let query = filter.search.trim().to_lowercase();
    if !query.is_empty()
        && !group.course_code.to_lowercase().contains(&query)
        && !group.course_title.to_lowercase().contains(&query)
    {
        return false;
    }

    if !filter.level_terms.is_empty() && !filter.level_terms.contains(&group.level_term) {
        return false;
    }

    if !filter.credits.is_empty()
        && !filter
            .credits
            .iter()
            .any(|c| (c - group.credit).abs() < 1e-9)
    {
        return false;
    }

    if !filter.weekly_classes.is_empty() {
        match group.weekly_class {
            Some(w) if filter.weekly_classes.contains(&w) => {}
            _ => return false,
        }
    }

    if !filter.course_types.is_empty() {
        let any = group
            .sections
            .iter()
            .any(|s| filter.course_types.contains(&delivery_label(s)));
        if !any {
            return false;
        }
    }

    in_range(
        group.section_count as i64,
        filter.min_sections,
        filter.max_sections,
    ) && in_range(
        group.total_classes_taken,
        filter.min_classes_taken,
        filter.max_classes_taken,
    ) && in_range(
        group.total_students,
        filter.min_students,
        filter.max_students,
    )
}

/// Group + filter in one step, keeping the sorted order.
pub fn derive_view(entries: &[SectionEntry], filter: &CourseFilter) -> Vec<CourseGroup> {
    let mut groups = group_courses(entries);
    groups.retain(|g| course_matches(g, filter));
    groups
}

/// Identity of a filtered result, for page-reset detection: the ordered
/// sequence of group keys. A field edit that keeps the same courses in the
/// same order keeps the page.
pub fn group_keys(groups: &[CourseGroup]) -> Vec<(String, String)> {
    groups
        .iter()
        .map(|g| (g.p_id.clone(), g.course_code.clone()))
        .collect()
}

pub fn page_count(total: usize, page_size: usize) -> usize {
    if total == 0 {
        1
    } else {
        total.div_ceil(page_size)
    }
}

/// Section ids key every update path, so a dataset with duplicates is
/// refused at the door. Returns the first repeated id.
pub fn duplicate_section_id(entries: &[SectionEntry]) -> Option<String> {
    let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();
    for entry in entries {
        if !seen.insert(entry.section_id.as_str()) {
            return Some(entry.section_id.clone());
        }
    }
    None
}

/// Distinct values feeding the filter controls: level-terms, credits and
/// weekly-class counts from the course display values, composite delivery
/// labels from every section.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub level_terms: Vec<String>,
    pub credits: Vec<f64>,
    pub weekly_classes: Vec<i64>,
    pub course_types: Vec<String>,
}

pub fn filter_options(groups: &[CourseGroup]) -> FilterOptions {
    let mut level_terms: Vec<String> = Vec::new();
    let mut credits: Vec<f64> = Vec::new();
    let mut weekly_classes: Vec<i64> = Vec::new();
    let mut course_types: Vec<String> = Vec::new();

    for group in groups {
        if !group.level_term.is_empty() && !level_terms.contains(&group.level_term) {
            level_terms.push(group.level_term.clone());
        }
        if !credits.iter().any(|c| (c - group.credit).abs() < 1e-9) {
            credits.push(group.credit);
        }
        if let Some(w) = group.weekly_class {
            if !weekly_classes.contains(&w) {
                weekly_classes.push(w);
            }
        }
        for section in &group.sections {
            let label = delivery_label(section);
            if !label.is_empty() && !course_types.contains(&label) {
                course_types.push(label);
            }
        }
    }

    level_terms.sort();
    credits.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    weekly_classes.sort_unstable();
    course_types.sort();

    FilterOptions {
        level_terms,
        credits,
        weekly_classes,
        course_types,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetStats {
    pub section_count: usize,
    pub course_count: usize,
    pub program_count: usize,
    pub teacher_count: usize,
    pub student_total: i64,
    pub class_taken_total: i64,
}

pub fn dataset_stats(entries: &[SectionEntry]) -> DatasetStats {
    let mut programs: Vec<&str> = Vec::new();
    let mut teachers: Vec<&str> = Vec::new();
    let mut student_total = 0i64;
    let mut class_taken_total = 0i64;

    for entry in entries {
        if !entry.p_id.is_empty() && !programs.contains(&entry.p_id.as_str()) {
            programs.push(&entry.p_id);
        }
        if !entry.teacher_id.is_empty() && !teachers.contains(&entry.teacher_id.as_str()) {
            teachers.push(&entry.teacher_id);
        }
        student_total += entry.student_count;
        class_taken_total += entry.class_taken;
    }

    DatasetStats {
        section_count: entries.len(),
        course_count: group_courses(entries).len(),
        program_count: programs.len(),
        teacher_count: teachers.len(),
        student_total,
        class_taken_total,
    }
}
