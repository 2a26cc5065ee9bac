use serde::{Deserialize, Serialize};

/// Delivery kind of a course offering. `N/A` is a real value in the source
/// data, not an absence marker, so it gets its own variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourseKind {
    Theory,
    Lab,
    Thesis,
    Project,
    Internship,
    Viva,
    Others,
    #[serde(rename = "N/A")]
    Na,
}

impl CourseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseKind::Theory => "Theory",
            CourseKind::Lab => "Lab",
            CourseKind::Thesis => "Thesis",
            CourseKind::Project => "Project",
            CourseKind::Internship => "Internship",
            CourseKind::Viva => "Viva",
            CourseKind::Others => "Others",
            CourseKind::Na => "N/A",
        }
    }

    /// Case-insensitive parse of the known labels. Returns `None` for
    /// anything else; callers decide whether that is an error or `Others`.
    pub fn parse(s: &str) -> Option<CourseKind> {
        match s.trim().to_ascii_lowercase().as_str() {
            "theory" => Some(CourseKind::Theory),
            "lab" => Some(CourseKind::Lab),
            "thesis" => Some(CourseKind::Thesis),
            "project" => Some(CourseKind::Project),
            "internship" => Some(CourseKind::Internship),
            "viva" => Some(CourseKind::Viva),
            "others" => Some(CourseKind::Others),
            "n/a" | "na" => Some(CourseKind::Na),
            _ => None,
        }
    }
}

/// One course section row. `sectionId` is the identity every update path
/// keys on; `pId` + `courseCode` is the grouping key for course views.
/// Only `levelTerm`, `weeklyClass` and `courseType` are mutable after
/// import.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionEntry {
    pub section_id: String,
    pub p_id: String,
    pub course_code: String,
    #[serde(default)]
    pub semester: String,
    #[serde(default)]
    pub course_title: String,
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub credit: f64,
    #[serde(rename = "type", default)]
    pub category: String,
    #[serde(default)]
    pub level_term: String,
    #[serde(default)]
    pub student_count: i64,
    #[serde(default)]
    pub teacher_id: String,
    #[serde(default)]
    pub teacher_name: String,
    #[serde(default)]
    pub designation: String,
    #[serde(default)]
    pub teacher_mobile: String,
    #[serde(default)]
    pub teacher_email: String,
    #[serde(default)]
    pub class_taken: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weekly_class: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_type: Option<CourseKind>,
}

/// `N/A` or `L{digits}T{digits}`, e.g. `L1T2`.
pub fn is_valid_level_term(s: &str) -> bool {
    if s == "N/A" {
        return true;
    }
    let rest = match s.strip_prefix('L') {
        Some(rest) => rest,
        None => return false,
    };
    let (level, term) = match rest.split_once('T') {
        Some(parts) => parts,
        None => return false,
    };
    !level.is_empty()
        && !term.is_empty()
        && level.chars().all(|c| c.is_ascii_digit())
        && term.chars().all(|c| c.is_ascii_digit())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotKind {
    Theory,
    Lab,
}

impl SlotKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotKind::Theory => "Theory",
            SlotKind::Lab => "Lab",
        }
    }

    pub fn parse(s: &str) -> Option<SlotKind> {
        match s.trim().to_ascii_lowercase().as_str() {
            "theory" => Some(SlotKind::Theory),
            "lab" => Some(SlotKind::Lab),
            _ => None,
        }
    }
}

/// A reusable timetable slot template, persisted per workspace. Times are
/// 24h `HH:MM` strings, same-day, end after start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultTimeSlot {
    pub id: String,
    pub kind: SlotKind,
    pub start_time: String,
    pub end_time: String,
}

/// Per-view filter state. Every field defaults to inactive; the views patch
/// individual fields and leave the rest in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CourseFilter {
    pub search: String,
    pub level_terms: Vec<String>,
    pub course_types: Vec<String>,
    pub credits: Vec<f64>,
    pub weekly_classes: Vec<i64>,
    pub min_sections: Option<i64>,
    pub max_sections: Option<i64>,
    pub min_classes_taken: Option<i64>,
    pub max_classes_taken: Option<i64>,
    pub min_students: Option<i64>,
    pub max_students: Option<i64>,
}

impl CourseFilter {
    pub fn is_active(&self) -> bool {
        !self.search.trim().is_empty()
            || !self.level_terms.is_empty()
            || !self.course_types.is_empty()
            || !self.credits.is_empty()
            || !self.weekly_classes.is_empty()
            || self.min_sections.is_some()
            || self.max_sections.is_some()
            || self.min_classes_taken.is_some()
            || self.max_classes_taken.is_some()
            || self.min_students.is_some()
            || self.max_students.is_some()
    }
}

/// Named in-memory snapshot of the dataset, for the sidebar's version list.
#[derive(Debug, Clone)]
pub struct RoutineVersion {
    pub id: String,
    pub name: String,
    pub saved_at: String,
    pub entries: Vec<SectionEntry>,
}
