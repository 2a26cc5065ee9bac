use std::collections::HashMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::layout::{PopoverPlacement, Rect};
use crate::model::{CourseFilter, RoutineVersion, SectionEntry};
use crate::store::SlotStore;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// The three course views. All run over the same dataset with independent
/// filter, page and editor state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewId {
    Listings,
    Master,
    List,
}

impl ViewId {
    pub const ALL: [ViewId; 3] = [ViewId::Listings, ViewId::Master, ViewId::List];

    pub fn as_str(&self) -> &'static str {
        match self {
            ViewId::Listings => "listings",
            ViewId::Master => "master",
            ViewId::List => "list",
        }
    }

    pub fn parse(s: &str) -> Option<ViewId> {
        match s {
            "listings" => Some(ViewId::Listings),
            "master" => Some(ViewId::Master),
            "list" => Some(ViewId::List),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    Full,
    LevelTerm,
    Weekly,
}

impl EditorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditorMode::Full => "full",
            EditorMode::LevelTerm => "levelTerm",
            EditorMode::Weekly => "weekly",
        }
    }

    pub fn parse(s: &str) -> Option<EditorMode> {
        match s {
            "full" => Some(EditorMode::Full),
            "levelTerm" => Some(EditorMode::LevelTerm),
            "weekly" => Some(EditorMode::Weekly),
            _ => None,
        }
    }

    /// Fields this mode exposes for staging and saving.
    pub fn fields(&self) -> &'static [&'static str] {
        match self {
            EditorMode::Full => &["levelTerm", "weeklyClass", "courseType"],
            EditorMode::LevelTerm => &["levelTerm"],
            EditorMode::Weekly => &["weeklyClass"],
        }
    }
}

/// Staged edits, all kept as strings the way the inputs hold them. The
/// weekly count only ever contains digits; empty means "unset".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorDraft {
    pub level_term: String,
    pub weekly_class: String,
    pub course_type: String,
}

#[derive(Debug, Clone)]
pub struct EditorState {
    pub section_id: String,
    pub mode: EditorMode,
    pub draft: EditorDraft,
    pub placement: PopoverPlacement,
}

#[derive(Debug)]
pub struct ViewState {
    pub filter: CourseFilter,
    pub page: usize,
    pub last_keys: Vec<(String, String)>,
    pub editor: Option<EditorState>,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            filter: CourseFilter::default(),
            page: 1,
            last_keys: Vec::new(),
            editor: None,
        }
    }
}

/// One searchable dropdown panel. The anchor is remembered so the panel
/// rect can be recomputed when the query shrinks the item list.
#[derive(Debug, Default)]
pub struct DropdownPanel {
    pub open: bool,
    pub query: String,
    pub anchor: Option<Rect>,
    pub rect: Option<Rect>,
}

#[derive(Debug, Default)]
pub struct Dropdowns {
    pub teacher: DropdownPanel,
    pub program: DropdownPanel,
    pub course_section: DropdownPanel,
    pub selected_teacher: Option<String>,
    pub selected_programs: Vec<String>,
    pub selected_course_section: Option<String>,
}

/// Externally supplied per-section aggregates: classes already placed in
/// the week (CIW) and the weekly class requirement (CR).
#[derive(Debug, Default)]
pub struct RequirementCounts {
    pub ciw: HashMap<String, i64>,
    pub class_requirement: HashMap<String, i64>,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub dataset: Vec<SectionEntry>,
    pub listings: ViewState,
    pub master: ViewState,
    pub list: ViewState,
    pub dropdowns: Dropdowns,
    pub slots: Option<SlotStore>,
    pub counts: RequirementCounts,
    pub versions: Vec<RoutineVersion>,
}

impl AppState {
    pub fn new() -> AppState {
        AppState {
            workspace: None,
            dataset: Vec::new(),
            listings: ViewState::default(),
            master: ViewState::default(),
            list: ViewState::default(),
            dropdowns: Dropdowns::default(),
            slots: None,
            counts: RequirementCounts::default(),
            versions: Vec::new(),
        }
    }

    pub fn view(&self, view: ViewId) -> &ViewState {
        match view {
            ViewId::Listings => &self.listings,
            ViewId::Master => &self.master,
            ViewId::List => &self.list,
        }
    }

    pub fn view_mut(&mut self, view: ViewId) -> &mut ViewState {
        match view {
            ViewId::Listings => &mut self.listings,
            ViewId::Master => &mut self.master,
            ViewId::List => &mut self.list,
        }
    }

    pub fn find_entry(&self, section_id: &str) -> Option<&SectionEntry> {
        self.dataset.iter().find(|e| e.section_id == section_id)
    }

    pub fn find_entry_mut(&mut self, section_id: &str) -> Option<&mut SectionEntry> {
        self.dataset.iter_mut().find(|e| e.section_id == section_id)
    }

    /// After the dataset is replaced wholesale, anything pointing at an
    /// entry that no longer exists closes or clears: open editors for
    /// vanished sections, dropdown selections that no longer resolve.
    pub fn reconcile_after_replace(&mut self) {
        let section_ids: Vec<String> = self.dataset.iter().map(|e| e.section_id.clone()).collect();

        for view in ViewId::ALL {
            let editor_gone = self
                .view(view)
                .editor
                .as_ref()
                .map(|ed| !section_ids.contains(&ed.section_id))
                .unwrap_or(false);
            if editor_gone {
                self.view_mut(view).editor = None;
            }
        }

        if let Some(teacher_id) = &self.dropdowns.selected_teacher {
            if !self.dataset.iter().any(|e| &e.teacher_id == teacher_id) {
                self.dropdowns.selected_teacher = None;
            }
        }
        let programs: Vec<String> = self.dataset.iter().map(|e| e.p_id.clone()).collect();
        self.dropdowns
            .selected_programs
            .retain(|p| programs.contains(p));
        if let Some(section_id) = &self.dropdowns.selected_course_section {
            if !section_ids.contains(section_id) {
                self.dropdowns.selected_course_section = None;
            }
        }
    }
}
