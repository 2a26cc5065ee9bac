//! Spreadsheet import/export for the section dataset. Columns are matched
//! by header name, not position, so reordered sheets import fine. Reading
//! goes through calamine, writing through rust_xlsxwriter.

use anyhow::{anyhow, Context};
use calamine::{open_workbook_auto, Data, Reader};
use chrono::NaiveDate;
use rust_xlsxwriter::{Color, Format, FormatBorder, FormatPattern, Workbook};
use std::collections::HashMap;
use std::path::Path;

use crate::model::{CourseKind, SectionEntry};

/// Export column order; import matches these names case-insensitively
/// with whitespace stripped.
pub const COLUMNS: [&str; 18] = [
    "semester",
    "pId",
    "sectionId",
    "courseCode",
    "courseTitle",
    "section",
    "credit",
    "type",
    "levelTerm",
    "studentCount",
    "teacherId",
    "teacherName",
    "designation",
    "teacherMobile",
    "teacherEmail",
    "classTaken",
    "weeklyClass",
    "courseType",
];

fn normalize_header(s: &str) -> String {
    s.to_lowercase().chars().filter(|c| !c.is_whitespace()).collect()
}

/// Whole floats render without the trailing `.0` so count columns survive
/// the float representation xlsx stores numbers in.
fn cell_to_string(c: &Data) -> String {
    match c {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => {
            if (f.floor() - f).abs() < f64::EPSILON {
                format!("{}", *f as i64)
            } else {
                format!("{}", f)
            }
        }
        Data::Int(i) => format!("{}", i),
        Data::Bool(b) => format!("{}", b),
        Data::Empty => String::new(),
        Data::Error(_) => String::new(),
        Data::DateTime(s) => s.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

fn parse_i64(s: &str) -> i64 {
    s.parse::<i64>()
        .or_else(|_| s.parse::<f64>().map(|f| f as i64))
        .unwrap_or(0)
}

fn parse_f64(s: &str) -> f64 {
    s.parse::<f64>().unwrap_or(0.0)
}

/// Reads the FIRST sheet of the workbook into section entries. Missing
/// cells fall back per column: generated `COURSE{n}` codes and timestamped
/// section ids keep every row addressable, counts default to zero, and an
/// unrecognized course-type label lands in `Others`.
pub fn import_entries(path: &Path) -> anyhow::Result<Vec<SectionEntry>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open workbook {}", path.to_string_lossy()))?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("workbook has no sheets"))?;
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("failed to read sheet {:?}", sheet))?;

    let mut rows = range.rows();
    let header_row = match rows.next() {
        Some(row) => row,
        None => return Ok(Vec::new()),
    };

    let mut columns: HashMap<String, usize> = HashMap::new();
    for (idx, cell) in header_row.iter().enumerate() {
        let name = normalize_header(&cell_to_string(cell));
        if !name.is_empty() {
            columns.entry(name).or_insert(idx);
        }
    }

    let col = |row: &[Data], name: &str| -> String {
        columns
            .get(name)
            .and_then(|&i| row.get(i))
            .map(cell_to_string)
            .unwrap_or_default()
    };

    let stamp = chrono::Utc::now().timestamp_millis();
    let mut entries: Vec<SectionEntry> = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for row in rows {
        if row.iter().all(|c| matches!(c, Data::Empty)) {
            continue;
        }
        let index = entries.len();

        let mut course_code = col(row, "coursecode");
        if course_code.is_empty() {
            course_code = format!("COURSE{}", index + 1);
        }
        let mut section_id = col(row, "sectionid");
        if section_id.is_empty() {
            section_id = format!("SectionID_{}_{}", stamp, index);
        }
        let mut level_term = col(row, "levelterm");
        if level_term.is_empty() {
            level_term = "N/A".to_string();
        }

        let weekly_raw = col(row, "weeklyclass");
        let weekly_class = if weekly_raw.is_empty() {
            None
        } else {
            Some(parse_i64(&weekly_raw))
        };

        let kind_raw = col(row, "coursetype");
        let course_type = if kind_raw.is_empty() {
            None
        } else {
            Some(CourseKind::parse(&kind_raw).unwrap_or(CourseKind::Others))
        };

        if let Some(prev) = seen.insert(section_id.clone(), index) {
            return Err(anyhow!(
                "duplicate sectionId {:?} (rows {} and {})",
                section_id,
                prev + 1,
                index + 1
            ));
        }

        entries.push(SectionEntry {
            section_id,
            p_id: col(row, "pid"),
            course_code,
            semester: col(row, "semester"),
            course_title: col(row, "coursetitle"),
            section: col(row, "section"),
            credit: parse_f64(&col(row, "credit")),
            category: col(row, "type"),
            level_term,
            student_count: parse_i64(&col(row, "studentcount")),
            teacher_id: col(row, "teacherid"),
            teacher_name: col(row, "teachername"),
            designation: col(row, "designation"),
            teacher_mobile: col(row, "teachermobile"),
            teacher_email: col(row, "teacheremail"),
            class_taken: parse_i64(&col(row, "classtaken")),
            weekly_class,
            course_type,
        });
    }

    Ok(entries)
}

fn entry_cells(entry: &SectionEntry) -> [String; 18] {
    [
        entry.semester.clone(),
        entry.p_id.clone(),
        entry.section_id.clone(),
        entry.course_code.clone(),
        entry.course_title.clone(),
        entry.section.clone(),
        entry.credit.to_string(),
        entry.category.clone(),
        entry.level_term.clone(),
        entry.student_count.to_string(),
        entry.teacher_id.clone(),
        entry.teacher_name.clone(),
        entry.designation.clone(),
        entry.teacher_mobile.clone(),
        entry.teacher_email.clone(),
        entry.class_taken.to_string(),
        entry
            .weekly_class
            .map(|w| w.to_string())
            .unwrap_or_default(),
        entry
            .course_type
            .map(|k| k.as_str().to_string())
            .unwrap_or_default(),
    ]
}

const NUMERIC_COLS: [usize; 4] = [6, 9, 15, 16];

/// Writes a single-sheet workbook with a styled header row. Numeric
/// columns are written as numbers; absent weekly counts and course types
/// stay blank.
pub fn export_entries(entries: &[SectionEntry], path: &Path) -> anyhow::Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    let header_format = Format::new()
        .set_bold()
        .set_font_color(Color::RGB(0xFFFFFF))
        .set_background_color(Color::RGB(0x2F75B5))
        .set_pattern(FormatPattern::Solid)
        .set_border(FormatBorder::Thin);

    let mut col_widths: Vec<usize> = COLUMNS.iter().map(|h| h.chars().count()).collect();

    for (col, header) in COLUMNS.iter().enumerate() {
        worksheet
            .write_with_format(0, col as u16, *header, &header_format)
            .context("failed to write header row")?;
    }
    worksheet.set_freeze_panes(1, 0).ok();

    for (row_index, entry) in entries.iter().enumerate() {
        let row = (row_index + 1) as u32;
        let cells = entry_cells(entry);
        for (col, value) in cells.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            if NUMERIC_COLS.contains(&col) {
                if let Ok(num) = value.parse::<f64>() {
                    worksheet
                        .write_number(row, col as u16, num)
                        .context("failed to write cell")?;
                    col_widths[col] = col_widths[col].max(value.chars().count());
                    continue;
                }
            }
            worksheet
                .write_string(row, col as u16, value.as_str())
                .context("failed to write cell")?;
            col_widths[col] = col_widths[col].max(value.chars().count());
        }
    }

    for (col, width) in col_widths.iter().enumerate() {
        worksheet
            .set_column_width(col as u16, *width as f64 + 2.0)
            .context("failed to size column")?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed to save workbook {}", path.to_string_lossy()))?;
    Ok(())
}

/// Derived export name; filtered exports are distinguishable from full
/// ones at a glance.
pub fn export_file_name(filtered: bool, date: NaiveDate) -> String {
    let scope = if filtered { "filtered" } else { "full" };
    format!("course_data_{}_{}.xlsx", scope, date.format("%Y%m%d"))
}
