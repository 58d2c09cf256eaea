//! Plain-text rendering of the attendance sheet for the terminal.

use chrono::{Datelike, NaiveDate};
use std::fmt::Write;

use crate::api::AttendanceApi;
use crate::calendar::{month_title, MonthGrid, DAY_NAMES};
use crate::controller::{AttendanceController, Banner};
use crate::types::{AttendanceStats, AttendanceStatus, Student};

/// Everything a renderer needs, captured from the controller.
pub struct SheetView<'a> {
    pub class_label: Option<String>,
    pub subject_name: Option<&'a str>,
    pub date: NaiveDate,
    pub editing: bool,
    pub rows: Vec<(&'a Student, AttendanceStatus)>,
    pub stats: AttendanceStats,
    pub banner: Option<&'a Banner>,
    pub grid: MonthGrid,
}

impl<'a> SheetView<'a> {
    pub fn capture<A: AttendanceApi>(controller: &'a AttendanceController<A>, query: &str) -> Self {
        let rows = controller
            .visible_students(query)
            .into_iter()
            .map(|s| (s, controller.status_of(s.id)))
            .collect();

        Self {
            class_label: controller.selected_class().map(|c| c.label()),
            subject_name: controller.selected_subject_name(),
            date: controller.selected_date(),
            editing: controller.is_editing(),
            rows,
            stats: controller.stats(),
            banner: controller.banner(),
            grid: controller.month_grid(),
        }
    }
}

/// e.g. "Thursday 1 February 2024"
pub fn long_date(date: NaiveDate) -> String {
    date.format("%A %-d %B %Y").to_string()
}

fn badge(status: AttendanceStatus) -> &'static str {
    match status {
        AttendanceStatus::Present => "[P] Present",
        AttendanceStatus::Absent => "[A] Absent",
        AttendanceStatus::Late => "[L] Late",
        AttendanceStatus::None => "[ ] Not set",
    }
}

/// The sheet as aligned text. In edit mode every status is listed with the
/// current one marked.
pub fn sheet_text(view: &SheetView<'_>) -> String {
    let mut out = String::new();

    let class = view.class_label.as_deref().unwrap_or("No class");
    let subject = view.subject_name.unwrap_or("no subject");
    let _ = writeln!(out, "{} ({}) - {}", class, subject, long_date(view.date));

    if let Some(banner) = view.banner {
        match banner {
            Banner::Success(text) => {
                let _ = writeln!(out, "OK: {}", text);
            }
            Banner::Failure(text) => {
                let _ = writeln!(out, "ERROR: {}", text);
            }
        }
    }

    let _ = writeln!(
        out,
        "Present {}  Absent {}  Late {}  Total {}",
        view.stats.present, view.stats.absent, view.stats.late, view.stats.total
    );
    out.push('\n');

    if view.rows.is_empty() {
        out.push_str("No students found\n");
        return out;
    }

    let width = view
        .rows
        .iter()
        .map(|(s, _)| s.full_name().chars().count())
        .max()
        .unwrap_or(0);

    for (student, status) in &view.rows {
        let name = student.full_name();
        if view.editing {
            let choices: Vec<String> = AttendanceStatus::ALL
                .iter()
                .filter(|s| s.is_recorded())
                .map(|s| {
                    if s == status {
                        format!("({})", s)
                    } else {
                        s.to_string()
                    }
                })
                .collect();
            let _ = writeln!(out, "{:>5}  {:<width$}  {}", student.id, name, choices.join(" "));
        } else {
            let _ = writeln!(out, "{:>5}  {:<width$}  {}", student.id, name, badge(*status));
        }
    }

    out
}

/// Month grid with the selected day in brackets and overflow days dimmed
/// to a dot.
pub fn grid_text(grid: &MonthGrid, selected: NaiveDate) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", month_title(grid.reference()));
    let _ = writeln!(out, "{}", DAY_NAMES.map(|d| format!("{:>4}", d)).join(""));

    for week in grid.weeks() {
        for cell in week {
            let day = cell.date.day();
            let text = if cell.date == selected {
                format!("[{:>2}]", day)
            } else if cell.in_month {
                format!("{:>4}", day)
            } else {
                format!("{:>4}", ".")
            };
            out.push_str(&text);
        }
        out.push('\n');
    }

    out
}
