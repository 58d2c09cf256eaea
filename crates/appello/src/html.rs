use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use std::fs;
use std::path::Path;

use crate::calendar::{month_title, CalendarCell, DAY_NAMES};
use crate::controller::Banner;
use crate::render::{long_date, SheetView};
use crate::types::{AttendanceStatus, Student};

/// Write the sheet as a standalone HTML page
pub fn generate_html(view: &SheetView<'_>, path: &Path) -> Result<()> {
    let html = render_page(view);
    fs::write(path, html.into_string())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn render_page(view: &SheetView<'_>) -> Markup {
    let class = view.class_label.as_deref().unwrap_or("No class");

    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { "Attendance - " (class) }
                style { (PreEscaped(CSS)) }
            }
            body {
                div.container {
                    header {
                        h1 { (class) }
                        p.date { (long_date(view.date)) }
                        @if let Some(subject) = view.subject_name {
                            p.subject { (subject) }
                        }
                    }
                    @if let Some(banner) = view.banner {
                        (render_banner(banner))
                    }
                    div.layout {
                        (render_calendar(view))
                        div.sheet {
                            (render_stats(view))
                            @if view.editing {
                                form #"attendance-form" method="post" {
                                    (render_table(view))
                                    button type="submit" { "Save" }
                                }
                            } @else {
                                (render_table(view))
                            }
                        }
                    }
                }
            }
        }
    }
}

fn render_banner(banner: &Banner) -> Markup {
    match banner {
        Banner::Success(text) => html! { div.banner.success { (text) } },
        Banner::Failure(text) => html! {
            div.banner.failure {
                @for line in text.lines() {
                    p { (line) }
                }
            }
        },
    }
}

fn render_stats(view: &SheetView<'_>) -> Markup {
    html! {
        div.stats {
            div.stat.present { span { "Present" } strong { (view.stats.present) } }
            div.stat.absent { span { "Absent" } strong { (view.stats.absent) } }
            div.stat.late { span { "Late" } strong { (view.stats.late) } }
            div.stat.total { span { "Total" } strong { (view.stats.total) } }
        }
    }
}

fn render_table(view: &SheetView<'_>) -> Markup {
    html! {
        table {
            thead { tr { th { "Student" } th { "Status" } } }
            tbody {
                @if view.rows.is_empty() {
                    tr { td.empty colspan="2" { "No students found" } }
                }
                @for (student, status) in &view.rows {
                    tr data-student-id=(student.id) {
                        td { (render_student(student)) }
                        td {
                            @if view.editing {
                                (render_choices(student, *status))
                            } @else {
                                span class=(format!("badge {}", status.as_str())) { (status.label()) }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn render_student(student: &Student) -> Markup {
    html! {
        div.student {
            @if let Some(avatar) = &student.avatar {
                img.avatar src=(avatar) alt=(student.full_name());
            } @else {
                span.avatar.initial { (student.initial()) }
            }
            span.name { (student.full_name()) }
        }
    }
}

fn render_choices(student: &Student, current: AttendanceStatus) -> Markup {
    let name = format!("status-{}", student.id);
    html! {
        div.choices {
            @for status in AttendanceStatus::ALL.iter().filter(|s| s.is_recorded()) {
                label class=(format!("choice {}", status.as_str())) {
                    input type="radio" name=(name) value=(status.as_str()) checked[*status == current];
                    (status.label())
                }
            }
        }
    }
}

fn render_calendar(view: &SheetView<'_>) -> Markup {
    let grid = &view.grid;
    html! {
        div.calendar {
            h3 { (month_title(grid.reference())) }
            div.grid {
                @for day in DAY_NAMES {
                    div.day-name { (day) }
                }
                @for cell in grid.cells() {
                    div class=(day_class(cell, view.date)) data-date=(cell.date.format("%Y-%m-%d")) {
                        (cell.date.day())
                    }
                }
            }
        }
    }
}

fn day_class(cell: &CalendarCell, selected: NaiveDate) -> String {
    let mut class = String::from("day");
    if !cell.in_month {
        class.push_str(" overflow");
    }
    if cell.date == selected {
        class.push_str(" selected");
    }
    class
}

const CSS: &str = r#"
* { margin: 0; padding: 0; box-sizing: border-box; }
body { font-family: -apple-system, BlinkMacSystemFont, sans-serif; background: #f5f5f5; color: #171717; }
.container { max-width: 1100px; margin: 0 auto; padding: 32px 24px; }
header h1 { font-size: 1.5rem; }
header .date, header .subject { color: #525252; }
.banner { margin: 16px 0; padding: 12px; border-radius: 6px; }
.banner.success { background: #dcfce7; color: #166534; }
.banner.failure { background: #fee2e2; color: #991b1b; }
.layout { display: grid; grid-template-columns: 1fr 3fr; gap: 24px; margin-top: 24px; }
.calendar, .sheet { background: #fff; border-radius: 8px; padding: 16px; }
.calendar .grid { display: grid; grid-template-columns: repeat(7, 1fr); gap: 4px; text-align: center; }
.day-name { font-size: 0.75rem; color: #737373; }
.day { padding: 6px 0; border-radius: 4px; }
.day.overflow { color: #a3a3a3; }
.day.selected { background: #2563eb; color: #fff; font-weight: 600; }
.stats { display: grid; grid-template-columns: repeat(4, 1fr); gap: 12px; margin-bottom: 16px; }
.stat { padding: 12px; border-radius: 8px; background: #f5f5f5; display: flex; flex-direction: column; }
.stat strong { font-size: 1.5rem; }
.stat.present { color: #15803d; }
.stat.absent { color: #b91c1c; }
.stat.late { color: #b45309; }
table { width: 100%; border-collapse: collapse; }
th, td { text-align: left; padding: 10px 8px; border-bottom: 1px solid #e5e5e5; }
td.empty { text-align: center; color: #737373; }
.student { display: flex; align-items: center; gap: 12px; }
.avatar { width: 36px; height: 36px; border-radius: 50%; object-fit: cover; }
.avatar.initial { display: inline-flex; align-items: center; justify-content: center; background: #dbeafe; color: #1d4ed8; }
.badge { padding: 2px 10px; border-radius: 999px; font-size: 0.75rem; background: #f5f5f5; }
.badge.present { background: #dcfce7; color: #15803d; }
.badge.absent { background: #fee2e2; color: #b91c1c; }
.badge.late { background: #fef3c7; color: #b45309; }
.choices { display: flex; gap: 8px; }
.choice { font-size: 0.75rem; }
button { margin-top: 16px; padding: 8px 16px; border: 0; border-radius: 6px; background: #16a34a; color: #fff; }
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::MonthGrid;
    use crate::testutil::{student, ymd};
    use crate::types::AttendanceStats;
    use tempfile::TempDir;

    fn view<'a>(rows: Vec<(&'a Student, AttendanceStatus)>, editing: bool) -> SheetView<'a> {
        SheetView {
            class_label: Some("3A - Mathematics".to_string()),
            subject_name: Some("Mathematics"),
            date: ymd(2024, 2, 1),
            editing,
            rows,
            stats: AttendanceStats::default(),
            banner: None,
            grid: MonthGrid::new(ymd(2024, 2, 1)),
        }
    }

    #[test]
    fn test_read_only_page_has_badges_not_inputs() {
        let ada = student(1, "Ada", "Byron");
        let html = render_page(&view(vec![(&ada, AttendanceStatus::Absent)], false)).into_string();

        assert!(html.contains("<title>Attendance - 3A - Mathematics</title>"));
        assert!(html.contains(r#"<span class="badge absent">Absent</span>"#));
        assert!(!html.contains("<form"));
        assert!(!html.contains(r#"type="radio""#));
    }

    #[test]
    fn test_editing_page_checks_current_status() {
        let ada = student(1, "Ada", "Byron");
        let html = render_page(&view(vec![(&ada, AttendanceStatus::Late)], true)).into_string();

        assert!(html.contains(r#"<form id="attendance-form" method="post">"#));
        assert!(html.contains(r#"name="status-1" value="late" checked"#));
        assert!(!html.contains(r#"value="present" checked"#));
    }

    #[test]
    fn test_calendar_marks_selected_and_overflow_days() {
        let html = render_page(&view(Vec::new(), false)).into_string();

        assert!(html.contains("February 2024"));
        assert!(html.contains(r#"<div class="day selected" data-date="2024-02-01">1</div>"#));
        assert!(html.contains(r#"<div class="day overflow" data-date="2024-01-29">29</div>"#));
        assert!(html.contains("No students found"));
    }

    #[test]
    fn test_failure_banner_lines() {
        let banner = Banner::Failure("Could not save:\n- Ada Byron: refused".to_string());
        let mut v = view(Vec::new(), false);
        v.banner = Some(&banner);

        let html = render_page(&v).into_string();
        assert!(html.contains("<p>- Ada Byron: refused</p>"));
    }

    #[test]
    fn test_generate_html_writes_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sheet.html");

        generate_html(&view(Vec::new(), false), &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("<!DOCTYPE html>"));
    }
}
