//! Month grid computation for the date picker.
//!
//! The grid always has 6 rows of 7 days, Monday first. Cells before the 1st
//! and after the last day of the month are filled with days from the
//! neighbouring months.

use chrono::{Datelike, Months, NaiveDate};

pub const DAYS_PER_WEEK: usize = 7;
pub const GRID_CELLS: usize = 6 * DAYS_PER_WEEK;

/// Column headers, Monday first.
pub const DAY_NAMES: [&str; DAYS_PER_WEEK] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarCell {
    pub date: NaiveDate,
    /// False for overflow days borrowed from the previous or next month
    pub in_month: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthGrid {
    reference: NaiveDate,
    cells: Vec<CalendarCell>,
}

impl MonthGrid {
    pub fn new(reference: NaiveDate) -> Self {
        let first = first_of_month(reference);
        let offset = first.weekday().num_days_from_monday() as u64;
        let start = first - chrono::Days::new(offset);

        let cells = start
            .iter_days()
            .take(GRID_CELLS)
            .map(|date| CalendarCell {
                date,
                in_month: date.year() == first.year() && date.month() == first.month(),
            })
            .collect();

        Self { reference, cells }
    }

    pub fn reference(&self) -> NaiveDate {
        self.reference
    }

    pub fn cells(&self) -> &[CalendarCell] {
        &self.cells
    }

    /// Number of overflow days before the 1st of the month.
    pub fn leading_days(&self) -> usize {
        self.cells.iter().take_while(|c| !c.in_month).count()
    }

    pub fn weeks(&self) -> impl Iterator<Item = &[CalendarCell]> {
        self.cells.chunks(DAYS_PER_WEEK)
    }

    /// Row and column (both zero-based) of a date inside the grid.
    pub fn position(&self, date: NaiveDate) -> Option<(usize, usize)> {
        self.cells
            .iter()
            .position(|c| c.date == date)
            .map(|idx| (idx / DAYS_PER_WEEK, idx % DAYS_PER_WEEK))
    }
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Same day one month earlier, clamped to the end of a shorter month.
pub fn previous_month(date: NaiveDate) -> NaiveDate {
    date.checked_sub_months(Months::new(1)).unwrap_or(date)
}

/// Same day one month later, clamped to the end of a shorter month.
pub fn next_month(date: NaiveDate) -> NaiveDate {
    date.checked_add_months(Months::new(1)).unwrap_or(date)
}

pub fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// e.g. "February 2024"
pub fn month_title(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}
