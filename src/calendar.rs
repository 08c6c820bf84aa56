use chrono::{Datelike, NaiveDate};

use crate::entity::{CalendarEvent, EventKind};

const MAX_INDICATORS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndicatorColor {
    Blue,
    Red,
    Green,
    Yellow,
    Gray,
}

pub fn indicator_color(kind: &EventKind) -> IndicatorColor {
    match kind {
        EventKind::Training => IndicatorColor::Blue,
        EventKind::Tournament => IndicatorColor::Red,
        EventKind::VodReview => IndicatorColor::Green,
        EventKind::Personal => IndicatorColor::Yellow,
        EventKind::Other(_) => IndicatorColor::Gray,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarDay {
    pub day: u32,
    pub date: String,
    pub indicators: Vec<IndicatorColor>,
    pub titles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalendarMonth {
    pub year: i32,
    pub month: u32,
    /// Empty cells before the 1st, weeks starting on Sunday.
    pub leading_blanks: u32,
    pub days: Vec<CalendarDay>,
}

impl CalendarMonth {
    pub fn title(&self) -> String {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .map(|d| d.format("%B %Y").to_string())
            .unwrap_or_default()
    }

    pub fn day(&self, day: u32) -> Option<&CalendarDay> {
        self.days.iter().find(|d| d.day == day)
    }
}

/// View model for one month. Events match on their `YYYY-MM-DD` date string.
pub fn build_month(year: i32, month: u32, events: &[CalendarEvent]) -> CalendarMonth {
    let Some(first) = NaiveDate::from_ymd_opt(year, month, 1) else {
        return CalendarMonth {
            year,
            month,
            leading_blanks: 0,
            days: Vec::new(),
        };
    };
    let total = days_in_month(year, month);
    let days = (1..=total)
        .map(|day| {
            let date = format!("{year}-{month:02}-{day:02}");
            let on_day: Vec<&CalendarEvent> = events.iter().filter(|e| e.date == date).collect();
            CalendarDay {
                day,
                indicators: on_day
                    .iter()
                    .take(MAX_INDICATORS)
                    .map(|e| indicator_color(&e.kind))
                    .collect(),
                titles: on_day.iter().map(|e| e.title.clone()).collect(),
                date,
            }
        })
        .collect();

    CalendarMonth {
        year,
        month,
        leading_blanks: first.weekday().num_days_from_sunday(),
        days,
    }
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    match (
        NaiveDate::from_ymd_opt(year, month, 1),
        NaiveDate::from_ymd_opt(ny, nm, 1),
    ) {
        (Some(a), Some(b)) => (b - a).num_days() as u32,
        _ => 0,
    }
}

/// Move `(year, month)` by `delta` months.
pub fn shift_month(year: i32, month: u32, delta: i32) -> (i32, u32) {
    let index = year * 12 + (month as i32 - 1) + delta;
    (index.div_euclid(12), index.rem_euclid(12) as u32 + 1)
}

/// Accepts `YYYY-MM-DD` only.
pub fn is_valid_date(raw: &str) -> bool {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").is_ok()
}
