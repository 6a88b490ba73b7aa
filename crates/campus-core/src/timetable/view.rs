use std::str::FromStr;

use anyhow::anyhow;
use chrono::Datelike;

use crate::slot::{DayOfWeek, TimetableSlot};
use crate::timetable::grouping::group_by_day;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewDay {
    Today,
    Tomorrow,
}

impl FromStr for ViewDay {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(Self::Today),
            "tomorrow" => Ok(Self::Tomorrow),
            other => Err(anyhow!("expected today or tomorrow, got: {other}")),
        }
    }
}

pub fn day_index_for<D: Datelike>(now: &D, which: ViewDay) -> DayOfWeek {
    let today = DayOfWeek::from_weekday(now.weekday());
    match which {
        ViewDay::Today => today,
        ViewDay::Tomorrow => today.succ(),
    }
}

/// Slots scheduled on `day`, earliest first.
pub fn slots_for_view(slots: &[TimetableSlot], day: DayOfWeek) -> Vec<&TimetableSlot> {
    group_by_day(slots).remove(&day).unwrap_or_default()
}
