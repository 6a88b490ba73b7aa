use std::fmt;

use chrono::{Datelike, NaiveDateTime};
use serde::Serialize;

use crate::slot::{ClockTime, DayOfWeek, TimetableSlot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    Upcoming,
    Ongoing,
    Finished,
}

/// Where a slot stands relative to a wall-clock minute.
///
/// `minutes` counts down to the start for `Upcoming`, to the end for
/// `Ongoing`, and is always 0 for `Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotStatus {
    pub kind: StatusKind,
    pub minutes: u16,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            StatusKind::Upcoming => write!(f, "starts in {}", format_minutes(self.minutes)),
            StatusKind::Ongoing => write!(f, "{} left", format_minutes(self.minutes)),
            StatusKind::Finished => f.write_str("finished"),
        }
    }
}

pub fn slot_status(slot: &TimetableSlot, now: ClockTime) -> SlotStatus {
    let now = now.minutes();
    let start = slot.start_time.minutes();
    let end = slot.end_time.minutes();

    if now < start {
        SlotStatus {
            kind: StatusKind::Upcoming,
            minutes: start - now,
        }
    } else if now < end {
        SlotStatus {
            kind: StatusKind::Ongoing,
            minutes: end - now,
        }
    } else {
        SlotStatus {
            kind: StatusKind::Finished,
            minutes: 0,
        }
    }
}

/// Status is only meaningful for slots scheduled on `now`'s own weekday.
pub fn status_for_today(slot: &TimetableSlot, now: NaiveDateTime) -> Option<SlotStatus> {
    if slot.day_of_week != DayOfWeek::from_weekday(now.weekday()) {
        return None;
    }
    Some(slot_status(slot, ClockTime::of(&now)))
}

pub fn format_minutes(minutes: u16) -> String {
    let hours = minutes / 60;
    let rest = minutes % 60;
    match (hours, rest) {
        (0, m) => format!("{m}m"),
        (h, 0) => format!("{h}h"),
        (h, m) => format!("{h}h {m}m"),
    }
}
