use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Timelike, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::datetime::compact_date_serde;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

const DAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Day-of-week index with Sunday as 0 and Saturday as 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct DayOfWeek(u8);

impl DayOfWeek {
    pub const SUNDAY: Self = Self(0);
    pub const MONDAY: Self = Self(1);
    pub const TUESDAY: Self = Self(2);
    pub const WEDNESDAY: Self = Self(3);
    pub const THURSDAY: Self = Self(4);
    pub const FRIDAY: Self = Self(5);
    pub const SATURDAY: Self = Self(6);

    pub fn new(index: u8) -> Option<Self> {
        (index < 7).then_some(Self(index))
    }

    pub fn from_weekday(weekday: Weekday) -> Self {
        Self(weekday.num_days_from_sunday() as u8)
    }

    pub fn all() -> impl Iterator<Item = Self> {
        (0..7).map(Self)
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn succ(self) -> Self {
        Self((self.0 + 1) % 7)
    }

    pub fn name(self) -> &'static str {
        DAY_NAMES[self.0 as usize]
    }

    pub fn short_name(self) -> &'static str {
        &DAY_NAMES[self.0 as usize][..3]
    }
}

impl TryFrom<u8> for DayOfWeek {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| anyhow!("day_of_week out of range 0-6: {value}"))
    }
}

impl From<DayOfWeek> for u8 {
    fn from(day: DayOfWeek) -> Self {
        day.0
    }
}

impl fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Wall-clock time of day at minute precision.
///
/// Seconds are accepted on input and dropped, so `"08:00:59"` and `"08:00"`
/// compare equal. Ordering is numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime(u16);

impl ClockTime {
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        if hour > 23 || minute > 59 {
            return None;
        }
        Some(Self((hour * 60 + minute) as u16))
    }

    pub fn of<T: Timelike>(time: &T) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    pub fn hour(self) -> u16 {
        self.0 / 60
    }

    pub fn minute(self) -> u16 {
        self.0 % 60
    }

    pub fn to_storage_string(self) -> String {
        format!("{:02}:{:02}:00", self.hour(), self.minute())
    }
}

impl FromStr for ClockTime {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let mut parts = raw.splitn(3, ':');

        let hour = parts
            .next()
            .filter(|part| (1..=2).contains(&part.len()) && all_digits(part))
            .and_then(|part| part.parse::<u32>().ok())
            .ok_or_else(|| anyhow!("invalid time of day (expected HH:MM[:SS]): {raw}"))?;
        let minute = parts
            .next()
            .filter(|part| part.len() == 2 && all_digits(part))
            .and_then(|part| part.parse::<u32>().ok())
            .ok_or_else(|| anyhow!("invalid time of day (expected HH:MM[:SS]): {raw}"))?;

        if let Some(seconds) = parts.next() {
            let whole = seconds.split('.').next().unwrap_or_default();
            let valid = whole.len() == 2
                && all_digits(whole)
                && whole.parse::<u32>().map(|value| value < 60).unwrap_or(false);
            if !valid {
                return Err(anyhow!("invalid seconds in time of day: {raw}"));
            }
        }

        Self::from_hm(hour, minute).ok_or_else(|| anyhow!("time of day out of range: {raw}"))
    }
}

fn all_digits(part: &str) -> bool {
    part.bytes().all(|b| b.is_ascii_digit())
}

impl TryFrom<String> for ClockTime {
    type Error = anyhow::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(time: ClockTime) -> Self {
        time.to_storage_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

/// A `(start, end)` pair used as a row key of the weekly grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeBand {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl TimeBand {
    pub fn new(start: ClockTime, end: ClockTime) -> Self {
        Self { start, end }
    }

    pub fn length_minutes(self) -> u16 {
        self.end.minutes().saturating_sub(self.start.minutes())
    }
}

impl FromStr for TimeBand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| anyhow!("expected START-END time band, got: {s}"))?;
        Ok(Self::new(start.parse()?, end.parse()?))
    }
}

impl fmt::Display for TimeBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

pub fn predefined_bands() -> Vec<TimeBand> {
    [(8, 10), (10, 12), (12, 14)]
        .into_iter()
        .filter_map(|(start, end)| {
            Some(TimeBand::new(
                ClockTime::from_hm(start, 0)?,
                ClockTime::from_hm(end, 0)?,
            ))
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimetableSlot {
    pub id: Uuid,

    pub class_id: Uuid,

    pub subject_id: Uuid,

    #[serde(default)]
    pub teacher_id: Option<Uuid>,

    pub day_of_week: DayOfWeek,

    pub start_time: ClockTime,

    pub end_time: ClockTime,

    #[serde(default)]
    pub classroom: Option<String>,

    #[serde(with = "compact_date_serde")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "compact_date_serde")]
    pub updated_at: DateTime<Utc>,

    #[serde(skip)]
    pub class_name: Option<String>,

    #[serde(skip)]
    pub subject_name: Option<String>,

    #[serde(skip)]
    pub teacher_name: Option<String>,
}

impl TimetableSlot {
    pub fn new(
        class_id: Uuid,
        subject_id: Uuid,
        day_of_week: DayOfWeek,
        band: TimeBand,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            class_id,
            subject_id,
            teacher_id: None,
            day_of_week,
            start_time: band.start,
            end_time: band.end,
            classroom: None,
            created_at: now,
            updated_at: now,
            class_name: None,
            subject_name: None,
            teacher_name: None,
        }
    }

    pub fn band(&self) -> TimeBand {
        TimeBand::new(self.start_time, self.end_time)
    }

    pub fn subject_label(&self) -> &str {
        self.subject_name.as_deref().unwrap_or("(unknown subject)")
    }

    pub fn short_id(&self) -> String {
        self.id.simple().to_string()[..8].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::{ClockTime, DayOfWeek, TimeBand, predefined_bands};

    #[test]
    fn clock_time_truncates_seconds() {
        let with_seconds: ClockTime = "09:05:59".parse().expect("parse with seconds");
        let plain: ClockTime = "09:05".parse().expect("parse plain");
        assert_eq!(with_seconds, plain);
        assert_eq!(plain.minutes(), 9 * 60 + 5);
        assert_eq!(plain.to_storage_string(), "09:05:00");

        let fractional: ClockTime = "13:30:00.000000".parse().expect("parse fractional");
        assert_eq!(fractional.to_string(), "13:30");
    }

    #[test]
    fn clock_time_orders_numerically_without_padding() {
        let nine: ClockTime = "9:00".parse().expect("parse unpadded");
        let ten: ClockTime = "10:00".parse().expect("parse ten");
        assert!(nine < ten);
    }

    #[test]
    fn clock_time_rejects_malformed_input() {
        for raw in [
            "", "24:00", "12:60", "noon", "12", "12:5", "12:00:61", "123:00", "09:+5", "+9:00",
            "09:00:+1", "9:-1",
        ] {
            assert!(raw.parse::<ClockTime>().is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn day_of_week_wraps_and_rejects_out_of_range() {
        assert_eq!(DayOfWeek::SATURDAY.succ(), DayOfWeek::SUNDAY);
        assert_eq!(DayOfWeek::MONDAY.name(), "Monday");
        assert_eq!(DayOfWeek::THURSDAY.short_name(), "Thu");
        assert!(DayOfWeek::new(7).is_none());
        assert!(serde_json::from_str::<DayOfWeek>("9").is_err());
        assert_eq!(
            serde_json::from_str::<DayOfWeek>("3").expect("valid day"),
            DayOfWeek::WEDNESDAY
        );
    }

    #[test]
    fn time_band_parses_and_lists_predefined() {
        let band: TimeBand = "08:00-10:00".parse().expect("parse band");
        assert_eq!(band.length_minutes(), 120);
        assert_eq!(band.to_string(), "08:00 - 10:00");

        let bands = predefined_bands();
        assert_eq!(bands.len(), 3);
        assert_eq!(bands[0], band);
        assert_eq!(bands[2].to_string(), "12:00 - 14:00");
    }
}
