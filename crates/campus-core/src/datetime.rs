use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{
  DateTime,
  NaiveDateTime,
  Utc
};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;

use crate::slot::{
  ClockTime,
  DayOfWeek
};
use crate::timetable::{
  ViewDay,
  day_index_for
};

const TIMEZONE_CONFIG_FILE: &str =
  "campus-time.toml";
const TIMEZONE_ENV_VAR: &str =
  "CAMPUS_TIMEZONE";
const TIMEZONE_CONFIG_ENV_VAR: &str =
  "CAMPUS_TIME_CONFIG";
const DEFAULT_SCHOOL_TIMEZONE: &str =
  "UTC";

#[derive(Debug, Deserialize)]
struct TimezoneConfig {
  timezone: Option<String>,
  time:     Option<TimezoneSection>
}

#[derive(Debug, Deserialize)]
struct TimezoneSection {
  timezone: Option<String>
}

pub fn school_timezone() -> &'static Tz
{
  static SCHOOL_TZ: OnceLock<Tz> =
    OnceLock::new();
  SCHOOL_TZ.get_or_init(
    resolve_school_timezone
  )
}

/// Wall-clock reading at the school, which is what slot times are
/// expressed in.
#[must_use]
pub fn school_now(
  now: DateTime<Utc>
) -> NaiveDateTime {
  now.with_timezone(school_timezone())
    .naive_local()
}

#[must_use]
pub fn format_school_date(
  now: DateTime<Utc>
) -> String {
  now.with_timezone(school_timezone())
    .format("%A %Y-%m-%d")
    .to_string()
}

fn resolve_school_timezone() -> Tz {
  if let Ok(raw) =
    std::env::var(TIMEZONE_ENV_VAR)
  {
    if let Some(tz) = parse_timezone(
      &raw,
      TIMEZONE_ENV_VAR
    ) {
      return tz;
    }
  }

  if let Some(path) =
    timezone_config_path()
    && let Some(tz) =
      load_timezone_from_file(&path)
  {
    return tz;
  }

  parse_timezone(
    DEFAULT_SCHOOL_TIMEZONE,
    "DEFAULT_SCHOOL_TIMEZONE"
  )
  .unwrap_or_else(|| {
    tracing::error!(
      "failed to parse fallback \
       timezone; using UTC"
    );
    chrono_tz::UTC
  })
}

fn timezone_config_path()
-> Option<PathBuf> {
  if let Ok(raw) = std::env::var(
    TIMEZONE_CONFIG_ENV_VAR
  ) {
    let trimmed = raw.trim();
    if !trimmed.is_empty() {
      return Some(PathBuf::from(
        trimmed
      ));
    }
  }

  std::env::current_dir().ok().map(
    |dir| {
      dir.join(TIMEZONE_CONFIG_FILE)
    }
  )
}

fn load_timezone_from_file(
  path: &PathBuf
) -> Option<Tz> {
  if !path.exists() {
    tracing::debug!(
      file = %path.display(),
      "timezone config file not found"
    );
    return None;
  }

  let raw = match fs::read_to_string(
    path
  ) {
    | Ok(raw) => raw,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed reading timezone config file"
      );
      return None;
    }
  };

  let parsed = match toml::from_str::<
    TimezoneConfig
  >(&raw)
  {
    | Ok(parsed) => parsed,
    | Err(err) => {
      tracing::error!(
        file = %path.display(),
        error = %err,
        "failed parsing timezone config file"
      );
      return None;
    }
  };

  let timezone =
    parsed.timezone.or_else(|| {
      parsed.time.and_then(|section| {
        section.timezone
      })
    });
  let Some(timezone) = timezone else {
    tracing::warn!(
      file = %path.display(),
      "timezone config had no timezone field"
    );
    return None;
  };

  parse_timezone(
    timezone.as_str(),
    &format!("file:{}", path.display())
  )
}

fn parse_timezone(
  raw: &str,
  source: &str
) -> Option<Tz> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    tracing::warn!(
      source,
      "timezone source was empty"
    );
    return None;
  }

  match trimmed.parse::<Tz>() {
    | Ok(tz) => {
      tracing::info!(
        source,
        timezone = %trimmed,
        "configured school timezone"
      );
      Some(tz)
    }
    | Err(err) => {
      tracing::error!(
        source,
        timezone = %trimmed,
        error = %err,
        "failed to parse timezone id"
      );
      None
    }
  }
}

/// Accepts `today`, `tomorrow`, weekday names and abbreviations, or a
/// bare 0-6 index.
#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_day_expr(
  input: &str,
  now: NaiveDateTime
) -> anyhow::Result<DayOfWeek> {
  let lower =
    input.trim().to_ascii_lowercase();

  if let Ok(view) =
    lower.parse::<ViewDay>()
  {
    return Ok(day_index_for(
      &now, view
    ));
  }

  if let Some(day) =
    parse_weekday_name(&lower)
  {
    return Ok(day);
  }

  if let Ok(index) = lower.parse::<u8>()
  {
    return DayOfWeek::try_from(index);
  }

  Err(anyhow!(
    "unrecognized day: {input} \
     (expected a weekday name, \
     today, tomorrow or 0-6 with \
     0 = Sunday)"
  ))
}

fn parse_weekday_name(
  token: &str
) -> Option<DayOfWeek> {
  match token.trim() {
    | "sunday" | "sun" => {
      Some(DayOfWeek::SUNDAY)
    }
    | "monday" | "mon" => {
      Some(DayOfWeek::MONDAY)
    }
    | "tuesday" | "tue" | "tues" => {
      Some(DayOfWeek::TUESDAY)
    }
    | "wednesday" | "wed" => {
      Some(DayOfWeek::WEDNESDAY)
    }
    | "thursday" | "thu" | "thur"
    | "thurs" => {
      Some(DayOfWeek::THURSDAY)
    }
    | "friday" | "fri" => {
      Some(DayOfWeek::FRIDAY)
    }
    | "saturday" | "sat" => {
      Some(DayOfWeek::SATURDAY)
    }
    | _ => None
  }
}

/// Parses `15:23`, `08:00:00` or `3:23pm` style clock times.
pub fn parse_clock_time(
  token: &str
) -> anyhow::Result<ClockTime> {
  let trimmed = token.trim();
  let clock_re = Regex::new(
    r"(?i)^(?P<hour>\d{1,2}):(?P<minute>\d{2})(:[0-5]\d)?\s*(?P<ampm>[ap]m)?$",
  )
  .map_err(|e| {
    anyhow!(
      "internal regex compile \
       failure: {e}"
    )
  })?;
  let captures = clock_re
    .captures(trimmed)
    .ok_or_else(|| {
      anyhow!(
        "invalid clock time: \
         {trimmed} (expected HH:MM, \
         HH:MM:SS or H:MMam/pm)"
      )
    })?;

  let raw_hour = captures
    .name("hour")
    .map(|m| m.as_str())
    .unwrap_or_default()
    .parse::<u32>()?;
  let minute = captures
    .name("minute")
    .map(|m| m.as_str())
    .unwrap_or_default()
    .parse::<u32>()?;

  let hour = if let Some(ampm_match) =
    captures.name("ampm")
  {
    if raw_hour == 0 || raw_hour > 12 {
      return Err(anyhow!(
        "invalid 12-hour clock time: \
         {trimmed}"
      ));
    }
    match ampm_match
      .as_str()
      .to_ascii_lowercase()
      .as_str()
    {
      | "am" => raw_hour % 12,
      | _ => raw_hour % 12 + 12
    }
  } else {
    raw_hour
  };

  ClockTime::from_hm(hour, minute)
    .ok_or_else(|| {
      anyhow!(
        "clock time out of range: \
         {trimmed}"
      )
    })
}

#[cfg(test)]
mod tests {
  use chrono::{
    NaiveDate,
    NaiveDateTime
  };

  use super::{
    parse_clock_time,
    parse_day_expr
  };
  use crate::slot::{
    ClockTime,
    DayOfWeek
  };

  fn saturday_noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(
      2026, 2, 21
    )
    .and_then(|date| {
      date.and_hms_opt(12, 0, 0)
    })
    .expect("valid now")
  }

  #[test]
  fn parses_day_names_and_indices() {
    let now = saturday_noon();
    assert_eq!(
      parse_day_expr("Monday", now)
        .expect("parse monday"),
      DayOfWeek::MONDAY
    );
    assert_eq!(
      parse_day_expr("thu", now)
        .expect("parse thu"),
      DayOfWeek::THURSDAY
    );
    assert_eq!(
      parse_day_expr("0", now)
        .expect("parse index"),
      DayOfWeek::SUNDAY
    );
    assert!(
      parse_day_expr("7", now).is_err()
    );
    assert!(
      parse_day_expr("someday", now)
        .is_err()
    );
  }

  #[test]
  fn relative_days_follow_the_clock() {
    let now = saturday_noon();
    assert_eq!(
      parse_day_expr("today", now)
        .expect("parse today"),
      DayOfWeek::SATURDAY
    );
    assert_eq!(
      parse_day_expr("tomorrow", now)
        .expect("parse tomorrow"),
      DayOfWeek::SUNDAY
    );
  }

  #[test]
  fn parses_clock_times() {
    assert_eq!(
      parse_clock_time("15:23")
        .expect("24h")
        .to_string(),
      "15:23"
    );
    assert_eq!(
      parse_clock_time("3:23pm")
        .expect("pm")
        .to_string(),
      "15:23"
    );
    assert_eq!(
      parse_clock_time("12:05am")
        .expect("midnight hour")
        .to_string(),
      "00:05"
    );
    assert_eq!(
      parse_clock_time("12:30 PM")
        .expect("noon hour")
        .to_string(),
      "12:30"
    );
    assert_eq!(
      parse_clock_time("08:00:00")
        .expect("with seconds")
        .to_string(),
      "08:00"
    );
    assert!(
      parse_clock_time("25:00").is_err()
    );
    assert!(
      parse_clock_time("13:00pm")
        .is_err()
    );
  }

  #[test]
  fn clock_time_parsers_agree_on_seconds() {
    for raw in [
      "08:00:61", "08:00:60", "08:+5",
      "+8:00"
    ] {
      assert!(
        parse_clock_time(raw).is_err(),
        "{raw} should be rejected"
      );
      assert!(
        raw.parse::<ClockTime>().is_err(),
        "{raw} should be rejected"
      );
    }
    assert_eq!(
      parse_clock_time("08:15:59")
        .expect("regex path"),
      "08:15:59"
        .parse::<ClockTime>()
        .expect("from_str path")
    );
  }
}

pub mod compact_date_serde {
  use chrono::{
    DateTime,
    NaiveDateTime,
    Utc
  };
  use serde::{
    Deserialize,
    Deserializer,
    Serializer
  };

  const FORMAT: &str = "%Y%m%dT%H%M%SZ";

  pub fn serialize<S>(
    dt: &DateTime<Utc>,
    serializer: S
  ) -> Result<S::Ok, S::Error>
  where
    S: Serializer
  {
    serializer.serialize_str(
      &dt.format(FORMAT).to_string()
    )
  }

  pub fn deserialize<'de, D>(
    deserializer: D
  ) -> Result<DateTime<Utc>, D::Error>
  where
    D: Deserializer<'de>
  {
    let raw = String::deserialize(
      deserializer
    )?;
    NaiveDateTime::parse_from_str(
      &raw, FORMAT
    )
    .map(|ndt| {
      DateTime::<Utc>::from_naive_utc_and_offset(ndt, Utc)
    })
    .map_err(serde::de::Error::custom)
  }
}
