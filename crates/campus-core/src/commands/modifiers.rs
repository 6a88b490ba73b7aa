use anyhow::anyhow;
use chrono::{
  DateTime,
  NaiveDateTime,
  Utc
};
use tracing::{
  debug,
  instrument
};
use uuid::Uuid;

use super::Roster;
use crate::datetime::{
  parse_clock_time,
  parse_day_expr
};
use crate::slot::{
  ClockTime,
  DayOfWeek,
  TimeBand,
  TimetableSlot,
  predefined_bands
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum SlotMod {
  Class(String),
  Subject(String),
  Teacher(Option<String>),
  Day(DayOfWeek),
  Band(TimeBand),
  Start(ClockTime),
  End(ClockTime),
  Room(Option<String>)
}

/// Field values collected from modifiers, with references resolved.
/// `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub(super) struct SlotDraft {
  pub class_id:   Option<Uuid>,
  pub subject_id: Option<Uuid>,
  pub teacher_id: Option<Option<Uuid>>,
  pub day:        Option<DayOfWeek>,
  pub start:      Option<ClockTime>,
  pub end:        Option<ClockTime>,
  pub room:       Option<Option<String>>
}

#[instrument(skip(args, now))]
pub(super) fn parse_slot_mods(
  args: &[String],
  now: NaiveDateTime
) -> anyhow::Result<Vec<SlotMod>> {
  let mut mods = Vec::new();
  for arg in args {
    let one_mod = parse_one_mod(arg, now)?
      .ok_or_else(|| {
        anyhow!(
          "unrecognized slot field: \
           {arg} (expected key:value)"
        )
      })?;
    mods.push(one_mod);
  }
  Ok(mods)
}

fn parse_one_mod(
  tok: &str,
  now: NaiveDateTime
) -> anyhow::Result<Option<SlotMod>> {
  let (key, value) =
    if let Some((k, v)) =
      tok.split_once(':')
    {
      (k, v)
    } else if let Some((k, v)) =
      tok.split_once('=')
    {
      (k, v)
    } else {
      return Ok(None);
    };

  let key = key.to_ascii_lowercase();
  let value = value.trim();

  match key.as_str() {
    | "class" => {
      Ok(Some(SlotMod::Class(
        value.to_string()
      )))
    }
    | "subject" => {
      Ok(Some(SlotMod::Subject(
        value.to_string()
      )))
    }
    | "teacher" => {
      Ok(Some(SlotMod::Teacher(
        non_empty(value)
      )))
    }
    | "room" | "classroom" => {
      Ok(Some(SlotMod::Room(
        non_empty(value)
      )))
    }
    | "day" => {
      Ok(Some(SlotMod::Day(
        parse_day_expr(value, now)?
      )))
    }
    | "time" => {
      let (start, end) = value
        .split_once('-')
        .ok_or_else(|| {
          anyhow!(
            "time expects START-END, \
             got: {value}"
          )
        })?;
      Ok(Some(SlotMod::Band(
        TimeBand::new(
          parse_clock_time(start)?,
          parse_clock_time(end)?
        )
      )))
    }
    | "band" => {
      Ok(Some(SlotMod::Band(
        predefined_band(value)?
      )))
    }
    | "start" => {
      Ok(Some(SlotMod::Start(
        parse_clock_time(value)?
      )))
    }
    | "end" => {
      Ok(Some(SlotMod::End(
        parse_clock_time(value)?
      )))
    }
    | _ => Ok(None)
  }
}

fn non_empty(
  value: &str
) -> Option<String> {
  let trimmed = value.trim();
  (!trimmed.is_empty())
    .then(|| trimmed.to_string())
}

fn predefined_band(
  value: &str
) -> anyhow::Result<TimeBand> {
  let bands = predefined_bands();
  let index: usize =
    value.trim().parse().map_err(
      |_| {
        anyhow!(
          "band expects a number \
           1-{}, got: {value}",
          bands.len()
        )
      }
    )?;
  index
    .checked_sub(1)
    .and_then(|idx| bands.get(idx))
    .copied()
    .ok_or_else(|| {
      anyhow!(
        "band {index} does not \
         exist (choose 1-{})",
        bands.len()
      )
    })
}

#[instrument(skip(roster, mods))]
pub(super) fn resolve_draft(
  roster: &Roster,
  mods: &[SlotMod]
) -> anyhow::Result<SlotDraft> {
  let mut draft = SlotDraft::default();
  for one_mod in mods {
    match one_mod {
      | SlotMod::Class(reference) => {
        draft.class_id = Some(
          roster.class(reference)?.id
        );
      }
      | SlotMod::Subject(reference) => {
        draft.subject_id = Some(
          roster.subject(reference)?.id
        );
      }
      | SlotMod::Teacher(reference) => {
        draft.teacher_id =
          Some(match reference {
            | Some(reference) => Some(
              roster
                .teacher(reference)?
                .id
            ),
            | None => None
          });
      }
      | SlotMod::Day(day) => {
        draft.day = Some(*day);
      }
      | SlotMod::Band(band) => {
        draft.start = Some(band.start);
        draft.end = Some(band.end);
      }
      | SlotMod::Start(start) => {
        draft.start = Some(*start);
      }
      | SlotMod::End(end) => {
        draft.end = Some(*end);
      }
      | SlotMod::Room(room) => {
        draft.room = Some(room.clone());
      }
    }
  }
  debug!(?draft, "resolved slot draft");
  Ok(draft)
}

pub(super) fn apply_draft(
  slot: &mut TimetableSlot,
  draft: &SlotDraft,
  now: DateTime<Utc>
) {
  if let Some(class_id) = draft.class_id
  {
    slot.class_id = class_id;
  }
  if let Some(subject_id) =
    draft.subject_id
  {
    slot.subject_id = subject_id;
  }
  if let Some(teacher_id) =
    draft.teacher_id
  {
    slot.teacher_id = teacher_id;
  }
  if let Some(day) = draft.day {
    slot.day_of_week = day;
  }
  if let Some(start) = draft.start {
    slot.start_time = start;
  }
  if let Some(end) = draft.end {
    slot.end_time = end;
  }
  if let Some(room) = &draft.room {
    slot.classroom = room.clone();
  }
  slot.updated_at = now;
}

pub(super) fn validate_slot(
  slot: &TimetableSlot
) -> anyhow::Result<()> {
  if slot.start_time >= slot.end_time {
    return Err(anyhow!(
      "slot must end after it \
       starts: {} - {}",
      slot.start_time,
      slot.end_time
    ));
  }
  Ok(())
}
