use std::io::Write;
use std::thread;

use anyhow::{
  Context,
  anyhow
};
use chrono::{
  DateTime,
  NaiveDateTime,
  Utc
};
use serde::Serialize;
use tracing::{
  debug,
  info,
  instrument
};

use super::select_class;
use crate::config::Config;
use crate::datastore::{
  DataStore,
  SlotSource
};
use crate::datetime::{
  format_school_date,
  school_now
};
use crate::render::Renderer;
use crate::slot::{
  DayOfWeek,
  TimetableSlot,
  predefined_bands
};
use crate::timetable::{
  SlotStatus,
  StatusKind,
  ViewDay,
  build_grid,
  day_index_for,
  slots_for_view,
  status_for_today
};

fn class_reference(
  args: &[String]
) -> Option<String> {
  let joined = args.join(" ");
  let trimmed = joined.trim();
  (!trimmed.is_empty())
    .then(|| trimmed.to_string())
}

#[instrument(skip(
  store, cfg, renderer, args, now, out
))]
pub(super) fn cmd_day<W: Write>(
  store: &DataStore,
  cfg: &Config,
  renderer: &Renderer,
  which: &str,
  args: &[String],
  now: DateTime<Utc>,
  out: &mut W
) -> anyhow::Result<()> {
  info!(which, "command day view");

  let view: ViewDay = which.parse()?;
  let class = select_class(
    store,
    cfg,
    class_reference(args).as_deref()
  )?;
  let local_now = school_now(now);
  let day =
    day_index_for(&local_now, view);

  let slots = store
    .fetch_slots_for_class(class.id)?;
  let selected =
    slots_for_view(&slots, day);
  debug!(
    class = %class.name,
    day = %day,
    count = selected.len(),
    "selected slots for view"
  );

  writeln!(
    out,
    "{} | {} ({})",
    class.name,
    which_label(view),
    day.name()
  )?;
  let status_clock =
    (view == ViewDay::Today)
      .then_some(local_now);
  renderer.write_day(
    out,
    &selected,
    status_clock
  )
}

fn which_label(
  view: ViewDay
) -> &'static str {
  match view {
    | ViewDay::Today => "Today",
    | ViewDay::Tomorrow => "Tomorrow"
  }
}

#[instrument(skip(
  store, cfg, renderer, args, out
))]
pub(super) fn cmd_week<W: Write>(
  store: &DataStore,
  cfg: &Config,
  renderer: &Renderer,
  args: &[String],
  out: &mut W
) -> anyhow::Result<()> {
  info!("command week");

  let class = select_class(
    store,
    cfg,
    class_reference(args).as_deref()
  )?;
  let slots = store
    .fetch_slots_for_class(class.id)?;
  let grid = build_grid(&slots);
  debug!(
    bands = grid.bands.len(),
    days = grid.days.len(),
    collisions = grid.collisions.len(),
    "assembled weekly grid"
  );

  writeln!(
    out,
    "{} | Weekly timetable",
    class.name
  )?;
  renderer.write_week(out, &grid)
}

#[derive(Debug, Clone, Default)]
struct NowOptions {
  watch: bool,
  ticks: Option<u64>,
  class: Option<String>
}

fn parse_now_options(
  args: &[String]
) -> anyhow::Result<NowOptions> {
  let mut options =
    NowOptions::default();
  let mut rest = Vec::new();
  let mut iter = args.iter();
  while let Some(arg) = iter.next() {
    match arg.as_str() {
      | "--watch" | "-w" => {
        options.watch = true;
      }
      | "--ticks" => {
        let raw =
          iter.next().ok_or_else(|| {
            anyhow!(
              "--ticks requires a \
               number"
            )
          })?;
        let ticks: u64 =
          raw.parse().with_context(
            || {
              format!(
                "invalid --ticks \
                 value: {raw}"
              )
            }
          )?;
        options.ticks = Some(ticks);
      }
      | _ => rest.push(arg.clone())
    }
  }
  options.class = class_reference(&rest);
  Ok(options)
}

/// Live board for today. With `--watch` the board is redrawn on the
/// `timetable.refresh` interval from a fresh read of the store.
#[instrument(skip(
  store, cfg, renderer, args, now, out
))]
pub(super) fn cmd_now<W: Write>(
  store: &DataStore,
  cfg: &Config,
  renderer: &Renderer,
  args: &[String],
  now: DateTime<Utc>,
  out: &mut W
) -> anyhow::Result<()> {
  info!("command now");

  let options = parse_now_options(args)?;
  let interval = cfg.refresh_interval()?;
  let limit = if options.watch {
    options.ticks
  } else {
    Some(1)
  };

  let mut tick_now = now;
  let mut ticks = 0_u64;
  loop {
    let class = select_class(
      store,
      cfg,
      options.class.as_deref()
    )?;
    let slots = store
      .fetch_slots_for_class(class.id)?;
    let local_now =
      school_now(tick_now);
    let today = day_index_for(
      &local_now,
      ViewDay::Today
    );
    let selected =
      slots_for_view(&slots, today);

    writeln!(
      out,
      "{} | {} {}",
      class.name,
      format_school_date(tick_now),
      local_now.format("%H:%M")
    )?;
    renderer.write_day(
      out,
      &selected,
      Some(local_now)
    )?;
    writeln!(
      out,
      "{}",
      summarize(&selected, local_now)
    )?;
    out.flush()?;

    ticks += 1;
    if limit.is_some_and(|max| ticks >= max)
    {
      break;
    }

    debug!(
      ticks,
      interval_secs = interval.as_secs(),
      "waiting for next refresh"
    );
    thread::sleep(interval);
    tick_now = Utc::now();
    writeln!(out)?;
  }

  Ok(())
}

fn summarize(
  slots: &[&TimetableSlot],
  now: NaiveDateTime
) -> String {
  let statuses: Vec<(
    &TimetableSlot,
    SlotStatus
  )> = slots
    .iter()
    .filter_map(|slot| {
      status_for_today(slot, now)
        .map(|status| (*slot, status))
    })
    .collect();

  if statuses.is_empty() {
    return "Nothing scheduled today."
      .to_string();
  }

  if let Some((slot, status)) = statuses
    .iter()
    .find(|(_, status)| {
      status.kind == StatusKind::Ongoing
    })
  {
    return format!(
      "Now: {} ({status})",
      slot.subject_label()
    );
  }

  if let Some((slot, status)) = statuses
    .iter()
    .find(|(_, status)| {
      status.kind == StatusKind::Upcoming
    })
  {
    return format!(
      "Next: {} ({status})",
      slot.subject_label()
    );
  }

  "All classes finished for today."
    .to_string()
}

#[instrument(skip(renderer, out))]
pub(super) fn cmd_bands<W: Write>(
  renderer: &Renderer,
  out: &mut W
) -> anyhow::Result<()> {
  let rows = predefined_bands()
    .into_iter()
    .enumerate()
    .map(|(idx, band)| {
      vec![
        (idx + 1).to_string(),
        band.start.to_string(),
        band.end.to_string(),
      ]
    })
    .collect();
  renderer.write_rows(
    out,
    &["Band", "Start", "End"],
    rows
  )
}

#[derive(Debug, Serialize)]
struct ExportSlot<'a> {
  id:           String,
  class_id:     String,
  class:        Option<&'a str>,
  subject_id:   String,
  subject:      Option<&'a str>,
  teacher_id:   Option<String>,
  teacher:      Option<&'a str>,
  day_of_week:  DayOfWeek,
  day_name:     &'static str,
  start_time:   String,
  end_time:     String,
  classroom:    Option<&'a str>
}

impl<'a> From<&'a TimetableSlot>
  for ExportSlot<'a>
{
  fn from(slot: &'a TimetableSlot) -> Self {
    Self {
      id:          slot.id.to_string(),
      class_id:    slot
        .class_id
        .to_string(),
      class:       slot
        .class_name
        .as_deref(),
      subject_id:  slot
        .subject_id
        .to_string(),
      subject:     slot
        .subject_name
        .as_deref(),
      teacher_id:  slot
        .teacher_id
        .map(|id| id.to_string()),
      teacher:     slot
        .teacher_name
        .as_deref(),
      day_of_week: slot.day_of_week,
      day_name:    slot
        .day_of_week
        .name(),
      start_time:  slot
        .start_time
        .to_storage_string(),
      end_time:    slot
        .end_time
        .to_storage_string(),
      classroom:   slot
        .classroom
        .as_deref()
    }
  }
}

#[instrument(skip(store, cfg, args, out))]
pub(super) fn cmd_export<W: Write>(
  store: &DataStore,
  cfg: &Config,
  args: &[String],
  out: &mut W
) -> anyhow::Result<()> {
  info!("command export");

  let slots = match class_reference(args)
  {
    | Some(reference)
      if reference != "all" =>
    {
      let class = select_class(
        store,
        cfg,
        Some(reference.as_str())
      )?;
      store
        .fetch_slots_for_class(class.id)?
    }
    | _ => store.fetch_all_slots()?
  };

  let rows: Vec<ExportSlot<'_>> =
    slots.iter().map(ExportSlot::from).collect();
  let serialized =
    serde_json::to_string(&rows)?;
  writeln!(out, "{serialized}")?;
  Ok(())
}
