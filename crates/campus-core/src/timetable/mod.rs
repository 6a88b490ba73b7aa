//! Read-only views derived from a snapshot of timetable slots.
//!
//! Nothing here touches the datastore or the clock: callers pass the slot
//! collection and the current wall-clock reading in, and get plain data
//! back. Every structure is rebuilt from scratch on each call.

pub mod grid;
pub mod grouping;
pub mod status;
pub mod view;

pub use grid::{Collision, WeeklyGrid, build_grid};
pub use grouping::{active_days, flatten, group_by_day};
pub use status::{SlotStatus, StatusKind, slot_status, status_for_today};
pub use view::{ViewDay, day_index_for, slots_for_view};

#[cfg(test)]
pub(crate) mod fixtures {
  use chrono::{
    TimeZone,
    Utc
  };
  use uuid::Uuid;

  use crate::slot::{
    DayOfWeek,
    TimeBand,
    TimetableSlot
  };

  pub fn slot(
    day: u8,
    band: &str,
    subject: &str
  ) -> TimetableSlot {
    slot_for_class(
      Uuid::nil(),
      day,
      band,
      subject
    )
  }

  pub fn slot_for_class(
    class_id: Uuid,
    day: u8,
    band: &str,
    subject: &str
  ) -> TimetableSlot {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 16, 7, 0, 0
      )
      .single()
      .expect("valid fixture time");
    let band: TimeBand = band
      .parse()
      .expect("valid fixture band");
    let day = DayOfWeek::new(day)
      .expect("valid fixture day");
    let mut slot = TimetableSlot::new(
      class_id,
      Uuid::new_v4(),
      day,
      band,
      now
    );
    slot.subject_name =
      Some(subject.to_string());
    slot
  }

  pub fn subjects<'a>(
    slots: &[&'a TimetableSlot]
  ) -> Vec<&'a str> {
    slots
      .iter()
      .map(|slot| slot.subject_label())
      .collect()
  }
}
