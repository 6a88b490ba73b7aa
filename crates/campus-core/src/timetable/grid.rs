use std::collections::{BTreeMap, BTreeSet};

use tracing::warn;

use crate::slot::{DayOfWeek, TimeBand, TimetableSlot};
use crate::timetable::grouping::active_days;

/// Two slots that claim the same band on the same day.
///
/// The grid keeps `kept` (the later one in input order); `displaced` is the
/// slot that was written to the cell first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision<'a> {
    pub band: TimeBand,
    pub day: DayOfWeek,
    pub kept: &'a TimetableSlot,
    pub displaced: &'a TimetableSlot,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WeeklyGrid<'a> {
    pub bands: Vec<TimeBand>,
    pub days: Vec<DayOfWeek>,
    pub cells: BTreeMap<TimeBand, BTreeMap<DayOfWeek, &'a TimetableSlot>>,
    pub collisions: Vec<Collision<'a>>,
}

impl<'a> WeeklyGrid<'a> {
    pub fn cell(&self, band: TimeBand, day: DayOfWeek) -> Option<&'a TimetableSlot> {
        self.cells.get(&band).and_then(|row| row.get(&day)).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn filled_cells(&self) -> usize {
        self.cells.values().map(BTreeMap::len).sum()
    }
}

/// Projects `slots` onto a band-by-day table.
///
/// A cell exists only when some slot has exactly that band and day. When two
/// slots share a cell the later one wins and the clash is reported in
/// `collisions`.
pub fn build_grid(slots: &[TimetableSlot]) -> WeeklyGrid<'_> {
    let bands: BTreeSet<TimeBand> = slots.iter().map(TimetableSlot::band).collect();

    let mut cells: BTreeMap<TimeBand, BTreeMap<DayOfWeek, &TimetableSlot>> = BTreeMap::new();
    let mut collisions = Vec::new();

    for slot in slots {
        let band = slot.band();
        let row = cells.entry(band).or_default();
        if let Some(displaced) = row.insert(slot.day_of_week, slot) {
            warn!(
                band = %band,
                day = %slot.day_of_week,
                kept = %slot.id,
                displaced = %displaced.id,
                "two slots share one grid cell; keeping the later one"
            );
            collisions.push(Collision {
                band,
                day: slot.day_of_week,
                kept: slot,
                displaced,
            });
        }
    }

    WeeklyGrid {
        bands: bands.into_iter().collect(),
        days: active_days(slots),
        cells,
        collisions,
    }
}
