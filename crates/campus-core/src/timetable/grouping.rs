use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::slot::{DayOfWeek, TimetableSlot};

pub type DayBuckets<'a> = BTreeMap<DayOfWeek, Vec<&'a TimetableSlot>>;

/// Partitions `slots` by weekday, each bucket ordered by start time.
///
/// Ties on start time fall back to end time and then id, so the result does
/// not depend on the order of `slots`. Days without slots have no entry.
pub fn group_by_day(slots: &[TimetableSlot]) -> DayBuckets<'_> {
    let mut grouped: DayBuckets<'_> = BTreeMap::new();
    for slot in slots {
        grouped.entry(slot.day_of_week).or_default().push(slot);
    }
    for bucket in grouped.values_mut() {
        bucket.sort_by(|a, b| compare_within_day(a, b));
    }
    grouped
}

pub fn active_days(slots: &[TimetableSlot]) -> Vec<DayOfWeek> {
    let mut days: Vec<DayOfWeek> = slots.iter().map(|slot| slot.day_of_week).collect();
    days.sort_unstable();
    days.dedup();
    days
}

pub fn flatten<'a>(grouped: &DayBuckets<'a>) -> Vec<&'a TimetableSlot> {
    grouped.values().flatten().copied().collect()
}

pub(crate) fn compare_within_day(a: &TimetableSlot, b: &TimetableSlot) -> Ordering {
    a.start_time
        .cmp(&b.start_time)
        .then_with(|| a.end_time.cmp(&b.end_time))
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{active_days, flatten, group_by_day};
    use crate::slot::{DayOfWeek, TimetableSlot};
    use crate::timetable::fixtures::{slot, subjects};

    fn sample() -> Vec<TimetableSlot> {
        vec![
            slot(3, "08:00-10:00", "Math"),
            slot(1, "10:00-12:00", "Physics"),
            slot(5, "9:00-9:45", "Art"),
            slot(1, "08:00-10:00", "Math"),
            slot(5, "10:00-11:00", "Music"),
            slot(0, "12:00-14:00", "Chemistry"),
        ]
    }

    #[test]
    fn groups_the_reference_week() {
        let slots = vec![
            slot(1, "08:00-10:00", "Math"),
            slot(1, "10:00-12:00", "Physics"),
            slot(3, "08:00-10:00", "Math"),
        ];
        let grouped = group_by_day(&slots);

        assert_eq!(grouped.len(), 2);
        assert_eq!(subjects(&grouped[&DayOfWeek::MONDAY]), vec!["Math", "Physics"]);
        assert_eq!(subjects(&grouped[&DayOfWeek::WEDNESDAY]), vec!["Math"]);
        assert_eq!(
            active_days(&slots),
            vec![DayOfWeek::MONDAY, DayOfWeek::WEDNESDAY]
        );
    }

    #[test]
    fn buckets_are_sorted_numerically() {
        let slots = sample();
        let grouped = group_by_day(&slots);
        for bucket in grouped.values() {
            assert!(
                bucket
                    .windows(2)
                    .all(|pair| pair[0].start_time <= pair[1].start_time)
            );
        }
        assert_eq!(subjects(&grouped[&DayOfWeek::FRIDAY]), vec!["Art", "Music"]);
    }

    #[test]
    fn every_slot_lands_in_exactly_one_bucket() {
        let slots = sample();
        let grouped = group_by_day(&slots);

        let mut seen: HashMap<uuid::Uuid, usize> = HashMap::new();
        for (day, bucket) in &grouped {
            for slot in bucket {
                assert_eq!(slot.day_of_week, *day);
                *seen.entry(slot.id).or_default() += 1;
            }
        }
        assert_eq!(seen.len(), slots.len());
        assert!(seen.values().all(|count| *count == 1));
    }

    #[test]
    fn regrouping_flattened_output_is_idempotent() {
        let slots = sample();
        let grouped = group_by_day(&slots);
        let flattened: Vec<TimetableSlot> = flatten(&grouped).into_iter().cloned().collect();
        let regrouped = group_by_day(&flattened);

        assert_eq!(grouped, regrouped);
    }

    #[test]
    fn input_order_does_not_matter() {
        let slots = sample();
        let mut reversed = slots.clone();
        reversed.reverse();

        assert_eq!(group_by_day(&slots), group_by_day(&reversed));
        assert_eq!(active_days(&slots), active_days(&reversed));
    }

    #[test]
    fn active_days_are_distinct_and_ascending() {
        let days = active_days(&sample());
        assert_eq!(
            days,
            vec![
                DayOfWeek::SUNDAY,
                DayOfWeek::MONDAY,
                DayOfWeek::WEDNESDAY,
                DayOfWeek::FRIDAY
            ]
        );
    }

    #[test]
    fn empty_input_yields_empty_views() {
        assert!(group_by_day(&[]).is_empty());
        assert!(active_days(&[]).is_empty());
    }
}
