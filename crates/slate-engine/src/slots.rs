//! Free-slot enumeration: "what times can I book?"

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use slate_core::{
  Error, Result, TimeInterval,
  interval,
  school::School,
  store::SchedulingTx,
};
use uuid::Uuid;

use crate::{hours::WorkingHours, oracle};

/// Start times `t`, stepping by `increment` from the start of the working
/// day, such that `[t, t + duration)` fits in the working window, misses
/// every `busy` interval, and does not start before `not_before`.
pub fn candidate_starts(
  busy: &[TimeInterval],
  hours: &WorkingHours,
  duration_minutes: u32,
  increment_minutes: u32,
  not_before: Option<NaiveTime>,
) -> Result<Vec<NaiveTime>> {
  if increment_minutes == 0 {
    return Err(Error::InvalidRange("slot increment must be positive".into()));
  }
  if duration_minutes == 0 {
    return Err(Error::InvalidRange("lesson duration must be positive".into()));
  }

  let window = hours.window()?;
  let busy = interval::merge(busy.iter().copied());
  let step = TimeDelta::minutes(i64::from(increment_minutes));

  let mut starts = Vec::new();
  let mut t = window.start();
  loop {
    let Ok(candidate) = TimeInterval::starting_at(t, duration_minutes) else {
      break;
    };
    if !window.contains(&candidate) {
      break;
    }
    let early = not_before.is_some_and(|limit| t < limit);
    if !early && !busy.iter().any(|b| b.overlaps(&candidate)) {
      starts.push(t);
    }

    let (next, wrapped) = t.overflowing_add_signed(step);
    if wrapped != 0 {
      break;
    }
    t = next;
  }
  Ok(starts)
}

/// A request for free start times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotQuery {
  pub instructor_id:     Uuid,
  pub date:              NaiveDate,
  pub duration_minutes:  u32,
  pub increment_minutes: u32,
}

/// Free start times for the queried instructor and date.
///
/// Busy time is exactly what the oracle would object to, so every returned
/// slot is schedulable for a lesson of the queried duration (absent
/// concurrent writes). When the school requires notice, starts inside the
/// notice window are dropped as well.
pub fn free_slots(
  tx: &dyn SchedulingTx,
  school: &School,
  query: SlotQuery,
  hours: &WorkingHours,
  now: NaiveDateTime,
) -> Result<Vec<NaiveTime>> {
  let not_before = if school.schedule_time_limit > 0 {
    let earliest = now + TimeDelta::hours(school.schedule_time_limit);
    if earliest.date() > query.date {
      return Ok(Vec::new());
    }
    (earliest.date() == query.date).then(|| earliest.time())
  } else {
    None
  };

  let busy: Vec<TimeInterval> = oracle::occupations(tx, query.instructor_id, query.date, None)?
    .into_iter()
    .map(|b| b.interval)
    .collect();

  candidate_starts(&busy, hours, query.duration_minutes, query.increment_minutes, not_before)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn t(h: u32, m: u32) -> NaiveTime { NaiveTime::from_hms_opt(h, m, 0).unwrap() }

  fn iv(a: u32, b: u32) -> TimeInterval { TimeInterval::new(t(a, 0), t(b, 0)).unwrap() }

  #[test]
  fn free_day_yields_every_step_that_fits() {
    let starts = candidate_starts(&[], &WorkingHours::default(), 60, 60, None).unwrap();
    assert_eq!(starts.len(), 9);
    assert_eq!(starts.first(), Some(&t(9, 0)));
    assert_eq!(starts.last(), Some(&t(17, 0)));
  }

  #[test]
  fn blocks_are_skipped() {
    let starts =
      candidate_starts(&[iv(10, 12), iv(13, 14)], &WorkingHours::default(), 60, 60, None).unwrap();
    assert_eq!(starts, vec![t(9, 0), t(12, 0), t(14, 0), t(15, 0), t(16, 0), t(17, 0)]);
  }

  #[test]
  fn finer_increment_finds_gaps_between_blocks() {
    let starts =
      candidate_starts(&[iv(9, 10), iv(11, 18)], &WorkingHours::default(), 30, 15, None).unwrap();
    assert_eq!(starts, vec![t(10, 0), t(10, 15), t(10, 30)]);
  }

  #[test]
  fn not_before_drops_early_starts() {
    let starts =
      candidate_starts(&[], &WorkingHours::default(), 60, 60, Some(t(15, 30))).unwrap();
    assert_eq!(starts, vec![t(16, 0), t(17, 0)]);
  }

  #[test]
  fn a_lesson_longer_than_the_day_has_no_slots() {
    let starts = candidate_starts(&[], &WorkingHours::default(), 600, 30, None).unwrap();
    assert!(starts.is_empty());
  }

  #[test]
  fn zero_increment_is_rejected() {
    assert!(matches!(
      candidate_starts(&[], &WorkingHours::default(), 60, 0, None),
      Err(Error::InvalidRange(_))
    ));
  }
}
