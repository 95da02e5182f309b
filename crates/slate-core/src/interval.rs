//! Half-open time-of-day intervals and the handful of set operations the
//! engine builds on.
//!
//! Every interval lives on a single date: `[start, end)` with `start < end`,
//! and never crosses midnight. Callers split multi-day windows before they
//! reach this module.

use std::cmp::{max, min};

use chrono::{NaiveTime, TimeDelta};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── TimeInterval ────────────────────────────────────────────────────────────

/// A half-open interval `[start, end)` within one day.
///
/// # Invariants
/// `start < end`. Enforced by every constructor, including deserialisation.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize,
  Deserialize,
)]
#[serde(try_from = "RawInterval")]
pub struct TimeInterval {
  start: NaiveTime,
  end:   NaiveTime,
}

#[derive(Deserialize)]
struct RawInterval {
  start: NaiveTime,
  end:   NaiveTime,
}

impl TryFrom<RawInterval> for TimeInterval {
  type Error = Error;

  fn try_from(raw: RawInterval) -> Result<Self> { Self::new(raw.start, raw.end) }
}

impl TimeInterval {
  /// Build `[start, end)`. Fails with [`Error::InvalidRange`] unless
  /// `start < end`.
  pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
    if start >= end {
      return Err(Error::InvalidRange(format!(
        "start {start} is not before end {end}"
      )));
    }
    Ok(Self { start, end })
  }

  /// Build `[start, start + minutes)`. Fails if `minutes` is zero or the
  /// interval would run past midnight.
  pub fn starting_at(start: NaiveTime, minutes: u32) -> Result<Self> {
    if minutes == 0 {
      return Err(Error::InvalidRange("duration must be positive".into()));
    }
    let (end, wrapped) =
      start.overflowing_add_signed(TimeDelta::minutes(i64::from(minutes)));
    if wrapped != 0 {
      return Err(Error::InvalidRange(format!(
        "{minutes} minutes from {start} crosses midnight"
      )));
    }
    Self::new(start, end)
  }

  pub fn start(&self) -> NaiveTime { self.start }

  pub fn end(&self) -> NaiveTime { self.end }

  pub fn duration_minutes(&self) -> i64 { (self.end - self.start).num_minutes() }

  /// `self.start < other.end && self.end > other.start`.
  pub fn overlaps(&self, other: &Self) -> bool {
    self.start < other.end && self.end > other.start
  }

  /// True when `other` lies entirely inside `self`.
  pub fn contains(&self, other: &Self) -> bool {
    self.start <= other.start && other.end <= self.end
  }

  /// True when the two intervals overlap or share an endpoint.
  pub fn touches(&self, other: &Self) -> bool {
    self.start <= other.end && other.start <= self.end
  }

  /// Smallest interval covering both.
  pub fn hull(&self, other: &Self) -> Self {
    Self { start: min(self.start, other.start), end: max(self.end, other.end) }
  }

  /// Remove `other` from `self`.
  ///
  /// | case | result |
  /// |------|--------|
  /// | disjoint | `self` |
  /// | `other ⊇ self` | empty |
  /// | `other` covers the left part | `[other.end, self.end)` |
  /// | `other` covers the right part | `[self.start, other.start)` |
  /// | `other ⊂ self` strictly | `[self.start, other.start)`, `[other.end, self.end)` |
  pub fn subtract(&self, other: &Self) -> Remainder {
    if !self.overlaps(other) {
      return Remainder::One(*self);
    }
    let left = (other.start > self.start)
      .then(|| Self { start: self.start, end: other.start });
    let right =
      (other.end < self.end).then(|| Self { start: other.end, end: self.end });
    match (left, right) {
      (None, None) => Remainder::Empty,
      (Some(one), None) | (None, Some(one)) => Remainder::One(one),
      (Some(l), Some(r)) => Remainder::Two(l, r),
    }
  }
}

impl std::fmt::Display for TimeInterval {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "[{}, {})", self.start.format("%H:%M"), self.end.format("%H:%M"))
  }
}

// ─── Remainder ───────────────────────────────────────────────────────────────

/// What is left of an interval after [`TimeInterval::subtract`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remainder {
  Empty,
  One(TimeInterval),
  Two(TimeInterval, TimeInterval),
}

impl Remainder {
  pub fn into_vec(self) -> Vec<TimeInterval> {
    match self {
      Self::Empty => Vec::new(),
      Self::One(a) => vec![a],
      Self::Two(a, b) => vec![a, b],
    }
  }
}

// ─── Merge ───────────────────────────────────────────────────────────────────

/// Sort `intervals` and coalesce entries that overlap or touch.
pub fn merge(intervals: impl IntoIterator<Item = TimeInterval>) -> Vec<TimeInterval> {
  let mut sorted: Vec<TimeInterval> = intervals.into_iter().collect();
  sorted.sort();

  let mut merged: Vec<TimeInterval> = Vec::with_capacity(sorted.len());
  for iv in sorted {
    match merged.last_mut() {
      Some(last) if last.touches(&iv) => *last = last.hull(&iv),
      _ => merged.push(iv),
    }
  }
  merged
}

#[cfg(test)]
mod tests {
  use super::*;

  fn t(h: u32, m: u32) -> NaiveTime { NaiveTime::from_hms_opt(h, m, 0).unwrap() }

  fn iv(a: u32, b: u32) -> TimeInterval { TimeInterval::new(t(a, 0), t(b, 0)).unwrap() }

  #[test]
  fn rejects_empty_and_inverted_ranges() {
    assert!(matches!(
      TimeInterval::new(t(10, 0), t(10, 0)),
      Err(Error::InvalidRange(_))
    ));
    assert!(matches!(
      TimeInterval::new(t(11, 0), t(10, 0)),
      Err(Error::InvalidRange(_))
    ));
  }

  #[test]
  fn starting_at_computes_end_and_refuses_midnight() {
    let lesson = TimeInterval::starting_at(t(10, 0), 90).unwrap();
    assert_eq!(lesson.end(), t(11, 30));
    assert_eq!(lesson.duration_minutes(), 90);

    assert!(TimeInterval::starting_at(t(23, 30), 30).is_err());
    assert!(TimeInterval::starting_at(t(10, 0), 0).is_err());
  }

  #[test]
  fn overlap_is_half_open() {
    assert!(iv(9, 11).overlaps(&iv(10, 12)));
    assert!(!iv(9, 10).overlaps(&iv(10, 11)));
    assert!(iv(9, 10).touches(&iv(10, 11)));
    assert!(iv(9, 13).contains(&iv(10, 12)));
  }

  #[test]
  fn subtract_covers_every_case() {
    assert_eq!(iv(10, 12).subtract(&iv(9, 13)), Remainder::Empty);
    assert_eq!(iv(9, 11).subtract(&iv(8, 10)), Remainder::One(iv(10, 11)));
    assert_eq!(iv(9, 11).subtract(&iv(10, 12)), Remainder::One(iv(9, 10)));
    assert_eq!(
      iv(9, 13).subtract(&iv(10, 12)),
      Remainder::Two(iv(9, 10), iv(12, 13))
    );
    assert_eq!(iv(9, 10).subtract(&iv(10, 11)), Remainder::One(iv(9, 10)));
  }

  #[test]
  fn merge_coalesces_touching_and_overlapping() {
    let merged = merge([iv(13, 14), iv(9, 10), iv(10, 11), iv(15, 17), iv(16, 18)]);
    assert_eq!(merged, vec![iv(9, 11), iv(13, 14), iv(15, 18)]);
  }

  #[test]
  fn deserialisation_enforces_ordering() {
    let ok: TimeInterval =
      serde_json::from_str(r#"{"start":"09:00:00","end":"10:00:00"}"#).unwrap();
    assert_eq!(ok, iv(9, 10));

    let bad = serde_json::from_str::<TimeInterval>(
      r#"{"start":"10:00:00","end":"09:00:00"}"#,
    );
    assert!(bad.is_err());
  }
}
