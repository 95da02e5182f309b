//! Unavailability windows and the rewrites that keep them disjoint.
//!
//! For any actor and date the stored windows never overlap. Both rewrite
//! functions take the actor's current windows on one date and return the
//! deletes, updates, and inserts that restore that invariant after a window
//! is declared busy ([`absorb`]) or free ([`carve`]).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  interval::{Remainder, TimeInterval},
  school::ActorRef,
};

/// A window during which an actor cannot be scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unavailability {
  pub unavailability_id: Uuid,
  pub actor:             ActorRef,
  pub date:              NaiveDate,
  pub interval:          TimeInterval,
  pub school_id:         Option<Uuid>,
}

impl Unavailability {
  pub fn new(
    actor: ActorRef,
    date: NaiveDate,
    interval: TimeInterval,
    school_id: Option<Uuid>,
  ) -> Self {
    Self { unavailability_id: Uuid::new_v4(), actor, date, interval, school_id }
  }

  pub fn duration_minutes(&self) -> i64 { self.interval.duration_minutes() }

  fn with_interval(&self, interval: TimeInterval) -> Self { Self { interval, ..self.clone() } }
}

/// Changes to apply to one actor's windows on one date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rewrite {
  pub deleted: Vec<Uuid>,
  pub updated: Vec<Unavailability>,
  pub created: Vec<Unavailability>,
}

impl Rewrite {
  pub fn is_empty(&self) -> bool {
    self.deleted.is_empty() && self.updated.is_empty() && self.created.is_empty()
  }
}

/// Declare `window` free: delete, truncate, or split every overlapping window.
///
/// A split keeps the original id on the left piece and gives the right piece
/// a fresh id.
pub fn carve(existing: &[Unavailability], window: TimeInterval) -> Rewrite {
  let mut rewrite = Rewrite::default();
  for current in existing.iter().filter(|u| u.interval.overlaps(&window)) {
    match current.interval.subtract(&window) {
      Remainder::Empty => rewrite.deleted.push(current.unavailability_id),
      Remainder::One(rest) => rewrite.updated.push(current.with_interval(rest)),
      Remainder::Two(left, right) => {
        rewrite.updated.push(current.with_interval(left));
        rewrite.created.push(Unavailability::new(
          current.actor,
          current.date,
          right,
          current.school_id,
        ));
      }
    }
  }
  rewrite
}

/// Declare `window` busy: merge it with every window it overlaps or touches.
///
/// The earliest absorbed window survives with the merged interval; the rest
/// are deleted. Returns the rewrite and the window that now covers `window`.
pub fn absorb(
  existing: &[Unavailability],
  actor: ActorRef,
  date: NaiveDate,
  window: TimeInterval,
  school_id: Option<Uuid>,
) -> (Rewrite, Unavailability) {
  let mut touching: Vec<&Unavailability> =
    existing.iter().filter(|u| u.interval.touches(&window)).collect();
  touching.sort_by_key(|u| u.interval);

  let mut rewrite = Rewrite::default();
  let Some((keeper, rest)) = touching.split_first() else {
    let created = Unavailability::new(actor, date, window, school_id);
    rewrite.created.push(created.clone());
    return (rewrite, created);
  };

  let merged = rest.iter().fold(keeper.interval.hull(&window), |acc, u| acc.hull(&u.interval));
  let survivor = keeper.with_interval(merged);
  if survivor.interval != keeper.interval {
    rewrite.updated.push(survivor.clone());
  }
  rewrite.deleted.extend(rest.iter().map(|u| u.unavailability_id));
  (rewrite, survivor)
}

/// Apply `rewrite` to an in-memory list of windows.
pub fn apply(existing: &mut Vec<Unavailability>, rewrite: &Rewrite) {
  existing.retain(|u| !rewrite.deleted.contains(&u.unavailability_id));
  for updated in &rewrite.updated {
    if let Some(slot) =
      existing.iter_mut().find(|u| u.unavailability_id == updated.unavailability_id)
    {
      *slot = updated.clone();
    }
  }
  existing.extend(rewrite.created.iter().cloned());
  existing.sort_by_key(|u| u.interval);
}

#[cfg(test)]
mod tests {
  use chrono::NaiveTime;

  use super::*;

  fn iv(a: u32, b: u32) -> TimeInterval {
    TimeInterval::new(
      NaiveTime::from_hms_opt(a, 0, 0).unwrap(),
      NaiveTime::from_hms_opt(b, 0, 0).unwrap(),
    )
    .unwrap()
  }

  fn date() -> NaiveDate { NaiveDate::from_ymd_opt(2025, 1, 24).unwrap() }

  fn window(actor: ActorRef, a: u32, b: u32) -> Unavailability {
    Unavailability::new(actor, date(), iv(a, b), None)
  }

  fn intervals(list: &[Unavailability]) -> Vec<TimeInterval> {
    list.iter().map(|u| u.interval).collect()
  }

  fn assert_disjoint(list: &[Unavailability]) {
    for (i, a) in list.iter().enumerate() {
      for b in &list[i + 1..] {
        assert!(!a.interval.overlaps(&b.interval), "{} overlaps {}", a.interval, b.interval);
      }
    }
  }

  #[test]
  fn carving_the_middle_splits_in_two() {
    let actor = ActorRef::Instructor(Uuid::new_v4());
    let original = window(actor, 9, 13);
    let mut list = vec![original.clone()];

    let rewrite = carve(&list, iv(10, 12));
    assert_eq!(rewrite.updated.len(), 1);
    assert_eq!(rewrite.created.len(), 1);
    assert_eq!(rewrite.updated[0].unavailability_id, original.unavailability_id);

    apply(&mut list, &rewrite);
    assert_eq!(intervals(&list), vec![iv(9, 10), iv(12, 13)]);
  }

  #[test]
  fn carving_across_two_windows_truncates_both() {
    let actor = ActorRef::Instructor(Uuid::new_v4());
    let mut list = vec![window(actor, 9, 11), window(actor, 11, 13)];

    let rewrite = carve(&list, iv(10, 12));
    apply(&mut list, &rewrite);
    assert_eq!(intervals(&list), vec![iv(9, 10), iv(12, 13)]);
  }

  #[test]
  fn carving_a_covering_window_deletes() {
    let actor = ActorRef::Student(Uuid::new_v4());
    let mut list = vec![window(actor, 10, 11), window(actor, 14, 15)];

    let rewrite = carve(&list, iv(9, 12));
    assert_eq!(rewrite.deleted.len(), 1);
    apply(&mut list, &rewrite);
    assert_eq!(intervals(&list), vec![iv(14, 15)]);
  }

  #[test]
  fn absorbing_merges_overlapping_and_touching_windows() {
    let actor = ActorRef::Instructor(Uuid::new_v4());
    let mut list = vec![window(actor, 9, 10), window(actor, 11, 12), window(actor, 15, 16)];

    let (rewrite, merged) = absorb(&list, actor, date(), iv(10, 11), None);
    assert_eq!(merged.interval, iv(9, 12));
    apply(&mut list, &rewrite);
    assert_eq!(intervals(&list), vec![iv(9, 12), iv(15, 16)]);
    assert_disjoint(&list);
  }

  #[test]
  fn absorbing_a_contained_window_changes_nothing() {
    let actor = ActorRef::Instructor(Uuid::new_v4());
    let list = vec![window(actor, 9, 13)];

    let (rewrite, covering) = absorb(&list, actor, date(), iv(10, 11), None);
    assert!(rewrite.is_empty());
    assert_eq!(covering, list[0]);
  }

  #[test]
  fn carve_then_absorb_restores_the_original_window() {
    let actor = ActorRef::Instructor(Uuid::new_v4());
    let original = vec![window(actor, 9, 13)];
    let mut list = original.clone();

    let freed = carve(&list, iv(10, 12));
    apply(&mut list, &freed);
    let (rewrite, _) = absorb(&list, actor, date(), iv(10, 12), None);
    apply(&mut list, &rewrite);

    assert_eq!(list, original);
  }
}
