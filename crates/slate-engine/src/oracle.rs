//! The conflict oracle: may an instructor (or student) take a given interval?
//!
//! An instructor is blocked on a date by their own unavailability windows,
//! by the private lessons and group classes they teach, and by every activity
//! held that day. Activities block regardless of who staffs them.

use chrono::NaiveDate;
use serde::Serialize;
use slate_core::{
  Blocker, BlockerKind, Error, Result, TimeInterval,
  school::ActorRef,
  store::SchedulingTx,
};
use tracing::debug;
use uuid::Uuid;

/// The oracle's answer for one booking request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
  pub ok:                   bool,
  /// Set when no instructor was requested and one was found free.
  pub suggested_instructor: Option<Uuid>,
  /// Everything in the way when `ok` is false.
  pub blockers:             Vec<Blocker>,
}

/// Every occupation of `instructor_id` on `date`, ordered by start.
///
/// `exclude` drops one lesson from consideration, so a lesson being moved
/// never blocks itself.
pub fn occupations(
  tx: &dyn SchedulingTx,
  instructor_id: Uuid,
  date: NaiveDate,
  exclude: Option<Uuid>,
) -> Result<Vec<Blocker>> {
  let mut blockers: Vec<Blocker> = tx
    .unavailabilities_of(ActorRef::Instructor(instructor_id), date)?
    .into_iter()
    .map(|u| Blocker {
      kind: BlockerKind::Unavailability,
      reference: u.unavailability_id,
      date,
      interval: u.interval,
    })
    .collect();

  for lesson in tx.lessons_with_instructor_on(instructor_id, date)? {
    if Some(lesson.lesson_id) == exclude || lesson.is_cancelled {
      continue;
    }
    let Some(slot) = lesson.slot else { continue };
    blockers.push(Blocker {
      kind: if lesson.is_private() { BlockerKind::PrivateLesson } else { BlockerKind::GroupClass },
      reference: lesson.lesson_id,
      date,
      interval: slot.interval,
    });
  }

  blockers.extend(tx.activities_on(date)?.into_iter().map(|a| Blocker {
    kind: BlockerKind::Activity,
    reference: a.activity_id,
    date,
    interval: a.interval,
  }));

  blockers.sort_by_key(|b| (b.interval, b.reference));
  Ok(blockers)
}

/// The occupations of `instructor_id` that overlap `interval` on `date`.
pub fn conflicts(
  tx: &dyn SchedulingTx,
  instructor_id: Uuid,
  date: NaiveDate,
  interval: TimeInterval,
  exclude: Option<Uuid>,
) -> Result<Vec<Blocker>> {
  let mut blockers = occupations(tx, instructor_id, date, exclude)?;
  blockers.retain(|b| b.interval.overlaps(&interval));
  Ok(blockers)
}

/// Decide whether `interval` on `date` can be booked.
///
/// With a concrete instructor this is a plain conflict check. Without one,
/// the school's instructors are tried in name order and the first free one
/// is suggested.
pub fn available(
  tx: &dyn SchedulingTx,
  school_id: Uuid,
  instructor: Option<Uuid>,
  date: NaiveDate,
  interval: TimeInterval,
  exclude: Option<Uuid>,
) -> Result<Availability> {
  if let Some(instructor_id) = instructor {
    let blockers = conflicts(tx, instructor_id, date, interval, exclude)?;
    debug!(%instructor_id, %date, %interval, blockers = blockers.len(), "oracle checked instructor");
    return Ok(Availability { ok: blockers.is_empty(), suggested_instructor: None, blockers });
  }

  let mut instructors = tx.instructors_of_school(school_id)?;
  if instructors.is_empty() {
    return Err(Error::IllegalState(format!("school {school_id} has no instructors")));
  }
  instructors.sort_by(|a, b| a.name.cmp(&b.name).then(a.instructor_id.cmp(&b.instructor_id)));

  let mut all_blockers = Vec::new();
  for instructor in instructors {
    let blockers = conflicts(tx, instructor.instructor_id, date, interval, exclude)?;
    if blockers.is_empty() {
      debug!(instructor_id = %instructor.instructor_id, %date, %interval, "oracle suggested instructor");
      return Ok(Availability {
        ok:                   true,
        suggested_instructor: Some(instructor.instructor_id),
        blockers:             Vec::new(),
      });
    }
    all_blockers.extend(blockers);
  }

  all_blockers.sort_by_key(|b| (b.interval, b.reference));
  all_blockers.dedup_by_key(|b| b.reference);
  debug!(%school_id, %date, %interval, "oracle found no free instructor");
  Ok(Availability { ok: false, suggested_instructor: None, blockers: all_blockers })
}

/// The student's unavailability windows that overlap `interval` on `date`.
pub fn student_conflicts(
  tx: &dyn SchedulingTx,
  student_id: Uuid,
  date: NaiveDate,
  interval: TimeInterval,
) -> Result<Vec<Blocker>> {
  Ok(
    tx.unavailabilities_of(ActorRef::Student(student_id), date)?
      .into_iter()
      .filter(|u| u.interval.overlaps(&interval))
      .map(|u| Blocker {
        kind: BlockerKind::Unavailability,
        reference: u.unavailability_id,
        date,
        interval: u.interval,
      })
      .collect(),
  )
}

/// False iff the student has an overlapping unavailability window.
pub fn student_available(
  tx: &dyn SchedulingTx,
  student_id: Uuid,
  date: NaiveDate,
  interval: TimeInterval,
) -> Result<bool> {
  Ok(student_conflicts(tx, student_id, date, interval)?.is_empty())
}
