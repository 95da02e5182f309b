//! Defining unavailability and availability windows.
//!
//! Both operations rewrite the actor's windows date by date so they stay
//! pairwise disjoint. Declaring a window busy never fails because of existing
//! bookings; the bookings it collides with are reported back and announced.

use chrono::NaiveDate;
use serde::Serialize;
use slate_core::{
  Blocker, BlockerKind, Result, TimeInterval,
  events::{Audience, EventRefs, Outbox},
  recurrence::{self, Recurrence},
  school::{ActorRef, School},
  store::SchedulingTx,
  template::TemplateKey,
  unavailability::{self, Unavailability},
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::notify::{Announcement, parents_of};

/// Result of declaring a window busy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnavailabilityOutcome {
  /// The window covering the request on each occurrence date, after merging.
  pub windows:   Vec<Unavailability>,
  /// Bookings that overlap the new windows.
  pub conflicts: Vec<Blocker>,
}

/// Result of declaring a window free.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AvailabilityOutcome {
  pub deleted: Vec<Uuid>,
  pub updated: Vec<Unavailability>,
  pub created: Vec<Unavailability>,
}

/// A booking that collides with a new unavailability window.
struct Collision {
  blocker:        Blocker,
  name:           String,
  student_ids:    Vec<Uuid>,
  instructor_ids: Vec<Uuid>,
}

/// The school and display name of an actor.
fn owner(tx: &dyn SchedulingTx, actor: ActorRef) -> Result<(Uuid, String)> {
  match actor {
    ActorRef::Instructor(id) => {
      let instructor = tx.require_instructor(id)?;
      Ok((instructor.school_id, instructor.name))
    }
    ActorRef::Student(id) => {
      let student = tx.require_student(id)?;
      Ok((student.school_id, student.name))
    }
  }
}

/// The actor's own lessons and activities on `date` that overlap `interval`.
fn collisions(
  tx: &dyn SchedulingTx,
  actor: ActorRef,
  date: NaiveDate,
  interval: TimeInterval,
) -> Result<Vec<Collision>> {
  let lessons = match actor {
    ActorRef::Instructor(id) => tx.lessons_with_instructor_on(id, date)?,
    ActorRef::Student(id) => tx.lessons_with_student_on(id, date)?,
  };

  let mut found = Vec::new();
  for lesson in lessons {
    let Some(slot) = lesson.slot else { continue };
    if lesson.is_cancelled || !slot.interval.overlaps(&interval) {
      continue;
    }
    let (kind, name) = if lesson.is_private() {
      (BlockerKind::PrivateLesson, "a private lesson".to_string())
    } else {
      (BlockerKind::GroupClass, "a group class".to_string())
    };
    found.push(Collision {
      blocker: Blocker { kind, reference: lesson.lesson_id, date, interval: slot.interval },
      name,
      student_ids: lesson.student_ids,
      instructor_ids: lesson.instructor_ids,
    });
  }

  for activity in tx.activities_on(date)? {
    let involved = match actor {
      ActorRef::Instructor(id) => activity.instructor_ids.contains(&id),
      ActorRef::Student(id) => activity.student_ids.contains(&id),
    };
    if !involved || !activity.interval.overlaps(&interval) {
      continue;
    }
    found.push(Collision {
      blocker: Blocker {
        kind: BlockerKind::Activity,
        reference: activity.activity_id,
        date,
        interval: activity.interval,
      },
      name: activity.name,
      student_ids: activity.student_ids,
      instructor_ids: activity.instructor_ids,
    });
  }
  Ok(found)
}

fn announce_collision(
  tx: &dyn SchedulingTx,
  outbox: &mut Outbox,
  school: &School,
  actor: ActorRef,
  actor_name: &str,
  window: TimeInterval,
  collision: &Collision,
) -> Result<()> {
  let refs = match collision.blocker.kind {
    BlockerKind::Activity => EventRefs { activity_id: Some(collision.blocker.reference), ..EventRefs::default() },
    _ => EventRefs { lesson_id: Some(collision.blocker.reference), ..EventRefs::default() },
  };
  let instructors: Vec<Uuid> = match actor {
    ActorRef::Instructor(id) => vec![id],
    ActorRef::Student(_) => collision.instructor_ids.clone(),
  };
  let mut students = collision.student_ids.clone();
  if let ActorRef::Student(id) = actor
    && !students.contains(&id)
  {
    students.push(id);
  }

  Announcement::new(school, TemplateKey::SchedulingConflictDetected)
    .refs(refs)
    .field("actor_name", actor_name)
    .field("date", collision.blocker.date)
    .field("start", window.start().format("%H:%M"))
    .field("end", window.end().format("%H:%M"))
    .field("conflict_name", &collision.name)
    .field("conflict_start", collision.blocker.interval.start().format("%H:%M"))
    .to(Audience::Instructor, instructors)
    .to(Audience::Parent, parents_of(tx, &students)?)
    .with_push()
    .post(outbox);
  Ok(())
}

/// Declare `interval` busy for `actor` on `date` and each recurrence date.
///
/// Overlapping or touching windows are merged into one. Existing bookings are
/// left in place; those that now collide are returned and announced to the
/// instructor and to the parents of the students involved.
pub fn define_unavailability(
  tx: &mut dyn SchedulingTx,
  outbox: &mut Outbox,
  actor: ActorRef,
  date: NaiveDate,
  interval: TimeInterval,
  recurrence: Option<&Recurrence>,
) -> Result<UnavailabilityOutcome> {
  let (school_id, actor_name) = owner(&*tx, actor)?;
  let school = tx.require_school(school_id)?;
  let dates = recurrence::occurrences(date, recurrence)?;

  let mut outcome = UnavailabilityOutcome::default();
  for date in dates {
    let found = collisions(&*tx, actor, date, interval)?;

    let existing = tx.unavailabilities_of(actor, date)?;
    let (rewrite, window) =
      unavailability::absorb(&existing, actor, date, interval, Some(school_id));
    tx.apply_rewrite(&rewrite)?;
    outcome.windows.push(window);

    for collision in found {
      warn!(
        actor = ?actor,
        %date,
        kind = %collision.blocker.kind,
        reference = %collision.blocker.reference,
        "unavailability conflicts with an existing booking"
      );
      announce_collision(&*tx, outbox, &school, actor, &actor_name, interval, &collision)?;
      outcome.conflicts.push(collision.blocker);
    }
  }

  info!(
    actor = ?actor,
    %interval,
    dates = outcome.windows.len(),
    conflicts = outcome.conflicts.len(),
    "unavailability defined"
  );
  Ok(outcome)
}

/// Declare `interval` free for `actor` on `date` and each recurrence date,
/// deleting, truncating, or splitting the windows it overlaps.
pub fn define_availability(
  tx: &mut dyn SchedulingTx,
  actor: ActorRef,
  date: NaiveDate,
  interval: TimeInterval,
  recurrence: Option<&Recurrence>,
) -> Result<AvailabilityOutcome> {
  owner(&*tx, actor)?;
  let dates = recurrence::occurrences(date, recurrence)?;

  let mut outcome = AvailabilityOutcome::default();
  for date in dates {
    let existing = tx.unavailabilities_of(actor, date)?;
    let rewrite = unavailability::carve(&existing, interval);
    tx.apply_rewrite(&rewrite)?;
    outcome.deleted.extend(rewrite.deleted);
    outcome.updated.extend(rewrite.updated);
    outcome.created.extend(rewrite.created);
  }

  info!(
    actor = ?actor,
    %interval,
    deleted = outcome.deleted.len(),
    updated = outcome.updated.len(),
    created = outcome.created.len(),
    "availability defined"
  );
  Ok(outcome)
}
