//! The lesson state machine.
//!
//! ```text
//! UNSCHEDULED ──schedule──▶ SCHEDULED ──mark_done──▶ DONE
//!      ▲                      │  ▲  │                  │
//!      └─────unschedule───────┘  └──┘ reschedule       └─mark_undone─▶ SCHEDULED
//!
//! UNSCHEDULED | SCHEDULED ──cancel──▶ CANCELLED
//! ```
//!
//! Each function runs inside the caller's transaction. Returning an error
//! discards every write and every queued event of the operation.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use slate_core::{
  Error, Result, TimeInterval,
  events::{Audience, EventRefs, Outbox},
  lesson::{Lesson, LessonSlot, LessonStatus},
  pack::Pack,
  school::School,
  store::SchedulingTx,
  template::TemplateKey,
};
use tracing::info;
use uuid::Uuid;

use crate::{
  notify::{Announcement, lesson_announcement, student_names},
  oracle,
};

// ─── Policy ──────────────────────────────────────────────────────────────────

/// True when `lesson` has no date yet or starts at least
/// `school.reschedule_time_limit` hours after `now`.
pub fn can_still_reschedule(lesson: &Lesson, school: &School, now: NaiveDateTime) -> bool {
  match lesson.starts_at() {
    None => true,
    Some(starts_at) => starts_at - now >= TimeDelta::hours(school.reschedule_time_limit),
  }
}

fn require_notice(school: &School, starts_at: NaiveDateTime, now: NaiveDateTime) -> Result<()> {
  if school.schedule_time_limit <= 0 {
    return Ok(());
  }
  let notice = starts_at - now;
  if notice < TimeDelta::hours(school.schedule_time_limit) {
    return Err(Error::ReschedulePolicyViolation {
      hours_until: notice.num_hours(),
      limit_hours: school.schedule_time_limit,
    });
  }
  Ok(())
}

fn require_bookable_pack(tx: &dyn SchedulingTx, lesson: &Lesson, date: NaiveDate) -> Result<()> {
  let Some(pack_id) = lesson.pack_id else {
    return Ok(());
  };
  let pack = tx.require_pack(pack_id)?;
  if pack.is_suspended {
    return Err(Error::IllegalState(format!("pack {pack_id} is suspended")));
  }
  if pack.is_expired_on(date) {
    return Err(Error::IllegalState(format!(
      "pack {pack_id} expires before {date}"
    )));
  }
  Ok(())
}

// ─── Placement ───────────────────────────────────────────────────────────────

/// Check `[start, start + duration)` on `date` and write it into `lesson`,
/// assigning the oracle's suggested instructor when none is fixed. Every
/// assigned instructor must be free.
fn place(
  tx: &dyn SchedulingTx,
  school: &School,
  lesson: &mut Lesson,
  date: NaiveDate,
  start: NaiveTime,
  now: NaiveDateTime,
) -> Result<()> {
  let interval = TimeInterval::starting_at(start, lesson.duration_minutes)?;
  require_bookable_pack(tx, lesson, date)?;
  require_notice(school, date.and_time(start), now)?;

  if lesson.instructor_ids.is_empty() {
    let answer =
      oracle::available(tx, school.school_id, None, date, interval, Some(lesson.lesson_id))?;
    if !answer.ok {
      return Err(Error::Conflict(answer.blockers));
    }
    lesson.instructor_ids.extend(answer.suggested_instructor);
  } else {
    let mut blockers = Vec::new();
    for &instructor_id in &lesson.instructor_ids {
      blockers.extend(oracle::conflicts(
        tx,
        instructor_id,
        date,
        interval,
        Some(lesson.lesson_id),
      )?);
    }
    if !blockers.is_empty() {
      blockers.sort_by_key(|b| (b.interval, b.reference));
      blockers.dedup_by_key(|b| b.reference);
      return Err(Error::Conflict(blockers));
    }
  }

  lesson.slot = Some(LessonSlot { date, interval });
  lesson.needs_calendar_sync = true;
  Ok(())
}

// ─── Transitions ─────────────────────────────────────────────────────────────

/// Give an unscheduled lesson a date and start time.
pub fn schedule(
  tx: &mut dyn SchedulingTx,
  outbox: &mut Outbox,
  lesson_id: Uuid,
  date: NaiveDate,
  start: NaiveTime,
  now: NaiveDateTime,
) -> Result<Lesson> {
  let mut lesson = tx.require_lesson(lesson_id)?;
  let status = lesson.status();
  if status != LessonStatus::Unscheduled {
    return Err(Error::IllegalState(format!(
      "lesson {lesson_id} is {status}; only unscheduled lessons can be scheduled"
    )));
  }

  let school = tx.require_school(lesson.school_id)?;
  place(&*tx, &school, &mut lesson, date, start, now)?;
  tx.put_lesson(&lesson)?;

  let key = if lesson.is_private() {
    TemplateKey::PrivateClassScheduled
  } else {
    TemplateKey::GroupClassScheduled
  };
  lesson_announcement(&*tx, &school, &lesson, key)?.post(outbox);
  outbox.calendar_sync(lesson_id);

  info!(%lesson_id, %date, %start, "lesson scheduled");
  Ok(lesson)
}

/// Clear a lesson's date and times. Returns `false` when there was nothing
/// to clear.
pub fn unschedule(tx: &mut dyn SchedulingTx, outbox: &mut Outbox, lesson_id: Uuid) -> Result<bool> {
  let mut lesson = tx.require_lesson(lesson_id)?;
  if lesson.is_done {
    return Err(Error::IllegalState(format!(
      "lesson {lesson_id} is done and cannot be unscheduled"
    )));
  }
  if lesson.slot.is_none() {
    return Ok(false);
  }

  let school = tx.require_school(lesson.school_id)?;
  let announcement = lesson_announcement(&*tx, &school, &lesson, TemplateKey::ClassUnscheduled)?;

  lesson.slot = None;
  lesson.needs_calendar_sync = true;
  tx.put_lesson(&lesson)?;

  announcement.post(outbox);
  outbox.calendar_sync(lesson_id);

  info!(%lesson_id, "lesson unscheduled");
  Ok(true)
}

/// Move a lesson to a new date and start time.
///
/// Only allowed while [`can_still_reschedule`] holds. The old slot is
/// released before the new one is checked, so a lesson may move to an
/// overlapping time; if the new slot is refused the old one is kept.
pub fn reschedule(
  tx: &mut dyn SchedulingTx,
  outbox: &mut Outbox,
  lesson_id: Uuid,
  date: NaiveDate,
  start: NaiveTime,
  now: NaiveDateTime,
) -> Result<Lesson> {
  let mut lesson = tx.require_lesson(lesson_id)?;
  let status = lesson.status();
  if matches!(status, LessonStatus::Done | LessonStatus::Cancelled) {
    return Err(Error::IllegalState(format!(
      "lesson {lesson_id} is {status} and cannot be rescheduled"
    )));
  }

  let school = tx.require_school(lesson.school_id)?;
  if !can_still_reschedule(&lesson, &school, now) {
    let hours_until = lesson.starts_at().map_or(0, |s| (s - now).num_hours());
    return Err(Error::ReschedulePolicyViolation {
      hours_until,
      limit_hours: school.reschedule_time_limit,
    });
  }

  let previous = lesson.slot.take();
  place(&*tx, &school, &mut lesson, date, start, now)?;
  tx.put_lesson(&lesson)?;

  let mut announcement =
    lesson_announcement(&*tx, &school, &lesson, TemplateKey::ClassRescheduled)?;
  if let Some(previous) = previous {
    announcement = announcement
      .field("previous_date", previous.date)
      .field("previous_start", previous.interval.start().format("%H:%M"));
  }
  announcement.post(outbox);
  outbox.calendar_sync(lesson_id);

  info!(%lesson_id, %date, %start, "lesson rescheduled");
  Ok(lesson)
}

/// Move a lesson to the terminal cancelled state.
///
/// Tickets bound to a cancelled group class are released so their packs can
/// use them elsewhere. A private lesson of a pack forfeits its class, so the
/// pack still finishes once its other lessons are done.
pub fn cancel(tx: &mut dyn SchedulingTx, outbox: &mut Outbox, lesson_id: Uuid) -> Result<Lesson> {
  let mut lesson = tx.require_lesson(lesson_id)?;
  let status = lesson.status();
  if matches!(status, LessonStatus::Done | LessonStatus::Cancelled) {
    return Err(Error::IllegalState(format!(
      "lesson {lesson_id} is {status} and cannot be cancelled"
    )));
  }

  let school = tx.require_school(lesson.school_id)?;
  let announcement = lesson_announcement(&*tx, &school, &lesson, TemplateKey::ClassCancelled)?;
  let was_scheduled = lesson.slot.is_some();

  for mut ticket in tx.tickets_of_lesson(lesson_id)? {
    ticket.lesson_id = None;
    ticket.student_id = None;
    tx.put_ticket(&ticket)?;
  }

  let forfeited = match lesson.pack_id {
    Some(pack_id) => {
      let mut pack = tx.require_pack(pack_id)?;
      pack.consume_class()?;
      tx.put_pack(&pack)?;
      Some(pack)
    }
    None => None,
  };

  lesson.slot = None;
  lesson.is_cancelled = true;
  lesson.needs_calendar_sync |= was_scheduled;
  tx.put_lesson(&lesson)?;

  announcement.post(outbox);
  if was_scheduled {
    outbox.calendar_sync(lesson_id);
  }
  if let Some(pack) = forfeited.filter(|p| p.is_done) {
    info!(pack_id = %pack.pack_id, "pack completed");
    announce_pack_completed(&*tx, outbox, &school, &pack)?;
  }

  info!(%lesson_id, "lesson cancelled");
  Ok(lesson)
}

// ─── Completion ──────────────────────────────────────────────────────────────

/// The packs a lesson draws from: its own pack, or the packs of the tickets
/// bound to a group class (once per ticket).
fn drawn_packs(tx: &dyn SchedulingTx, lesson: &Lesson) -> Result<Vec<Uuid>> {
  if let Some(pack_id) = lesson.pack_id {
    return Ok(vec![pack_id]);
  }
  Ok(tx.tickets_of_lesson(lesson.lesson_id)?.into_iter().map(|t| t.pack_id).collect())
}

fn announce_pack_completed(
  tx: &dyn SchedulingTx,
  outbox: &mut Outbox,
  school: &School,
  pack: &Pack,
) -> Result<()> {
  Announcement::new(school, TemplateKey::PackCompleted)
    .refs(EventRefs { pack_id: Some(pack.pack_id), ..EventRefs::default() })
    .field("number_of_classes", pack.number_of_classes)
    .field("students", student_names(tx, &pack.student_ids)?)
    .to(Audience::Parent, pack.parent_ids.iter().copied())
    .to(Audience::Instructor, pack.instructor_id)
    .to_admins()
    .post(outbox);
  Ok(())
}

/// Mark a scheduled lesson as taken, consuming one class from each pack it
/// draws from. A pack reaching zero classes left becomes done.
pub fn mark_done(tx: &mut dyn SchedulingTx, outbox: &mut Outbox, lesson_id: Uuid) -> Result<Lesson> {
  let mut lesson = tx.require_lesson(lesson_id)?;
  let status = lesson.status();
  if status != LessonStatus::Scheduled {
    return Err(Error::IllegalState(format!(
      "lesson {lesson_id} is {status}; only scheduled lessons can be marked done"
    )));
  }

  let school = tx.require_school(lesson.school_id)?;
  lesson.is_done = true;
  tx.put_lesson(&lesson)?;

  let mut completed = Vec::new();
  for pack_id in drawn_packs(&*tx, &lesson)? {
    let mut pack = tx.require_pack(pack_id)?;
    pack.consume_class()?;
    tx.put_pack(&pack)?;
    if pack.is_done {
      completed.push(pack);
    }
  }

  lesson_announcement(&*tx, &school, &lesson, TemplateKey::ClassDone)?.post(outbox);
  for pack in &completed {
    info!(pack_id = %pack.pack_id, "pack completed");
    announce_pack_completed(&*tx, outbox, &school, pack)?;
  }

  info!(%lesson_id, "lesson marked done");
  Ok(lesson)
}

/// Undo [`mark_done`], giving each drawn pack its class back.
pub fn mark_undone(
  tx: &mut dyn SchedulingTx,
  outbox: &mut Outbox,
  lesson_id: Uuid,
) -> Result<Lesson> {
  let mut lesson = tx.require_lesson(lesson_id)?;
  if !lesson.is_done {
    return Err(Error::IllegalState(format!("lesson {lesson_id} is not done")));
  }

  let school = tx.require_school(lesson.school_id)?;
  lesson.is_done = false;
  tx.put_lesson(&lesson)?;

  for pack_id in drawn_packs(&*tx, &lesson)? {
    let mut pack = tx.require_pack(pack_id)?;
    pack.restore_class()?;
    tx.put_pack(&pack)?;
  }

  lesson_announcement(&*tx, &school, &lesson, TemplateKey::ClassUndone)?.post(outbox);

  info!(%lesson_id, "lesson marked undone");
  Ok(lesson)
}
