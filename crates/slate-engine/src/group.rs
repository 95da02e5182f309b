//! Group-class membership: students in, students out, instructors in and out.

use slate_core::{
  Error, Result,
  events::{Audience, EventRefs, Outbox},
  lesson::{Lesson, LessonKind, LessonStatus},
  pack::{ClassTicket, PackKind},
  school::School,
  store::SchedulingTx,
  template::TemplateKey,
};
use tracing::info;
use uuid::Uuid;

use crate::{
  notify::{Announcement, lesson_announcement},
  oracle,
};

/// Load a group class that can still change membership.
fn open_class(tx: &dyn SchedulingTx, class_id: Uuid) -> Result<Lesson> {
  let class = tx.require_lesson(class_id)?;
  if !class.is_group() {
    return Err(Error::IllegalState(format!("lesson {class_id} is not a group class")));
  }
  let status = class.status();
  if matches!(status, LessonStatus::Done | LessonStatus::Cancelled) {
    return Err(Error::IllegalState(format!(
      "group class {class_id} is {status}; its members are fixed"
    )));
  }
  Ok(class)
}

/// An unused ticket of `pack_id` that `student_id` may spend on `class`.
fn spendable_ticket(
  tx: &dyn SchedulingTx,
  pack_id: Uuid,
  student_id: Uuid,
  class: &Lesson,
) -> Result<ClassTicket> {
  let pack = tx.require_pack(pack_id)?;
  if pack.kind != PackKind::Group {
    return Err(Error::IllegalState(format!("pack {pack_id} is not a group pack")));
  }
  if !pack.student_ids.contains(&student_id) {
    return Err(Error::IllegalState(format!(
      "pack {pack_id} does not belong to student {student_id}"
    )));
  }
  if pack.is_suspended {
    return Err(Error::IllegalState(format!("pack {pack_id} is suspended")));
  }
  if let Some(slot) = class.slot
    && pack.is_expired_on(slot.date)
  {
    return Err(Error::IllegalState(format!(
      "pack {pack_id} expires before {}",
      slot.date
    )));
  }

  tx.tickets_of_pack(pack_id)?
    .into_iter()
    .find(|t| !t.is_used())
    .ok_or_else(|| Error::IllegalState(format!("pack {pack_id} has no unused tickets")))
}

fn instructor_announcement<'a>(
  tx: &dyn SchedulingTx,
  school: &'a School,
  class: &Lesson,
  key: TemplateKey,
  instructor_id: Uuid,
  audience: &[Uuid],
) -> Result<Announcement<'a>> {
  let instructor = tx.require_instructor(instructor_id)?;
  let level = match &class.kind {
    LessonKind::Group { level, .. } => level.clone(),
    LessonKind::Private { .. } => String::new(),
  };
  let mut announcement = Announcement::new(school, key)
    .refs(EventRefs { lesson_id: Some(class.lesson_id), ..EventRefs::default() })
    .field("instructor_name", instructor.name)
    .field("level", level);
  if let Some(slot) = class.slot {
    announcement = announcement
      .field("date", slot.date)
      .field("start", slot.interval.start().format("%H:%M"));
  }
  Ok(
    announcement
      .to(Audience::Instructor, audience.iter().copied())
      .to_admins()
      .with_push(),
  )
}

// ─── Students ────────────────────────────────────────────────────────────────

/// Enrol `student_id` in a group class, optionally spending one ticket of
/// `pack_id`.
pub fn add_student(
  tx: &mut dyn SchedulingTx,
  outbox: &mut Outbox,
  class_id: Uuid,
  student_id: Uuid,
  pack_id: Option<Uuid>,
) -> Result<Lesson> {
  let mut class = open_class(&*tx, class_id)?;
  let student = tx.require_student(student_id)?;
  if class.student_ids.contains(&student_id) {
    return Err(Error::IllegalState(format!(
      "student {student_id} is already in group class {class_id}"
    )));
  }
  if let LessonKind::Group { max_students, .. } = class.kind
    && class.is_full()
  {
    return Err(Error::CapacityExceeded { class_id, max_students });
  }
  if let Some(slot) = class.slot {
    let blockers = oracle::student_conflicts(&*tx, student_id, slot.date, slot.interval)?;
    if !blockers.is_empty() {
      return Err(Error::Conflict(blockers));
    }
  }

  if let Some(pack_id) = pack_id {
    let mut ticket = spendable_ticket(&*tx, pack_id, student_id, &class)?;
    ticket.lesson_id = Some(class_id);
    ticket.student_id = Some(student_id);
    tx.put_ticket(&ticket)?;
  }

  class.student_ids.push(student_id);
  tx.put_lesson(&class)?;

  let school = tx.require_school(class.school_id)?;
  lesson_announcement(&*tx, &school, &class, TemplateKey::StudentAddedToClass)?
    .field("student_name", student.name)
    .post(outbox);

  info!(%class_id, %student_id, "student added to group class");
  Ok(class)
}

/// Take `student_id` out of a group class, releasing any ticket it spent.
pub fn remove_student(
  tx: &mut dyn SchedulingTx,
  outbox: &mut Outbox,
  class_id: Uuid,
  student_id: Uuid,
) -> Result<Lesson> {
  let mut class = open_class(&*tx, class_id)?;
  if !class.student_ids.contains(&student_id) {
    return Err(Error::IllegalState(format!(
      "student {student_id} is not in group class {class_id}"
    )));
  }
  let student = tx.require_student(student_id)?;

  // Addressed before removal so the leaving student's parents hear of it.
  let school = tx.require_school(class.school_id)?;
  let announcement =
    lesson_announcement(&*tx, &school, &class, TemplateKey::StudentRemovedFromClass)?
      .field("student_name", student.name);

  for mut ticket in tx.tickets_of_lesson(class_id)? {
    if ticket.student_id == Some(student_id) {
      ticket.lesson_id = None;
      ticket.student_id = None;
      tx.put_ticket(&ticket)?;
    }
  }

  class.student_ids.retain(|id| *id != student_id);
  tx.put_lesson(&class)?;
  announcement.post(outbox);

  info!(%class_id, %student_id, "student removed from group class");
  Ok(class)
}

// ─── Instructors ─────────────────────────────────────────────────────────────

/// Add an instructor to a group class.
///
/// A scheduled class is checked against the instructor's occupations first.
/// Adding an instructor who already teaches the class changes nothing.
pub fn add_instructor(
  tx: &mut dyn SchedulingTx,
  outbox: &mut Outbox,
  class_id: Uuid,
  instructor_id: Uuid,
) -> Result<Lesson> {
  let mut class = open_class(&*tx, class_id)?;
  let instructor = tx.require_instructor(instructor_id)?;
  if instructor.school_id != class.school_id {
    return Err(Error::IllegalState(format!(
      "instructor {instructor_id} does not teach at school {}",
      class.school_id
    )));
  }
  if class.instructor_ids.contains(&instructor_id) {
    return Ok(class);
  }

  if let Some(slot) = class.slot {
    let blockers =
      oracle::conflicts(&*tx, instructor_id, slot.date, slot.interval, Some(class_id))?;
    if !blockers.is_empty() {
      return Err(Error::Conflict(blockers));
    }
    class.needs_calendar_sync = true;
    outbox.calendar_sync(class_id);
  }

  class.instructor_ids.push(instructor_id);
  tx.put_lesson(&class)?;

  let school = tx.require_school(class.school_id)?;
  instructor_announcement(
    &*tx,
    &school,
    &class,
    TemplateKey::InstructorAddedToClass,
    instructor_id,
    &class.instructor_ids,
  )?
  .post(outbox);

  info!(%class_id, %instructor_id, "instructor added to group class");
  Ok(class)
}

/// Remove an instructor from a group class.
pub fn remove_instructor(
  tx: &mut dyn SchedulingTx,
  outbox: &mut Outbox,
  class_id: Uuid,
  instructor_id: Uuid,
) -> Result<Lesson> {
  let mut class = open_class(&*tx, class_id)?;
  if !class.instructor_ids.contains(&instructor_id) {
    return Err(Error::IllegalState(format!(
      "instructor {instructor_id} does not teach group class {class_id}"
    )));
  }

  let school = tx.require_school(class.school_id)?;
  let announcement = instructor_announcement(
    &*tx,
    &school,
    &class,
    TemplateKey::InstructorRemovedFromClass,
    instructor_id,
    &class.instructor_ids,
  )?;

  class.instructor_ids.retain(|id| *id != instructor_id);
  if class.slot.is_some() {
    class.needs_calendar_sync = true;
    outbox.calendar_sync(class_id);
  }
  tx.put_lesson(&class)?;
  announcement.post(outbox);

  info!(%class_id, %instructor_id, "instructor removed from group class");
  Ok(class)
}
