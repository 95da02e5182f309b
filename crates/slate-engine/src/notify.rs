//! Builds notifications from templates and queues them in an outbox.

use slate_core::{
  Result,
  events::{Audience, EventRefs, Notification, OutboundEvent, Outbox, Recipient},
  lesson::{Lesson, LessonKind},
  school::School,
  store::SchedulingTx,
  template::{self, Fields, TemplateKey},
};
use uuid::Uuid;

/// One templated message addressed to a set of users.
pub(crate) struct Announcement<'a> {
  school:     &'a School,
  key:        TemplateKey,
  fields:     Fields,
  refs:       EventRefs,
  recipients: Vec<Recipient>,
  push:       bool,
}

impl<'a> Announcement<'a> {
  pub fn new(school: &'a School, key: TemplateKey) -> Self {
    let mut fields = Fields::new();
    fields.insert("currency", school.currency.clone());
    fields.insert("school_name", school.name.clone());
    Self {
      school,
      key,
      fields,
      refs: EventRefs::default(),
      recipients: Vec::new(),
      push: false,
    }
  }

  pub fn field(mut self, name: &'static str, value: impl ToString) -> Self {
    self.fields.insert(name, value.to_string());
    self
  }

  pub fn refs(mut self, refs: EventRefs) -> Self {
    self.refs = refs;
    self
  }

  /// Add recipients; a user already addressed keeps their first audience.
  pub fn to(mut self, audience: Audience, users: impl IntoIterator<Item = Uuid>) -> Self {
    for user_id in users {
      if !self.recipients.iter().any(|r| r.user_id == user_id) {
        self.recipients.push(Recipient { user_id, audience });
      }
    }
    self
  }

  pub fn to_admins(self) -> Self {
    let admins = self.school.admin_ids.clone();
    self.to(Audience::Admin, admins)
  }

  /// Also send a push message to every non-admin recipient.
  pub fn with_push(mut self) -> Self {
    self.push = true;
    self
  }

  pub fn post(self, outbox: &mut Outbox) {
    let (subject, body) = self.key.resolve(self.school);
    let subject = template::render(subject, &self.fields);
    let message = template::render(body, &self.fields);

    for recipient in &self.recipients {
      outbox.push(OutboundEvent::Notify(Notification {
        recipient: *recipient,
        key:       self.key,
        subject:   subject.clone(),
        message:   message.clone(),
        refs:      self.refs,
      }));
      if self.push && recipient.audience != Audience::Admin {
        outbox.push(OutboundEvent::Push {
          recipient: *recipient,
          title:     subject.clone(),
          body:      message.clone(),
        });
      }
    }
  }
}

/// Every distinct parent of `student_ids`.
pub(crate) fn parents_of(tx: &dyn SchedulingTx, student_ids: &[Uuid]) -> Result<Vec<Uuid>> {
  let mut parents = Vec::new();
  for student_id in student_ids {
    for parent in tx.require_student(*student_id)?.parent_ids {
      if !parents.contains(&parent) {
        parents.push(parent);
      }
    }
  }
  Ok(parents)
}

pub(crate) fn student_names(tx: &dyn SchedulingTx, student_ids: &[Uuid]) -> Result<String> {
  let names = student_ids
    .iter()
    .map(|id| tx.require_student(*id).map(|s| s.name))
    .collect::<Result<Vec<_>>>()?;
  Ok(names.join(", "))
}

pub(crate) fn instructor_names(tx: &dyn SchedulingTx, instructor_ids: &[Uuid]) -> Result<String> {
  if instructor_ids.is_empty() {
    return Ok("an instructor to be confirmed".into());
  }
  let names = instructor_ids
    .iter()
    .map(|id| tx.require_instructor(*id).map(|i| i.name))
    .collect::<Result<Vec<_>>>()?;
  Ok(names.join(", "))
}

/// The standard announcement for a change to `lesson`: every parent, every
/// instructor, and the school admins, with push, carrying the lesson fields.
pub(crate) fn lesson_announcement<'a>(
  tx: &dyn SchedulingTx,
  school: &'a School,
  lesson: &Lesson,
  key: TemplateKey,
) -> Result<Announcement<'a>> {
  let mut announcement = Announcement::new(school, key)
    .refs(EventRefs { lesson_id: Some(lesson.lesson_id), pack_id: lesson.pack_id, activity_id: None })
    .field("duration_in_minutes", lesson.duration_minutes)
    .field("students", student_names(tx, &lesson.student_ids)?)
    .field("instructor_name", instructor_names(tx, &lesson.instructor_ids)?);

  if let Some(slot) = lesson.slot {
    announcement = announcement
      .field("date", slot.date)
      .field("start", slot.interval.start().format("%H:%M"))
      .field("end", slot.interval.end().format("%H:%M"));
  }

  match &lesson.kind {
    LessonKind::Private { class_number, price } => {
      announcement = announcement
        .field("class_number", class_number)
        .field("price", format!("{price:.2}"));
    }
    LessonKind::Group { level, .. } => {
      announcement = announcement.field("level", level);
    }
  }

  if let Some(pack_id) = lesson.pack_id
    && let Some(pack) = tx.pack(pack_id)?
  {
    announcement = announcement
      .field("number_of_classes", pack.number_of_classes)
      .field("classes_left", pack.number_of_classes_left);
  }

  Ok(
    announcement
      .to(Audience::Parent, parents_of(tx, &lesson.student_ids)?)
      .to(Audience::Instructor, lesson.instructor_ids.iter().copied())
      .to_admins()
      .with_push(),
  )
}
