//! An in-process [`SchedulingStore`].
//!
//! Transactions run against a copy of the tables under a mutex and replace
//! the originals on success, so a failed operation leaves no trace. Intended
//! for tests and for embedding the engine without a database.

use std::{
  collections::BTreeMap,
  future::{Future, ready},
  sync::{Arc, Mutex},
};

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
  Error, Result,
  activity::Activity,
  lesson::Lesson,
  pack::{ClassTicket, Pack},
  school::{ActorRef, Instructor, School, Student},
  store::{SchedulingStore, SchedulingTx},
  unavailability::Unavailability,
};

/// Every entity, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct Tables {
  schools:          BTreeMap<Uuid, School>,
  instructors:      BTreeMap<Uuid, Instructor>,
  students:         BTreeMap<Uuid, Student>,
  lessons:          BTreeMap<Uuid, Lesson>,
  activities:       BTreeMap<Uuid, Activity>,
  packs:            BTreeMap<Uuid, Pack>,
  tickets:          BTreeMap<Uuid, ClassTicket>,
  unavailabilities: BTreeMap<Uuid, Unavailability>,
}

impl SchedulingTx for Tables {
  fn school(&self, id: Uuid) -> Result<Option<School>> { Ok(self.schools.get(&id).cloned()) }

  fn put_school(&mut self, school: &School) -> Result<()> {
    self.schools.insert(school.school_id, school.clone());
    Ok(())
  }

  fn instructor(&self, id: Uuid) -> Result<Option<Instructor>> {
    Ok(self.instructors.get(&id).cloned())
  }

  fn instructors_of_school(&self, school_id: Uuid) -> Result<Vec<Instructor>> {
    Ok(
      self
        .instructors
        .values()
        .filter(|i| i.school_id == school_id)
        .cloned()
        .collect(),
    )
  }

  fn put_instructor(&mut self, instructor: &Instructor) -> Result<()> {
    self.instructors.insert(instructor.instructor_id, instructor.clone());
    Ok(())
  }

  fn student(&self, id: Uuid) -> Result<Option<Student>> { Ok(self.students.get(&id).cloned()) }

  fn put_student(&mut self, student: &Student) -> Result<()> {
    self.students.insert(student.student_id, student.clone());
    Ok(())
  }

  fn lesson(&self, id: Uuid) -> Result<Option<Lesson>> { Ok(self.lessons.get(&id).cloned()) }

  fn put_lesson(&mut self, lesson: &Lesson) -> Result<()> {
    self.lessons.insert(lesson.lesson_id, lesson.clone());
    Ok(())
  }

  fn lessons_of_pack(&self, pack_id: Uuid) -> Result<Vec<Lesson>> {
    let mut lessons: Vec<Lesson> = self
      .lessons
      .values()
      .filter(|l| l.pack_id == Some(pack_id))
      .cloned()
      .collect();
    lessons.sort_by_key(|l| match l.kind {
      crate::lesson::LessonKind::Private { class_number, .. } => class_number,
      crate::lesson::LessonKind::Group { .. } => 0,
    });
    Ok(lessons)
  }

  fn lessons_with_instructor_on(
    &self,
    instructor_id: Uuid,
    date: NaiveDate,
  ) -> Result<Vec<Lesson>> {
    Ok(
      self
        .lessons
        .values()
        .filter(|l| l.slot.is_some_and(|s| s.date == date))
        .filter(|l| l.instructor_ids.contains(&instructor_id))
        .cloned()
        .collect(),
    )
  }

  fn lessons_with_student_on(&self, student_id: Uuid, date: NaiveDate) -> Result<Vec<Lesson>> {
    Ok(
      self
        .lessons
        .values()
        .filter(|l| l.slot.is_some_and(|s| s.date == date))
        .filter(|l| l.student_ids.contains(&student_id))
        .cloned()
        .collect(),
    )
  }

  fn activity(&self, id: Uuid) -> Result<Option<Activity>> {
    Ok(self.activities.get(&id).cloned())
  }

  fn put_activity(&mut self, activity: &Activity) -> Result<()> {
    self.activities.insert(activity.activity_id, activity.clone());
    Ok(())
  }

  fn activities_on(&self, date: NaiveDate) -> Result<Vec<Activity>> {
    Ok(self.activities.values().filter(|a| a.date == date).cloned().collect())
  }

  fn pack(&self, id: Uuid) -> Result<Option<Pack>> { Ok(self.packs.get(&id).cloned()) }

  fn put_pack(&mut self, pack: &Pack) -> Result<()> {
    self.packs.insert(pack.pack_id, pack.clone());
    Ok(())
  }

  fn tickets_of_pack(&self, pack_id: Uuid) -> Result<Vec<ClassTicket>> {
    Ok(self.tickets.values().filter(|t| t.pack_id == pack_id).cloned().collect())
  }

  fn tickets_of_lesson(&self, lesson_id: Uuid) -> Result<Vec<ClassTicket>> {
    Ok(
      self
        .tickets
        .values()
        .filter(|t| t.lesson_id == Some(lesson_id))
        .cloned()
        .collect(),
    )
  }

  fn put_ticket(&mut self, ticket: &ClassTicket) -> Result<()> {
    self.tickets.insert(ticket.ticket_id, ticket.clone());
    Ok(())
  }

  fn unavailabilities_of(
    &self,
    actor: ActorRef,
    date: NaiveDate,
  ) -> Result<Vec<Unavailability>> {
    let mut list: Vec<Unavailability> = self
      .unavailabilities
      .values()
      .filter(|u| u.actor == actor && u.date == date)
      .cloned()
      .collect();
    list.sort_by_key(|u| u.interval);
    Ok(list)
  }

  fn put_unavailability(&mut self, unavailability: &Unavailability) -> Result<()> {
    self
      .unavailabilities
      .insert(unavailability.unavailability_id, unavailability.clone());
    Ok(())
  }

  fn delete_unavailability(&mut self, id: Uuid) -> Result<()> {
    self.unavailabilities.remove(&id);
    Ok(())
  }
}

/// A [`SchedulingStore`] that keeps everything in memory.
///
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
  tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  fn locked<T>(&self, f: impl FnOnce(&mut Tables) -> Result<T>) -> Result<T> {
    let mut guard = self
      .tables
      .lock()
      .map_err(|_| Error::Storage("memory store lock poisoned".into()))?;
    f(&mut guard)
  }
}

impl SchedulingStore for MemoryStore {
  fn transact<T, F>(&self, f: F) -> impl Future<Output = Result<T>> + Send + '_
  where
    F: FnOnce(&mut dyn SchedulingTx) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    ready(self.locked(|tables| {
      let mut working = tables.clone();
      let value = f(&mut working)?;
      *tables = working;
      Ok(value)
    }))
  }

  fn read<T, F>(&self, f: F) -> impl Future<Output = Result<T>> + Send + '_
  where
    F: FnOnce(&dyn SchedulingTx) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    ready(self.locked(|tables| f(&*tables)))
  }
}
