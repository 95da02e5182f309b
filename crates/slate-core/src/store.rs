//! The storage ports.
//!
//! [`SchedulingTx`] is the view of the database inside one transaction; the
//! engine's operations are plain synchronous functions over it.
//! [`SchedulingStore`] hands out those views: `transact` runs a closure under
//! a serialisable transaction and commits only when it returns `Ok`, `read`
//! runs one against a snapshot that is never committed.
//!
//! Entities reference each other by id. The transaction is the arena that
//! resolves ids; the engine never follows back-links.

use std::future::Future;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
  Entity, Error, Result,
  activity::Activity,
  lesson::Lesson,
  pack::{ClassTicket, Pack},
  school::{ActorRef, Instructor, School, Student},
  unavailability::{Rewrite, Unavailability},
};

// ─── Transaction view ────────────────────────────────────────────────────────

/// Reads and writes available inside a single transaction.
///
/// `put_*` methods insert or replace by primary key.
pub trait SchedulingTx {
  // ── Schools and people ────────────────────────────────────────────────

  fn school(&self, id: Uuid) -> Result<Option<School>>;

  fn put_school(&mut self, school: &School) -> Result<()>;

  fn instructor(&self, id: Uuid) -> Result<Option<Instructor>>;

  /// All instructors of a school, in no particular order.
  fn instructors_of_school(&self, school_id: Uuid) -> Result<Vec<Instructor>>;

  fn put_instructor(&mut self, instructor: &Instructor) -> Result<()>;

  fn student(&self, id: Uuid) -> Result<Option<Student>>;

  fn put_student(&mut self, student: &Student) -> Result<()>;

  // ── Lessons ───────────────────────────────────────────────────────────

  fn lesson(&self, id: Uuid) -> Result<Option<Lesson>>;

  fn put_lesson(&mut self, lesson: &Lesson) -> Result<()>;

  fn lessons_of_pack(&self, pack_id: Uuid) -> Result<Vec<Lesson>>;

  /// Lessons scheduled on `date` that list `instructor_id`.
  fn lessons_with_instructor_on(
    &self,
    instructor_id: Uuid,
    date: NaiveDate,
  ) -> Result<Vec<Lesson>>;

  /// Lessons scheduled on `date` that list `student_id`.
  fn lessons_with_student_on(&self, student_id: Uuid, date: NaiveDate)
  -> Result<Vec<Lesson>>;

  // ── Activities ────────────────────────────────────────────────────────

  fn activity(&self, id: Uuid) -> Result<Option<Activity>>;

  fn put_activity(&mut self, activity: &Activity) -> Result<()>;

  /// Every activity on `date`, whoever staffs it.
  fn activities_on(&self, date: NaiveDate) -> Result<Vec<Activity>>;

  // ── Packs and tickets ─────────────────────────────────────────────────

  fn pack(&self, id: Uuid) -> Result<Option<Pack>>;

  fn put_pack(&mut self, pack: &Pack) -> Result<()>;

  fn tickets_of_pack(&self, pack_id: Uuid) -> Result<Vec<ClassTicket>>;

  fn tickets_of_lesson(&self, lesson_id: Uuid) -> Result<Vec<ClassTicket>>;

  fn put_ticket(&mut self, ticket: &ClassTicket) -> Result<()>;

  // ── Unavailability ────────────────────────────────────────────────────

  /// The actor's windows on `date`, ordered by start.
  fn unavailabilities_of(
    &self,
    actor: ActorRef,
    date: NaiveDate,
  ) -> Result<Vec<Unavailability>>;

  fn put_unavailability(&mut self, unavailability: &Unavailability) -> Result<()>;

  fn delete_unavailability(&mut self, id: Uuid) -> Result<()>;

  // ── Provided ──────────────────────────────────────────────────────────

  fn require_school(&self, id: Uuid) -> Result<School> {
    self.school(id)?.ok_or(Error::NotFound { entity: Entity::School, id })
  }

  fn require_instructor(&self, id: Uuid) -> Result<Instructor> {
    self.instructor(id)?.ok_or(Error::NotFound { entity: Entity::Instructor, id })
  }

  fn require_student(&self, id: Uuid) -> Result<Student> {
    self.student(id)?.ok_or(Error::NotFound { entity: Entity::Student, id })
  }

  fn require_lesson(&self, id: Uuid) -> Result<Lesson> {
    self.lesson(id)?.ok_or(Error::NotFound { entity: Entity::Lesson, id })
  }

  fn require_pack(&self, id: Uuid) -> Result<Pack> {
    self.pack(id)?.ok_or(Error::NotFound { entity: Entity::Pack, id })
  }

  /// Persist every change in `rewrite`.
  fn apply_rewrite(&mut self, rewrite: &Rewrite) -> Result<()> {
    for id in &rewrite.deleted {
      self.delete_unavailability(*id)?;
    }
    for unavailability in rewrite.updated.iter().chain(&rewrite.created) {
      self.put_unavailability(unavailability)?;
    }
    Ok(())
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A backend able to run closures against [`SchedulingTx`] views.
///
/// Closures run to completion without awaiting; only the hand-off to the
/// backend suspends. This keeps the oracle's read and the following write in
/// the same serialisable transaction.
pub trait SchedulingStore: Send + Sync {
  /// Run `f` in a serialisable transaction. Commits when `f` returns `Ok`,
  /// rolls back otherwise.
  fn transact<T, F>(&self, f: F) -> impl Future<Output = Result<T>> + Send + '_
  where
    F: FnOnce(&mut dyn SchedulingTx) -> Result<T> + Send + 'static,
    T: Send + 'static;

  /// Run `f` against a read-only snapshot.
  fn read<T, F>(&self, f: F) -> impl Future<Output = Result<T>> + Send + '_
  where
    F: FnOnce(&dyn SchedulingTx) -> Result<T> + Send + 'static,
    T: Send + 'static;
}
