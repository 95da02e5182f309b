//! [`SqliteStore`]: the SQLite implementation of [`SchedulingStore`].

use std::{future::Future, path::Path};

use chrono::NaiveDate;
use rusqlite::{OptionalExtension as _, Params, Row, TransactionBehavior};
use slate_core::{
  activity::Activity,
  lesson::Lesson,
  pack::{ClassTicket, Pack},
  school::{ActorRef, Instructor, School, Student},
  store::{SchedulingStore, SchedulingTx},
  unavailability::Unavailability,
};
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    ACTIVITY_COLUMNS, INSTRUCTOR_COLUMNS, LESSON_COLUMNS, PACK_COLUMNS, RawActivity,
    RawInstructor, RawLesson, RawPack, RawSchool, RawStudent, RawTicket, RawUnavailability,
    SCHOOL_COLUMNS, STUDENT_COLUMNS, TICKET_COLUMNS, UNAVAILABILITY_COLUMNS, encode_actor,
    encode_date, encode_dt, encode_json, encode_time, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A scheduling store backed by a single SQLite file.
///
/// Clones share the same connection thread. Writes run under
/// `BEGIN IMMEDIATE`, which takes SQLite's single writer lock before the
/// first read, so the oracle's check and the following write can never
/// interleave with another writer.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

impl SchedulingStore for SqliteStore {
  fn transact<T, F>(&self, f: F) -> impl Future<Output = slate_core::Result<T>> + Send + '_
  where
    F: FnOnce(&mut dyn SchedulingTx) -> slate_core::Result<T> + Send + 'static,
    T: Send + 'static,
  {
    async move {
      let outcome = self
        .conn
        .call(move |conn| {
          let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
          let result = f(&mut SqliteTx { conn: &tx });
          // Dropping an uncommitted transaction rolls it back.
          if result.is_ok() {
            tx.commit()?;
          }
          Ok(result)
        })
        .await;
      outcome.map_err(crate::Error::from)?
    }
  }

  fn read<T, F>(&self, f: F) -> impl Future<Output = slate_core::Result<T>> + Send + '_
  where
    F: FnOnce(&dyn SchedulingTx) -> slate_core::Result<T> + Send + 'static,
    T: Send + 'static,
  {
    async move {
      let outcome = self
        .conn
        .call(move |conn| {
          let tx = conn.transaction()?;
          Ok(f(&SqliteTx { conn: &tx }))
        })
        .await;
      outcome.map_err(crate::Error::from)?
    }
  }
}

// ─── Transaction view ────────────────────────────────────────────────────────

/// [`SchedulingTx`] over an open SQLite transaction.
struct SqliteTx<'c> {
  conn: &'c rusqlite::Connection,
}

impl SqliteTx<'_> {
  fn one<R, T>(
    &self,
    sql: &str,
    params: impl Params,
    raw: fn(&Row<'_>) -> rusqlite::Result<R>,
    decode: fn(R) -> Result<T>,
  ) -> Result<Option<T>> {
    self.conn.query_row(sql, params, raw).optional()?.map(decode).transpose()
  }

  fn many<R, T>(
    &self,
    sql: &str,
    params: impl Params,
    raw: fn(&Row<'_>) -> rusqlite::Result<R>,
    decode: fn(R) -> Result<T>,
  ) -> Result<Vec<T>> {
    let mut stmt = self.conn.prepare_cached(sql)?;
    let rows = stmt.query_map(params, raw)?.collect::<rusqlite::Result<Vec<R>>>()?;
    rows.into_iter().map(decode).collect()
  }

  fn lessons_with_member_on(
    &self,
    column: &str,
    member_id: Uuid,
    date: NaiveDate,
  ) -> Result<Vec<Lesson>> {
    let sql = format!(
      "SELECT {LESSON_COLUMNS} FROM lessons
       WHERE date = ?1
         AND EXISTS (SELECT 1 FROM json_each(lessons.{column}) WHERE value = ?2)
       ORDER BY start_time, lesson_id"
    );
    self.many(
      &sql,
      rusqlite::params![encode_date(date), encode_uuid(member_id)],
      RawLesson::from_row,
      RawLesson::into_lesson,
    )
  }

  fn write_school(&self, school: &School) -> Result<()> {
    self.conn.execute(
      &format!(
        "INSERT OR REPLACE INTO schools ({SCHOOL_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
      ),
      rusqlite::params![
        encode_uuid(school.school_id),
        school.name,
        school.currency,
        school.reschedule_time_limit,
        school.schedule_time_limit,
        encode_json(&school.notification_templates)?,
        encode_json(&school.admin_ids)?,
      ],
    )?;
    Ok(())
  }

  fn write_instructor(&self, instructor: &Instructor) -> Result<()> {
    self.conn.execute(
      &format!("INSERT OR REPLACE INTO instructors ({INSTRUCTOR_COLUMNS}) VALUES (?1, ?2, ?3)"),
      rusqlite::params![
        encode_uuid(instructor.instructor_id),
        encode_uuid(instructor.school_id),
        instructor.name,
      ],
    )?;
    Ok(())
  }

  fn write_student(&self, student: &Student) -> Result<()> {
    self.conn.execute(
      &format!("INSERT OR REPLACE INTO students ({STUDENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5)"),
      rusqlite::params![
        encode_uuid(student.student_id),
        encode_uuid(student.school_id),
        student.name,
        student.birth_date.map(encode_date),
        encode_json(&student.parent_ids)?,
      ],
    )?;
    Ok(())
  }

  fn write_lesson(&self, lesson: &Lesson) -> Result<()> {
    let date = lesson.slot.map(|s| encode_date(s.date));
    let start = lesson.slot.map(|s| encode_time(s.interval.start()));
    let end = lesson.slot.map(|s| encode_time(s.interval.end()));
    self.conn.execute(
      &format!(
        "INSERT OR REPLACE INTO lessons ({LESSON_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
      ),
      rusqlite::params![
        encode_uuid(lesson.lesson_id),
        encode_json(&lesson.kind)?,
        date,
        start,
        end,
        lesson.duration_minutes,
        encode_uuid(lesson.school_id),
        lesson.sport_id.map(encode_uuid),
        lesson.location_id.map(encode_uuid),
        encode_json(&lesson.instructor_ids)?,
        encode_json(&lesson.student_ids)?,
        lesson.is_done,
        lesson.is_cancelled,
        lesson.pack_id.map(encode_uuid),
        lesson.needs_calendar_sync,
        lesson.last_calendar_sync.map(encode_dt),
        encode_json(&lesson.calendar_event_ids)?,
      ],
    )?;
    Ok(())
  }

  fn write_activity(&self, activity: &Activity) -> Result<()> {
    self.conn.execute(
      &format!(
        "INSERT OR REPLACE INTO activities ({ACTIVITY_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
      ),
      rusqlite::params![
        encode_uuid(activity.activity_id),
        encode_uuid(activity.school_id),
        activity.name,
        encode_date(activity.date),
        encode_time(activity.interval.start()),
        encode_time(activity.interval.end()),
        encode_json(&activity.instructor_ids)?,
        encode_json(&activity.student_ids)?,
        encode_json(&activity.monitor_ids)?,
      ],
    )?;
    Ok(())
  }

  fn write_pack(&self, pack: &Pack) -> Result<()> {
    self.conn.execute(
      &format!(
        "INSERT OR REPLACE INTO packs ({PACK_COLUMNS})
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
      ),
      rusqlite::params![
        encode_uuid(pack.pack_id),
        pack.kind.to_string(),
        encode_date(pack.date),
        pack.number_of_classes,
        pack.number_of_classes_left,
        pack.duration_minutes,
        pack.price,
        pack.debt,
        pack.is_done,
        pack.is_paid,
        pack.is_suspended,
        pack.expiration_date.map(encode_date),
        encode_json(&pack.student_ids)?,
        encode_json(&pack.parent_ids)?,
        pack.instructor_id.map(encode_uuid),
        pack.sport_id.map(encode_uuid),
        encode_uuid(pack.school_id),
      ],
    )?;
    Ok(())
  }

  fn write_ticket(&self, ticket: &ClassTicket) -> Result<()> {
    self.conn.execute(
      &format!("INSERT OR REPLACE INTO class_tickets ({TICKET_COLUMNS}) VALUES (?1, ?2, ?3, ?4)"),
      rusqlite::params![
        encode_uuid(ticket.ticket_id),
        encode_uuid(ticket.pack_id),
        ticket.lesson_id.map(encode_uuid),
        ticket.student_id.map(encode_uuid),
      ],
    )?;
    Ok(())
  }

  fn write_unavailability(&self, unavailability: &Unavailability) -> Result<()> {
    let (actor_kind, actor_id) = encode_actor(unavailability.actor);
    self.conn.execute(
      &format!(
        "INSERT OR REPLACE INTO unavailabilities ({UNAVAILABILITY_COLUMNS}, duration_minutes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
      ),
      rusqlite::params![
        encode_uuid(unavailability.unavailability_id),
        actor_kind,
        actor_id,
        encode_date(unavailability.date),
        encode_time(unavailability.interval.start()),
        encode_time(unavailability.interval.end()),
        unavailability.school_id.map(encode_uuid),
        unavailability.duration_minutes(),
      ],
    )?;
    Ok(())
  }
}

impl SchedulingTx for SqliteTx<'_> {
  // ── Schools and people ──────────────────────────────────────────────────

  fn school(&self, id: Uuid) -> slate_core::Result<Option<School>> {
    Ok(self.one(
      &format!("SELECT {SCHOOL_COLUMNS} FROM schools WHERE school_id = ?1"),
      [encode_uuid(id)],
      RawSchool::from_row,
      RawSchool::into_school,
    )?)
  }

  fn put_school(&mut self, school: &School) -> slate_core::Result<()> {
    Ok(self.write_school(school)?)
  }

  fn instructor(&self, id: Uuid) -> slate_core::Result<Option<Instructor>> {
    Ok(self.one(
      &format!("SELECT {INSTRUCTOR_COLUMNS} FROM instructors WHERE instructor_id = ?1"),
      [encode_uuid(id)],
      RawInstructor::from_row,
      RawInstructor::into_instructor,
    )?)
  }

  fn instructors_of_school(&self, school_id: Uuid) -> slate_core::Result<Vec<Instructor>> {
    Ok(self.many(
      &format!(
        "SELECT {INSTRUCTOR_COLUMNS} FROM instructors WHERE school_id = ?1 ORDER BY instructor_id"
      ),
      [encode_uuid(school_id)],
      RawInstructor::from_row,
      RawInstructor::into_instructor,
    )?)
  }

  fn put_instructor(&mut self, instructor: &Instructor) -> slate_core::Result<()> {
    Ok(self.write_instructor(instructor)?)
  }

  fn student(&self, id: Uuid) -> slate_core::Result<Option<Student>> {
    Ok(self.one(
      &format!("SELECT {STUDENT_COLUMNS} FROM students WHERE student_id = ?1"),
      [encode_uuid(id)],
      RawStudent::from_row,
      RawStudent::into_student,
    )?)
  }

  fn put_student(&mut self, student: &Student) -> slate_core::Result<()> {
    Ok(self.write_student(student)?)
  }

  // ── Lessons ─────────────────────────────────────────────────────────────

  fn lesson(&self, id: Uuid) -> slate_core::Result<Option<Lesson>> {
    Ok(self.one(
      &format!("SELECT {LESSON_COLUMNS} FROM lessons WHERE lesson_id = ?1"),
      [encode_uuid(id)],
      RawLesson::from_row,
      RawLesson::into_lesson,
    )?)
  }

  fn put_lesson(&mut self, lesson: &Lesson) -> slate_core::Result<()> {
    Ok(self.write_lesson(lesson)?)
  }

  fn lessons_of_pack(&self, pack_id: Uuid) -> slate_core::Result<Vec<Lesson>> {
    Ok(self.many(
      &format!(
        "SELECT {LESSON_COLUMNS} FROM lessons WHERE pack_id = ?1
         ORDER BY json_extract(kind, '$.class_number'), lesson_id"
      ),
      [encode_uuid(pack_id)],
      RawLesson::from_row,
      RawLesson::into_lesson,
    )?)
  }

  fn lessons_with_instructor_on(
    &self,
    instructor_id: Uuid,
    date: NaiveDate,
  ) -> slate_core::Result<Vec<Lesson>> {
    Ok(self.lessons_with_member_on("instructor_ids", instructor_id, date)?)
  }

  fn lessons_with_student_on(
    &self,
    student_id: Uuid,
    date: NaiveDate,
  ) -> slate_core::Result<Vec<Lesson>> {
    Ok(self.lessons_with_member_on("student_ids", student_id, date)?)
  }

  // ── Activities ──────────────────────────────────────────────────────────

  fn activity(&self, id: Uuid) -> slate_core::Result<Option<Activity>> {
    Ok(self.one(
      &format!("SELECT {ACTIVITY_COLUMNS} FROM activities WHERE activity_id = ?1"),
      [encode_uuid(id)],
      RawActivity::from_row,
      RawActivity::into_activity,
    )?)
  }

  fn put_activity(&mut self, activity: &Activity) -> slate_core::Result<()> {
    Ok(self.write_activity(activity)?)
  }

  fn activities_on(&self, date: NaiveDate) -> slate_core::Result<Vec<Activity>> {
    Ok(self.many(
      &format!(
        "SELECT {ACTIVITY_COLUMNS} FROM activities WHERE date = ?1 ORDER BY start_time, activity_id"
      ),
      [encode_date(date)],
      RawActivity::from_row,
      RawActivity::into_activity,
    )?)
  }

  // ── Packs and tickets ───────────────────────────────────────────────────

  fn pack(&self, id: Uuid) -> slate_core::Result<Option<Pack>> {
    Ok(self.one(
      &format!("SELECT {PACK_COLUMNS} FROM packs WHERE pack_id = ?1"),
      [encode_uuid(id)],
      RawPack::from_row,
      RawPack::into_pack,
    )?)
  }

  fn put_pack(&mut self, pack: &Pack) -> slate_core::Result<()> { Ok(self.write_pack(pack)?) }

  fn tickets_of_pack(&self, pack_id: Uuid) -> slate_core::Result<Vec<ClassTicket>> {
    Ok(self.many(
      &format!("SELECT {TICKET_COLUMNS} FROM class_tickets WHERE pack_id = ?1 ORDER BY ticket_id"),
      [encode_uuid(pack_id)],
      RawTicket::from_row,
      RawTicket::into_ticket,
    )?)
  }

  fn tickets_of_lesson(&self, lesson_id: Uuid) -> slate_core::Result<Vec<ClassTicket>> {
    Ok(self.many(
      &format!(
        "SELECT {TICKET_COLUMNS} FROM class_tickets WHERE lesson_id = ?1 ORDER BY ticket_id"
      ),
      [encode_uuid(lesson_id)],
      RawTicket::from_row,
      RawTicket::into_ticket,
    )?)
  }

  fn put_ticket(&mut self, ticket: &ClassTicket) -> slate_core::Result<()> {
    Ok(self.write_ticket(ticket)?)
  }

  // ── Unavailability ──────────────────────────────────────────────────────

  fn unavailabilities_of(
    &self,
    actor: ActorRef,
    date: NaiveDate,
  ) -> slate_core::Result<Vec<Unavailability>> {
    let (actor_kind, actor_id) = encode_actor(actor);
    Ok(self.many(
      &format!(
        "SELECT {UNAVAILABILITY_COLUMNS} FROM unavailabilities
         WHERE actor_kind = ?1 AND actor_id = ?2 AND date = ?3
         ORDER BY start_time, end_time"
      ),
      rusqlite::params![actor_kind, actor_id, encode_date(date)],
      RawUnavailability::from_row,
      RawUnavailability::into_unavailability,
    )?)
  }

  fn put_unavailability(&mut self, unavailability: &Unavailability) -> slate_core::Result<()> {
    Ok(self.write_unavailability(unavailability)?)
  }

  fn delete_unavailability(&mut self, id: Uuid) -> slate_core::Result<()> {
    self
      .conn
      .execute("DELETE FROM unavailabilities WHERE unavailability_id = ?1", [encode_uuid(id)])
      .map_err(crate::Error::from)?;
    Ok(())
  }
}
