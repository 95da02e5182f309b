//! The [`Scheduler`] facade: every engine operation as one async call.

use chrono::{NaiveDate, NaiveTime};
use slate_core::{
  Blocker, Result, TimeInterval,
  clock::{Clock, SystemClock},
  events::{EventSink, Outbox},
  lesson::Lesson,
  pack::{NewPack, Pack},
  recurrence::Recurrence,
  school::ActorRef,
  store::{SchedulingStore, SchedulingTx},
};
use uuid::Uuid;

use crate::{
  availability::{self, AvailabilityOutcome, UnavailabilityOutcome},
  dispatch,
  group,
  hours::WorkingHours,
  lessons,
  oracle::{self, Availability},
  packs,
  slots::{self, SlotQuery},
};

/// Runs engine operations against a store, delivering their events to a
/// sink once committed.
///
/// The scheduler holds no state of its own beyond its collaborators, so any
/// number of them may share one database.
pub struct Scheduler<S, E, C = SystemClock> {
  store: S,
  sink:  E,
  clock: C,
  hours: WorkingHours,
}

impl<S: SchedulingStore, E: EventSink> Scheduler<S, E> {
  pub fn new(store: S, sink: E) -> Self { Self::with_clock(store, sink, SystemClock) }
}

impl<S: SchedulingStore, E: EventSink, C: Clock> Scheduler<S, E, C> {
  pub fn with_clock(store: S, sink: E, clock: C) -> Self {
    Self { store, sink, clock, hours: WorkingHours::default() }
  }

  pub fn with_working_hours(mut self, hours: WorkingHours) -> Self {
    self.hours = hours;
    self
  }

  pub fn store(&self) -> &S { &self.store }

  pub fn sink(&self) -> &E { &self.sink }

  pub fn working_hours(&self) -> WorkingHours { self.hours }

  /// Run `f` in a transaction, then drain the events it queued.
  async fn run<T, F>(&self, f: F) -> Result<T>
  where
    F: FnOnce(&mut dyn SchedulingTx, &mut Outbox) -> Result<T> + Send + 'static,
    T: Send + 'static,
  {
    let (value, outbox) = self
      .store
      .transact(move |tx| {
        let mut outbox = Outbox::default();
        let value = f(tx, &mut outbox)?;
        Ok((value, outbox))
      })
      .await?;
    dispatch::drain(&self.sink, outbox).await;
    Ok(value)
  }

  // ─── Lessons ─────────────────────────────────────────────────────────────

  pub async fn schedule_lesson(
    &self,
    lesson_id: Uuid,
    date: NaiveDate,
    start: NaiveTime,
  ) -> Result<Lesson> {
    let now = self.clock.now();
    self
      .run(move |tx, outbox| lessons::schedule(tx, outbox, lesson_id, date, start, now))
      .await
  }

  /// Returns `false` if the lesson was already unscheduled.
  pub async fn unschedule_lesson(&self, lesson_id: Uuid) -> Result<bool> {
    self.run(move |tx, outbox| lessons::unschedule(tx, outbox, lesson_id)).await
  }

  pub async fn reschedule_lesson(
    &self,
    lesson_id: Uuid,
    date: NaiveDate,
    start: NaiveTime,
  ) -> Result<Lesson> {
    let now = self.clock.now();
    self
      .run(move |tx, outbox| lessons::reschedule(tx, outbox, lesson_id, date, start, now))
      .await
  }

  pub async fn can_still_reschedule(&self, lesson_id: Uuid) -> Result<bool> {
    let now = self.clock.now();
    self
      .store
      .read(move |tx| {
        let lesson = tx.require_lesson(lesson_id)?;
        let school = tx.require_school(lesson.school_id)?;
        Ok(lessons::can_still_reschedule(&lesson, &school, now))
      })
      .await
  }

  pub async fn mark_done(&self, lesson_id: Uuid) -> Result<Lesson> {
    self.run(move |tx, outbox| lessons::mark_done(tx, outbox, lesson_id)).await
  }

  pub async fn mark_undone(&self, lesson_id: Uuid) -> Result<Lesson> {
    self.run(move |tx, outbox| lessons::mark_undone(tx, outbox, lesson_id)).await
  }

  pub async fn cancel_lesson(&self, lesson_id: Uuid) -> Result<Lesson> {
    self.run(move |tx, outbox| lessons::cancel(tx, outbox, lesson_id)).await
  }

  // ─── Group classes ───────────────────────────────────────────────────────

  pub async fn add_student_to_group_class(
    &self,
    class_id: Uuid,
    student_id: Uuid,
    pack_id: Option<Uuid>,
  ) -> Result<Lesson> {
    self
      .run(move |tx, outbox| group::add_student(tx, outbox, class_id, student_id, pack_id))
      .await
  }

  pub async fn remove_student_from_group_class(
    &self,
    class_id: Uuid,
    student_id: Uuid,
  ) -> Result<Lesson> {
    self.run(move |tx, outbox| group::remove_student(tx, outbox, class_id, student_id)).await
  }

  pub async fn add_instructor_to_group_class(
    &self,
    class_id: Uuid,
    instructor_id: Uuid,
  ) -> Result<Lesson> {
    self.run(move |tx, outbox| group::add_instructor(tx, outbox, class_id, instructor_id)).await
  }

  pub async fn remove_instructor_from_group_class(
    &self,
    class_id: Uuid,
    instructor_id: Uuid,
  ) -> Result<Lesson> {
    self
      .run(move |tx, outbox| group::remove_instructor(tx, outbox, class_id, instructor_id))
      .await
  }

  // ─── Unavailability ──────────────────────────────────────────────────────

  pub async fn define_unavailability(
    &self,
    actor: ActorRef,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    recurrence: Option<Recurrence>,
  ) -> Result<UnavailabilityOutcome> {
    let interval = TimeInterval::new(start, end)?;
    self
      .run(move |tx, outbox| {
        availability::define_unavailability(tx, outbox, actor, date, interval, recurrence.as_ref())
      })
      .await
  }

  pub async fn define_availability(
    &self,
    actor: ActorRef,
    date: NaiveDate,
    start: NaiveTime,
    end: NaiveTime,
    recurrence: Option<Recurrence>,
  ) -> Result<AvailabilityOutcome> {
    let interval = TimeInterval::new(start, end)?;
    self
      .run(move |tx, _| {
        availability::define_availability(tx, actor, date, interval, recurrence.as_ref())
      })
      .await
  }

  // ─── Queries ─────────────────────────────────────────────────────────────

  /// Start times on `date` at which `instructor_id` could take a lesson of
  /// `duration_minutes`, stepping by `increment_minutes` through the working
  /// day.
  pub async fn free_slots(
    &self,
    instructor_id: Uuid,
    date: NaiveDate,
    duration_minutes: u32,
    increment_minutes: u32,
  ) -> Result<Vec<NaiveTime>> {
    let now = self.clock.now();
    let hours = self.hours;
    let query = SlotQuery { instructor_id, date, duration_minutes, increment_minutes };
    self
      .store
      .read(move |tx| {
        let instructor = tx.require_instructor(instructor_id)?;
        let school = tx.require_school(instructor.school_id)?;
        slots::free_slots(tx, &school, query, &hours, now)
      })
      .await
  }

  pub async fn available(
    &self,
    school_id: Uuid,
    instructor_id: Option<Uuid>,
    date: NaiveDate,
    interval: TimeInterval,
    exclude_lesson: Option<Uuid>,
  ) -> Result<Availability> {
    self
      .store
      .read(move |tx| {
        oracle::available(tx, school_id, instructor_id, date, interval, exclude_lesson)
      })
      .await
  }

  pub async fn conflicts(
    &self,
    instructor_id: Uuid,
    date: NaiveDate,
    interval: TimeInterval,
    exclude_lesson: Option<Uuid>,
  ) -> Result<Vec<Blocker>> {
    self
      .store
      .read(move |tx| oracle::conflicts(tx, instructor_id, date, interval, exclude_lesson))
      .await
  }

  pub async fn student_available(
    &self,
    student_id: Uuid,
    date: NaiveDate,
    interval: TimeInterval,
  ) -> Result<bool> {
    self
      .store
      .read(move |tx| oracle::student_available(tx, student_id, date, interval))
      .await
  }

  // ─── Packs ───────────────────────────────────────────────────────────────

  pub async fn book_new_pack(&self, input: NewPack) -> Result<Pack> {
    let today = self.clock.today();
    self.run(move |tx, outbox| packs::book_new_pack(tx, outbox, input, today)).await
  }

  pub async fn update_debt(&self, pack_id: Uuid, amount: f64) -> Result<Pack> {
    self.run(move |tx, _| packs::update_debt(tx, pack_id, amount)).await
  }

  pub async fn suspend_pack(&self, pack_id: Uuid) -> Result<Pack> {
    self.run(move |tx, outbox| packs::suspend(tx, outbox, pack_id)).await
  }

  pub async fn resume_pack(&self, pack_id: Uuid) -> Result<Pack> {
    self.run(move |tx, outbox| packs::resume(tx, outbox, pack_id)).await
  }

  pub async fn add_class(&self, pack_id: Uuid) -> Result<Pack> {
    self.run(move |tx, _| packs::add_class(tx, pack_id)).await
  }

  pub async fn remaining_classes(&self, pack_id: Uuid) -> Result<u32> {
    self.store.read(move |tx| packs::remaining_classes(tx, pack_id)).await
  }
}
