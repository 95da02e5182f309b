//! Integration tests for `SqliteStore` against an in-memory database.

use std::{
  collections::BTreeMap,
  future::{Future, ready},
  sync::{Arc, Mutex},
};

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use slate_core::{
  BlockerKind, Entity, Error, TimeInterval,
  activity::Activity,
  clock::FixedClock,
  events::{EventSink, Notification, OutboundEvent, Recipient, SinkError},
  lesson::{Lesson, LessonKind, LessonSlot, LessonStatus},
  pack::{ClassTicket, NewPack, Pack, PackKind},
  school::{ActorRef, Instructor, School, Student},
  store::{SchedulingStore, SchedulingTx},
  unavailability::Unavailability,
};
use slate_engine::Scheduler;
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn d(y: i32, m: u32, day: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, day).unwrap() }

fn t(h: u32, m: u32) -> NaiveTime { NaiveTime::from_hms_opt(h, m, 0).unwrap() }

fn iv(a: u32, b: u32) -> TimeInterval { TimeInterval::new(t(a, 0), t(b, 0)).unwrap() }

async fn put<F>(s: &SqliteStore, f: F)
where
  F: FnOnce(&mut dyn SchedulingTx) -> slate_core::Result<()> + Send + 'static,
{
  s.transact(f).await.unwrap();
}

fn scheduled(
  school_id: Uuid,
  instructor_id: Uuid,
  date: NaiveDate,
  interval: TimeInterval,
) -> Lesson {
  let mut lesson = Lesson::private(school_id, 60, 1, 40.0);
  lesson.instructor_ids.push(instructor_id);
  lesson.slot = Some(LessonSlot { date, interval });
  lesson
}

// ─── Schools and people ──────────────────────────────────────────────────────

#[tokio::test]
async fn school_round_trips_with_templates_and_admins() {
  let s = store().await;

  let mut school = School::new("Surf Club", "EUR");
  school.reschedule_time_limit = 24;
  school.schedule_time_limit = 2;
  school.admin_ids.push(Uuid::new_v4());
  school
    .notification_templates
    .insert("class_cancelled_subject".into(), "No class on {date}".into());

  let copy = school.clone();
  put(&s, move |tx| tx.put_school(&copy)).await;

  let id = school.school_id;
  let fetched = s.read(move |tx| tx.school(id)).await.unwrap();
  assert_eq!(fetched, Some(school));
}

#[tokio::test]
async fn missing_rows_read_as_none_and_require_reports_not_found() {
  let s = store().await;
  let id = Uuid::new_v4();

  assert!(s.read(move |tx| tx.lesson(id)).await.unwrap().is_none());
  assert!(s.read(move |tx| tx.pack(id)).await.unwrap().is_none());

  let err = s.read(move |tx| tx.require_student(id)).await.unwrap_err();
  assert!(matches!(
    err,
    Error::NotFound { entity: Entity::Student, id: missing } if missing == id
  ));
}

#[tokio::test]
async fn instructors_are_listed_per_school() {
  let s = store().await;
  let school = School::new("Surf Club", "EUR");
  let other = School::new("Ski Club", "CHF");

  let ann = Instructor::new(school.school_id, "Ann");
  let bob = Instructor::new(school.school_id, "Bob");
  let eve = Instructor::new(other.school_id, "Eve");
  let rows = vec![ann.clone(), bob.clone(), eve];
  put(&s, move |tx| rows.iter().try_for_each(|i| tx.put_instructor(i))).await;

  let school_id = school.school_id;
  let mut names: Vec<String> = s
    .read(move |tx| tx.instructors_of_school(school_id))
    .await
    .unwrap()
    .into_iter()
    .map(|i| i.name)
    .collect();
  names.sort();
  assert_eq!(names, ["Ann", "Bob"]);
}

#[tokio::test]
async fn student_keeps_birth_date_and_parents() {
  let s = store().await;
  let mut student = Student::new(Uuid::new_v4(), "Sam");
  student.birth_date = Some(d(2014, 6, 30));
  student.parent_ids = vec![Uuid::new_v4(), Uuid::new_v4()];

  let copy = student.clone();
  put(&s, move |tx| tx.put_student(&copy)).await;

  let id = student.student_id;
  assert_eq!(s.read(move |tx| tx.require_student(id)).await.unwrap(), student);
}

// ─── Lessons ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn lesson_round_trips_scheduled_and_unscheduled() {
  let s = store().await;
  let school_id = Uuid::new_v4();

  let mut lesson = scheduled(school_id, Uuid::new_v4(), d(2025, 3, 1), iv(9, 10));
  lesson.needs_calendar_sync = true;
  lesson.last_calendar_sync = Some(Utc.with_ymd_and_hms(2025, 2, 28, 12, 0, 0).unwrap());
  lesson.calendar_event_ids = BTreeMap::from([("user-1".to_string(), "evt-9".to_string())]);

  let mut class = Lesson::group(school_id, 90, "advanced", 6);
  class.student_ids.push(Uuid::new_v4());

  let (a, b) = (lesson.clone(), class.clone());
  put(&s, move |tx| {
    tx.put_lesson(&a)?;
    tx.put_lesson(&b)
  })
  .await;

  let (lesson_id, class_id) = (lesson.lesson_id, class.lesson_id);
  let (fetched_lesson, fetched_class) = s
    .read(move |tx| Ok((tx.require_lesson(lesson_id)?, tx.require_lesson(class_id)?)))
    .await
    .unwrap();

  assert_eq!(fetched_lesson, lesson);
  assert_eq!(fetched_lesson.status(), LessonStatus::Scheduled);
  assert_eq!(fetched_class, class);
  assert!(matches!(fetched_class.kind, LessonKind::Group { max_students: 6, .. }));
  assert_eq!(fetched_class.status(), LessonStatus::Unscheduled);
}

#[tokio::test]
async fn putting_a_lesson_again_replaces_it() {
  let s = store().await;
  let mut lesson = scheduled(Uuid::new_v4(), Uuid::new_v4(), d(2025, 3, 1), iv(9, 10));
  let copy = lesson.clone();
  put(&s, move |tx| tx.put_lesson(&copy)).await;

  lesson.slot = None;
  let copy = lesson.clone();
  put(&s, move |tx| tx.put_lesson(&copy)).await;

  let id = lesson.lesson_id;
  let fetched = s.read(move |tx| tx.require_lesson(id)).await.unwrap();
  assert_eq!(fetched.slot, None);
}

#[tokio::test]
async fn lessons_on_a_date_are_filtered_by_member_and_ordered_by_start() {
  let s = store().await;
  let school_id = Uuid::new_v4();
  let (ann, bob) = (Uuid::new_v4(), Uuid::new_v4());
  let day = d(2025, 3, 1);

  let late = scheduled(school_id, ann, day, iv(14, 15));
  let early = scheduled(school_id, ann, day, iv(9, 10));
  let other_day = scheduled(school_id, ann, d(2025, 3, 2), iv(9, 10));
  let other_instructor = scheduled(school_id, bob, day, iv(11, 12));
  let mut with_student = scheduled(school_id, bob, day, iv(16, 17));
  let student = Uuid::new_v4();
  with_student.student_ids.push(student);

  let rows = vec![late.clone(), early.clone(), other_day, other_instructor, with_student.clone()];
  put(&s, move |tx| rows.iter().try_for_each(|l| tx.put_lesson(l))).await;

  let ids: Vec<Uuid> = s
    .read(move |tx| tx.lessons_with_instructor_on(ann, day))
    .await
    .unwrap()
    .into_iter()
    .map(|l| l.lesson_id)
    .collect();
  assert_eq!(ids, [early.lesson_id, late.lesson_id]);

  let for_student = s.read(move |tx| tx.lessons_with_student_on(student, day)).await.unwrap();
  assert_eq!(for_student, [with_student]);
}

#[tokio::test]
async fn lessons_of_pack_follow_class_number() {
  let s = store().await;
  let school_id = Uuid::new_v4();
  let pack_id = Uuid::new_v4();

  let lessons: Vec<Lesson> = [3, 1, 2]
    .into_iter()
    .map(|n| {
      let mut lesson = Lesson::private(school_id, 60, n, 30.0);
      lesson.pack_id = Some(pack_id);
      lesson
    })
    .collect();
  put(&s, move |tx| lessons.iter().try_for_each(|l| tx.put_lesson(l))).await;

  let numbers: Vec<u32> = s
    .read(move |tx| tx.lessons_of_pack(pack_id))
    .await
    .unwrap()
    .into_iter()
    .filter_map(|l| match l.kind {
      LessonKind::Private { class_number, .. } => Some(class_number),
      LessonKind::Group { .. } => None,
    })
    .collect();
  assert_eq!(numbers, [1, 2, 3]);
}

// ─── Activities ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn activities_are_listed_by_date() {
  let s = store().await;
  let school_id = Uuid::new_v4();

  let mut trip = Activity::new(school_id, "Coastal trip", d(2025, 3, 1), iv(13, 17));
  trip.instructor_ids.push(Uuid::new_v4());
  trip.monitor_ids.push(Uuid::new_v4());
  let party = Activity::new(school_id, "Beach party", d(2025, 3, 1), iv(10, 12));
  let elsewhere = Activity::new(school_id, "Cleanup", d(2025, 3, 2), iv(10, 12));

  let rows = vec![trip.clone(), party.clone(), elsewhere];
  put(&s, move |tx| rows.iter().try_for_each(|a| tx.put_activity(a))).await;

  let on_day = s.read(|tx| tx.activities_on(d(2025, 3, 1))).await.unwrap();
  assert_eq!(on_day, [party, trip.clone()]);

  let id = trip.activity_id;
  assert_eq!(s.read(move |tx| tx.activity(id)).await.unwrap(), Some(trip));
}

// ─── Packs and tickets ───────────────────────────────────────────────────────

#[tokio::test]
async fn pack_round_trips() {
  let s = store().await;
  let mut input =
    NewPack::new(PackKind::Group, Uuid::new_v4(), vec![Uuid::new_v4()], 4, 90, 120.0);
  input.payment = Some(20.0);
  input.expiration_date = Some(d(2025, 6, 30));
  let pack = Pack::from_booking(&input, d(2025, 3, 1), vec![Uuid::new_v4()]);

  let copy = pack.clone();
  put(&s, move |tx| tx.put_pack(&copy)).await;

  let id = pack.pack_id;
  let fetched = s.read(move |tx| tx.require_pack(id)).await.unwrap();
  assert_eq!(fetched, pack);
  assert_eq!(fetched.kind, PackKind::Group);
}

#[tokio::test]
async fn tickets_are_found_by_pack_and_by_lesson() {
  let s = store().await;
  let pack_id = Uuid::new_v4();
  let class_id = Uuid::new_v4();

  let unused = ClassTicket::unused(pack_id);
  let mut used = ClassTicket::unused(pack_id);
  used.lesson_id = Some(class_id);
  used.student_id = Some(Uuid::new_v4());
  let stranger = ClassTicket::unused(Uuid::new_v4());

  let rows = vec![unused.clone(), used.clone(), stranger];
  put(&s, move |tx| rows.iter().try_for_each(|t| tx.put_ticket(t))).await;

  let mut of_pack = s.read(move |tx| tx.tickets_of_pack(pack_id)).await.unwrap();
  of_pack.sort_by_key(|t| t.is_used());
  assert_eq!(of_pack, [unused, used.clone()]);

  let of_lesson = s.read(move |tx| tx.tickets_of_lesson(class_id)).await.unwrap();
  assert_eq!(of_lesson, [used]);
}

// ─── Unavailability ──────────────────────────────────────────────────────────

#[tokio::test]
async fn unavailabilities_are_ordered_by_start_and_deletable() {
  let s = store().await;
  let actor = ActorRef::Instructor(Uuid::new_v4());
  let day = d(2025, 3, 1);

  let afternoon = Unavailability::new(actor, day, iv(14, 16), None);
  let morning = Unavailability::new(actor, day, iv(8, 9), Some(Uuid::new_v4()));
  let tomorrow = Unavailability::new(actor, d(2025, 3, 2), iv(8, 9), None);
  let someone_else = Unavailability::new(ActorRef::Student(actor.id()), day, iv(8, 9), None);

  let rows = vec![afternoon.clone(), morning.clone(), tomorrow, someone_else];
  put(&s, move |tx| rows.iter().try_for_each(|u| tx.put_unavailability(u))).await;

  let windows = s.read(move |tx| tx.unavailabilities_of(actor, day)).await.unwrap();
  assert_eq!(windows, [morning.clone(), afternoon.clone()]);

  let id = morning.unavailability_id;
  put(&s, move |tx| tx.delete_unavailability(id)).await;
  let windows = s.read(move |tx| tx.unavailabilities_of(actor, day)).await.unwrap();
  assert_eq!(windows, [afternoon]);
}

// ─── Transactions ────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_transactions_leave_no_trace() {
  let s = store().await;
  let school = School::new("Surf Club", "EUR");
  let id = school.school_id;

  let err = s
    .transact(move |tx| {
      tx.put_school(&school)?;
      Err::<(), _>(Error::IllegalState("abort".into()))
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::IllegalState(_)));

  assert!(s.read(move |tx| tx.school(id)).await.unwrap().is_none());
}

#[tokio::test]
async fn transactions_return_their_value_after_commit() {
  let s = store().await;
  let school = School::new("Surf Club", "EUR");
  let id = s
    .transact(move |tx| {
      tx.put_school(&school)?;
      Ok(school.school_id)
    })
    .await
    .unwrap();

  assert!(s.read(move |tx| tx.school(id)).await.unwrap().is_some());
}

#[tokio::test]
async fn data_survives_reopening_the_file() {
  let path = std::env::temp_dir().join(format!("slate-{}.db", Uuid::new_v4()));
  let school = School::new("Surf Club", "EUR");
  let id = school.school_id;

  {
    let s = SqliteStore::open(&path).await.unwrap();
    put(&s, move |tx| tx.put_school(&school)).await;
  }

  let s = SqliteStore::open(&path).await.unwrap();
  let fetched = s.read(move |tx| tx.require_school(id)).await.unwrap();
  assert_eq!(fetched.name, "Surf Club");

  drop(s);
  for suffix in ["", "-wal", "-shm"] {
    let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
  }
}

// ─── Engine on SQLite ────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct RecordingSink {
  events: Arc<Mutex<Vec<OutboundEvent>>>,
}

impl RecordingSink {
  fn record(&self, event: OutboundEvent) -> Result<(), SinkError> {
    self.events.lock().unwrap().push(event);
    Ok(())
  }

  fn len(&self) -> usize { self.events.lock().unwrap().len() }
}

impl EventSink for RecordingSink {
  fn notify(
    &self,
    notification: &Notification,
  ) -> impl Future<Output = Result<(), SinkError>> + Send {
    ready(self.record(OutboundEvent::Notify(notification.clone())))
  }

  fn notify_push(
    &self,
    recipient: &Recipient,
    title: &str,
    body: &str,
  ) -> impl Future<Output = Result<(), SinkError>> + Send {
    ready(self.record(OutboundEvent::Push {
      recipient: *recipient,
      title:     title.to_string(),
      body:      body.to_string(),
    }))
  }

  fn mark_for_calendar_sync(
    &self,
    lesson_id: Uuid,
  ) -> impl Future<Output = Result<(), SinkError>> + Send {
    ready(self.record(OutboundEvent::CalendarSync { lesson_id }))
  }
}

struct Engine {
  scheduler:  Scheduler<SqliteStore, RecordingSink, FixedClock>,
  sink:       RecordingSink,
  school:     School,
  instructor: Instructor,
  student:    Student,
}

async fn engine() -> Engine {
  let s = store().await;
  let school = School::new("Surf Club", "EUR");
  let instructor = Instructor::new(school.school_id, "Ann");
  let mut student = Student::new(school.school_id, "Sam");
  student.parent_ids.push(Uuid::new_v4());

  let (a, b, c) = (school.clone(), instructor.clone(), student.clone());
  put(&s, move |tx| {
    tx.put_school(&a)?;
    tx.put_instructor(&b)?;
    tx.put_student(&c)
  })
  .await;

  let sink = RecordingSink::default();
  let clock = FixedClock(d(2025, 1, 1).and_time(t(8, 0)));
  Engine {
    scheduler: Scheduler::with_clock(s, sink.clone(), clock),
    sink,
    school,
    instructor,
    student,
  }
}

impl Engine {
  async fn private_pack(&self, classes: u32) -> (Uuid, Vec<Lesson>) {
    let mut input = NewPack::new(
      PackKind::Private,
      self.school.school_id,
      vec![self.student.student_id],
      classes,
      60,
      100.0,
    );
    input.instructor_id = Some(self.instructor.instructor_id);
    let pack = self.scheduler.book_new_pack(input).await.unwrap();
    let pack_id = pack.pack_id;
    let lessons =
      self.scheduler.store().read(move |tx| tx.lessons_of_pack(pack_id)).await.unwrap();
    (pack_id, lessons)
  }

  async fn windows(&self, actor: ActorRef, date: NaiveDate) -> Vec<Unavailability> {
    self.scheduler.store().read(move |tx| tx.unavailabilities_of(actor, date)).await.unwrap()
  }
}

#[tokio::test]
async fn overlapping_bookings_are_rejected_and_rolled_back() {
  let e = engine().await;
  let (_, lessons) = e.private_pack(2).await;
  let day = d(2025, 1, 2);

  e.scheduler.schedule_lesson(lessons[0].lesson_id, day, t(10, 0)).await.unwrap();
  let delivered = e.sink.len();

  let err = e
    .scheduler
    .schedule_lesson(lessons[1].lesson_id, day, t(10, 30))
    .await
    .unwrap_err();
  assert_eq!(err.blockers().len(), 1);
  assert_eq!(err.blockers()[0].kind, BlockerKind::PrivateLesson);
  assert_eq!(err.blockers()[0].reference, lessons[0].lesson_id);
  assert_eq!(e.sink.len(), delivered);

  let second = lessons[1].lesson_id;
  let stored = e.scheduler.store().read(move |tx| tx.require_lesson(second)).await.unwrap();
  assert_eq!(stored.slot, None);
}

#[tokio::test]
async fn completing_a_pack_persists_its_counters() {
  let e = engine().await;
  let (pack_id, lessons) = e.private_pack(2).await;

  for (lesson, hour) in lessons.iter().zip([10, 12]) {
    e.scheduler.schedule_lesson(lesson.lesson_id, d(2025, 1, 2), t(hour, 0)).await.unwrap();
    e.scheduler.mark_done(lesson.lesson_id).await.unwrap();
  }

  let pack = e.scheduler.store().read(move |tx| tx.require_pack(pack_id)).await.unwrap();
  assert_eq!(pack.number_of_classes_left, 0);
  assert!(pack.is_done);
  assert_eq!(e.scheduler.remaining_classes(pack_id).await.unwrap(), 0);
}

#[tokio::test]
async fn touching_unavailability_is_merged_in_the_database() {
  let e = engine().await;
  let actor = ActorRef::Instructor(e.instructor.instructor_id);
  let day = d(2025, 1, 3);

  e.scheduler.define_unavailability(actor, day, t(9, 0), t(10, 0), None).await.unwrap();
  e.scheduler.define_unavailability(actor, day, t(10, 0), t(11, 0), None).await.unwrap();

  let windows = e.windows(actor, day).await;
  assert_eq!(windows.len(), 1);
  assert_eq!(windows[0].interval, iv(9, 11));

  e.scheduler.define_availability(actor, day, t(9, 30), t(10, 0), None).await.unwrap();
  let windows = e.windows(actor, day).await;
  let intervals: Vec<TimeInterval> = windows.iter().map(|w| w.interval).collect();
  assert_eq!(intervals, [
    TimeInterval::new(t(9, 0), t(9, 30)).unwrap(),
    iv(10, 11)
  ]);
}
