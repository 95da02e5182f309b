//! Subcommands and their dispatch onto the [`Scheduler`](slate_engine::Scheduler).

use anyhow::{Context as _, bail};
use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Subcommand};
use serde::Serialize;
use slate_core::{
  TimeInterval,
  activity::Activity,
  lesson::{Lesson, LessonKind},
  pack::{NewPack, PackKind},
  recurrence::{Frequency, Recurrence},
  school::{ActorRef, Instructor, School, Student},
  store::SchedulingStore,
  template::TemplateKey,
};
use tracing::info;
use uuid::Uuid;

use crate::{
  App,
  settings::{Settings, parse_time},
};

// ─── Commands ────────────────────────────────────────────────────────────────

#[derive(Subcommand)]
pub enum Command {
  /// Create schools and edit their policies.
  #[command(subcommand)]
  School(SchoolCommand),

  #[command(subcommand)]
  Instructor(InstructorCommand),

  #[command(subcommand)]
  Student(StudentCommand),

  /// Book packs and track their payments.
  #[command(subcommand)]
  Pack(PackCommand),

  /// Schedule, move, and complete lessons.
  #[command(subcommand)]
  Lesson(LessonCommand),

  /// Create group classes and manage their rosters.
  #[command(subcommand)]
  Class(ClassCommand),

  #[command(subcommand)]
  Activity(ActivityCommand),

  /// Mark a window as busy or free.
  #[command(subcommand)]
  Unavailability(UnavailabilityCommand),

  /// Check whether an instructor could take a lesson at a given time.
  Available {
    #[arg(long)]
    school:     Uuid,
    /// Leave out to let the school suggest a free instructor.
    #[arg(long)]
    instructor: Option<Uuid>,
    #[command(flatten)]
    window:     WindowArgs,
    /// Ignore this lesson's own occupation.
    #[arg(long)]
    exclude:    Option<Uuid>,
  },

  /// List everything blocking an instructor at a given time.
  Conflicts {
    #[arg(long)]
    instructor: Uuid,
    #[command(flatten)]
    window:     WindowArgs,
    #[arg(long)]
    exclude:    Option<Uuid>,
  },

  /// Check whether a student is free at a given time.
  StudentAvailable {
    #[arg(long)]
    student: Uuid,
    #[command(flatten)]
    window:  WindowArgs,
  },

  /// Free start times for an instructor on one day.
  Slots {
    #[arg(long)]
    instructor: Uuid,
    #[arg(long)]
    date:       NaiveDate,
    /// Lesson length in minutes.
    #[arg(long)]
    duration:   u32,
    /// Step between candidate starts, in minutes.
    #[arg(long)]
    increment:  Option<u32>,
  },
}

#[derive(Subcommand)]
pub enum SchoolCommand {
  Create {
    #[arg(long)]
    name:             String,
    /// ISO 4217 currency code.
    #[arg(long)]
    currency:         String,
    /// Hours before start after which lessons can no longer be moved.
    #[arg(long, default_value_t = 0)]
    reschedule_limit: i64,
    /// Minimum notice, in hours, for scheduling a lesson.
    #[arg(long, default_value_t = 0)]
    schedule_limit:   i64,
    /// Users who receive administrative copies of notifications.
    #[arg(long = "admin")]
    admins:           Vec<Uuid>,
  },

  /// Override the subject and/or body of one notification template.
  Template {
    #[arg(long)]
    school:  Uuid,
    #[arg(long)]
    key:     TemplateKey,
    #[arg(long)]
    subject: Option<String>,
    #[arg(long)]
    body:    Option<String>,
  },
}

#[derive(Subcommand)]
pub enum InstructorCommand {
  Create {
    #[arg(long)]
    school: Uuid,
    #[arg(long)]
    name:   String,
  },
}

#[derive(Subcommand)]
pub enum StudentCommand {
  Create {
    #[arg(long)]
    school:     Uuid,
    #[arg(long)]
    name:       String,
    #[arg(long)]
    birth_date: Option<NaiveDate>,
    #[arg(long = "parent")]
    parents:    Vec<Uuid>,
  },
}

#[derive(Subcommand)]
pub enum PackCommand {
  Book {
    #[arg(long)]
    school:     Uuid,
    /// `private` or `group`.
    #[arg(long)]
    kind:       PackKind,
    #[arg(long = "student", required = true)]
    students:   Vec<Uuid>,
    #[arg(long)]
    classes:    u32,
    /// Length of each class in minutes.
    #[arg(long)]
    duration:   u32,
    #[arg(long)]
    price:      f64,
    #[arg(long)]
    instructor: Option<Uuid>,
    #[arg(long)]
    sport:      Option<Uuid>,
    /// Amount paid at booking time.
    #[arg(long)]
    payment:    Option<f64>,
    /// Booking date; defaults to today.
    #[arg(long)]
    date:       Option<NaiveDate>,
    #[arg(long)]
    expires:    Option<NaiveDate>,
  },

  /// Record a payment against a pack.
  Pay {
    #[arg(long)]
    pack:   Uuid,
    #[arg(long)]
    amount: f64,
  },

  Suspend {
    #[arg(long)]
    pack: Uuid,
  },

  Resume {
    #[arg(long)]
    pack: Uuid,
  },

  /// Extend a pack by one class.
  AddClass {
    #[arg(long)]
    pack: Uuid,
  },

  Remaining {
    #[arg(long)]
    pack: Uuid,
  },
}

#[derive(Subcommand)]
pub enum LessonCommand {
  Schedule {
    #[arg(long)]
    lesson: Uuid,
    #[arg(long)]
    date:   NaiveDate,
    #[arg(long, value_parser = parse_time)]
    start:  NaiveTime,
  },

  Reschedule {
    #[arg(long)]
    lesson: Uuid,
    #[arg(long)]
    date:   NaiveDate,
    #[arg(long, value_parser = parse_time)]
    start:  NaiveTime,
  },

  Unschedule {
    #[arg(long)]
    lesson: Uuid,
  },

  CanReschedule {
    #[arg(long)]
    lesson: Uuid,
  },

  Done {
    #[arg(long)]
    lesson: Uuid,
  },

  Undone {
    #[arg(long)]
    lesson: Uuid,
  },

  Cancel {
    #[arg(long)]
    lesson: Uuid,
  },
}

#[derive(Subcommand)]
pub enum ClassCommand {
  Create {
    #[arg(long)]
    school:       Uuid,
    #[arg(long)]
    duration:     u32,
    #[arg(long)]
    level:        String,
    #[arg(long)]
    max_students: u32,
    #[arg(long)]
    min_age:      Option<u32>,
    #[arg(long)]
    max_age:      Option<u32>,
    #[arg(long)]
    sport:        Option<Uuid>,
    #[arg(long)]
    location:     Option<Uuid>,
  },

  AddStudent {
    #[arg(long)]
    class:   Uuid,
    #[arg(long)]
    student: Uuid,
    /// Group pack to draw a class ticket from.
    #[arg(long)]
    pack:    Option<Uuid>,
  },

  RemoveStudent {
    #[arg(long)]
    class:   Uuid,
    #[arg(long)]
    student: Uuid,
  },

  AddInstructor {
    #[arg(long)]
    class:      Uuid,
    #[arg(long)]
    instructor: Uuid,
  },

  RemoveInstructor {
    #[arg(long)]
    class:      Uuid,
    #[arg(long)]
    instructor: Uuid,
  },
}

#[derive(Subcommand)]
pub enum ActivityCommand {
  Create {
    #[arg(long)]
    school:      Uuid,
    #[arg(long)]
    name:        String,
    #[command(flatten)]
    window:      WindowArgs,
    #[arg(long = "instructor")]
    instructors: Vec<Uuid>,
    #[arg(long = "student")]
    students:    Vec<Uuid>,
    #[arg(long = "monitor")]
    monitors:    Vec<Uuid>,
  },
}

#[derive(Subcommand)]
pub enum UnavailabilityCommand {
  /// Mark a window busy, merging it with adjacent ones.
  Define {
    #[command(flatten)]
    actor:      ActorArgs,
    #[command(flatten)]
    window:     WindowArgs,
    #[command(flatten)]
    recurrence: RecurrenceArgs,
  },

  /// Carve a window out of existing unavailability.
  Free {
    #[command(flatten)]
    actor:      ActorArgs,
    #[command(flatten)]
    window:     WindowArgs,
    #[command(flatten)]
    recurrence: RecurrenceArgs,
  },
}

// ─── Shared arguments ────────────────────────────────────────────────────────

#[derive(Args)]
pub struct WindowArgs {
  #[arg(long)]
  date:  NaiveDate,
  #[arg(long, value_parser = parse_time)]
  start: NaiveTime,
  #[arg(long, value_parser = parse_time)]
  end:   NaiveTime,
}

impl WindowArgs {
  fn interval(&self) -> anyhow::Result<TimeInterval> {
    Ok(TimeInterval::new(self.start, self.end)?)
  }
}

#[derive(Args)]
pub struct ActorArgs {
  #[arg(long, conflicts_with = "student", required_unless_present = "student")]
  instructor: Option<Uuid>,
  #[arg(long)]
  student:    Option<Uuid>,
}

impl ActorArgs {
  fn actor(&self) -> anyhow::Result<ActorRef> {
    match (self.instructor, self.student) {
      (Some(id), None) => Ok(ActorRef::Instructor(id)),
      (None, Some(id)) => Ok(ActorRef::Student(id)),
      _ => bail!("pass exactly one of --instructor or --student"),
    }
  }
}

#[derive(Args)]
pub struct RecurrenceArgs {
  /// Repeat the window up to and including this date.
  #[arg(long)]
  until:     Option<NaiveDate>,
  /// `daily` or `weekly`.
  #[arg(long, default_value = "weekly", requires = "until")]
  frequency: Frequency,
  #[arg(long, default_value_t = 1, requires = "until")]
  every:     u32,
}

impl RecurrenceArgs {
  fn recurrence(&self) -> Option<Recurrence> {
    self.until.map(|until| Recurrence { frequency: self.frequency, every: self.every, until })
  }
}

// ─── Dispatch ────────────────────────────────────────────────────────────────

fn emit<T: Serialize>(value: &T) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value).context("failed to encode output")?);
  Ok(())
}

pub async fn run(app: &App, settings: &Settings, command: Command) -> anyhow::Result<()> {
  match command {
    Command::School(cmd) => run_school(app, cmd).await,
    Command::Instructor(InstructorCommand::Create { school, name }) => {
      let instructor = Instructor::new(school, name);
      let copy = instructor.clone();
      app
        .store()
        .transact(move |tx| {
          tx.require_school(copy.school_id)?;
          tx.put_instructor(&copy)
        })
        .await?;
      info!(instructor_id = %instructor.instructor_id, "instructor created");
      emit(&instructor)
    }
    Command::Student(StudentCommand::Create { school, name, birth_date, parents }) => {
      let mut student = Student::new(school, name);
      student.birth_date = birth_date;
      student.parent_ids = parents;
      let copy = student.clone();
      app
        .store()
        .transact(move |tx| {
          tx.require_school(copy.school_id)?;
          tx.put_student(&copy)
        })
        .await?;
      info!(student_id = %student.student_id, "student created");
      emit(&student)
    }
    Command::Pack(cmd) => run_pack(app, cmd).await,
    Command::Lesson(cmd) => run_lesson(app, cmd).await,
    Command::Class(cmd) => run_class(app, cmd).await,
    Command::Activity(ActivityCommand::Create {
      school,
      name,
      window,
      instructors,
      students,
      monitors,
    }) => {
      let mut activity = Activity::new(school, name, window.date, window.interval()?);
      activity.instructor_ids = instructors;
      activity.student_ids = students;
      activity.monitor_ids = monitors;
      let copy = activity.clone();
      app
        .store()
        .transact(move |tx| {
          tx.require_school(copy.school_id)?;
          tx.put_activity(&copy)
        })
        .await?;
      info!(activity_id = %activity.activity_id, "activity created");
      emit(&activity)
    }
    Command::Unavailability(cmd) => run_unavailability(app, cmd).await,
    Command::Available { school, instructor, window, exclude } => {
      let interval = window.interval()?;
      emit(&app.available(school, instructor, window.date, interval, exclude).await?)
    }
    Command::Conflicts { instructor, window, exclude } => {
      let interval = window.interval()?;
      emit(&app.conflicts(instructor, window.date, interval, exclude).await?)
    }
    Command::StudentAvailable { student, window } => {
      let interval = window.interval()?;
      emit(&app.student_available(student, window.date, interval).await?)
    }
    Command::Slots { instructor, date, duration, increment } => {
      let increment = increment.unwrap_or(settings.default_increment_minutes);
      let slots = app.free_slots(instructor, date, duration, increment).await?;
      let slots: Vec<String> = slots.iter().map(|t| t.format("%H:%M").to_string()).collect();
      emit(&slots)
    }
  }
}

async fn run_school(app: &App, cmd: SchoolCommand) -> anyhow::Result<()> {
  match cmd {
    SchoolCommand::Create { name, currency, reschedule_limit, schedule_limit, admins } => {
      let mut school = School::new(name, currency);
      school.reschedule_time_limit = reschedule_limit;
      school.schedule_time_limit = schedule_limit;
      school.admin_ids = admins;
      let copy = school.clone();
      app.store().transact(move |tx| tx.put_school(&copy)).await?;
      info!(school_id = %school.school_id, "school created");
      emit(&school)
    }
    SchoolCommand::Template { school, key, subject, body } => {
      if subject.is_none() && body.is_none() {
        bail!("pass --subject, --body, or both");
      }
      let school = app
        .store()
        .transact(move |tx| {
          let mut school = tx.require_school(school)?;
          if let Some(subject) = subject {
            school.notification_templates.insert(format!("{}_subject", key.as_ref()), subject);
          }
          if let Some(body) = body {
            school.notification_templates.insert(key.as_ref().to_string(), body);
          }
          tx.put_school(&school)?;
          Ok(school)
        })
        .await?;
      emit(&school)
    }
  }
}

async fn run_pack(app: &App, cmd: PackCommand) -> anyhow::Result<()> {
  match cmd {
    PackCommand::Book {
      school,
      kind,
      students,
      classes,
      duration,
      price,
      instructor,
      sport,
      payment,
      date,
      expires,
    } => {
      let mut input = NewPack::new(kind, school, students, classes, duration, price);
      input.instructor_id = instructor;
      input.sport_id = sport;
      input.payment = payment;
      input.date = date;
      input.expiration_date = expires;
      emit(&app.book_new_pack(input).await?)
    }
    PackCommand::Pay { pack, amount } => emit(&app.update_debt(pack, amount).await?),
    PackCommand::Suspend { pack } => emit(&app.suspend_pack(pack).await?),
    PackCommand::Resume { pack } => emit(&app.resume_pack(pack).await?),
    PackCommand::AddClass { pack } => emit(&app.add_class(pack).await?),
    PackCommand::Remaining { pack } => emit(&app.remaining_classes(pack).await?),
  }
}

async fn run_lesson(app: &App, cmd: LessonCommand) -> anyhow::Result<()> {
  match cmd {
    LessonCommand::Schedule { lesson, date, start } => {
      emit(&app.schedule_lesson(lesson, date, start).await?)
    }
    LessonCommand::Reschedule { lesson, date, start } => {
      emit(&app.reschedule_lesson(lesson, date, start).await?)
    }
    LessonCommand::Unschedule { lesson } => emit(&app.unschedule_lesson(lesson).await?),
    LessonCommand::CanReschedule { lesson } => emit(&app.can_still_reschedule(lesson).await?),
    LessonCommand::Done { lesson } => emit(&app.mark_done(lesson).await?),
    LessonCommand::Undone { lesson } => emit(&app.mark_undone(lesson).await?),
    LessonCommand::Cancel { lesson } => emit(&app.cancel_lesson(lesson).await?),
  }
}

async fn run_class(app: &App, cmd: ClassCommand) -> anyhow::Result<()> {
  match cmd {
    ClassCommand::Create {
      school,
      duration,
      level,
      max_students,
      min_age,
      max_age,
      sport,
      location,
    } => {
      let mut class = Lesson::group(school, duration, level, max_students);
      if let LessonKind::Group { min_age: min, max_age: max, .. } = &mut class.kind {
        *min = min_age;
        *max = max_age;
      }
      class.sport_id = sport;
      class.location_id = location;
      let copy = class.clone();
      app
        .store()
        .transact(move |tx| {
          tx.require_school(copy.school_id)?;
          tx.put_lesson(&copy)
        })
        .await?;
      info!(class_id = %class.lesson_id, "group class created");
      emit(&class)
    }
    ClassCommand::AddStudent { class, student, pack } => {
      emit(&app.add_student_to_group_class(class, student, pack).await?)
    }
    ClassCommand::RemoveStudent { class, student } => {
      emit(&app.remove_student_from_group_class(class, student).await?)
    }
    ClassCommand::AddInstructor { class, instructor } => {
      emit(&app.add_instructor_to_group_class(class, instructor).await?)
    }
    ClassCommand::RemoveInstructor { class, instructor } => {
      emit(&app.remove_instructor_from_group_class(class, instructor).await?)
    }
  }
}

async fn run_unavailability(app: &App, cmd: UnavailabilityCommand) -> anyhow::Result<()> {
  match cmd {
    UnavailabilityCommand::Define { actor, window, recurrence } => {
      let outcome = app
        .define_unavailability(
          actor.actor()?,
          window.date,
          window.start,
          window.end,
          recurrence.recurrence(),
        )
        .await?;
      emit(&outcome)
    }
    UnavailabilityCommand::Free { actor, window, recurrence } => {
      let outcome = app
        .define_availability(
          actor.actor()?,
          window.date,
          window.start,
          window.end,
          recurrence.recurrence(),
        )
        .await?;
      emit(&outcome)
    }
  }
}

#[cfg(test)]
mod tests {
  use clap::Parser;

  use super::*;

  #[derive(Parser)]
  struct Harness {
    #[command(subcommand)]
    command: Command,
  }

  fn parse(args: &[&str]) -> Result<Command, clap::Error> {
    Harness::try_parse_from(std::iter::once("slate").chain(args.iter().copied()))
      .map(|h| h.command)
  }

  #[test]
  fn schedule_accepts_short_times() {
    let id = Uuid::new_v4().to_string();
    let id = id.as_str();
    let command =
      parse(&["lesson", "schedule", "--lesson", id, "--date", "2025-07-01", "--start", "10:30"])
        .unwrap();
    let Command::Lesson(LessonCommand::Schedule { start, date, .. }) = command else {
      panic!("parsed the wrong command");
    };
    assert_eq!(start, NaiveTime::from_hms_opt(10, 30, 0).unwrap());
    assert_eq!(date, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap());
  }

  #[test]
  fn unavailability_needs_exactly_one_actor() {
    let id = Uuid::new_v4().to_string();
    let id = id.as_str();
    let window = ["--date", "2025-07-01", "--start", "09:00", "--end", "10:00"];

    let mut neither = vec!["unavailability", "define"];
    neither.extend(window);
    assert!(parse(&neither).is_err());

    let mut both = vec!["unavailability", "define", "--instructor", id, "--student", id];
    both.extend(window);
    assert!(parse(&both).is_err());

    let mut one = vec!["unavailability", "define", "--student", id];
    one.extend(window);
    let Command::Unavailability(UnavailabilityCommand::Define { actor, recurrence, .. }) =
      parse(&one).unwrap()
    else {
      panic!("parsed the wrong command");
    };
    assert!(matches!(actor.actor().unwrap(), ActorRef::Student(_)));
    assert!(recurrence.recurrence().is_none());
  }

  #[test]
  fn recurrence_is_built_from_until() {
    let id = Uuid::new_v4().to_string();
    let id = id.as_str();
    let args = [
      "unavailability",
      "free",
      "--instructor",
      id,
      "--date",
      "2025-07-01",
      "--start",
      "09:00",
      "--end",
      "10:00",
      "--until",
      "2025-07-29",
      "--frequency",
      "daily",
      "--every",
      "2",
    ];
    let Command::Unavailability(UnavailabilityCommand::Free { recurrence, .. }) =
      parse(&args).unwrap()
    else {
      panic!("parsed the wrong command");
    };
    let rule = recurrence.recurrence().unwrap();
    assert_eq!(rule.frequency, Frequency::Daily);
    assert_eq!(rule.every, 2);
    assert_eq!(rule.until, NaiveDate::from_ymd_opt(2025, 7, 29).unwrap());
  }

  #[test]
  fn pack_kinds_parse_lowercase() {
    let (school, student) = (Uuid::new_v4().to_string(), Uuid::new_v4().to_string());
    let (school, student) = (school.as_str(), student.as_str());
    let command = parse(&[
      "pack", "book", "--school", school, "--kind", "group", "--student", student, "--classes",
      "5", "--duration", "90", "--price", "150",
    ])
    .unwrap();
    assert!(matches!(command, Command::Pack(PackCommand::Book { kind: PackKind::Group, .. })));
  }
}
