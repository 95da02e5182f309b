//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! UUIDs are stored as hyphenated lowercase strings, dates as `YYYY-MM-DD`,
//! times of day as `HH:MM:SS`, and timestamps as RFC 3339. Id lists, maps,
//! and lesson kinds are stored as compact JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::Row;
use serde::{Serialize, de::DeserializeOwned};
use slate_core::{
  TimeInterval,
  activity::Activity,
  lesson::{Lesson, LessonSlot},
  pack::{ClassTicket, Pack, PackKind},
  school::{ActorRef, Instructor, School, Student},
  unavailability::Unavailability,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_date(date: NaiveDate) -> String { date.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_time(time: NaiveTime) -> String { time.format("%H:%M:%S").to_string() }

pub fn decode_time(s: &str) -> Result<NaiveTime> {
  NaiveTime::parse_from_str(s, "%H:%M:%S").map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_interval(start: &str, end: &str) -> Result<TimeInterval> {
  Ok(TimeInterval::new(decode_time(start)?, decode_time(end)?)?)
}

pub fn encode_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
  Ok(serde_json::to_string(value)?)
}

fn decode_json<T: DeserializeOwned>(s: &str) -> Result<T> { Ok(serde_json::from_str(s)?) }

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn encode_actor(actor: ActorRef) -> (&'static str, String) {
  match actor {
    ActorRef::Instructor(id) => ("instructor", encode_uuid(id)),
    ActorRef::Student(id) => ("student", encode_uuid(id)),
  }
}

fn decode_actor(kind: &str, id: &str) -> Result<ActorRef> {
  let id = decode_uuid(id)?;
  match kind {
    "instructor" => Ok(ActorRef::Instructor(id)),
    "student" => Ok(ActorRef::Student(id)),
    other => Err(Error::UnknownValue { column: "actor_kind", value: other.to_owned() }),
  }
}

fn decode_pack_kind(s: &str) -> Result<PackKind> {
  s.parse()
    .map_err(|_| Error::UnknownValue { column: "packs.kind", value: s.to_owned() })
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const SCHOOL_COLUMNS: &str = "school_id, name, currency, reschedule_time_limit, \
                                  schedule_time_limit, notification_templates, admin_ids";

/// Raw values read directly from a `schools` row.
pub struct RawSchool {
  pub school_id:              String,
  pub name:                   String,
  pub currency:               String,
  pub reschedule_time_limit:  i64,
  pub schedule_time_limit:    i64,
  pub notification_templates: String,
  pub admin_ids:              String,
}

impl RawSchool {
  pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      school_id:              r.get(0)?,
      name:                   r.get(1)?,
      currency:               r.get(2)?,
      reschedule_time_limit:  r.get(3)?,
      schedule_time_limit:    r.get(4)?,
      notification_templates: r.get(5)?,
      admin_ids:              r.get(6)?,
    })
  }

  pub fn into_school(self) -> Result<School> {
    let notification_templates: BTreeMap<String, String> =
      decode_json(&self.notification_templates)?;
    Ok(School {
      school_id: decode_uuid(&self.school_id)?,
      name: self.name,
      currency: self.currency,
      reschedule_time_limit: self.reschedule_time_limit,
      schedule_time_limit: self.schedule_time_limit,
      notification_templates,
      admin_ids: decode_json(&self.admin_ids)?,
    })
  }
}

pub const INSTRUCTOR_COLUMNS: &str = "instructor_id, school_id, name";

pub struct RawInstructor {
  pub instructor_id: String,
  pub school_id:     String,
  pub name:          String,
}

impl RawInstructor {
  pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self { instructor_id: r.get(0)?, school_id: r.get(1)?, name: r.get(2)? })
  }

  pub fn into_instructor(self) -> Result<Instructor> {
    Ok(Instructor {
      instructor_id: decode_uuid(&self.instructor_id)?,
      school_id:     decode_uuid(&self.school_id)?,
      name:          self.name,
    })
  }
}

pub const STUDENT_COLUMNS: &str = "student_id, school_id, name, birth_date, parent_ids";

pub struct RawStudent {
  pub student_id: String,
  pub school_id:  String,
  pub name:       String,
  pub birth_date: Option<String>,
  pub parent_ids: String,
}

impl RawStudent {
  pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      student_id: r.get(0)?,
      school_id:  r.get(1)?,
      name:       r.get(2)?,
      birth_date: r.get(3)?,
      parent_ids: r.get(4)?,
    })
  }

  pub fn into_student(self) -> Result<Student> {
    Ok(Student {
      student_id: decode_uuid(&self.student_id)?,
      school_id:  decode_uuid(&self.school_id)?,
      name:       self.name,
      birth_date: self.birth_date.as_deref().map(decode_date).transpose()?,
      parent_ids: decode_json(&self.parent_ids)?,
    })
  }
}

pub const LESSON_COLUMNS: &str = "lesson_id, kind, date, start_time, end_time, duration_minutes, \
                                  school_id, sport_id, location_id, instructor_ids, student_ids, \
                                  is_done, is_cancelled, pack_id, needs_calendar_sync, \
                                  last_calendar_sync, calendar_event_ids";

/// Raw values read directly from a `lessons` row.
pub struct RawLesson {
  pub lesson_id:           String,
  pub kind:                String,
  pub date:                Option<String>,
  pub start_time:          Option<String>,
  pub end_time:            Option<String>,
  pub duration_minutes:    u32,
  pub school_id:           String,
  pub sport_id:            Option<String>,
  pub location_id:         Option<String>,
  pub instructor_ids:      String,
  pub student_ids:         String,
  pub is_done:             bool,
  pub is_cancelled:        bool,
  pub pack_id:             Option<String>,
  pub needs_calendar_sync: bool,
  pub last_calendar_sync:  Option<String>,
  pub calendar_event_ids:  String,
}

impl RawLesson {
  pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      lesson_id:           r.get(0)?,
      kind:                r.get(1)?,
      date:                r.get(2)?,
      start_time:          r.get(3)?,
      end_time:            r.get(4)?,
      duration_minutes:    r.get(5)?,
      school_id:           r.get(6)?,
      sport_id:            r.get(7)?,
      location_id:         r.get(8)?,
      instructor_ids:      r.get(9)?,
      student_ids:         r.get(10)?,
      is_done:             r.get(11)?,
      is_cancelled:        r.get(12)?,
      pack_id:             r.get(13)?,
      needs_calendar_sync: r.get(14)?,
      last_calendar_sync:  r.get(15)?,
      calendar_event_ids:  r.get(16)?,
    })
  }

  pub fn into_lesson(self) -> Result<Lesson> {
    let slot = match (self.date, self.start_time, self.end_time) {
      (Some(date), Some(start), Some(end)) => Some(LessonSlot {
        date:     decode_date(&date)?,
        interval: decode_interval(&start, &end)?,
      }),
      (None, None, None) => None,
      _ => {
        return Err(Error::DateParse(format!(
          "lesson {} has a partial schedule",
          self.lesson_id
        )));
      }
    };

    Ok(Lesson {
      lesson_id: decode_uuid(&self.lesson_id)?,
      kind: decode_json(&self.kind)?,
      slot,
      duration_minutes: self.duration_minutes,
      school_id: decode_uuid(&self.school_id)?,
      sport_id: decode_opt_uuid(self.sport_id)?,
      location_id: decode_opt_uuid(self.location_id)?,
      instructor_ids: decode_json(&self.instructor_ids)?,
      student_ids: decode_json(&self.student_ids)?,
      is_done: self.is_done,
      is_cancelled: self.is_cancelled,
      pack_id: decode_opt_uuid(self.pack_id)?,
      needs_calendar_sync: self.needs_calendar_sync,
      last_calendar_sync: self.last_calendar_sync.as_deref().map(decode_dt).transpose()?,
      calendar_event_ids: decode_json(&self.calendar_event_ids)?,
    })
  }
}

pub const ACTIVITY_COLUMNS: &str = "activity_id, school_id, name, date, start_time, end_time, \
                                    instructor_ids, student_ids, monitor_ids";

pub struct RawActivity {
  pub activity_id:    String,
  pub school_id:      String,
  pub name:           String,
  pub date:           String,
  pub start_time:     String,
  pub end_time:       String,
  pub instructor_ids: String,
  pub student_ids:    String,
  pub monitor_ids:    String,
}

impl RawActivity {
  pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      activity_id:    r.get(0)?,
      school_id:      r.get(1)?,
      name:           r.get(2)?,
      date:           r.get(3)?,
      start_time:     r.get(4)?,
      end_time:       r.get(5)?,
      instructor_ids: r.get(6)?,
      student_ids:    r.get(7)?,
      monitor_ids:    r.get(8)?,
    })
  }

  pub fn into_activity(self) -> Result<Activity> {
    Ok(Activity {
      activity_id:    decode_uuid(&self.activity_id)?,
      school_id:      decode_uuid(&self.school_id)?,
      name:           self.name,
      date:           decode_date(&self.date)?,
      interval:       decode_interval(&self.start_time, &self.end_time)?,
      instructor_ids: decode_json(&self.instructor_ids)?,
      student_ids:    decode_json(&self.student_ids)?,
      monitor_ids:    decode_json(&self.monitor_ids)?,
    })
  }
}

pub const PACK_COLUMNS: &str = "pack_id, kind, date, number_of_classes, number_of_classes_left, \
                                duration_minutes, price, debt, is_done, is_paid, is_suspended, \
                                expiration_date, student_ids, parent_ids, instructor_id, \
                                sport_id, school_id";

/// Raw values read directly from a `packs` row.
pub struct RawPack {
  pub pack_id:                String,
  pub kind:                   String,
  pub date:                   String,
  pub number_of_classes:      u32,
  pub number_of_classes_left: u32,
  pub duration_minutes:       u32,
  pub price:                  f64,
  pub debt:                   f64,
  pub is_done:                bool,
  pub is_paid:                bool,
  pub is_suspended:           bool,
  pub expiration_date:        Option<String>,
  pub student_ids:            String,
  pub parent_ids:             String,
  pub instructor_id:          Option<String>,
  pub sport_id:               Option<String>,
  pub school_id:              String,
}

impl RawPack {
  pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      pack_id:                r.get(0)?,
      kind:                   r.get(1)?,
      date:                   r.get(2)?,
      number_of_classes:      r.get(3)?,
      number_of_classes_left: r.get(4)?,
      duration_minutes:       r.get(5)?,
      price:                  r.get(6)?,
      debt:                   r.get(7)?,
      is_done:                r.get(8)?,
      is_paid:                r.get(9)?,
      is_suspended:           r.get(10)?,
      expiration_date:        r.get(11)?,
      student_ids:            r.get(12)?,
      parent_ids:             r.get(13)?,
      instructor_id:          r.get(14)?,
      sport_id:               r.get(15)?,
      school_id:              r.get(16)?,
    })
  }

  pub fn into_pack(self) -> Result<Pack> {
    Ok(Pack {
      pack_id:                decode_uuid(&self.pack_id)?,
      kind:                   decode_pack_kind(&self.kind)?,
      date:                   decode_date(&self.date)?,
      number_of_classes:      self.number_of_classes,
      number_of_classes_left: self.number_of_classes_left,
      duration_minutes:       self.duration_minutes,
      price:                  self.price,
      debt:                   self.debt,
      is_done:                self.is_done,
      is_paid:                self.is_paid,
      is_suspended:           self.is_suspended,
      expiration_date:        self.expiration_date.as_deref().map(decode_date).transpose()?,
      student_ids:            decode_json(&self.student_ids)?,
      parent_ids:             decode_json(&self.parent_ids)?,
      instructor_id:          decode_opt_uuid(self.instructor_id)?,
      sport_id:               decode_opt_uuid(self.sport_id)?,
      school_id:              decode_uuid(&self.school_id)?,
    })
  }
}

pub const TICKET_COLUMNS: &str = "ticket_id, pack_id, lesson_id, student_id";

pub struct RawTicket {
  pub ticket_id:  String,
  pub pack_id:    String,
  pub lesson_id:  Option<String>,
  pub student_id: Option<String>,
}

impl RawTicket {
  pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      ticket_id:  r.get(0)?,
      pack_id:    r.get(1)?,
      lesson_id:  r.get(2)?,
      student_id: r.get(3)?,
    })
  }

  pub fn into_ticket(self) -> Result<ClassTicket> {
    Ok(ClassTicket {
      ticket_id:  decode_uuid(&self.ticket_id)?,
      pack_id:    decode_uuid(&self.pack_id)?,
      lesson_id:  decode_opt_uuid(self.lesson_id)?,
      student_id: decode_opt_uuid(self.student_id)?,
    })
  }
}

pub const UNAVAILABILITY_COLUMNS: &str =
  "unavailability_id, actor_kind, actor_id, date, start_time, end_time, school_id";

pub struct RawUnavailability {
  pub unavailability_id: String,
  pub actor_kind:        String,
  pub actor_id:          String,
  pub date:              String,
  pub start_time:        String,
  pub end_time:          String,
  pub school_id:         Option<String>,
}

impl RawUnavailability {
  pub fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      unavailability_id: r.get(0)?,
      actor_kind:        r.get(1)?,
      actor_id:          r.get(2)?,
      date:              r.get(3)?,
      start_time:        r.get(4)?,
      end_time:          r.get(5)?,
      school_id:         r.get(6)?,
    })
  }

  pub fn into_unavailability(self) -> Result<Unavailability> {
    Ok(Unavailability {
      unavailability_id: decode_uuid(&self.unavailability_id)?,
      actor:             decode_actor(&self.actor_kind, &self.actor_id)?,
      date:              decode_date(&self.date)?,
      interval:          decode_interval(&self.start_time, &self.end_time)?,
      school_id:         decode_opt_uuid(self.school_id)?,
    })
  }
}
