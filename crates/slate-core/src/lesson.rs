//! Lessons: private lessons sold in packs and capacity-bounded group classes.
//!
//! Both kinds share one record with a [`LessonKind`] discriminator. A lesson
//! is scheduled exactly when it carries a [`LessonSlot`]; the slot is written
//! and cleared as a unit, so a date can never exist without its times.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::interval::TimeInterval;

// ─── Slot ────────────────────────────────────────────────────────────────────

/// When a scheduled lesson takes place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonSlot {
  pub date:     NaiveDate,
  pub interval: TimeInterval,
}

impl LessonSlot {
  pub fn starts_at(&self) -> NaiveDateTime { self.date.and_time(self.interval.start()) }
}

// ─── Kind ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LessonKind {
  Private {
    /// 1-based position of the lesson within its pack.
    class_number: u32,
    price:        f64,
  },
  Group {
    level:        String,
    min_age:      Option<u32>,
    max_age:      Option<u32>,
    max_students: u32,
  },
}

/// Position of a lesson in its lifecycle, derived from its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LessonStatus {
  Unscheduled,
  Scheduled,
  Done,
  Cancelled,
}

// ─── Lesson ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
  pub lesson_id:           Uuid,
  pub kind:                LessonKind,
  pub slot:                Option<LessonSlot>,
  pub duration_minutes:    u32,
  pub school_id:           Uuid,
  pub sport_id:            Option<Uuid>,
  pub location_id:         Option<Uuid>,
  /// At most one entry for private lessons.
  pub instructor_ids:      Vec<Uuid>,
  pub student_ids:         Vec<Uuid>,
  pub is_done:             bool,
  pub is_cancelled:        bool,
  pub pack_id:             Option<Uuid>,
  /// Set whenever the schedule changes; cleared by the calendar-sync worker.
  pub needs_calendar_sync: bool,
  pub last_calendar_sync:  Option<DateTime<Utc>>,
  /// Calendar event id per participant user id, owned by the sync worker.
  pub calendar_event_ids:  BTreeMap<String, String>,
}

impl Lesson {
  fn with_kind(school_id: Uuid, duration_minutes: u32, kind: LessonKind) -> Self {
    Self {
      lesson_id: Uuid::new_v4(),
      kind,
      slot: None,
      duration_minutes,
      school_id,
      sport_id: None,
      location_id: None,
      instructor_ids: Vec::new(),
      student_ids: Vec::new(),
      is_done: false,
      is_cancelled: false,
      pack_id: None,
      needs_calendar_sync: false,
      last_calendar_sync: None,
      calendar_event_ids: BTreeMap::new(),
    }
  }

  /// An unscheduled private lesson.
  pub fn private(
    school_id: Uuid,
    duration_minutes: u32,
    class_number: u32,
    price: f64,
  ) -> Self {
    Self::with_kind(school_id, duration_minutes, LessonKind::Private {
      class_number,
      price,
    })
  }

  /// An unscheduled, empty group class.
  pub fn group(
    school_id: Uuid,
    duration_minutes: u32,
    level: impl Into<String>,
    max_students: u32,
  ) -> Self {
    Self::with_kind(school_id, duration_minutes, LessonKind::Group {
      level: level.into(),
      min_age: None,
      max_age: None,
      max_students,
    })
  }

  pub fn status(&self) -> LessonStatus {
    if self.is_cancelled {
      LessonStatus::Cancelled
    } else if self.is_done {
      LessonStatus::Done
    } else if self.slot.is_some() {
      LessonStatus::Scheduled
    } else {
      LessonStatus::Unscheduled
    }
  }

  pub fn is_private(&self) -> bool { matches!(self.kind, LessonKind::Private { .. }) }

  pub fn is_group(&self) -> bool { matches!(self.kind, LessonKind::Group { .. }) }

  /// The lesson's instructor, if one is fixed.
  pub fn instructor(&self) -> Option<Uuid> { self.instructor_ids.first().copied() }

  /// Whether a group class has reached its capacity. Private lessons are never
  /// full.
  pub fn is_full(&self) -> bool {
    match self.kind {
      LessonKind::Group { max_students, .. } => {
        self.student_ids.len() >= max_students as usize
      }
      LessonKind::Private { .. } => false,
    }
  }

  pub fn starts_at(&self) -> Option<NaiveDateTime> { self.slot.map(|s| s.starts_at()) }
}
