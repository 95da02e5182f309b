//! Schools and the people scheduled within them.
//!
//! Entities reference each other by id only; the store is the arena that
//! resolves them. Nothing here holds a back-link.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The scheduling policy and notification overrides of one school.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct School {
  pub school_id:              Uuid,
  pub name:                   String,
  /// ISO 4217 code rendered next to prices in notifications.
  pub currency:               String,
  /// Hours before start after which a lesson can no longer be moved.
  pub reschedule_time_limit:  i64,
  /// Minimum notice, in hours, for scheduling a lesson. Zero disables it.
  pub schedule_time_limit:    i64,
  /// Per-key overrides of the fallback notification templates.
  pub notification_templates: BTreeMap<String, String>,
  /// Users who receive administrative copies of notifications.
  pub admin_ids:              Vec<Uuid>,
}

impl School {
  /// A school with no limits, no overrides, and no admins.
  pub fn new(name: impl Into<String>, currency: impl Into<String>) -> Self {
    Self {
      school_id:              Uuid::new_v4(),
      name:                   name.into(),
      currency:               currency.into(),
      reschedule_time_limit:  0,
      schedule_time_limit:    0,
      notification_templates: BTreeMap::new(),
      admin_ids:              Vec::new(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instructor {
  pub instructor_id: Uuid,
  pub school_id:     Uuid,
  pub name:          String,
}

impl Instructor {
  pub fn new(school_id: Uuid, name: impl Into<String>) -> Self {
    Self { instructor_id: Uuid::new_v4(), school_id, name: name.into() }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
  pub student_id: Uuid,
  pub school_id:  Uuid,
  pub name:       String,
  pub birth_date: Option<NaiveDate>,
  /// Users notified on the student's behalf.
  pub parent_ids: Vec<Uuid>,
}

impl Student {
  pub fn new(school_id: Uuid, name: impl Into<String>) -> Self {
    Self {
      student_id: Uuid::new_v4(),
      school_id,
      name: name.into(),
      birth_date: None,
      parent_ids: Vec::new(),
    }
  }
}

/// Whoever an unavailability window belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum ActorRef {
  Instructor(Uuid),
  Student(Uuid),
}

impl ActorRef {
  pub fn id(&self) -> Uuid {
    match self {
      Self::Instructor(id) | Self::Student(id) => *id,
    }
  }
}
