//! Activities: camp sessions and party activities that occupy staff.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::interval::TimeInterval;

/// A fixed-time event. Unlike lessons, its date and times are always set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
  pub activity_id:    Uuid,
  pub school_id:      Uuid,
  pub name:           String,
  pub date:           NaiveDate,
  pub interval:       TimeInterval,
  pub instructor_ids: Vec<Uuid>,
  pub student_ids:    Vec<Uuid>,
  pub monitor_ids:    Vec<Uuid>,
}

impl Activity {
  pub fn new(
    school_id: Uuid,
    name: impl Into<String>,
    date: NaiveDate,
    interval: TimeInterval,
  ) -> Self {
    Self {
      activity_id: Uuid::new_v4(),
      school_id,
      name: name.into(),
      date,
      interval,
      instructor_ids: Vec::new(),
      student_ids: Vec::new(),
      monitor_ids: Vec::new(),
    }
  }

  pub fn duration_minutes(&self) -> i64 { self.interval.duration_minutes() }
}
