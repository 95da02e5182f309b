//! Error types for `slate-core`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::interval::TimeInterval;

/// The kind of occupation that blocks a requested interval.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BlockerKind {
  Unavailability,
  PrivateLesson,
  GroupClass,
  Activity,
}

/// One occupation that overlaps a requested interval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blocker {
  pub kind:      BlockerKind,
  /// Id of the unavailability, lesson, or activity doing the blocking.
  pub reference: Uuid,
  pub date:      NaiveDate,
  pub interval:  TimeInterval,
}

/// Entity names used in [`Error::NotFound`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Entity {
  School,
  Instructor,
  Student,
  Lesson,
  Activity,
  Pack,
  Ticket,
  Unavailability,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid range: {0}")]
  InvalidRange(String),

  #[error("scheduling conflict with {} occupation(s)", .0.len())]
  Conflict(Vec<Blocker>),

  #[error(
    "lesson starts in {hours_until}h, inside the {limit_hours}h limit"
  )]
  ReschedulePolicyViolation { hours_until: i64, limit_hours: i64 },

  #[error("group class {class_id} is full ({max_students} students)")]
  CapacityExceeded { class_id: Uuid, max_students: u32 },

  #[error("illegal state: {0}")]
  IllegalState(String),

  #[error("{entity} not found: {id}")]
  NotFound { entity: Entity, id: Uuid },

  #[error("storage error: {0}")]
  Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// The blocking occupations, if this is a [`Error::Conflict`].
  pub fn blockers(&self) -> &[Blocker] {
    match self {
      Self::Conflict(blockers) => blockers,
      _ => &[],
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
