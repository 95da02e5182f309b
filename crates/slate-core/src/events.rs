//! Outbound events and the [`EventSink`] port.
//!
//! The engine never talks to a transport. Operations collect events into an
//! [`Outbox`] while their transaction runs; once the transaction commits the
//! outbox is drained into the sink. Sink failures are never propagated.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::template::TemplateKey;

// ─── Recipients ──────────────────────────────────────────────────────────────

/// Why a user is receiving an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Audience {
  Parent,
  Instructor,
  Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
  pub user_id:  Uuid,
  pub audience: Audience,
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// Entities a notification is about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRefs {
  pub lesson_id:   Option<Uuid>,
  pub pack_id:     Option<Uuid>,
  pub activity_id: Option<Uuid>,
}

/// A rendered notification addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub recipient: Recipient,
  pub key:       TemplateKey,
  pub subject:   String,
  pub message:   String,
  pub refs:      EventRefs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OutboundEvent {
  Notify(Notification),
  Push { recipient: Recipient, title: String, body: String },
  CalendarSync { lesson_id: Uuid },
}

// ─── Outbox ──────────────────────────────────────────────────────────────────

/// Events produced by one operation, pending delivery.
#[derive(Debug, Clone, Default)]
pub struct Outbox {
  events: Vec<OutboundEvent>,
}

impl Outbox {
  pub fn push(&mut self, event: OutboundEvent) { self.events.push(event); }

  pub fn calendar_sync(&mut self, lesson_id: Uuid) {
    self.events.push(OutboundEvent::CalendarSync { lesson_id });
  }

  pub fn len(&self) -> usize { self.events.len() }

  pub fn is_empty(&self) -> bool { self.events.is_empty() }

  pub fn iter(&self) -> impl Iterator<Item = &OutboundEvent> { self.events.iter() }
}

impl IntoIterator for Outbox {
  type IntoIter = std::vec::IntoIter<OutboundEvent>;
  type Item = OutboundEvent;

  fn into_iter(self) -> Self::IntoIter { self.events.into_iter() }
}

// ─── Sink ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum SinkError {
  #[error("no delivery channel for user {0}")]
  Unreachable(Uuid),

  #[error("transport error: {0}")]
  Transport(String),
}

/// Delivery port for notifications, push messages, and calendar-sync nudges.
///
/// Implemented by the host. The engine only ever calls it after the state
/// change it describes has been committed.
pub trait EventSink: Send + Sync {
  fn notify(
    &self,
    notification: &Notification,
  ) -> impl Future<Output = Result<(), SinkError>> + Send;

  fn notify_push(
    &self,
    recipient: &Recipient,
    title: &str,
    body: &str,
  ) -> impl Future<Output = Result<(), SinkError>> + Send;

  /// Tell the calendar-sync worker that `lesson_id` has pending changes. The
  /// lesson's `needs_calendar_sync` flag is already set when this is called.
  fn mark_for_calendar_sync(
    &self,
    lesson_id: Uuid,
  ) -> impl Future<Output = Result<(), SinkError>> + Send;
}
