//! An [`EventSink`] that writes every outbound event to the log.

use std::future::{Future, ready};

use slate_core::events::{EventSink, Notification, Recipient, SinkError};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
  fn notify(
    &self,
    notification: &Notification,
  ) -> impl Future<Output = Result<(), SinkError>> + Send {
    info!(
      user = %notification.recipient.user_id,
      audience = ?notification.recipient.audience,
      key = %notification.key,
      subject = %notification.subject,
      message = %notification.message,
      "notification"
    );
    ready(Ok(()))
  }

  fn notify_push(
    &self,
    recipient: &Recipient,
    title: &str,
    body: &str,
  ) -> impl Future<Output = Result<(), SinkError>> + Send {
    info!(user = %recipient.user_id, title, body, "push");
    ready(Ok(()))
  }

  fn mark_for_calendar_sync(
    &self,
    lesson_id: Uuid,
  ) -> impl Future<Output = Result<(), SinkError>> + Send {
    info!(%lesson_id, "calendar sync requested");
    ready(Ok(()))
  }
}
