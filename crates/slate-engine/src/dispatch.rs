//! Draining a committed operation's outbox into the [`EventSink`].

use slate_core::events::{EventSink, OutboundEvent, Outbox};
use tracing::{debug, warn};

/// Deliver every event in `outbox`, in order.
///
/// Must only be called after the transaction that produced the outbox has
/// committed. Delivery failures are logged and skipped.
pub async fn drain<E: EventSink>(sink: &E, outbox: Outbox) {
  let total = outbox.len();
  let mut failed = 0usize;

  for event in outbox {
    let result = match &event {
      OutboundEvent::Notify(notification) => sink.notify(notification).await,
      OutboundEvent::Push { recipient, title, body } => {
        sink.notify_push(recipient, title, body).await
      }
      OutboundEvent::CalendarSync { lesson_id } => sink.mark_for_calendar_sync(*lesson_id).await,
    };
    if let Err(error) = result {
      failed += 1;
      warn!(?event, %error, "failed to deliver event");
    }
  }

  debug!(total, failed, "outbox drained");
}
