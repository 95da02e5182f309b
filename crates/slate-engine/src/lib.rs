//! The Slate scheduling engine.
//!
//! Decides whether lessons, group classes, and activities may be booked,
//! maintains unavailability windows, enumerates free slots, and couples
//! lesson completion to pack lifecycles. Every operation runs inside one
//! [`SchedulingStore`](slate_core::store::SchedulingStore) transaction and
//! hands its events to the [`EventSink`](slate_core::events::EventSink) only
//! after commit.
//!
//! [`Scheduler`] is the entry point; the modules below hold the operations it
//! composes.

pub mod availability;
pub mod dispatch;
pub mod group;
pub mod hours;
pub mod lessons;
pub mod oracle;
pub mod packs;
pub mod scheduler;
pub mod slots;

mod notify;

pub use hours::WorkingHours;
pub use scheduler::Scheduler;
pub use slate_core::{Error, Result};
