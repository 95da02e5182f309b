//! Core types and port definitions for the Slate scheduling engine.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the entity shapes, the interval algebra, and the traits that storage
//! backends and notification transports implement.

pub mod activity;
pub mod clock;
pub mod error;
pub mod events;
pub mod interval;
pub mod lesson;
pub mod memory;
pub mod pack;
pub mod recurrence;
pub mod school;
pub mod store;
pub mod template;
pub mod unavailability;

pub use error::{Blocker, BlockerKind, Entity, Error, Result};
pub use interval::TimeInterval;
