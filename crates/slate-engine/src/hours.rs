//! The working window slots are enumerated in.

use chrono::NaiveTime;
use slate_core::{Error, Result, TimeInterval};

const fn hm(hour: u32, minute: u32) -> NaiveTime {
  match NaiveTime::from_hms_opt(hour, minute, 0) {
    Some(time) => time,
    None => panic!("invalid time of day"),
  }
}

/// Default opening time.
pub const DAY_START: NaiveTime = hm(9, 0);

/// Default closing time.
pub const DAY_END: NaiveTime = hm(18, 0);

/// Local opening hours, `[day_start, day_end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingHours {
  day_start: NaiveTime,
  day_end:   NaiveTime,
}

impl WorkingHours {
  pub fn new(day_start: NaiveTime, day_end: NaiveTime) -> Result<Self> {
    if day_start >= day_end {
      return Err(Error::InvalidRange(format!(
        "working day starts at {day_start} but ends at {day_end}"
      )));
    }
    Ok(Self { day_start, day_end })
  }

  pub fn day_start(&self) -> NaiveTime { self.day_start }

  pub fn day_end(&self) -> NaiveTime { self.day_end }

  pub fn window(&self) -> Result<TimeInterval> { TimeInterval::new(self.day_start, self.day_end) }
}

impl Default for WorkingHours {
  fn default() -> Self { Self { day_start: DAY_START, day_end: DAY_END } }
}
