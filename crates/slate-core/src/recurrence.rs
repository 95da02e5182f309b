//! Recurrence rules for availability windows.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How far apart consecutive occurrences are.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Frequency {
  Daily,
  Weekly,
}

/// Repeat a window every `every` days or weeks, up to and including `until`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
  pub frequency: Frequency,
  pub every:     u32,
  pub until:     NaiveDate,
}

impl Recurrence {
  fn step(&self) -> Days {
    match self.frequency {
      Frequency::Daily => Days::new(u64::from(self.every)),
      Frequency::Weekly => Days::new(u64::from(self.every) * 7),
    }
  }
}

/// Every date on which a window starting on `first` applies.
///
/// Without a recurrence this is just `[first]`.
pub fn occurrences(
  first: NaiveDate,
  recurrence: Option<&Recurrence>,
) -> Result<Vec<NaiveDate>> {
  let Some(rule) = recurrence else {
    return Ok(vec![first]);
  };
  if rule.every == 0 {
    return Err(Error::InvalidRange("recurrence frequency must be positive".into()));
  }
  if rule.until < first {
    return Err(Error::InvalidRange(format!(
      "recurrence ends on {} before it starts on {first}",
      rule.until
    )));
  }

  let step = rule.step();
  let mut dates = Vec::new();
  let mut current = Some(first);
  while let Some(date) = current
    && date <= rule.until
  {
    dates.push(date);
    current = date.checked_add_days(step);
  }
  Ok(dates)
}
