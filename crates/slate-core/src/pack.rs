//! Packs: prepaid bundles of classes, and the tickets that let group-pack
//! holders into group classes.
//!
//! `number_of_classes_left` is authoritative. `is_done` and `is_paid` are
//! derived flags; every mutator below re-derives them before returning.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Kind ────────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PackKind {
  /// Materialises one private lesson per class.
  Private,
  /// Materialises one class ticket per class.
  Group,
}

// ─── Pack ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pack {
  pub pack_id:                Uuid,
  pub kind:                   PackKind,
  /// Purchase date.
  pub date:                   NaiveDate,
  pub number_of_classes:      u32,
  pub number_of_classes_left: u32,
  pub duration_minutes:       u32,
  pub price:                  f64,
  /// Outstanding amount; zero or negative once settled.
  pub debt:                   f64,
  pub is_done:                bool,
  pub is_paid:                bool,
  pub is_suspended:           bool,
  pub expiration_date:        Option<NaiveDate>,
  pub student_ids:            Vec<Uuid>,
  pub parent_ids:             Vec<Uuid>,
  pub instructor_id:          Option<Uuid>,
  pub sport_id:               Option<Uuid>,
  pub school_id:              Uuid,
}

impl Pack {
  /// Build a fresh pack from booking input, applying the initial payment.
  pub fn from_booking(input: &NewPack, date: NaiveDate, parent_ids: Vec<Uuid>) -> Self {
    let mut pack = Self {
      pack_id: Uuid::new_v4(),
      kind: input.kind,
      date,
      number_of_classes: input.number_of_classes,
      number_of_classes_left: input.number_of_classes,
      duration_minutes: input.duration_minutes,
      price: input.price,
      debt: input.price - input.payment.unwrap_or(0.0),
      is_done: false,
      is_paid: false,
      is_suspended: false,
      expiration_date: input.expiration_date,
      student_ids: input.student_ids.clone(),
      parent_ids,
      instructor_id: input.instructor_id,
      sport_id: input.sport_id,
      school_id: input.school_id,
    };
    pack.rederive();
    pack
  }

  fn rederive(&mut self) {
    self.is_done = self.number_of_classes_left == 0;
    self.is_paid = self.debt <= 0.0;
  }

  /// Price of a single class; what each materialised private lesson costs.
  pub fn price_per_class(&self) -> f64 {
    if self.number_of_classes == 0 {
      0.0
    } else {
      self.price / f64::from(self.number_of_classes)
    }
  }

  /// Count one class as taken.
  pub fn consume_class(&mut self) -> Result<()> {
    if self.number_of_classes_left == 0 {
      return Err(Error::IllegalState(format!(
        "pack {} has no classes left",
        self.pack_id
      )));
    }
    self.number_of_classes_left -= 1;
    self.rederive();
    Ok(())
  }

  /// Give back a class previously taken with [`Pack::consume_class`].
  pub fn restore_class(&mut self) -> Result<()> {
    if self.number_of_classes_left >= self.number_of_classes {
      return Err(Error::IllegalState(format!(
        "pack {} already has all {} classes left",
        self.pack_id, self.number_of_classes
      )));
    }
    self.number_of_classes_left += 1;
    self.rederive();
    Ok(())
  }

  /// Extend the pack by one class.
  pub fn add_class(&mut self) {
    self.number_of_classes += 1;
    self.number_of_classes_left += 1;
    self.rederive();
  }

  /// Record a payment against the outstanding debt. Negative amounts are
  /// refunds.
  pub fn apply_payment(&mut self, amount: f64) {
    self.debt -= amount;
    self.rederive();
  }

  pub fn is_expired_on(&self, date: NaiveDate) -> bool {
    self.expiration_date.is_some_and(|expires| date > expires)
  }
}

// ─── NewPack ─────────────────────────────────────────────────────────────────

/// Input to the pack booking operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPack {
  pub kind:              PackKind,
  pub school_id:         Uuid,
  pub student_ids:       Vec<Uuid>,
  /// Defaults to today.
  pub date:              Option<NaiveDate>,
  pub number_of_classes: u32,
  pub duration_minutes:  u32,
  pub instructor_id:     Option<Uuid>,
  pub sport_id:          Option<Uuid>,
  pub price:             f64,
  /// Amount paid up front.
  pub payment:           Option<f64>,
  pub expiration_date:   Option<NaiveDate>,
}

impl NewPack {
  /// Convenience constructor with all optional fields unset.
  pub fn new(
    kind: PackKind,
    school_id: Uuid,
    student_ids: Vec<Uuid>,
    number_of_classes: u32,
    duration_minutes: u32,
    price: f64,
  ) -> Self {
    Self {
      kind,
      school_id,
      student_ids,
      date: None,
      number_of_classes,
      duration_minutes,
      instructor_id: None,
      sport_id: None,
      price,
      payment: None,
      expiration_date: None,
    }
  }
}

// ─── ClassTicket ─────────────────────────────────────────────────────────────

/// One class of a group pack. Unused while `lesson_id` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassTicket {
  pub ticket_id:  Uuid,
  pub pack_id:    Uuid,
  pub lesson_id:  Option<Uuid>,
  pub student_id: Option<Uuid>,
}

impl ClassTicket {
  pub fn unused(pack_id: Uuid) -> Self {
    Self { ticket_id: Uuid::new_v4(), pack_id, lesson_id: None, student_id: None }
  }

  pub fn is_used(&self) -> bool { self.lesson_id.is_some() }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pack(classes: u32, price: f64, payment: Option<f64>) -> Pack {
    let mut input =
      NewPack::new(PackKind::Private, Uuid::new_v4(), vec![Uuid::new_v4()], classes, 60, price);
    input.payment = payment;
    Pack::from_booking(&input, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(), Vec::new())
  }

  #[test]
  fn payment_drives_is_paid() {
    let mut p = pack(4, 200.0, Some(50.0));
    assert_eq!(p.debt, 150.0);
    assert!(!p.is_paid);

    p.apply_payment(150.0);
    assert!(p.is_paid);

    p.apply_payment(-10.0);
    assert!(!p.is_paid);
  }

  #[test]
  fn consuming_every_class_marks_done_and_restoring_reopens() {
    let mut p = pack(2, 100.0, None);
    p.consume_class().unwrap();
    assert!(!p.is_done);
    p.consume_class().unwrap();
    assert!(p.is_done);
    assert!(matches!(p.consume_class(), Err(Error::IllegalState(_))));

    p.restore_class().unwrap();
    assert!(!p.is_done);
    assert_eq!(p.number_of_classes_left, 1);
  }

  #[test]
  fn restore_never_exceeds_total() {
    let mut p = pack(2, 100.0, None);
    assert!(p.restore_class().is_err());
    assert_eq!(p.number_of_classes_left, 2);
  }

  #[test]
  fn add_class_reopens_a_finished_pack() {
    let mut p = pack(1, 30.0, None);
    p.consume_class().unwrap();
    assert!(p.is_done);
    p.add_class();
    assert!(!p.is_done);
    assert_eq!((p.number_of_classes, p.number_of_classes_left), (2, 1));
  }

  #[test]
  fn price_splits_evenly() {
    assert_eq!(pack(4, 200.0, None).price_per_class(), 50.0);
  }
}
