//! Pack lifecycle: booking, payments, suspension, and extension.
//!
//! Class consumption on completion lives with the lesson transitions in
//! [`crate::lessons`]; everything else that changes a pack is here.

use chrono::NaiveDate;
use slate_core::{
  Error, Result,
  events::{Audience, EventRefs, Outbox},
  lesson::Lesson,
  pack::{ClassTicket, NewPack, Pack, PackKind},
  school::School,
  store::SchedulingTx,
  template::TemplateKey,
};
use tracing::info;
use uuid::Uuid;

use crate::notify::{Announcement, parents_of, student_names};

/// Create the lesson or ticket standing for class `class_number` of `pack`.
fn materialise_class(
  tx: &mut dyn SchedulingTx,
  pack: &Pack,
  class_number: u32,
  price: f64,
) -> Result<()> {
  match pack.kind {
    PackKind::Private => {
      let mut lesson =
        Lesson::private(pack.school_id, pack.duration_minutes, class_number, price);
      lesson.pack_id = Some(pack.pack_id);
      lesson.student_ids = pack.student_ids.clone();
      lesson.instructor_ids = pack.instructor_id.into_iter().collect();
      lesson.sport_id = pack.sport_id;
      tx.put_lesson(&lesson)
    }
    PackKind::Group => tx.put_ticket(&ClassTicket::unused(pack.pack_id)),
  }
}

fn pack_announcement<'a>(
  tx: &dyn SchedulingTx,
  school: &'a School,
  pack: &Pack,
  key: TemplateKey,
) -> Result<Announcement<'a>> {
  Ok(
    Announcement::new(school, key)
      .refs(EventRefs { pack_id: Some(pack.pack_id), ..EventRefs::default() })
      .field("number_of_classes", pack.number_of_classes)
      .field("classes_left", pack.number_of_classes_left)
      .field("duration_in_minutes", pack.duration_minutes)
      .field("students", student_names(tx, &pack.student_ids)?)
      .field("price", format!("{:.2}", pack.price))
      .field("debt", format!("{:.2}", pack.debt))
      .to(Audience::Parent, pack.parent_ids.iter().copied())
      .to(Audience::Instructor, pack.instructor_id)
      .to_admins(),
  )
}

// ─── Booking ─────────────────────────────────────────────────────────────────

/// Create a pack and everything it entitles its students to.
///
/// Private packs get one unscheduled lesson per class, each priced at an even
/// share of the pack. Group packs get one unused ticket per class. The pack
/// date defaults to `today`.
pub fn book_new_pack(
  tx: &mut dyn SchedulingTx,
  outbox: &mut Outbox,
  input: NewPack,
  today: NaiveDate,
) -> Result<Pack> {
  if input.number_of_classes == 0 {
    return Err(Error::InvalidRange("a pack needs at least one class".into()));
  }
  if input.duration_minutes == 0 {
    return Err(Error::InvalidRange("class duration must be positive".into()));
  }
  if input.price < 0.0 {
    return Err(Error::InvalidRange(format!("negative pack price {}", input.price)));
  }
  if input.student_ids.is_empty() {
    return Err(Error::IllegalState("a pack needs at least one student".into()));
  }

  let school = tx.require_school(input.school_id)?;
  if let Some(instructor_id) = input.instructor_id {
    let instructor = tx.require_instructor(instructor_id)?;
    if instructor.school_id != school.school_id {
      return Err(Error::IllegalState(format!(
        "instructor {instructor_id} does not teach at school {}",
        school.school_id
      )));
    }
  }

  let parents = parents_of(&*tx, &input.student_ids)?;
  let pack = Pack::from_booking(&input, input.date.unwrap_or(today), parents);
  tx.put_pack(&pack)?;

  let price = pack.price_per_class();
  for class_number in 1..=pack.number_of_classes {
    materialise_class(tx, &pack, class_number, price)?;
  }

  pack_announcement(&*tx, &school, &pack, TemplateKey::PackPurchased)?.post(outbox);

  info!(
    pack_id = %pack.pack_id,
    kind = %pack.kind,
    classes = pack.number_of_classes,
    "pack booked"
  );
  Ok(pack)
}

// ─── Adjustments ─────────────────────────────────────────────────────────────

/// Record a payment (or, when negative, a refund) against the pack's debt.
pub fn update_debt(tx: &mut dyn SchedulingTx, pack_id: Uuid, amount: f64) -> Result<Pack> {
  let mut pack = tx.require_pack(pack_id)?;
  pack.apply_payment(amount);
  tx.put_pack(&pack)?;
  info!(%pack_id, amount, debt = pack.debt, is_paid = pack.is_paid, "pack debt updated");
  Ok(pack)
}

fn set_suspended(
  tx: &mut dyn SchedulingTx,
  outbox: &mut Outbox,
  pack_id: Uuid,
  suspended: bool,
) -> Result<Pack> {
  let mut pack = tx.require_pack(pack_id)?;
  if pack.is_suspended == suspended {
    let state = if suspended { "suspended" } else { "active" };
    return Err(Error::IllegalState(format!("pack {pack_id} is already {state}")));
  }
  pack.is_suspended = suspended;
  tx.put_pack(&pack)?;

  let school = tx.require_school(pack.school_id)?;
  let key = if suspended { TemplateKey::PackSuspended } else { TemplateKey::PackResumed };
  pack_announcement(&*tx, &school, &pack, key)?.post(outbox);
  Ok(pack)
}

/// Stop the pack's lessons from being scheduled.
pub fn suspend(tx: &mut dyn SchedulingTx, outbox: &mut Outbox, pack_id: Uuid) -> Result<Pack> {
  let pack = set_suspended(tx, outbox, pack_id, true)?;
  info!(%pack_id, "pack suspended");
  Ok(pack)
}

pub fn resume(tx: &mut dyn SchedulingTx, outbox: &mut Outbox, pack_id: Uuid) -> Result<Pack> {
  let pack = set_suspended(tx, outbox, pack_id, false)?;
  info!(%pack_id, "pack resumed");
  Ok(pack)
}

/// Extend a pack by one class.
///
/// The pack price is unchanged; a new private lesson is priced at the
/// per-class rate the pack was sold at.
pub fn add_class(tx: &mut dyn SchedulingTx, pack_id: Uuid) -> Result<Pack> {
  let mut pack = tx.require_pack(pack_id)?;
  let price = pack.price_per_class();
  pack.add_class();
  tx.put_pack(&pack)?;
  materialise_class(tx, &pack, pack.number_of_classes, price)?;

  info!(%pack_id, classes = pack.number_of_classes, "class added to pack");
  Ok(pack)
}

pub fn remaining_classes(tx: &dyn SchedulingTx, pack_id: Uuid) -> Result<u32> {
  Ok(tx.require_pack(pack_id)?.number_of_classes_left)
}
