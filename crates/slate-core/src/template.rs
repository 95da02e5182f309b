//! Notification templates.
//!
//! Every [`TemplateKey`] has a fallback subject and body. A school overrides
//! the body under `notification_templates[key]` and the subject under
//! `notification_templates["{key}_subject"]`. Placeholders are written
//! `{field}`; unknown placeholders are left as they are.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::school::School;

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
  strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TemplateKey {
  PrivateClassScheduled,
  GroupClassScheduled,
  ClassRescheduled,
  ClassUnscheduled,
  ClassCancelled,
  ClassDone,
  ClassUndone,
  PackPurchased,
  PackCompleted,
  PackSuspended,
  PackResumed,
  SchedulingConflictDetected,
  StudentAddedToClass,
  StudentRemovedFromClass,
  InstructorAddedToClass,
  InstructorRemovedFromClass,
}

impl TemplateKey {
  fn fallback(self) -> (&'static str, &'static str) {
    match self {
      Self::PrivateClassScheduled => (
        "Class {class_number}/{number_of_classes} scheduled",
        "Class {class_number} of {number_of_classes} for {students} is \
         scheduled on {date} at {start} ({duration_in_minutes} min) with \
         {instructor_name}. Price: {price} {currency}.",
      ),
      Self::GroupClassScheduled => (
        "Group class scheduled",
        "The group class for {students} is scheduled on {date} at {start} \
         ({duration_in_minutes} min) with {instructor_name}.",
      ),
      Self::ClassRescheduled => (
        "Class rescheduled",
        "The class for {students} on {previous_date} at {previous_start} \
         moved to {date} at {start} with {instructor_name}.",
      ),
      Self::ClassUnscheduled => (
        "Class unscheduled",
        "The class for {students} on {date} at {start} has been unscheduled.",
      ),
      Self::ClassCancelled => (
        "Class cancelled",
        "The class for {students} on {date} at {start} has been cancelled.",
      ),
      Self::ClassDone => (
        "Class completed",
        "{students} completed the class on {date}. {classes_left} class(es) \
         left in the pack.",
      ),
      Self::ClassUndone => (
        "Class reopened",
        "The class for {students} on {date} is no longer marked as done.",
      ),
      Self::PackPurchased => (
        "Pack purchased",
        "A pack of {number_of_classes} class(es) of {duration_in_minutes} min \
         for {students} was purchased for {price} {currency}. Outstanding: \
         {debt} {currency}.",
      ),
      Self::PackCompleted => (
        "Pack completed",
        "All {number_of_classes} class(es) of the pack for {students} are done.",
      ),
      Self::PackSuspended => ("Pack suspended", "The pack for {students} is suspended."),
      Self::PackResumed => ("Pack resumed", "The pack for {students} is active again."),
      Self::SchedulingConflictDetected => (
        "Scheduling Conflict Detected",
        "{actor_name} is unavailable on {date} from {start} to {end}, which \
         conflicts with {conflict_name} at {conflict_start}.",
      ),
      Self::StudentAddedToClass => (
        "Student added to class",
        "{student_name} joined the {level} class on {date} at {start}.",
      ),
      Self::StudentRemovedFromClass => (
        "Student removed from class",
        "{student_name} left the {level} class on {date} at {start}.",
      ),
      Self::InstructorAddedToClass => (
        "Instructor added to class",
        "{instructor_name} now teaches the {level} class on {date} at {start}.",
      ),
      Self::InstructorRemovedFromClass => (
        "Instructor removed from class",
        "{instructor_name} no longer teaches the {level} class on {date} at \
         {start}.",
      ),
    }
  }

  /// Subject and body templates for this key, with school overrides applied.
  pub fn resolve<'a>(self, school: &'a School) -> (&'a str, &'a str) {
    let (subject, body) = self.fallback();
    let templates = &school.notification_templates;
    let subject = templates
      .get(&format!("{}_subject", self.as_ref()))
      .map_or(subject, String::as_str);
    let body = templates.get(self.as_ref()).map_or(body, String::as_str);
    (subject, body)
  }
}

/// Fields substituted into a template.
pub type Fields = BTreeMap<&'static str, String>;

/// Replace every `{name}` in `template` with `fields[name]`.
pub fn render(template: &str, fields: &Fields) -> String {
  let mut out = String::with_capacity(template.len());
  let mut rest = template;
  while let Some(open) = rest.find('{') {
    out.push_str(&rest[..open]);
    let after = &rest[open + 1..];
    match after.find('}') {
      Some(close) => {
        let name = &after[..close];
        match fields.get(name) {
          Some(value) => out.push_str(value),
          None => {
            out.push('{');
            out.push_str(name);
            out.push('}');
          }
        }
        rest = &after[close + 1..];
      }
      None => {
        out.push_str(&rest[open..]);
        rest = "";
      }
    }
  }
  out.push_str(rest);
  out
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn render_substitutes_known_fields_only() {
    let mut fields = Fields::new();
    fields.insert("date", "2025-01-02".into());
    assert_eq!(render("on {date} at {start}", &fields), "on 2025-01-02 at {start}");
    assert_eq!(render("unclosed {date", &fields), "unclosed {date");
  }

  #[test]
  fn school_overrides_win_over_fallbacks() {
    let mut school = School::new("Surf Club", "EUR");
    school
      .notification_templates
      .insert("class_cancelled".into(), "Sorry, {date} is off".into());
    school
      .notification_templates
      .insert("class_cancelled_subject".into(), "Cancelled!".into());

    assert_eq!(
      TemplateKey::ClassCancelled.resolve(&school),
      ("Cancelled!", "Sorry, {date} is off")
    );
    assert_eq!(TemplateKey::PackResumed.resolve(&school).0, "Pack resumed");
  }

  #[test]
  fn keys_round_trip_through_their_names() {
    assert_eq!(TemplateKey::PrivateClassScheduled.to_string(), "private_class_scheduled");
    assert_eq!(
      "scheduling_conflict_detected".parse::<TemplateKey>().unwrap(),
      TemplateKey::SchedulingConflictDetected
    );
  }
}
