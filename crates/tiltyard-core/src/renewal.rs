//! The credential renewal engine.
//!
//! Cards and waivers are both "dated credentials": a renewal date plus a
//! fixed duration implies an expiry date, and the expiry date implies a
//! reminder schedule. Reminders are derived state — every renewal recomputes
//! the full set from scratch rather than diffing, which eliminates the class
//! of drift bugs where a stale reminder survives a renewal.

use chrono::{Days, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// The unambiguous date format accepted everywhere a date string enters the
/// core: `YYYY-MM-DD`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Advance-reminder day offsets used when neither the settings store nor the
/// discipline overrides them.
pub const DEFAULT_REMINDER_OFFSETS: [i64; 2] = [30, 60];

// ─── Credential kinds ────────────────────────────────────────────────────────

/// Which kind of dated credential is being renewed. The renewal algorithm is
/// identical for both; only the duration differs.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum CredentialKind {
  Card,
  Waiver,
}

impl CredentialKind {
  /// Years of validity granted by a renewal.
  pub fn duration_years(self) -> u32 {
    match self {
      Self::Card => 2,
      Self::Waiver => 7,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Card => "card",
      Self::Waiver => "waiver",
    }
  }
}

// ─── Date helpers ────────────────────────────────────────────────────────────

/// Parse a `YYYY-MM-DD` date string. `field` names the offending input field
/// in the error.
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| {
    Error::MalformedDate { field: field.to_string(), value: value.to_string() }
  })
}

/// Add calendar years to a date. Feb 29 clamps to Feb 28 in non-leap years.
pub fn add_years(date: NaiveDate, years: u32) -> NaiveDate {
  date
    .checked_add_months(Months::new(years * 12))
    .unwrap_or(NaiveDate::MAX)
}

// ─── Schedule computation ────────────────────────────────────────────────────

/// One reminder to be inserted by the store as part of a renewal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderSpec {
  pub reminder_date: NaiveDate,
  /// `true` for the terminal "now expired" notice, `false` for an advance
  /// warning.
  pub is_expiry:     bool,
}

/// The full derived schedule for one renewal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderSchedule {
  pub renewal_date: NaiveDate,
  pub expiry_date:  NaiveDate,
  pub reminders:    Vec<ReminderSpec>,
}

/// Compute the reminder set implied by renewing a credential of `kind` on
/// `renewal_date` with the given advance offsets.
///
/// Exactly one `is_expiry = true` reminder lands on the expiry date, plus one
/// advance reminder per offset at `expiry - offset` days. Offsets are
/// independent; two offsets that land on the same date produce two reminders.
/// A renewal date in the past is allowed and simply yields dates the sweep
/// will catch up on.
pub fn build_schedule(
  renewal_date: NaiveDate,
  kind: CredentialKind,
  offsets: &[i64],
) -> ReminderSchedule {
  let expiry_date = add_years(renewal_date, kind.duration_years());

  let mut reminders =
    vec![ReminderSpec { reminder_date: expiry_date, is_expiry: true }];

  for &days in offsets {
    let reminder_date = expiry_date
      .checked_sub_days(Days::new(days.unsigned_abs()))
      .unwrap_or(NaiveDate::MIN);
    reminders.push(ReminderSpec { reminder_date, is_expiry: false });
  }

  ReminderSchedule { renewal_date, expiry_date, reminders }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(s: &str) -> NaiveDate { parse_date("test", s).unwrap() }

  #[test]
  fn card_schedule_shape() {
    let schedule =
      build_schedule(d("2024-03-15"), CredentialKind::Card, &[30, 60]);

    assert_eq!(schedule.expiry_date, d("2026-03-15"));
    assert_eq!(schedule.reminders.len(), 3);

    let expiry: Vec<_> =
      schedule.reminders.iter().filter(|r| r.is_expiry).collect();
    assert_eq!(expiry.len(), 1);
    assert_eq!(expiry[0].reminder_date, d("2026-03-15"));

    let advance_dates: Vec<_> = schedule
      .reminders
      .iter()
      .filter(|r| !r.is_expiry)
      .map(|r| r.reminder_date)
      .collect();
    assert_eq!(advance_dates, vec![d("2026-02-13"), d("2026-01-14")]);
  }

  #[test]
  fn waiver_duration_is_seven_years() {
    let schedule =
      build_schedule(d("2024-01-01"), CredentialKind::Waiver, &[30, 60]);
    assert_eq!(schedule.expiry_date, d("2031-01-01"));

    let advance_dates: Vec<_> = schedule
      .reminders
      .iter()
      .filter(|r| !r.is_expiry)
      .map(|r| r.reminder_date)
      .collect();
    assert_eq!(advance_dates, vec![d("2030-12-02"), d("2030-11-02")]);
  }

  #[test]
  fn duplicate_offsets_are_not_deduplicated() {
    let schedule =
      build_schedule(d("2024-01-01"), CredentialKind::Card, &[30, 30]);
    assert_eq!(schedule.reminders.len(), 3);
    let advance: Vec<_> =
      schedule.reminders.iter().filter(|r| !r.is_expiry).collect();
    assert_eq!(advance[0].reminder_date, advance[1].reminder_date);
  }

  #[test]
  fn empty_offsets_yield_only_the_expiry_notice() {
    let schedule = build_schedule(d("2024-01-01"), CredentialKind::Card, &[]);
    assert_eq!(schedule.reminders.len(), 1);
    assert!(schedule.reminders[0].is_expiry);
  }

  #[test]
  fn past_renewal_dates_are_permitted() {
    let schedule =
      build_schedule(d("2010-06-01"), CredentialKind::Card, &[30, 60]);
    assert_eq!(schedule.expiry_date, d("2012-06-01"));
  }

  #[test]
  fn leap_day_clamps() {
    assert_eq!(add_years(d("2024-02-29"), 2), d("2026-02-28"));
  }

  #[test]
  fn malformed_dates_are_rejected_with_the_field_name() {
    let err = parse_date("card_date", "01/02/2024").unwrap_err();
    assert!(
      matches!(err, Error::MalformedDate { ref field, .. } if field == "card_date")
    );
    assert!(parse_date("card_date", "2024-13-40").is_err());
    assert!(parse_date("card_date", "2024-02-30").is_err());
  }
}
