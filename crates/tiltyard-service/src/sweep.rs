//! The daily reminder sweep.
//!
//! An external scheduler runs this once a day (or less often; the due query
//! is `reminder_date <= today`, so missed days are caught up). Each due
//! reminder is mailed at most once: the row is deleted after the send
//! attempt whether or not delivery was accepted.

use chrono::NaiveDate;
use tiltyard_core::{
  crypto::Encryptor, notify::Notifier, store::RosterStore,
};

use crate::{Result, Roster};

/// Outcome counts from one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
  pub sent:   usize,
  pub failed: usize,
}

impl<S, N, E> Roster<S, N, E>
where
  S: RosterStore,
  N: Notifier,
  E: Encryptor,
{
  /// Process every card and waiver reminder due on or before `today`.
  pub async fn run_sweep(&self, today: NaiveDate) -> Result<SweepReport> {
    let mut report = SweepReport::default();

    let due_cards = self
      .store()
      .due_card_reminders(today)
      .await
      .map_err(Self::store_err)?;
    for due in due_cards {
      if self.mailer().send_card_reminder(&due, today) {
        report.sent += 1;
      } else {
        report.failed += 1;
        tracing::warn!(
          recipient = %due.combatant_email,
          discipline = %due.discipline_slug,
          "card reminder not accepted for delivery",
        );
      }
      // Delete regardless of delivery: at most one attempt per reminder.
      self
        .store()
        .delete_card_reminder(due.reminder.reminder_id)
        .await
        .map_err(Self::store_err)?;
      tracing::debug!(
        recipient = %due.combatant_email,
        date = %due.reminder.reminder_date,
        expiry = due.reminder.is_expiry,
        "card reminder processed",
      );
    }

    let due_waivers = self
      .store()
      .due_waiver_reminders(today)
      .await
      .map_err(Self::store_err)?;
    for due in due_waivers {
      if self.mailer().send_waiver_reminder(&due, today) {
        report.sent += 1;
      } else {
        report.failed += 1;
        tracing::warn!(
          recipient = %due.combatant_email,
          "waiver reminder not accepted for delivery",
        );
      }
      self
        .store()
        .delete_waiver_reminder(due.reminder.reminder_id)
        .await
        .map_err(Self::store_err)?;
      tracing::debug!(
        recipient = %due.combatant_email,
        date = %due.reminder.reminder_date,
        expiry = due.reminder.is_expiry,
        "waiver reminder processed",
      );
    }

    tracing::info!(
      %today,
      sent = report.sent,
      failed = report.failed,
      "sweep complete",
    );
    Ok(report)
  }
}
