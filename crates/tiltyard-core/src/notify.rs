//! The notification collaborator seam and the email templates built on it.
//!
//! Delivery is an external concern: [`Notifier::send`] reports acceptance
//! for delivery as a plain boolean and never raises. The [`Mailer`] wrapper
//! owns template interpolation and the privacy-policy gating that several
//! messages require.

use chrono::NaiveDate;

use crate::{
  Error, Result,
  combatant::Combatant,
  privacy::PrivacyAcceptance,
  store::{DueCardReminder, DueWaiverReminder},
  update_request::UpdateRequest,
};

/// Accepts a message for delivery. `true` means accepted; a failure is a
/// status, never an error that could abort a committed mutation.
pub trait Notifier: Send + Sync {
  fn send(&self, recipient: &str, subject: &str, body: &str) -> bool;
}

impl<N: Notifier + ?Sized> Notifier for std::sync::Arc<N> {
  fn send(&self, recipient: &str, subject: &str, body: &str) -> bool {
    (**self).send(recipient, subject, body)
  }
}

// ─── Mailer ──────────────────────────────────────────────────────────────────

/// Composes and sends the system's emails through a [`Notifier`].
pub struct Mailer<'a, N: Notifier + ?Sized> {
  notifier: &'a N,
  /// External base URL interpolated into links, e.g. `https://mol.example.org`.
  base_url: &'a str,
}

impl<'a, N: Notifier + ?Sized> Mailer<'a, N> {
  pub fn new(notifier: &'a N, base_url: &'a str) -> Self {
    Self { notifier, base_url }
  }

  /// The public URL of a combatant's card. Requires an accepted privacy
  /// policy and an allocated card id.
  pub fn card_url(
    &self,
    combatant: &Combatant,
    privacy: &PrivacyAcceptance,
  ) -> Result<String> {
    if !privacy.is_accepted() {
      return Err(Error::PrivacyPolicyNotAccepted);
    }
    let card_id = combatant
      .card_id
      .as_deref()
      .filter(|id| !id.is_empty())
      .ok_or_else(|| Error::Validation { field: "card_id".to_string() })?;
    Ok(format!("{}/card/{card_id}", self.base_url))
  }

  /// Prompt a new combatant to read and accept the privacy policy.
  pub fn send_privacy_policy(
    &self,
    combatant: &Combatant,
    privacy: &PrivacyAcceptance,
  ) -> bool {
    let url = format!("{}/privacy/{}", self.base_url, privacy.token);
    let body = format!(
      "You have been added to the authorization card registry.\n\
       Before your card can be issued, please review and accept the\n\
       privacy policy at:\n\n{url}\n",
    );
    self.notifier.send(
      &combatant.email,
      "Privacy policy acceptance required",
      &body,
    )
  }

  /// Send the combatant the link to their card. Gated on privacy acceptance.
  pub fn send_card_request(
    &self,
    combatant: &Combatant,
    privacy: &PrivacyAcceptance,
  ) -> Result<bool> {
    let url = self.card_url(combatant, privacy)?;
    let body = format!(
      "Your authorization card is available at:\n\n{url}\n\n\
       Bookmark this link; it is unique to you.\n",
    );
    Ok(self.notifier.send(
      &combatant.email,
      "Your authorization card",
      &body,
    ))
  }

  /// Send a self-serve info-update link. Gated on privacy acceptance.
  pub fn send_info_update(
    &self,
    combatant: &Combatant,
    request: &UpdateRequest,
    privacy: &PrivacyAcceptance,
  ) -> Result<bool> {
    if !privacy.is_accepted() {
      return Err(Error::PrivacyPolicyNotAccepted);
    }
    let url = format!("{}/update-info/{}", self.base_url, request.token);
    let body = format!(
      "A request was made to update your combatant information.\n\
       Use the one-time link below; it expires at {} UTC.\n\n{url}\n",
      request.expiry.format("%Y-%m-%d %H:%M"),
    );
    Ok(self.notifier.send(
      &combatant.email,
      "Update your combatant information",
      &body,
    ))
  }

  /// Mail one due card reminder — advance warning or terminal expiry notice
  /// depending on the reminder's flag. An advance reminder swept after the
  /// expiry date has passed gets the expired wording too.
  pub fn send_card_reminder(&self, due: &DueCardReminder, today: NaiveDate) -> bool {
    let days_left = (due.expiry_date - today).num_days();
    if due.reminder.is_expiry || days_left <= 0 {
      let body = format!(
        "Your {} authorization card expired on {}.\n\
         Contact the Minister of the Lists to renew it.\n",
        due.discipline_name, due.expiry_date,
      );
      self.notifier.send(
        &due.combatant_email,
        &format!("Your {} authorization has expired", due.discipline_name),
        &body,
      )
    } else {
      let body = format!(
        "Your {} authorization card expires in {days_left} days,\n\
         on {}. Renew it before then to stay authorized.\n",
        due.discipline_name, due.expiry_date,
      );
      self.notifier.send(
        &due.combatant_email,
        &format!("Your {} authorization expires soon", due.discipline_name),
        &body,
      )
    }
  }

  /// Mail one due waiver reminder.
  pub fn send_waiver_reminder(
    &self,
    due: &DueWaiverReminder,
    today: NaiveDate,
  ) -> bool {
    let days_left = (due.expiry_date - today).num_days();
    if due.reminder.is_expiry || days_left <= 0 {
      let body = format!(
        "Your waiver on file expired on {}.\n\
         A new signed waiver is required before your next event.\n",
        due.expiry_date,
      );
      self.notifier.send(
        &due.combatant_email,
        "Your waiver has expired",
        &body,
      )
    } else {
      let body = format!(
        "The waiver we have on file for you expires in {days_left} days,\n\
         on {}. Please arrange to sign a new one.\n",
        due.expiry_date,
      );
      self.notifier.send(
        &due.combatant_email,
        "Your waiver expires soon",
        &body,
      )
    }
  }
}
