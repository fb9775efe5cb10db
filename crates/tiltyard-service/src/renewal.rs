//! Credential renewal operations.
//!
//! Renewal computes the reminder schedule in core and hands the store the
//! date plus the complete replacement reminder set in one call, so a renewal
//! is atomic from the sweep's point of view.

use chrono::Utc;
use tiltyard_core::{
  Error as CoreError,
  card::{Card, Waiver},
  combatant::CombatantId,
  crypto::Encryptor,
  discipline::{Discipline, DisciplineId},
  notify::Notifier,
  principal::{Principal, RolePolicy, RoleSlug},
  renewal::{
    CredentialKind, DEFAULT_REMINDER_OFFSETS, ReminderSchedule, build_schedule,
    parse_date,
  },
  store::RosterStore,
};

use crate::{Result, Roster, SETTING_REMINDER_OFFSETS};

impl<S, N, E> Roster<S, N, E>
where
  S: RosterStore,
  N: Notifier,
  E: Encryptor,
{
  /// Renew a combatant's card for a discipline. `date` is `YYYY-MM-DD`,
  /// `None` meaning today. Requires the card-date role under the configured
  /// policy scope.
  pub async fn renew_card(
    &self,
    principal: &Principal,
    id: CombatantId,
    discipline: DisciplineId,
    date: Option<String>,
  ) -> Result<ReminderSchedule> {
    let policy = self.role_policy().await?;
    let scope = policy.date_role_scope(CredentialKind::Card, Some(discipline));
    if !principal.has_role(scope, RoleSlug::EditCardDate) {
      return Err(CoreError::Unauthorized.into());
    }

    let card = self
      .store()
      .card(id, discipline)
      .await
      .map_err(Self::store_err)?
      .ok_or(CoreError::CardNotFound { combatant: id, discipline })?;
    let discipline_row = self.require_discipline(discipline).await?;

    let renewal_date = match date {
      Some(s) => parse_date("renewal_date", &s)?,
      None => Utc::now().date_naive(),
    };
    self.renew_card_row(&card, &discipline_row, renewal_date).await
  }

  /// Renew a combatant's waiver, creating the waiver row on first renewal.
  /// Requires the waiver-date role; when the policy makes waiver dates a
  /// per-discipline concern the check accepts a grant in any scope, since a
  /// waiver belongs to no discipline.
  pub async fn renew_waiver(
    &self,
    principal: &Principal,
    id: CombatantId,
    date: Option<String>,
  ) -> Result<ReminderSchedule> {
    let policy = self.role_policy().await?;
    if !waiver_date_allowed(principal, policy) {
      return Err(CoreError::Unauthorized.into());
    }

    self.require_combatant(id).await?;
    let waiver = match self.store().waiver(id).await.map_err(Self::store_err)? {
      Some(waiver) => waiver,
      None => {
        let waiver = Waiver::new(id);
        self
          .store()
          .insert_waiver(waiver.clone())
          .await
          .map_err(Self::store_err)?;
        waiver
      }
    };

    let renewal_date = match date {
      Some(s) => parse_date("waiver_date", &s)?,
      None => Utc::now().date_naive(),
    };

    let offsets = self.reminder_offsets(None).await?;
    let schedule =
      build_schedule(renewal_date, CredentialKind::Waiver, &offsets);
    self
      .store()
      .set_waiver_renewal(
        waiver.waiver_id,
        renewal_date,
        schedule.reminders.clone(),
      )
      .await
      .map_err(Self::store_err)?;

    tracing::info!(
      combatant = %id,
      renewal = %renewal_date,
      expiry = %schedule.expiry_date,
      "waiver renewed",
    );
    Ok(schedule)
  }

  /// Write a card renewal: schedule computed in core, applied atomically by
  /// the store. Role checks are the caller's.
  pub(crate) async fn renew_card_row(
    &self,
    card: &Card,
    discipline: &Discipline,
    renewal_date: chrono::NaiveDate,
  ) -> Result<ReminderSchedule> {
    let offsets = self.reminder_offsets(Some(discipline)).await?;
    let schedule = build_schedule(renewal_date, CredentialKind::Card, &offsets);
    self
      .store()
      .set_card_renewal(card.card_id, renewal_date, schedule.reminders.clone())
      .await
      .map_err(Self::store_err)?;

    tracing::info!(
      combatant = %card.combatant_id,
      discipline = %discipline.slug,
      renewal = %renewal_date,
      expiry = %schedule.expiry_date,
      "card renewed",
    );
    Ok(schedule)
  }

  /// Advance-reminder offsets, in precedence order: discipline override,
  /// then the store-wide setting, then the built-in default.
  pub(crate) async fn reminder_offsets(
    &self,
    discipline: Option<&Discipline>,
  ) -> Result<Vec<i64>> {
    if let Some(offsets) = discipline.and_then(|d| d.reminder_offsets.clone()) {
      return Ok(offsets);
    }
    match self
      .store()
      .setting(SETTING_REMINDER_OFFSETS.to_string())
      .await
      .map_err(Self::store_err)?
    {
      Some(value) => {
        Ok(serde_json::from_value(value).map_err(CoreError::from)?)
      }
      None => Ok(DEFAULT_REMINDER_OFFSETS.to_vec()),
    }
  }
}

pub(crate) fn waiver_date_allowed(
  principal: &Principal,
  policy: RolePolicy,
) -> bool {
  if policy.waiver_date_is_global {
    principal.has_role(None, RoleSlug::EditWaiverDate)
  } else {
    principal.has_role_anywhere(RoleSlug::EditWaiverDate)
  }
}
