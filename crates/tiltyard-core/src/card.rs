//! Cards, waivers, and their reminders.
//!
//! A card is a per-discipline credential bundle: granted authorizations,
//! marshal warrants, and a renewal date. A waiver is the combatant's single
//! liability waiver with its own renewal date. Both own a set of reminders
//! derived from the renewal date by [`crate::renewal::build_schedule`];
//! reminders are created only by renewal and deleted only by the sweep or by
//! the next renewal.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  combatant::CombatantId,
  discipline::{AuthorizationId, DisciplineId, MarshalTypeId},
  renewal::{CredentialKind, add_years},
};

// ─── Ids ─────────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CardId(pub Uuid);

impl CardId {
  pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for CardId {
  fn default() -> Self { Self::new() }
}

impl std::fmt::Display for CardId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.0.fmt(f)
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct WaiverId(pub Uuid);

impl WaiverId {
  pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for WaiverId {
  fn default() -> Self { Self::new() }
}

impl std::fmt::Display for WaiverId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.0.fmt(f)
  }
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ReminderId(pub Uuid);

impl ReminderId {
  pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for ReminderId {
  fn default() -> Self { Self::new() }
}

impl std::fmt::Display for ReminderId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.0.fmt(f)
  }
}

// ─── Card ────────────────────────────────────────────────────────────────────

/// An authorization card. At most one per (combatant, discipline) pair —
/// enforced by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
  pub card_id:        CardId,
  pub combatant_id:   CombatantId,
  pub discipline_id:  DisciplineId,
  /// Date of the most recent renewal. `None` until the first renewal.
  pub renewal_date:   Option<NaiveDate>,
  /// Granted authorizations; each must belong to `discipline_id`.
  pub authorizations: Vec<AuthorizationId>,
  /// Granted marshal warrants; each must belong to `discipline_id`.
  pub warrants:       Vec<MarshalTypeId>,
}

impl Card {
  pub fn new(combatant_id: CombatantId, discipline_id: DisciplineId) -> Self {
    Self {
      card_id: CardId::new(),
      combatant_id,
      discipline_id,
      renewal_date: None,
      authorizations: Vec::new(),
      warrants: Vec::new(),
    }
  }

  /// Renewal date plus the card duration, if the card has ever been renewed.
  pub fn expiry_date(&self) -> Option<NaiveDate> {
    self
      .renewal_date
      .map(|d| add_years(d, CredentialKind::Card.duration_years()))
  }

  pub fn has_authorization(&self, id: AuthorizationId) -> bool {
    self.authorizations.contains(&id)
  }

  pub fn has_warrant(&self, id: MarshalTypeId) -> bool {
    self.warrants.contains(&id)
  }
}

// ─── Waiver ──────────────────────────────────────────────────────────────────

/// The on-file liability waiver. At most one per combatant — enforced by the
/// store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waiver {
  pub waiver_id:    WaiverId,
  pub combatant_id: CombatantId,
  /// Date of the most recent renewal. `None` until the first renewal.
  pub renewal_date: Option<NaiveDate>,
}

impl Waiver {
  pub fn new(combatant_id: CombatantId) -> Self {
    Self { waiver_id: WaiverId::new(), combatant_id, renewal_date: None }
  }

  pub fn expiry_date(&self) -> Option<NaiveDate> {
    self
      .renewal_date
      .map(|d| add_years(d, CredentialKind::Waiver.duration_years()))
  }
}

// ─── Reminder ────────────────────────────────────────────────────────────────

/// A scheduled one-shot notification owned by a card or waiver. Once the
/// sweep consumes it (mails and deletes it), it can never fire again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
  pub reminder_id:   ReminderId,
  pub reminder_date: NaiveDate,
  pub is_expiry:     bool,
}
