//! The `RosterStore` trait and supporting row types.
//!
//! The trait is implemented by storage backends (e.g.
//! `tiltyard-store-sqlite`). The service layer depends on this abstraction,
//! not on any concrete backend.
//!
//! Transactional contract: `set_card_renewal` and `set_waiver_renewal` must
//! replace the owned reminder set and update the renewal date atomically —
//! either the new date and the full new reminder set are persisted, or
//! nothing is. `add_combatant` persists the combatant and its privacy
//! acceptance in one transaction, and `delete_combatant` cascades to the
//! whole owned subgraph.

use std::future::Future;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
  card::{Card, CardId, Reminder, ReminderId, Waiver, WaiverId},
  combatant::{Combatant, CombatantId},
  discipline::{
    AuthorizationId, Discipline, DisciplineId, MarshalTypeId, NewDiscipline,
  },
  principal::{RoleSlug, UserAccount},
  privacy::PrivacyAcceptance,
  update_request::UpdateRequest,
};

// ─── Due-reminder rows ───────────────────────────────────────────────────────

/// A card reminder that has come due, joined with the context the sweep
/// needs to compose its email.
#[derive(Debug, Clone)]
pub struct DueCardReminder {
  pub reminder:        Reminder,
  pub card_id:         CardId,
  pub combatant_email: String,
  pub discipline_name: String,
  pub discipline_slug: String,
  /// The owning card's current expiry date.
  pub expiry_date:     NaiveDate,
}

/// A waiver reminder that has come due.
#[derive(Debug, Clone)]
pub struct DueWaiverReminder {
  pub reminder:        Reminder,
  pub waiver_id:       WaiverId,
  pub combatant_email: String,
  pub expiry_date:     NaiveDate,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Tiltyard storage backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait RosterStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Discipline catalog ────────────────────────────────────────────────

  /// Create a discipline with its authorizations and marshal types.
  /// Setup-time only.
  fn add_discipline(
    &self,
    input: NewDiscipline,
  ) -> impl Future<Output = Result<Discipline, Self::Error>> + Send + '_;

  fn discipline(
    &self,
    id: DisciplineId,
  ) -> impl Future<Output = Result<Option<Discipline>, Self::Error>> + Send + '_;

  /// The one explicit slug-to-id conversion point.
  fn discipline_by_slug(
    &self,
    slug: String,
  ) -> impl Future<Output = Result<Option<Discipline>, Self::Error>> + Send + '_;

  fn list_disciplines(
    &self,
  ) -> impl Future<Output = Result<Vec<Discipline>, Self::Error>> + Send + '_;

  // ── Combatants ────────────────────────────────────────────────────────

  /// Persist a new combatant together with its privacy-acceptance record.
  fn add_combatant(
    &self,
    combatant: Combatant,
    privacy: PrivacyAcceptance,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Persist changes to an existing combatant row.
  fn update_combatant(
    &self,
    combatant: Combatant,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete a combatant and its entire owned subgraph.
  fn delete_combatant(
    &self,
    id: CombatantId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn combatant(
    &self,
    id: CombatantId,
  ) -> impl Future<Output = Result<Option<Combatant>, Self::Error>> + Send + '_;

  fn combatant_by_email(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<Combatant>, Self::Error>> + Send + '_;

  fn combatant_by_card_id(
    &self,
    card_id: String,
  ) -> impl Future<Output = Result<Option<Combatant>, Self::Error>> + Send + '_;

  // ── Cards ─────────────────────────────────────────────────────────────

  fn insert_card(
    &self,
    card: Card,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn card(
    &self,
    combatant: CombatantId,
    discipline: DisciplineId,
  ) -> impl Future<Output = Result<Option<Card>, Self::Error>> + Send + '_;

  fn add_card_authorization(
    &self,
    card: CardId,
    authorization: AuthorizationId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn remove_card_authorization(
    &self,
    card: CardId,
    authorization: AuthorizationId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn add_card_warrant(
    &self,
    card: CardId,
    marshal_type: MarshalTypeId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn remove_card_warrant(
    &self,
    card: CardId,
    marshal_type: MarshalTypeId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Waivers ───────────────────────────────────────────────────────────

  fn insert_waiver(
    &self,
    waiver: Waiver,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn waiver(
    &self,
    combatant: CombatantId,
  ) -> impl Future<Output = Result<Option<Waiver>, Self::Error>> + Send + '_;

  // ── Renewal (atomic reminder replacement) ─────────────────────────────

  /// Set a card's renewal date and replace its entire reminder set, in one
  /// transaction.
  fn set_card_renewal(
    &self,
    card: CardId,
    renewal_date: NaiveDate,
    reminders: Vec<crate::renewal::ReminderSpec>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Set a waiver's renewal date and replace its entire reminder set, in
  /// one transaction.
  fn set_waiver_renewal(
    &self,
    waiver: WaiverId,
    renewal_date: NaiveDate,
    reminders: Vec<crate::renewal::ReminderSpec>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn card_reminders(
    &self,
    card: CardId,
  ) -> impl Future<Output = Result<Vec<Reminder>, Self::Error>> + Send + '_;

  fn waiver_reminders(
    &self,
    waiver: WaiverId,
  ) -> impl Future<Output = Result<Vec<Reminder>, Self::Error>> + Send + '_;

  // ── Sweep ─────────────────────────────────────────────────────────────

  /// Every card reminder with `reminder_date <= today`, joined with mail
  /// context. The `<=` is the catch-up guarantee for skipped sweeps.
  fn due_card_reminders(
    &self,
    today: NaiveDate,
  ) -> impl Future<Output = Result<Vec<DueCardReminder>, Self::Error>> + Send + '_;

  fn due_waiver_reminders(
    &self,
    today: NaiveDate,
  ) -> impl Future<Output = Result<Vec<DueWaiverReminder>, Self::Error>> + Send + '_;

  fn delete_card_reminder(
    &self,
    reminder: ReminderId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn delete_waiver_reminder(
    &self,
    reminder: ReminderId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Privacy acceptance ────────────────────────────────────────────────

  fn privacy_acceptance(
    &self,
    combatant: CombatantId,
  ) -> impl Future<Output = Result<Option<PrivacyAcceptance>, Self::Error>> + Send + '_;

  fn privacy_acceptance_by_token(
    &self,
    token: Uuid,
  ) -> impl Future<Output = Result<Option<PrivacyAcceptance>, Self::Error>> + Send + '_;

  fn set_privacy_accepted(
    &self,
    combatant: CombatantId,
    accepted: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Update requests ───────────────────────────────────────────────────

  fn insert_update_request(
    &self,
    request: UpdateRequest,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn update_request_by_token(
    &self,
    token: Uuid,
  ) -> impl Future<Output = Result<Option<UpdateRequest>, Self::Error>> + Send + '_;

  fn consume_update_request(
    &self,
    token: Uuid,
    consumed: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Users and role grants ─────────────────────────────────────────────

  /// Register a login-capable user.
  fn add_user(
    &self,
    email: String,
    is_system_admin: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Fetch a user with all their role grants loaded, for principal
  /// resolution at the authentication boundary.
  fn user_by_email(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<UserAccount>, Self::Error>> + Send + '_;

  fn add_user_role(
    &self,
    email: String,
    role: RoleSlug,
    discipline: Option<DisciplineId>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn remove_user_role(
    &self,
    email: String,
    role: RoleSlug,
    discipline: Option<DisciplineId>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Settings ──────────────────────────────────────────────────────────

  /// Read a JSON-valued setting. `None` if the key was never set.
  fn setting(
    &self,
    key: String,
  ) -> impl Future<Output = Result<Option<serde_json::Value>, Self::Error>> + Send + '_;

  fn set_setting(
    &self,
    key: String,
    value: serde_json::Value,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
