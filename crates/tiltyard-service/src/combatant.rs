//! Combatant aggregate operations.
//!
//! Every operation takes the acting [`Principal`] explicitly and converts a
//! failed role check into [`tiltyard_core::Error::Unauthorized`]. Email
//! delivery outcomes are reported as booleans, never as errors, once the
//! mutation has committed.

use chrono::Utc;
use tiltyard_core::{
  Error as CoreError,
  card::Card,
  combatant::{
    Combatant, CombatantId, CombatantUpdate, NewCombatant, SelfServeUpdate,
    card_id_candidate, normalize_phone, salted_name_hash,
  },
  crypto::Encryptor,
  discipline::{Discipline, DisciplineId},
  notify::Notifier,
  principal::{Principal, RoleSlug},
  privacy::PrivacyAcceptance,
  store::RosterStore,
  update_request::{DEFAULT_UPDATE_REQUEST_TTL_DAYS, UpdateRequest},
};
use uuid::Uuid;

use crate::{Result, Roster, SETTING_UPDATE_REQUEST_TTL_DAYS};

// How many deterministic card-id candidates to try before giving up.
const CARD_ID_MAX_ATTEMPTS: usize = 64;

// ─── Operation results ───────────────────────────────────────────────────────

/// Result of [`Roster::create_combatant`].
#[derive(Debug)]
pub struct CreatedCombatant {
  pub combatant:     Combatant,
  /// Token the combatant uses to accept or decline the privacy policy.
  pub privacy_token: Uuid,
  /// Whether the privacy-policy email was accepted for delivery.
  pub delivered:     bool,
}

/// Result of [`Roster::update_self_serve`].
#[derive(Debug)]
pub struct SelfServeApplied {
  pub combatant:      Combatant,
  /// Delivery status of the card email, sent only when the display name
  /// changed and the card id was regenerated.
  pub card_delivered: Option<bool>,
}

/// Result of [`Roster::accept_privacy`].
#[derive(Debug)]
pub struct PrivacyAccepted {
  pub combatant: Combatant,
  pub card_id:   String,
  pub delivered: bool,
}

/// Result of [`Roster::request_self_serve_update`].
#[derive(Debug)]
pub struct UpdateRequested {
  pub token:     Uuid,
  pub delivered: bool,
}

// ─── Operations ──────────────────────────────────────────────────────────────

impl<S, N, E> Roster<S, N, E>
where
  S: RosterStore,
  N: Notifier,
  E: Encryptor,
{
  /// Register a new combatant and start the privacy-acceptance flow.
  pub async fn create_combatant(
    &self,
    principal: &Principal,
    input: NewCombatant,
  ) -> Result<CreatedCombatant> {
    if !principal.has_role(None, RoleSlug::EditCombatantInfo) {
      return Err(CoreError::Unauthorized.into());
    }
    input.validate()?;

    if self
      .store()
      .combatant_by_email(input.email.clone())
      .await
      .map_err(Self::store_err)?
      .is_some()
    {
      return Err(CoreError::DuplicateEmail(input.email).into());
    }

    let mut combatant = Combatant {
      combatant_id: CombatantId::new(),
      email:        input.email,
      sca_name:     input.sca_name,
      card_id:      None,
      encrypted:    None,
      last_update:  Utc::now(),
    };
    combatant.set_personal_info(&input.info, self.encryptor(), Utc::now())?;

    let privacy = PrivacyAcceptance::new(combatant.combatant_id);
    let privacy_token = privacy.token;

    self
      .store()
      .add_combatant(combatant.clone(), privacy.clone())
      .await
      .map_err(Self::store_err)?;

    let delivered = self.mailer().send_privacy_policy(&combatant, &privacy);
    tracing::info!(
      combatant = %combatant.combatant_id,
      delivered,
      "combatant created",
    );

    Ok(CreatedCombatant { combatant, privacy_token, delivered })
  }

  /// Fetch a combatant for someone holding any combatant-visible role.
  pub async fn combatant(
    &self,
    principal: &Principal,
    id: CombatantId,
  ) -> Result<Combatant> {
    if !principal.can_see_combatant_list() {
      return Err(CoreError::Unauthorized.into());
    }
    self.require_combatant(id).await
  }

  /// Apply an administrative update. Requires the global combatant-edit
  /// role; a waiver date in the update additionally requires the waiver-date
  /// role under the configured policy.
  pub async fn update_restricted(
    &self,
    principal: &Principal,
    id: CombatantId,
    update: CombatantUpdate,
  ) -> Result<Combatant> {
    if !principal.has_role(None, RoleSlug::EditCombatantInfo) {
      return Err(CoreError::Unauthorized.into());
    }
    // The waiver date rides along on the admin form but is gated separately.
    // Check it up front: a rejection must leave no partial write behind.
    if update.waiver_date.is_some() {
      let policy = self.role_policy().await?;
      if !crate::renewal::waiver_date_allowed(principal, policy) {
        return Err(CoreError::Unauthorized.into());
      }
    }
    let mut combatant = self.require_combatant(id).await?;

    if let Some(email) = update.email {
      self.require_email_free(&email, id).await?;
      combatant.email = email;
    }
    if let Some(sca_name) = update.sca_name {
      combatant.sca_name = Some(sca_name);
    }

    let mut info = combatant.personal_info(self.encryptor())?;
    if let Some(v) = update.legal_name {
      info.legal_name = Some(v);
    }
    if let Some(v) = update.phone {
      info.phone = Some(v);
    }
    if let Some(v) = update.address1 {
      info.address1 = Some(v);
    }
    if let Some(v) = update.address2 {
      info.address2 = Some(v);
    }
    if let Some(v) = update.city {
      info.city = Some(v);
    }
    if let Some(v) = update.province {
      info.province = Some(v);
    }
    if let Some(v) = update.postal_code {
      info.postal_code = Some(v);
    }
    if let Some(v) = update.dob {
      info.dob = Some(v);
    }
    if let Some(v) = update.member_number {
      info.member_number = Some(v);
    }
    if let Some(v) = update.member_expiry {
      info.member_expiry = Some(v);
    }
    combatant.set_personal_info(&info, self.encryptor(), Utc::now())?;

    self
      .store()
      .update_combatant(combatant.clone())
      .await
      .map_err(Self::store_err)?;

    if let Some(date) = update.waiver_date {
      self.renew_waiver(principal, id, Some(date)).await?;
    }

    tracing::info!(combatant = %id, "combatant updated");
    Ok(combatant)
  }

  /// Apply a combatant's own update, authorized by a one-time token rather
  /// than a role grant. The field allowlist is the type itself.
  pub async fn update_self_serve(
    &self,
    token: Uuid,
    update: SelfServeUpdate,
  ) -> Result<SelfServeApplied> {
    let now = Utc::now();
    let request = self
      .store()
      .update_request_by_token(token)
      .await
      .map_err(Self::store_err)?
      .filter(|r| r.is_valid(now))
      .ok_or(CoreError::Unauthorized)?;

    let mut combatant = self.require_combatant(request.combatant_id).await?;
    let previous_sca_name = combatant.sca_name.clone();

    if let Some(email) = update.email {
      self.require_email_free(&email, combatant.combatant_id).await?;
      combatant.email = email;
    }
    if let Some(sca_name) = update.sca_name {
      combatant.sca_name = Some(sca_name);
    }

    let mut info = combatant.personal_info(self.encryptor())?;
    if let Some(v) = update.phone {
      info.phone = Some(normalize_phone(&v));
    }
    if let Some(v) = update.address1 {
      info.address1 = Some(v);
    }
    if let Some(v) = update.address2 {
      info.address2 = Some(v);
    }
    if let Some(v) = update.city {
      info.city = Some(v);
    }
    if let Some(v) = update.province {
      info.province = Some(v);
    }
    if let Some(v) = update.postal_code {
      info.postal_code = Some(v);
    }
    combatant.set_personal_info(&info, self.encryptor(), now)?;

    self
      .store()
      .update_combatant(combatant.clone())
      .await
      .map_err(Self::store_err)?;
    self
      .store()
      .consume_update_request(token, now)
      .await
      .map_err(Self::store_err)?;

    // A display-name change invalidates the derived card id.
    let card_delivered = if combatant.sca_name != previous_sca_name {
      self.generate_card_id(combatant.combatant_id).await?;
      combatant = self.require_combatant(combatant.combatant_id).await?;
      let privacy = self.require_privacy(combatant.combatant_id).await?;
      Some(self.mailer().send_card_request(&combatant, &privacy)?)
    } else {
      None
    };

    tracing::info!(combatant = %combatant.combatant_id, "self-serve update applied");
    Ok(SelfServeApplied { combatant, card_delivered })
  }

  /// Fetch a combatant's card for a discipline. Reading an existing card
  /// needs no role; creating one requires the discipline-scoped
  /// authorization-edit role and immediately renews it as of today.
  pub async fn get_card(
    &self,
    principal: &Principal,
    id: CombatantId,
    discipline: DisciplineId,
    create_if_absent: bool,
  ) -> Result<Card> {
    if let Some(card) = self
      .store()
      .card(id, discipline)
      .await
      .map_err(Self::store_err)?
    {
      return Ok(card);
    }
    if !create_if_absent {
      return Err(CoreError::CardNotFound { combatant: id, discipline }.into());
    }
    if !principal.has_role(Some(discipline), RoleSlug::EditAuthorizations) {
      return Err(CoreError::Unauthorized.into());
    }

    self.require_combatant(id).await?;
    let discipline_row = self.require_discipline(discipline).await?;

    let card = Card::new(id, discipline);
    self
      .store()
      .insert_card(card.clone())
      .await
      .map_err(Self::store_err)?;
    self
      .renew_card_row(&card, &discipline_row, Utc::now().date_naive())
      .await?;

    tracing::info!(
      combatant = %id,
      discipline = %discipline_row.slug,
      "card created",
    );
    self
      .store()
      .card(id, discipline)
      .await
      .map_err(Self::store_err)?
      .ok_or_else(|| {
        CoreError::CardNotFound { combatant: id, discipline }.into()
      })
  }

  /// Grant an authorization, by slug, on a combatant's card. Idempotent.
  pub async fn add_authorization(
    &self,
    principal: &Principal,
    id: CombatantId,
    discipline: DisciplineId,
    slug: &str,
  ) -> Result<()> {
    if !principal.has_role(Some(discipline), RoleSlug::EditAuthorizations) {
      return Err(CoreError::Unauthorized.into());
    }
    let (card, authorization_id) =
      self.card_and_authorization(id, discipline, slug).await?;
    self
      .store()
      .add_card_authorization(card.card_id, authorization_id)
      .await
      .map_err(Self::store_err)?;
    tracing::debug!(combatant = %id, slug, "authorization granted");
    Ok(())
  }

  /// Revoke an authorization. Idempotent.
  pub async fn remove_authorization(
    &self,
    principal: &Principal,
    id: CombatantId,
    discipline: DisciplineId,
    slug: &str,
  ) -> Result<()> {
    if !principal.has_role(Some(discipline), RoleSlug::EditAuthorizations) {
      return Err(CoreError::Unauthorized.into());
    }
    let (card, authorization_id) =
      self.card_and_authorization(id, discipline, slug).await?;
    self
      .store()
      .remove_card_authorization(card.card_id, authorization_id)
      .await
      .map_err(Self::store_err)?;
    tracing::debug!(combatant = %id, slug, "authorization revoked");
    Ok(())
  }

  /// Grant a marshal warrant, by slug, on a combatant's card. Idempotent.
  pub async fn add_warrant(
    &self,
    principal: &Principal,
    id: CombatantId,
    discipline: DisciplineId,
    slug: &str,
  ) -> Result<()> {
    if !principal.has_role(Some(discipline), RoleSlug::EditMarshal) {
      return Err(CoreError::Unauthorized.into());
    }
    let (card, marshal_type_id) =
      self.card_and_marshal_type(id, discipline, slug).await?;
    self
      .store()
      .add_card_warrant(card.card_id, marshal_type_id)
      .await
      .map_err(Self::store_err)?;
    tracing::debug!(combatant = %id, slug, "warrant granted");
    Ok(())
  }

  /// Revoke a marshal warrant. Idempotent.
  pub async fn remove_warrant(
    &self,
    principal: &Principal,
    id: CombatantId,
    discipline: DisciplineId,
    slug: &str,
  ) -> Result<()> {
    if !principal.has_role(Some(discipline), RoleSlug::EditMarshal) {
      return Err(CoreError::Unauthorized.into());
    }
    let (card, marshal_type_id) =
      self.card_and_marshal_type(id, discipline, slug).await?;
    self
      .store()
      .remove_card_warrant(card.card_id, marshal_type_id)
      .await
      .map_err(Self::store_err)?;
    tracing::debug!(combatant = %id, slug, "warrant revoked");
    Ok(())
  }

  /// Allocate (or re-derive) the combatant's human-visible card id.
  ///
  /// Candidates come from the slugified SCA name, or from a salted hash of
  /// the legal name when no SCA name is set; collisions extend the candidate
  /// deterministically. Re-running with unchanged inputs keeps the same id.
  pub async fn generate_card_id(&self, id: CombatantId) -> Result<String> {
    let mut combatant = self.require_combatant(id).await?;
    let privacy = self.require_privacy(id).await?;
    if !privacy.is_accepted() {
      return Err(CoreError::PrivacyPolicyNotAccepted.into());
    }

    let info = combatant.personal_info(self.encryptor())?;
    let name_hash = salted_name_hash(
      info.legal_name.as_deref().unwrap_or_default(),
      &self.config.card_id_salt,
    );

    for attempt in 0..CARD_ID_MAX_ATTEMPTS {
      let candidate =
        card_id_candidate(combatant.sca_name.as_deref(), &name_hash, attempt);
      if candidate.is_empty() {
        break;
      }
      if combatant.card_id.as_deref() == Some(candidate.as_str()) {
        return Ok(candidate);
      }
      let taken = self
        .store()
        .combatant_by_card_id(candidate.clone())
        .await
        .map_err(Self::store_err)?
        .is_some_and(|other| other.combatant_id != id);
      if !taken {
        combatant.card_id = Some(candidate.clone());
        self
          .store()
          .update_combatant(combatant)
          .await
          .map_err(Self::store_err)?;
        tracing::info!(combatant = %id, card_id = %candidate, "card id allocated");
        return Ok(candidate);
      }
    }

    Err(CoreError::Validation { field: "card_id".to_string() }.into())
  }

  /// Accept the privacy policy by token: stamp the acceptance, allocate the
  /// card id, and mail the card link.
  pub async fn accept_privacy(&self, token: Uuid) -> Result<PrivacyAccepted> {
    let privacy = self.require_privacy_by_token(token).await?;

    if !privacy.is_accepted() {
      self
        .store()
        .set_privacy_accepted(privacy.combatant_id, Utc::now())
        .await
        .map_err(Self::store_err)?;
    }

    let card_id = self.generate_card_id(privacy.combatant_id).await?;
    let combatant = self.require_combatant(privacy.combatant_id).await?;
    let privacy = self.require_privacy(privacy.combatant_id).await?;
    let delivered = self.mailer().send_card_request(&combatant, &privacy)?;

    tracing::info!(combatant = %combatant.combatant_id, "privacy policy accepted");
    Ok(PrivacyAccepted { combatant, card_id, delivered })
  }

  /// Decline the privacy policy by token: the combatant and everything the
  /// registry holds about them are deleted.
  pub async fn decline_privacy(&self, token: Uuid) -> Result<()> {
    let privacy = self.require_privacy_by_token(token).await?;
    self
      .store()
      .delete_combatant(privacy.combatant_id)
      .await
      .map_err(Self::store_err)?;
    tracing::info!(combatant = %privacy.combatant_id, "privacy policy declined, record removed");
    Ok(())
  }

  /// Issue a one-time self-serve update link and mail it to the combatant.
  pub async fn request_self_serve_update(
    &self,
    principal: &Principal,
    id: CombatantId,
  ) -> Result<UpdateRequested> {
    if !principal.has_role(None, RoleSlug::EditCombatantInfo) {
      return Err(CoreError::Unauthorized.into());
    }
    let combatant = self.require_combatant(id).await?;
    let privacy = self.require_privacy(id).await?;
    // Gate before the insert: a rejection must not leave a live token.
    if !privacy.is_accepted() {
      return Err(CoreError::PrivacyPolicyNotAccepted.into());
    }

    let ttl_days = match self
      .store()
      .setting(SETTING_UPDATE_REQUEST_TTL_DAYS.to_string())
      .await
      .map_err(Self::store_err)?
    {
      Some(value) => {
        serde_json::from_value(value).map_err(CoreError::from)?
      }
      None => DEFAULT_UPDATE_REQUEST_TTL_DAYS,
    };

    let request = UpdateRequest::new(id, Utc::now(), ttl_days);
    self
      .store()
      .insert_update_request(request.clone())
      .await
      .map_err(Self::store_err)?;

    let delivered =
      self.mailer().send_info_update(&combatant, &request, &privacy)?;
    tracing::info!(combatant = %id, delivered, "self-serve update link issued");
    Ok(UpdateRequested { token: request.token, delivered })
  }

  // ── Lookup helpers ────────────────────────────────────────────────────────

  pub(crate) async fn require_combatant(
    &self,
    id: CombatantId,
  ) -> Result<Combatant> {
    self
      .store()
      .combatant(id)
      .await
      .map_err(Self::store_err)?
      .ok_or_else(|| CoreError::CombatantNotFound(id.to_string()).into())
  }

  pub(crate) async fn require_discipline(
    &self,
    id: DisciplineId,
  ) -> Result<Discipline> {
    self
      .store()
      .discipline(id)
      .await
      .map_err(Self::store_err)?
      .ok_or_else(|| CoreError::DisciplineNotFound(id.to_string()).into())
  }

  pub(crate) async fn require_privacy(
    &self,
    id: CombatantId,
  ) -> Result<PrivacyAcceptance> {
    self
      .store()
      .privacy_acceptance(id)
      .await
      .map_err(Self::store_err)?
      .ok_or_else(|| CoreError::PrivacyAcceptanceNotFound(id.to_string()).into())
  }

  async fn require_privacy_by_token(
    &self,
    token: Uuid,
  ) -> Result<PrivacyAcceptance> {
    self
      .store()
      .privacy_acceptance_by_token(token)
      .await
      .map_err(Self::store_err)?
      .ok_or_else(|| {
        CoreError::PrivacyAcceptanceNotFound(token.to_string()).into()
      })
  }

  async fn require_email_free(
    &self,
    email: &str,
    own_id: CombatantId,
  ) -> Result<()> {
    let clash = self
      .store()
      .combatant_by_email(email.to_string())
      .await
      .map_err(Self::store_err)?
      .is_some_and(|other| other.combatant_id != own_id);
    if clash {
      return Err(CoreError::DuplicateEmail(email.to_string()).into());
    }
    Ok(())
  }

  /// Resolve a combatant's card for `discipline` plus the discipline-local
  /// authorization named by `slug`.
  async fn card_and_authorization(
    &self,
    id: CombatantId,
    discipline: DisciplineId,
    slug: &str,
  ) -> Result<(Card, tiltyard_core::discipline::AuthorizationId)> {
    let discipline_row = self.require_discipline(discipline).await?;
    let authorization = discipline_row
      .authorization_by_slug(slug)
      .ok_or_else(|| CoreError::AuthorizationNotFound {
        discipline: discipline_row.slug.clone(),
        slug:       slug.to_string(),
      })?;
    let card = self
      .store()
      .card(id, discipline)
      .await
      .map_err(Self::store_err)?
      .ok_or(CoreError::CardNotFound { combatant: id, discipline })?;
    Ok((card, authorization.authorization_id))
  }

  async fn card_and_marshal_type(
    &self,
    id: CombatantId,
    discipline: DisciplineId,
    slug: &str,
  ) -> Result<(Card, tiltyard_core::discipline::MarshalTypeId)> {
    let discipline_row = self.require_discipline(discipline).await?;
    let marshal_type = discipline_row
      .marshal_type_by_slug(slug)
      .ok_or_else(|| CoreError::MarshalTypeNotFound {
        discipline: discipline_row.slug.clone(),
        slug:       slug.to_string(),
      })?;
    let card = self
      .store()
      .card(id, discipline)
      .await
      .map_err(Self::store_err)?
      .ok_or(CoreError::CardNotFound { combatant: id, discipline })?;
    Ok((card, marshal_type.marshal_type_id))
  }
}
