//! Combatant — the aggregate root for a tracked person.
//!
//! Restricted personal fields live in [`PersonalInfo`], which is only ever
//! persisted as an opaque encrypted blob (see [`crate::crypto::Encryptor`]).
//! The split between administrative edits and self-serve edits is enforced
//! at the type level: [`SelfServeUpdate`] simply has no field for a date of
//! birth or a dated credential.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{Error, Result, crypto::Encryptor};

// ─── Id ──────────────────────────────────────────────────────────────────────

/// Stable, immutable, externally shareable combatant identifier.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CombatantId(pub Uuid);

impl CombatantId {
  pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for CombatantId {
  fn default() -> Self { Self::new() }
}

impl std::fmt::Display for CombatantId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.0.fmt(f)
  }
}

// ─── Combatant ───────────────────────────────────────────────────────────────

/// The aggregate root. Owns its cards, waiver, privacy acceptance, and
/// update requests; all of those are cascade-deleted with it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combatant {
  pub combatant_id: CombatantId,
  /// Globally unique.
  pub email:        String,
  /// Preferred display (SCA) name, if the combatant uses one.
  pub sca_name:     Option<String>,
  /// Human-visible card identifier. Generated once the privacy policy is
  /// accepted; globally unique; immutable once non-empty except through
  /// [`card_id_candidate`] regeneration on a display-name change.
  pub card_id:      Option<String>,
  /// Opaque encrypted blob holding the combatant's [`PersonalInfo`].
  pub encrypted:    Option<Vec<u8>>,
  pub last_update:  DateTime<Utc>,
}

impl Combatant {
  /// The combatant's display name: SCA name if set, else the legal name
  /// from the decrypted personal info.
  pub fn display_name(&self, info: &PersonalInfo) -> String {
    self
      .sca_name
      .clone()
      .or_else(|| info.legal_name.clone())
      .unwrap_or_default()
  }

  /// Decrypt the personal-info blob. An absent blob decodes as the empty
  /// record.
  pub fn personal_info(
    &self,
    encryptor: &dyn Encryptor,
  ) -> Result<PersonalInfo> {
    match &self.encrypted {
      None => Ok(PersonalInfo::default()),
      Some(blob) => {
        let value = encryptor.decrypt_json(blob)?;
        Ok(serde_json::from_value(value)?)
      }
    }
  }

  /// Re-encrypt `info` into the blob and bump `last_update`.
  pub fn set_personal_info(
    &mut self,
    info: &PersonalInfo,
    encryptor: &dyn Encryptor,
    now: DateTime<Utc>,
  ) -> Result<()> {
    let value = serde_json::to_value(info)?;
    self.encrypted = Some(encryptor.encrypt_json(&value)?);
    self.last_update = now;
    Ok(())
  }
}

// ─── Personal info ───────────────────────────────────────────────────────────

/// Restricted personal fields. Plaintext in memory only; encrypted at rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonalInfo {
  pub legal_name:    Option<String>,
  pub phone:         Option<String>,
  pub address1:      Option<String>,
  pub address2:      Option<String>,
  pub city:          Option<String>,
  pub province:      Option<String>,
  pub postal_code:   Option<String>,
  pub dob:           Option<NaiveDate>,
  pub member_number: Option<String>,
  pub member_expiry: Option<NaiveDate>,
}

impl PersonalInfo {
  /// Whether the combatant holds a valid membership on `on_date`. No
  /// membership number or no expiry means no.
  pub fn membership_valid(&self, on_date: NaiveDate) -> bool {
    match (&self.member_number, self.member_expiry) {
      (Some(_), Some(expiry)) => expiry >= on_date,
      _ => false,
    }
  }

  /// One-line mailing address for card rendering.
  pub fn one_line_address(&self) -> String {
    let part = |f: &Option<String>| f.clone().unwrap_or_default();
    match &self.address2 {
      None => format!(
        "{}, {}, {}  {}",
        part(&self.address1),
        part(&self.city),
        part(&self.province),
        part(&self.postal_code),
      ),
      Some(address2) => format!(
        "{} {}, {}, {}  {}",
        part(&self.address1).trim(),
        address2,
        part(&self.city),
        part(&self.province),
        part(&self.postal_code),
      ),
    }
  }
}

// ─── Create / update inputs ──────────────────────────────────────────────────

/// Input to combatant creation.
#[derive(Debug, Clone, Default)]
pub struct NewCombatant {
  pub email:    String,
  pub sca_name: Option<String>,
  pub info:     PersonalInfo,
}

fn is_blank(value: &Option<String>) -> bool {
  value.as_deref().is_none_or(|s| s.trim().is_empty())
}

fn require(field: &'static str, value: &Option<String>) -> Result<()> {
  if is_blank(value) {
    return Err(Error::Validation { field: field.to_string() });
  }
  Ok(())
}

impl NewCombatant {
  /// Check that every mandatory combatant-info field is present and
  /// non-blank. The offending field is named in the error.
  pub fn validate(&self) -> Result<()> {
    if self.email.trim().is_empty() {
      return Err(Error::Validation { field: "email".to_string() });
    }
    require("legal_name", &self.info.legal_name)?;
    require("phone", &self.info.phone)?;
    require("address1", &self.info.address1)?;
    require("city", &self.info.city)?;
    require("province", &self.info.province)?;
    require("postal_code", &self.info.postal_code)?;
    Ok(())
  }
}

/// Administrative update. Only roles holding `edit_combatant_info` may apply
/// one; the waiver date additionally requires `edit_waiver_date`.
#[derive(Debug, Clone, Default)]
pub struct CombatantUpdate {
  pub email:         Option<String>,
  pub sca_name:      Option<String>,
  pub legal_name:    Option<String>,
  pub phone:         Option<String>,
  pub address1:      Option<String>,
  pub address2:      Option<String>,
  pub city:          Option<String>,
  pub province:      Option<String>,
  pub postal_code:   Option<String>,
  pub dob:           Option<NaiveDate>,
  pub member_number: Option<String>,
  pub member_expiry: Option<NaiveDate>,
  /// `YYYY-MM-DD`. Applying it requires the waiver-date role.
  pub waiver_date:   Option<String>,
}

/// The self-serve field allowlist, enforced by construction: there is no way
/// to express a date of birth, a membership field, or a dated credential in
/// this struct.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SelfServeUpdate {
  pub email:       Option<String>,
  pub sca_name:    Option<String>,
  pub phone:       Option<String>,
  pub address1:    Option<String>,
  pub address2:    Option<String>,
  pub city:        Option<String>,
  pub province:    Option<String>,
  pub postal_code: Option<String>,
}

/// Strip everything but digits from a phone number.
pub fn normalize_phone(raw: &str) -> String {
  raw.chars().filter(char::is_ascii_digit).collect()
}

// ─── Card-id generation ──────────────────────────────────────────────────────

/// Tokenize a display name into a URL/DB-safe slug: lowercase alphanumerics
/// with single-hyphen separators.
pub fn slugify(name: &str) -> String {
  let mut slug = String::with_capacity(name.len());
  let mut last_hyphen = true;
  for c in name.chars() {
    if c.is_alphanumeric() {
      slug.extend(c.to_lowercase());
      last_hyphen = false;
    } else if !last_hyphen {
      slug.push('-');
      last_hyphen = true;
    }
  }
  while slug.ends_with('-') {
    slug.pop();
  }
  slug
}

/// Salted SHA-256 hex digest of a legal name, used to derive card ids for
/// combatants without an SCA name and to extend colliding candidates.
pub fn salted_name_hash(legal_name: &str, salt: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(legal_name.as_bytes());
  hasher.update(salt.as_bytes());
  hex::encode(hasher.finalize())
}

/// The `attempt`-th card-id candidate for a combatant.
///
/// Attempt 0 is the slugified SCA name, or the first six characters of the
/// name hash when no SCA name is set. Each collision advances
/// deterministically: hash-based candidates slide a six-character window
/// along the digest; slug candidates append the next four hash characters.
pub fn card_id_candidate(
  sca_name: Option<&str>,
  name_hash: &str,
  attempt: usize,
) -> String {
  match sca_name {
    None => {
      // 64 hex chars; wrap the window rather than run off the end.
      let start = attempt % (name_hash.len() - 6);
      name_hash[start..start + 6].to_string()
    }
    Some(name) => {
      let mut candidate = slugify(name);
      for i in 0..attempt {
        let start = (i * 4) % (name_hash.len() - 4);
        candidate.push('-');
        candidate.push_str(&name_hash[start..start + 4]);
      }
      candidate
    }
  }
}
