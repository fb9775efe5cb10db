//! Error types for `tiltyard-core`.
//!
//! Every variant here is an expected, caller-recoverable condition. Nothing
//! in the core is fatal to the process.

use thiserror::Error;
use uuid::Uuid;

use crate::{combatant::CombatantId, discipline::DisciplineId};

#[derive(Debug, Error)]
pub enum Error {
  /// The principal lacks a required role, or a self-serve token is
  /// missing, expired, or already consumed.
  #[error("unauthorized")]
  Unauthorized,

  #[error("combatant not found: {0}")]
  CombatantNotFound(String),

  #[error("discipline not found: {0}")]
  DisciplineNotFound(String),

  #[error("card not found for combatant {combatant} in {discipline}")]
  CardNotFound {
    combatant:  CombatantId,
    discipline: DisciplineId,
  },

  #[error("no waiver on file for combatant {0}")]
  WaiverNotFound(CombatantId),

  #[error("authorization {slug:?} not found in discipline {discipline:?}")]
  AuthorizationNotFound { discipline: String, slug: String },

  #[error("marshal type {slug:?} not found in discipline {discipline:?}")]
  MarshalTypeNotFound { discipline: String, slug: String },

  #[error("update request not found: {0}")]
  UpdateRequestNotFound(Uuid),

  #[error("privacy acceptance record not found: {0}")]
  PrivacyAcceptanceNotFound(String),

  #[error("a combatant with email {0:?} already exists")]
  DuplicateEmail(String),

  /// A required combatant field is missing or blank.
  #[error("required field missing: {field}")]
  Validation { field: String },

  /// A date string did not parse as `YYYY-MM-DD`.
  #[error("malformed date in field {field}: {value:?}")]
  MalformedDate { field: String, value: String },

  #[error("privacy policy has not been accepted")]
  PrivacyPolicyNotAccepted,

  #[error("unknown role slug: {0:?}")]
  UnknownRoleSlug(String),

  #[error("encryption error: {0}")]
  Encryption(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
