//! Discipline catalog — disciplines, their authorizations, and marshal types.
//!
//! These are reference data created at setup time, rarely mutated, and never
//! deleted while referenced. Everything else in the data graph points at them
//! by typed id; lookup by slug is a single explicit store operation, not an
//! overloaded find.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Ids ─────────────────────────────────────────────────────────────────────

/// Opaque identifier for a discipline.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DisciplineId(pub Uuid);

impl DisciplineId {
  pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for DisciplineId {
  fn default() -> Self { Self::new() }
}

impl std::fmt::Display for DisciplineId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.0.fmt(f)
  }
}

/// Opaque identifier for an authorization within a discipline.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AuthorizationId(pub Uuid);

impl AuthorizationId {
  pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for AuthorizationId {
  fn default() -> Self { Self::new() }
}

impl std::fmt::Display for AuthorizationId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.0.fmt(f)
  }
}

/// Opaque identifier for a marshal type within a discipline.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct MarshalTypeId(pub Uuid);

impl MarshalTypeId {
  pub fn new() -> Self { Self(Uuid::new_v4()) }
}

impl Default for MarshalTypeId {
  fn default() -> Self { Self::new() }
}

impl std::fmt::Display for MarshalTypeId {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    self.0.fmt(f)
  }
}

// ─── Catalog entities ────────────────────────────────────────────────────────

/// Something a combatant can be authorized to do within a discipline,
/// e.g. "Heavy Rapier" or "Weapon and Shield". Identity is
/// (discipline, slug).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Authorization {
  pub authorization_id: AuthorizationId,
  pub discipline_id:    DisciplineId,
  pub name:             String,
  pub slug:             String,
}

/// A marshal warrant type within a discipline, e.g. "Cut & Thrust Marshal".
/// Identity is (discipline, slug).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarshalType {
  pub marshal_type_id: MarshalTypeId,
  pub discipline_id:   DisciplineId,
  pub name:            String,
  pub slug:            String,
}

/// A named activity category (e.g. "Rapier", "Armoured Combat") scoping
/// authorizations, marshal types, and optionally roles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discipline {
  pub discipline_id:    DisciplineId,
  pub name:             String,
  /// URL/DB-safe unique token.
  pub slug:             String,
  pub authorizations:   Vec<Authorization>,
  pub marshal_types:    Vec<MarshalType>,
  /// Per-discipline override of the advance-reminder day offsets.
  /// `None` means the global default applies.
  pub reminder_offsets: Option<Vec<i64>>,
}

impl Discipline {
  pub fn authorization_by_slug(&self, slug: &str) -> Option<&Authorization> {
    self.authorizations.iter().find(|a| a.slug == slug)
  }

  pub fn marshal_type_by_slug(&self, slug: &str) -> Option<&MarshalType> {
    self.marshal_types.iter().find(|m| m.slug == slug)
  }
}

/// Input to [`crate::store::RosterStore::add_discipline`]. Slugs are paired
/// with readable names; ids are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewDiscipline {
  pub name:             String,
  pub slug:             String,
  /// (name, slug) pairs for the discipline's authorizations.
  pub authorizations:   Vec<(String, String)>,
  /// (name, slug) pairs for the discipline's marshal types.
  pub marshal_types:    Vec<(String, String)>,
  pub reminder_offsets: Option<Vec<i64>>,
}
