//! Principals and the role/permission engine.
//!
//! Every core operation takes the acting principal as an explicit argument;
//! there is no ambient "current user". The engine only answers boolean
//! questions — converting a failed check into an `Unauthorized` rejection is
//! the enclosing operation's job.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, discipline::DisciplineId, renewal::CredentialKind};

// ─── Roles ───────────────────────────────────────────────────────────────────

/// The closed set of grantable roles.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RoleSlug {
  ViewCombatantInfo,
  EditCombatantInfo,
  EditWaiverDate,
  EditCardDate,
  EditAuthorizations,
  EditMarshal,
  WarrantRoster,
  CanImport,
  CanEditOfficers,
}

impl RoleSlug {
  /// The slug string stored in the `user_roles` table.
  /// Must match the `rename_all = "snake_case"` serde tags above.
  pub fn as_slug(self) -> &'static str {
    match self {
      Self::ViewCombatantInfo => "view_combatant_info",
      Self::EditCombatantInfo => "edit_combatant_info",
      Self::EditWaiverDate => "edit_waiver_date",
      Self::EditCardDate => "edit_card_date",
      Self::EditAuthorizations => "edit_authorizations",
      Self::EditMarshal => "edit_marshal",
      Self::WarrantRoster => "warrant_roster",
      Self::CanImport => "can_import",
      Self::CanEditOfficers => "can_edit_officers",
    }
  }

  pub fn from_slug(slug: &str) -> Result<Self> {
    match slug {
      "view_combatant_info" => Ok(Self::ViewCombatantInfo),
      "edit_combatant_info" => Ok(Self::EditCombatantInfo),
      "edit_waiver_date" => Ok(Self::EditWaiverDate),
      "edit_card_date" => Ok(Self::EditCardDate),
      "edit_authorizations" => Ok(Self::EditAuthorizations),
      "edit_marshal" => Ok(Self::EditMarshal),
      "warrant_roster" => Ok(Self::WarrantRoster),
      "can_import" => Ok(Self::CanImport),
      "can_edit_officers" => Ok(Self::CanEditOfficers),
      other => Err(Error::UnknownRoleSlug(other.to_string())),
    }
  }

  /// Readable name, for admin listings.
  pub fn name(self) -> &'static str {
    match self {
      Self::ViewCombatantInfo => "Can view combatant info",
      Self::EditCombatantInfo => "Can edit combatant info",
      Self::EditWaiverDate => "Can edit waiver dates",
      Self::EditCardDate => "Can edit card dates",
      Self::EditAuthorizations => "Can edit authorizations",
      Self::EditMarshal => "Can edit marshal status",
      Self::WarrantRoster => "Can generate warrant roster",
      Self::CanImport => "Can import combatants",
      Self::CanEditOfficers => "Can edit kingdom officers",
    }
  }

  /// Roles that are always global and may never be granted per-discipline.
  pub fn is_always_global(self) -> bool {
    matches!(self, Self::ViewCombatantInfo | Self::EditCombatantInfo)
  }

  /// Roles that grant visibility of the combatant list.
  pub const COMBATANT_LIST_ROLES: [RoleSlug; 6] = [
    Self::ViewCombatantInfo,
    Self::EditCombatantInfo,
    Self::EditWaiverDate,
    Self::EditCardDate,
    Self::EditAuthorizations,
    Self::EditMarshal,
  ];
}

/// A role granted to a user, optionally scoped to one discipline.
/// `discipline: None` is a global grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGrant {
  pub role:       RoleSlug,
  pub discipline: Option<DisciplineId>,
}

// ─── Role policy ─────────────────────────────────────────────────────────────

/// Setup-time configuration of whether the card-date and waiver-date roles
/// are granted globally or per discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RolePolicy {
  pub card_date_is_global:   bool,
  pub waiver_date_is_global: bool,
}

impl Default for RolePolicy {
  fn default() -> Self {
    Self { card_date_is_global: true, waiver_date_is_global: true }
  }
}

impl RolePolicy {
  /// The scope a date-edit role check must be made against for a credential
  /// attached to `discipline`. Waivers carry no discipline, so a
  /// per-discipline waiver-date policy still checks global scope.
  pub fn date_role_scope(
    self,
    kind: CredentialKind,
    discipline: Option<DisciplineId>,
  ) -> Option<DisciplineId> {
    match kind {
      CredentialKind::Card if !self.card_date_is_global => discipline,
      _ => None,
    }
  }
}

// ─── Principal ───────────────────────────────────────────────────────────────

/// A resolved user account, as supplied by the external authentication layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
  pub email:           String,
  pub is_system_admin: bool,
  pub grants:          Vec<RoleGrant>,
}

/// The acting party for a core operation.
#[derive(Debug, Clone)]
pub enum Principal {
  /// An unauthenticated caller. Satisfies no role checks.
  Anonymous,
  /// The restricted-capability principal used only for the self-serve
  /// info-update flow. Satisfies exactly the global `edit_combatant_info`
  /// check and can never hold a discipline-scoped capability.
  SelfServe,
  /// An authenticated user with persisted role grants.
  User(UserAccount),
}

impl Principal {
  pub fn is_anonymous(&self) -> bool { matches!(self, Self::Anonymous) }

  pub fn is_system_admin(&self) -> bool {
    matches!(self, Self::User(u) if u.is_system_admin)
  }

  /// Check whether this principal holds `role` at exactly the given scope.
  ///
  /// A grant scoped to discipline A satisfies only checks scoped to A; a
  /// global grant satisfies only global checks. There is no fallthrough in
  /// either direction. A system admin satisfies every check.
  pub fn has_role(
    &self,
    discipline: Option<DisciplineId>,
    role: RoleSlug,
  ) -> bool {
    match self {
      Self::Anonymous => false,
      Self::SelfServe => {
        discipline.is_none() && role == RoleSlug::EditCombatantInfo
      }
      Self::User(user) => {
        if user.is_system_admin {
          return true;
        }
        user
          .grants
          .iter()
          .any(|g| g.role == role && g.discipline == discipline)
      }
    }
  }

  /// Check whether this principal holds any of `roles` at the given scope.
  pub fn has_any_role(
    &self,
    discipline: Option<DisciplineId>,
    roles: &[RoleSlug],
  ) -> bool {
    roles.iter().any(|r| self.has_role(discipline, *r))
  }

  /// Check whether this principal holds `role` in any scope at all.
  /// Used for per-discipline-configured date roles on scope-less entities.
  pub fn has_role_anywhere(&self, role: RoleSlug) -> bool {
    match self {
      Self::Anonymous => false,
      Self::SelfServe => role == RoleSlug::EditCombatantInfo,
      Self::User(user) => {
        user.is_system_admin || user.grants.iter().any(|g| g.role == role)
      }
    }
  }

  /// Whether this principal may see the combatant list at all.
  pub fn can_see_combatant_list(&self) -> bool {
    match self {
      Self::Anonymous | Self::SelfServe => false,
      Self::User(user) => {
        user.is_system_admin
          || user
            .grants
            .iter()
            .any(|g| RoleSlug::COMBATANT_LIST_ROLES.contains(&g.role))
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn user(grants: Vec<RoleGrant>) -> Principal {
    Principal::User(UserAccount {
      email: "marshal@example.org".into(),
      is_system_admin: false,
      grants,
    })
  }

  #[test]
  fn scoped_grant_does_not_satisfy_other_scopes() {
    let rapier = DisciplineId::new();
    let armoured = DisciplineId::new();
    let p = user(vec![RoleGrant {
      role:       RoleSlug::EditAuthorizations,
      discipline: Some(rapier),
    }]);

    assert!(p.has_role(Some(rapier), RoleSlug::EditAuthorizations));
    assert!(!p.has_role(Some(armoured), RoleSlug::EditAuthorizations));
    assert!(!p.has_role(None, RoleSlug::EditAuthorizations));
  }

  #[test]
  fn global_grant_does_not_satisfy_scoped_checks() {
    let rapier = DisciplineId::new();
    let p = user(vec![RoleGrant {
      role:       RoleSlug::EditCardDate,
      discipline: None,
    }]);

    assert!(p.has_role(None, RoleSlug::EditCardDate));
    assert!(!p.has_role(Some(rapier), RoleSlug::EditCardDate));
  }

  #[test]
  fn system_admin_satisfies_everything() {
    let p = Principal::User(UserAccount {
      email: "admin@example.org".into(),
      is_system_admin: true,
      grants: vec![],
    });

    assert!(p.has_role(None, RoleSlug::CanEditOfficers));
    assert!(p.has_role(Some(DisciplineId::new()), RoleSlug::EditMarshal));
  }

  #[test]
  fn anonymous_satisfies_nothing() {
    let p = Principal::Anonymous;
    assert!(!p.has_role(None, RoleSlug::ViewCombatantInfo));
    assert!(!p.has_any_role(None, &RoleSlug::COMBATANT_LIST_ROLES));
    assert!(!p.can_see_combatant_list());
  }

  #[test]
  fn self_serve_holds_exactly_one_global_capability() {
    let p = Principal::SelfServe;
    assert!(p.has_role(None, RoleSlug::EditCombatantInfo));
    assert!(!p.has_role(None, RoleSlug::EditWaiverDate));
    // Never a discipline-scoped capability, not even the one it has globally.
    assert!(
      !p.has_role(Some(DisciplineId::new()), RoleSlug::EditCombatantInfo)
    );
  }

  #[test]
  fn combatant_list_visibility_follows_the_list_roles() {
    let rapier = DisciplineId::new();
    let viewer = user(vec![RoleGrant {
      role:       RoleSlug::ViewCombatantInfo,
      discipline: Some(rapier),
    }]);
    assert!(viewer.can_see_combatant_list());

    // Roles outside the list set confer nothing.
    let importer = user(vec![RoleGrant {
      role:       RoleSlug::CanImport,
      discipline: None,
    }]);
    assert!(!importer.can_see_combatant_list());
    assert!(!Principal::SelfServe.can_see_combatant_list());
  }

  #[test]
  fn has_any_role_matches_one_of_several() {
    let p = user(vec![RoleGrant {
      role:       RoleSlug::ViewCombatantInfo,
      discipline: None,
    }]);
    assert!(p.has_any_role(
      None,
      &[RoleSlug::EditCombatantInfo, RoleSlug::ViewCombatantInfo]
    ));
    assert!(!p.has_any_role(None, &[RoleSlug::EditMarshal]));
  }

  #[test]
  fn role_slug_roundtrip() {
    for slug in [
      RoleSlug::ViewCombatantInfo,
      RoleSlug::EditCombatantInfo,
      RoleSlug::EditWaiverDate,
      RoleSlug::EditCardDate,
      RoleSlug::EditAuthorizations,
      RoleSlug::EditMarshal,
      RoleSlug::WarrantRoster,
      RoleSlug::CanImport,
      RoleSlug::CanEditOfficers,
    ] {
      assert_eq!(RoleSlug::from_slug(slug.as_slug()).unwrap(), slug);
    }
    assert!(RoleSlug::from_slug("rule_the_world").is_err());
  }

  #[test]
  fn date_role_scope_follows_policy() {
    let rapier = DisciplineId::new();
    let global = RolePolicy::default();
    assert_eq!(
      global.date_role_scope(CredentialKind::Card, Some(rapier)),
      None
    );

    let per_discipline = RolePolicy {
      card_date_is_global:   false,
      waiver_date_is_global: false,
    };
    assert_eq!(
      per_discipline.date_role_scope(CredentialKind::Card, Some(rapier)),
      Some(rapier)
    );
    // Waivers have no discipline to scope to.
    assert_eq!(
      per_discipline.date_role_scope(CredentialKind::Waiver, None),
      None
    );
  }
}
