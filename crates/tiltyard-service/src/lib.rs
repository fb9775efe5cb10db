//! The Tiltyard operation layer.
//!
//! [`Roster`] binds a [`RosterStore`] backend, a [`Notifier`] and an
//! [`Encryptor`] together and exposes the registry's operations, each taking
//! the acting [`Principal`](tiltyard_core::principal::Principal) explicitly.
//! Auth resolution, HTTP, and delivery transport are the caller's
//! responsibility.

pub mod combatant;
pub mod error;
pub mod renewal;
pub mod sweep;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use tiltyard_core::{
  crypto::Encryptor,
  notify::{Mailer, Notifier},
  principal::RolePolicy,
  store::RosterStore,
};

pub use error::{Error, Result};

// ─── Settings keys ───────────────────────────────────────────────────────────

/// JSON array of advance-reminder offsets in days, e.g. `[30, 60]`.
/// Discipline-level offsets override it; absent both, the built-in default
/// applies.
pub const SETTING_REMINDER_OFFSETS: &str = "reminder_offsets";

/// JSON-encoded [`RolePolicy`].
pub const SETTING_ROLE_POLICY: &str = "role_policy";

/// Integer lifetime of self-serve update links, in days.
pub const SETTING_UPDATE_REQUEST_TTL_DAYS: &str = "update_request_ttl_days";

// ─── Service ─────────────────────────────────────────────────────────────────

/// Deployment-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
  /// External base URL interpolated into emailed links.
  pub base_url:     String,
  /// Salt mixed into the legal-name hash that backs card-id generation.
  pub card_id_salt: String,
}

/// The registry service. Generic over its three collaborator seams.
pub struct Roster<S, N, E> {
  store:     S,
  notifier:  N,
  encryptor: E,
  config:    RosterConfig,
}

impl<S, N, E> Roster<S, N, E>
where
  S: RosterStore,
  N: Notifier,
  E: Encryptor,
{
  pub fn new(store: S, notifier: N, encryptor: E, config: RosterConfig) -> Self {
    Self { store, notifier, encryptor, config }
  }

  pub fn store(&self) -> &S { &self.store }

  pub(crate) fn mailer(&self) -> Mailer<'_, N> {
    Mailer::new(&self.notifier, &self.config.base_url)
  }

  pub(crate) fn encryptor(&self) -> &dyn Encryptor { &self.encryptor }

  /// Box a backend error.
  pub(crate) fn store_err(e: S::Error) -> Error {
    Error::Store(Box::new(e))
  }

  /// The configured role policy, defaulting when the setting is absent.
  pub async fn role_policy(&self) -> Result<RolePolicy> {
    match self
      .store
      .setting(SETTING_ROLE_POLICY.to_string())
      .await
      .map_err(Self::store_err)?
    {
      None => Ok(RolePolicy::default()),
      Some(value) => Ok(
        serde_json::from_value(value).map_err(tiltyard_core::Error::from)?,
      ),
    }
  }
}
