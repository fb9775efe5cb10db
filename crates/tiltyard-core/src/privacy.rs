//! Privacy-policy acceptance records.
//!
//! Every combatant gets one of these at creation time. Until it is resolved
//! affirmatively, card-id generation and card-URL notifications are blocked.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::combatant::CombatantId;

/// One-to-one with a combatant. The token is externally unguessable and is
/// what the acceptance email links to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyAcceptance {
  pub combatant_id: CombatantId,
  pub token:        Uuid,
  /// When the combatant accepted the policy; `None` while unresolved.
  pub accepted:     Option<DateTime<Utc>>,
}

impl PrivacyAcceptance {
  pub fn new(combatant_id: CombatantId) -> Self {
    Self { combatant_id, token: Uuid::new_v4(), accepted: None }
  }

  pub fn is_accepted(&self) -> bool { self.accepted.is_some() }
}
