//! Self-serve info-update requests.
//!
//! When a combatant asks to edit their own information, one of these is
//! created and its token mailed to them. The token is one-time-use: usable
//! only while `now < expiry` and `consumed` is unset.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::combatant::CombatantId;

/// Days an update request stays usable unless overridden by the
/// `update_request_ttl_days` setting.
pub const DEFAULT_UPDATE_REQUEST_TTL_DAYS: i64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
  pub token:        Uuid,
  pub combatant_id: CombatantId,
  pub expiry:       DateTime<Utc>,
  /// When the request was used; `None` while still open.
  pub consumed:     Option<DateTime<Utc>>,
}

impl UpdateRequest {
  pub fn new(
    combatant_id: CombatantId,
    now: DateTime<Utc>,
    ttl_days: i64,
  ) -> Self {
    Self {
      token: Uuid::new_v4(),
      combatant_id,
      expiry: now + Duration::days(ttl_days),
      consumed: None,
    }
  }

  /// A request is valid iff it has neither expired nor been consumed.
  pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
    now < self.expiry && self.consumed.is_none()
  }
}
