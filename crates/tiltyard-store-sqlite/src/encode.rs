//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Calendar dates are stored as `YYYY-MM-DD` strings, timestamps as RFC 3339
//! strings, UUIDs as hyphenated lowercase strings, and reminder-offset lists
//! as compact JSON.

use chrono::{DateTime, NaiveDate, Utc};
use tiltyard_core::{
  card::{Card, CardId, Reminder, ReminderId, Waiver, WaiverId},
  combatant::{Combatant, CombatantId},
  discipline::{
    Authorization, AuthorizationId, Discipline, DisciplineId, MarshalType,
    MarshalTypeId,
  },
  privacy::PrivacyAcceptance,
  renewal::DATE_FORMAT,
  update_request::UpdateRequest,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_date(d: NaiveDate) -> String {
  d.format(DATE_FORMAT).to_string()
}

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, DATE_FORMAT)
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_offsets(offsets: &Option<Vec<i64>>) -> Result<Option<String>> {
  offsets
    .as_ref()
    .map(|o| serde_json::to_string(o).map_err(Error::Json))
    .transpose()
}

pub fn decode_offsets(s: Option<String>) -> Result<Option<Vec<i64>>> {
  s.as_deref()
    .map(|v| serde_json::from_str(v).map_err(Error::Json))
    .transpose()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `disciplines` row; the authorization and
/// marshal-type collections are filled in by separate queries.
pub struct RawDiscipline {
  pub discipline_id:    String,
  pub slug:             String,
  pub name:             String,
  pub reminder_offsets: Option<String>,
}

impl RawDiscipline {
  pub fn into_discipline(
    self,
    authorizations: Vec<Authorization>,
    marshal_types: Vec<MarshalType>,
  ) -> Result<Discipline> {
    Ok(Discipline {
      discipline_id: DisciplineId(decode_uuid(&self.discipline_id)?),
      slug: self.slug,
      name: self.name,
      authorizations,
      marshal_types,
      reminder_offsets: decode_offsets(self.reminder_offsets)?,
    })
  }
}

pub struct RawAuthorization {
  pub authorization_id: String,
  pub discipline_id:    String,
  pub slug:             String,
  pub name:             String,
}

impl RawAuthorization {
  pub fn into_authorization(self) -> Result<Authorization> {
    Ok(Authorization {
      authorization_id: AuthorizationId(decode_uuid(&self.authorization_id)?),
      discipline_id:    DisciplineId(decode_uuid(&self.discipline_id)?),
      slug:             self.slug,
      name:             self.name,
    })
  }
}

pub struct RawMarshalType {
  pub marshal_type_id: String,
  pub discipline_id:   String,
  pub slug:            String,
  pub name:            String,
}

impl RawMarshalType {
  pub fn into_marshal_type(self) -> Result<MarshalType> {
    Ok(MarshalType {
      marshal_type_id: MarshalTypeId(decode_uuid(&self.marshal_type_id)?),
      discipline_id:   DisciplineId(decode_uuid(&self.discipline_id)?),
      slug:            self.slug,
      name:            self.name,
    })
  }
}

/// Raw strings read directly from a `combatants` row.
pub struct RawCombatant {
  pub combatant_id: String,
  pub email:        String,
  pub sca_name:     Option<String>,
  pub card_id:      Option<String>,
  pub encrypted:    Option<Vec<u8>>,
  pub last_update:  String,
}

impl RawCombatant {
  pub fn into_combatant(self) -> Result<Combatant> {
    Ok(Combatant {
      combatant_id: CombatantId(decode_uuid(&self.combatant_id)?),
      email:        self.email,
      sca_name:     self.sca_name,
      card_id:      self.card_id,
      encrypted:    self.encrypted,
      last_update:  decode_dt(&self.last_update)?,
    })
  }
}

/// Raw strings from a `cards` row; association sets are separate queries.
pub struct RawCard {
  pub card_id:       String,
  pub combatant_id:  String,
  pub discipline_id: String,
  pub renewal_date:  Option<String>,
}

impl RawCard {
  pub fn into_card(
    self,
    authorizations: Vec<AuthorizationId>,
    warrants: Vec<MarshalTypeId>,
  ) -> Result<Card> {
    Ok(Card {
      card_id: CardId(decode_uuid(&self.card_id)?),
      combatant_id: CombatantId(decode_uuid(&self.combatant_id)?),
      discipline_id: DisciplineId(decode_uuid(&self.discipline_id)?),
      renewal_date: self.renewal_date.as_deref().map(decode_date).transpose()?,
      authorizations,
      warrants,
    })
  }
}

pub struct RawWaiver {
  pub waiver_id:    String,
  pub combatant_id: String,
  pub renewal_date: Option<String>,
}

impl RawWaiver {
  pub fn into_waiver(self) -> Result<Waiver> {
    Ok(Waiver {
      waiver_id:    WaiverId(decode_uuid(&self.waiver_id)?),
      combatant_id: CombatantId(decode_uuid(&self.combatant_id)?),
      renewal_date: self.renewal_date.as_deref().map(decode_date).transpose()?,
    })
  }
}

pub struct RawReminder {
  pub reminder_id:   String,
  pub reminder_date: String,
  pub is_expiry:     bool,
}

impl RawReminder {
  pub fn into_reminder(self) -> Result<Reminder> {
    Ok(Reminder {
      reminder_id:   ReminderId(decode_uuid(&self.reminder_id)?),
      reminder_date: decode_date(&self.reminder_date)?,
      is_expiry:     self.is_expiry,
    })
  }
}

pub struct RawPrivacyAcceptance {
  pub combatant_id: String,
  pub token:        String,
  pub accepted:     Option<String>,
}

impl RawPrivacyAcceptance {
  pub fn into_privacy(self) -> Result<PrivacyAcceptance> {
    Ok(PrivacyAcceptance {
      combatant_id: CombatantId(decode_uuid(&self.combatant_id)?),
      token:        decode_uuid(&self.token)?,
      accepted:     self.accepted.as_deref().map(decode_dt).transpose()?,
    })
  }
}

pub struct RawUpdateRequest {
  pub token:        String,
  pub combatant_id: String,
  pub expiry:       String,
  pub consumed:     Option<String>,
}

impl RawUpdateRequest {
  pub fn into_update_request(self) -> Result<UpdateRequest> {
    Ok(UpdateRequest {
      token:        decode_uuid(&self.token)?,
      combatant_id: CombatantId(decode_uuid(&self.combatant_id)?),
      expiry:       decode_dt(&self.expiry)?,
      consumed:     self.consumed.as_deref().map(decode_dt).transpose()?,
    })
  }
}
