//! [`SqliteStore`] — the SQLite implementation of [`RosterStore`].

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use tiltyard_core::{
  card::{Card, CardId, Reminder, ReminderId, Waiver, WaiverId},
  combatant::{Combatant, CombatantId},
  discipline::{
    Authorization, AuthorizationId, Discipline, DisciplineId, MarshalType,
    MarshalTypeId, NewDiscipline,
  },
  principal::{RoleGrant, RoleSlug, UserAccount},
  privacy::PrivacyAcceptance,
  renewal::{CredentialKind, ReminderSpec, add_years},
  store::{DueCardReminder, DueWaiverReminder, RosterStore},
  update_request::UpdateRequest,
};

use crate::{
  Error, Result,
  encode::{
    RawAuthorization, RawCard, RawCombatant, RawDiscipline, RawMarshalType,
    RawPrivacyAcceptance, RawReminder, RawUpdateRequest, RawWaiver,
    decode_date, decode_uuid, encode_date, encode_dt, encode_offsets,
    encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tiltyard roster store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch a card's granted authorization and warrant id sets.
  async fn card_grants(
    &self,
    card_id_str: String,
  ) -> Result<(Vec<AuthorizationId>, Vec<MarshalTypeId>)> {
    let (auth_strs, warrant_strs): (Vec<String>, Vec<String>) = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT authorization_id FROM card_authorizations WHERE card_id = ?1",
        )?;
        let auths = stmt
          .query_map(rusqlite::params![card_id_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;

        let mut stmt = conn.prepare(
          "SELECT marshal_type_id FROM card_warrants WHERE card_id = ?1",
        )?;
        let warrants = stmt
          .query_map(rusqlite::params![card_id_str], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok((auths, warrants))
      })
      .await?;

    let authorizations = auth_strs
      .iter()
      .map(|s| Ok(AuthorizationId(decode_uuid(s)?)))
      .collect::<Result<Vec<_>>>()?;
    let warrants = warrant_strs
      .iter()
      .map(|s| Ok(MarshalTypeId(decode_uuid(s)?)))
      .collect::<Result<Vec<_>>>()?;

    Ok((authorizations, warrants))
  }

  /// Assemble a full [`Discipline`] from its raw row.
  async fn hydrate_discipline(&self, raw: RawDiscipline) -> Result<Discipline> {
    let id_str = raw.discipline_id.clone();

    let (raw_auths, raw_marshals): (Vec<RawAuthorization>, Vec<RawMarshalType>) =
      self
        .conn
        .call(move |conn| {
          let mut stmt = conn.prepare(
            "SELECT authorization_id, discipline_id, slug, name
             FROM authorizations WHERE discipline_id = ?1 ORDER BY name",
          )?;
          let auths = stmt
            .query_map(rusqlite::params![id_str], |row| {
              Ok(RawAuthorization {
                authorization_id: row.get(0)?,
                discipline_id:    row.get(1)?,
                slug:             row.get(2)?,
                name:             row.get(3)?,
              })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

          let mut stmt = conn.prepare(
            "SELECT marshal_type_id, discipline_id, slug, name
             FROM marshal_types WHERE discipline_id = ?1 ORDER BY name",
          )?;
          let marshals = stmt
            .query_map(rusqlite::params![id_str], |row| {
              Ok(RawMarshalType {
                marshal_type_id: row.get(0)?,
                discipline_id:   row.get(1)?,
                slug:            row.get(2)?,
                name:            row.get(3)?,
              })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

          Ok((auths, marshals))
        })
        .await?;

    let authorizations: Vec<Authorization> = raw_auths
      .into_iter()
      .map(RawAuthorization::into_authorization)
      .collect::<Result<_>>()?;
    let marshal_types: Vec<MarshalType> = raw_marshals
      .into_iter()
      .map(RawMarshalType::into_marshal_type)
      .collect::<Result<_>>()?;

    raw.into_discipline(authorizations, marshal_types)
  }

  async fn discipline_row(
    &self,
    sql: &'static str,
    key: String,
  ) -> Result<Option<RawDiscipline>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(sql, rusqlite::params![key], |row| {
              Ok(RawDiscipline {
                discipline_id:    row.get(0)?,
                slug:             row.get(1)?,
                name:             row.get(2)?,
                reminder_offsets: row.get(3)?,
              })
            })
            .optional()?,
        )
      })
      .await?;
    Ok(raw)
  }

  async fn combatant_row(
    &self,
    sql: &'static str,
    key: String,
  ) -> Result<Option<Combatant>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(sql, rusqlite::params![key], |row| {
              Ok(RawCombatant {
                combatant_id: row.get(0)?,
                email:        row.get(1)?,
                sca_name:     row.get(2)?,
                card_id:      row.get(3)?,
                encrypted:    row.get(4)?,
                last_update:  row.get(5)?,
              })
            })
            .optional()?,
        )
      })
      .await?;

    raw.map(RawCombatant::into_combatant).transpose()
  }
}

// ─── RosterStore impl ────────────────────────────────────────────────────────

impl RosterStore for SqliteStore {
  type Error = Error;

  // ── Discipline catalog ────────────────────────────────────────────────────

  async fn add_discipline(&self, input: NewDiscipline) -> Result<Discipline> {
    let discipline_id = DisciplineId::new();

    let authorizations: Vec<Authorization> = input
      .authorizations
      .into_iter()
      .map(|(name, slug)| Authorization {
        authorization_id: AuthorizationId::new(),
        discipline_id,
        name,
        slug,
      })
      .collect();
    let marshal_types: Vec<MarshalType> = input
      .marshal_types
      .into_iter()
      .map(|(name, slug)| MarshalType {
        marshal_type_id: MarshalTypeId::new(),
        discipline_id,
        name,
        slug,
      })
      .collect();

    let discipline = Discipline {
      discipline_id,
      name: input.name,
      slug: input.slug,
      authorizations,
      marshal_types,
      reminder_offsets: input.reminder_offsets,
    };

    let id_str = encode_uuid(discipline_id.0);
    let slug = discipline.slug.clone();
    let name = discipline.name.clone();
    let offsets_str = encode_offsets(&discipline.reminder_offsets)?;
    let auth_rows: Vec<(String, String, String)> = discipline
      .authorizations
      .iter()
      .map(|a| {
        (encode_uuid(a.authorization_id.0), a.slug.clone(), a.name.clone())
      })
      .collect();
    let marshal_rows: Vec<(String, String, String)> = discipline
      .marshal_types
      .iter()
      .map(|m| (encode_uuid(m.marshal_type_id.0), m.slug.clone(), m.name.clone()))
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO disciplines (discipline_id, slug, name, reminder_offsets)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id_str, slug, name, offsets_str],
        )?;
        for (auth_id, auth_slug, auth_name) in &auth_rows {
          tx.execute(
            "INSERT INTO authorizations (authorization_id, discipline_id, slug, name)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![auth_id, id_str, auth_slug, auth_name],
          )?;
        }
        for (marshal_id, marshal_slug, marshal_name) in &marshal_rows {
          tx.execute(
            "INSERT INTO marshal_types (marshal_type_id, discipline_id, slug, name)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![marshal_id, id_str, marshal_slug, marshal_name],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    Ok(discipline)
  }

  async fn discipline(&self, id: DisciplineId) -> Result<Option<Discipline>> {
    let raw = self
      .discipline_row(
        "SELECT discipline_id, slug, name, reminder_offsets
         FROM disciplines WHERE discipline_id = ?1",
        encode_uuid(id.0),
      )
      .await?;

    match raw {
      None => Ok(None),
      Some(raw) => Ok(Some(self.hydrate_discipline(raw).await?)),
    }
  }

  async fn discipline_by_slug(&self, slug: String) -> Result<Option<Discipline>> {
    let raw = self
      .discipline_row(
        "SELECT discipline_id, slug, name, reminder_offsets
         FROM disciplines WHERE slug = ?1",
        slug,
      )
      .await?;

    match raw {
      None => Ok(None),
      Some(raw) => Ok(Some(self.hydrate_discipline(raw).await?)),
    }
  }

  async fn list_disciplines(&self) -> Result<Vec<Discipline>> {
    let raws: Vec<RawDiscipline> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT discipline_id, slug, name, reminder_offsets
           FROM disciplines ORDER BY name",
        )?;
        let rows = stmt
          .query_map([], |row| {
            Ok(RawDiscipline {
              discipline_id:    row.get(0)?,
              slug:             row.get(1)?,
              name:             row.get(2)?,
              reminder_offsets: row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut disciplines = Vec::with_capacity(raws.len());
    for raw in raws {
      disciplines.push(self.hydrate_discipline(raw).await?);
    }
    Ok(disciplines)
  }

  // ── Combatants ────────────────────────────────────────────────────────────

  async fn add_combatant(
    &self,
    combatant: Combatant,
    privacy: PrivacyAcceptance,
  ) -> Result<()> {
    let id_str = encode_uuid(combatant.combatant_id.0);
    let email = combatant.email;
    let sca_name = combatant.sca_name;
    let card_id = combatant.card_id;
    let encrypted = combatant.encrypted;
    let last_update = encode_dt(combatant.last_update);
    let token_str = encode_uuid(privacy.token);
    let accepted_str = privacy.accepted.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO combatants
             (combatant_id, email, sca_name, card_id, encrypted, last_update)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            id_str, email, sca_name, card_id, encrypted, last_update
          ],
        )?;
        tx.execute(
          "INSERT INTO privacy_acceptances (combatant_id, token, accepted)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![id_str, token_str, accepted_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn update_combatant(&self, combatant: Combatant) -> Result<()> {
    let id_str = encode_uuid(combatant.combatant_id.0);
    let email = combatant.email;
    let sca_name = combatant.sca_name;
    let card_id = combatant.card_id;
    let encrypted = combatant.encrypted;
    let last_update = encode_dt(combatant.last_update);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE combatants
           SET email = ?2, sca_name = ?3, card_id = ?4, encrypted = ?5,
               last_update = ?6
           WHERE combatant_id = ?1",
          rusqlite::params![
            id_str, email, sca_name, card_id, encrypted, last_update
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_combatant(&self, id: CombatantId) -> Result<()> {
    let id_str = encode_uuid(id.0);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM combatants WHERE combatant_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn combatant(&self, id: CombatantId) -> Result<Option<Combatant>> {
    self
      .combatant_row(
        "SELECT combatant_id, email, sca_name, card_id, encrypted, last_update
         FROM combatants WHERE combatant_id = ?1",
        encode_uuid(id.0),
      )
      .await
  }

  async fn combatant_by_email(&self, email: String) -> Result<Option<Combatant>> {
    self
      .combatant_row(
        "SELECT combatant_id, email, sca_name, card_id, encrypted, last_update
         FROM combatants WHERE email = ?1",
        email,
      )
      .await
  }

  async fn combatant_by_card_id(
    &self,
    card_id: String,
  ) -> Result<Option<Combatant>> {
    self
      .combatant_row(
        "SELECT combatant_id, email, sca_name, card_id, encrypted, last_update
         FROM combatants WHERE card_id = ?1",
        card_id,
      )
      .await
  }

  // ── Cards ─────────────────────────────────────────────────────────────────

  async fn insert_card(&self, card: Card) -> Result<()> {
    let card_id_str = encode_uuid(card.card_id.0);
    let combatant_str = encode_uuid(card.combatant_id.0);
    let discipline_str = encode_uuid(card.discipline_id.0);
    let renewal_str = card.renewal_date.map(encode_date);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO cards (card_id, combatant_id, discipline_id, renewal_date)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![
            card_id_str, combatant_str, discipline_str, renewal_str
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn card(
    &self,
    combatant: CombatantId,
    discipline: DisciplineId,
  ) -> Result<Option<Card>> {
    let combatant_str = encode_uuid(combatant.0);
    let discipline_str = encode_uuid(discipline.0);

    let raw: Option<RawCard> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT card_id, combatant_id, discipline_id, renewal_date
               FROM cards WHERE combatant_id = ?1 AND discipline_id = ?2",
              rusqlite::params![combatant_str, discipline_str],
              |row| {
                Ok(RawCard {
                  card_id:       row.get(0)?,
                  combatant_id:  row.get(1)?,
                  discipline_id: row.get(2)?,
                  renewal_date:  row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    match raw {
      None => Ok(None),
      Some(raw) => {
        let (authorizations, warrants) =
          self.card_grants(raw.card_id.clone()).await?;
        Ok(Some(raw.into_card(authorizations, warrants)?))
      }
    }
  }

  async fn add_card_authorization(
    &self,
    card: CardId,
    authorization: AuthorizationId,
  ) -> Result<()> {
    let card_str = encode_uuid(card.0);
    let auth_str = encode_uuid(authorization.0);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO card_authorizations (card_id, authorization_id)
           VALUES (?1, ?2)",
          rusqlite::params![card_str, auth_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn remove_card_authorization(
    &self,
    card: CardId,
    authorization: AuthorizationId,
  ) -> Result<()> {
    let card_str = encode_uuid(card.0);
    let auth_str = encode_uuid(authorization.0);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM card_authorizations
           WHERE card_id = ?1 AND authorization_id = ?2",
          rusqlite::params![card_str, auth_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn add_card_warrant(
    &self,
    card: CardId,
    marshal_type: MarshalTypeId,
  ) -> Result<()> {
    let card_str = encode_uuid(card.0);
    let marshal_str = encode_uuid(marshal_type.0);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO card_warrants (card_id, marshal_type_id)
           VALUES (?1, ?2)",
          rusqlite::params![card_str, marshal_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn remove_card_warrant(
    &self,
    card: CardId,
    marshal_type: MarshalTypeId,
  ) -> Result<()> {
    let card_str = encode_uuid(card.0);
    let marshal_str = encode_uuid(marshal_type.0);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM card_warrants
           WHERE card_id = ?1 AND marshal_type_id = ?2",
          rusqlite::params![card_str, marshal_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Waivers ───────────────────────────────────────────────────────────────

  async fn insert_waiver(&self, waiver: Waiver) -> Result<()> {
    let waiver_str = encode_uuid(waiver.waiver_id.0);
    let combatant_str = encode_uuid(waiver.combatant_id.0);
    let renewal_str = waiver.renewal_date.map(encode_date);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO waivers (waiver_id, combatant_id, renewal_date)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![waiver_str, combatant_str, renewal_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn waiver(&self, combatant: CombatantId) -> Result<Option<Waiver>> {
    let combatant_str = encode_uuid(combatant.0);

    let raw: Option<RawWaiver> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT waiver_id, combatant_id, renewal_date
               FROM waivers WHERE combatant_id = ?1",
              rusqlite::params![combatant_str],
              |row| {
                Ok(RawWaiver {
                  waiver_id:    row.get(0)?,
                  combatant_id: row.get(1)?,
                  renewal_date: row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawWaiver::into_waiver).transpose()
  }

  // ── Renewal ───────────────────────────────────────────────────────────────

  async fn set_card_renewal(
    &self,
    card: CardId,
    renewal_date: NaiveDate,
    reminders: Vec<ReminderSpec>,
  ) -> Result<()> {
    let card_str = encode_uuid(card.0);
    let date_str = encode_date(renewal_date);
    let reminder_rows: Vec<(String, String, bool)> = reminders
      .iter()
      .map(|r| {
        (
          encode_uuid(Uuid::new_v4()),
          encode_date(r.reminder_date),
          r.is_expiry,
        )
      })
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM card_reminders WHERE card_id = ?1",
          rusqlite::params![card_str],
        )?;
        tx.execute(
          "UPDATE cards SET renewal_date = ?2 WHERE card_id = ?1",
          rusqlite::params![card_str, date_str],
        )?;
        for (reminder_id, reminder_date, is_expiry) in &reminder_rows {
          tx.execute(
            "INSERT INTO card_reminders
               (reminder_id, card_id, reminder_date, is_expiry)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![reminder_id, card_str, reminder_date, is_expiry],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn set_waiver_renewal(
    &self,
    waiver: WaiverId,
    renewal_date: NaiveDate,
    reminders: Vec<ReminderSpec>,
  ) -> Result<()> {
    let waiver_str = encode_uuid(waiver.0);
    let date_str = encode_date(renewal_date);
    let reminder_rows: Vec<(String, String, bool)> = reminders
      .iter()
      .map(|r| {
        (
          encode_uuid(Uuid::new_v4()),
          encode_date(r.reminder_date),
          r.is_expiry,
        )
      })
      .collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM waiver_reminders WHERE waiver_id = ?1",
          rusqlite::params![waiver_str],
        )?;
        tx.execute(
          "UPDATE waivers SET renewal_date = ?2 WHERE waiver_id = ?1",
          rusqlite::params![waiver_str, date_str],
        )?;
        for (reminder_id, reminder_date, is_expiry) in &reminder_rows {
          tx.execute(
            "INSERT INTO waiver_reminders
               (reminder_id, waiver_id, reminder_date, is_expiry)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
              reminder_id, waiver_str, reminder_date, is_expiry
            ],
          )?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn card_reminders(&self, card: CardId) -> Result<Vec<Reminder>> {
    let card_str = encode_uuid(card.0);

    let raws: Vec<RawReminder> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT reminder_id, reminder_date, is_expiry
           FROM card_reminders WHERE card_id = ?1 ORDER BY reminder_date",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![card_str], |row| {
            Ok(RawReminder {
              reminder_id:   row.get(0)?,
              reminder_date: row.get(1)?,
              is_expiry:     row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReminder::into_reminder).collect()
  }

  async fn waiver_reminders(&self, waiver: WaiverId) -> Result<Vec<Reminder>> {
    let waiver_str = encode_uuid(waiver.0);

    let raws: Vec<RawReminder> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT reminder_id, reminder_date, is_expiry
           FROM waiver_reminders WHERE waiver_id = ?1 ORDER BY reminder_date",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![waiver_str], |row| {
            Ok(RawReminder {
              reminder_id:   row.get(0)?,
              reminder_date: row.get(1)?,
              is_expiry:     row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReminder::into_reminder).collect()
  }

  // ── Sweep ─────────────────────────────────────────────────────────────────

  async fn due_card_reminders(
    &self,
    today: NaiveDate,
  ) -> Result<Vec<DueCardReminder>> {
    let today_str = encode_date(today);

    struct Row {
      reminder:        RawReminder,
      card_id:         String,
      combatant_email: String,
      discipline_name: String,
      discipline_slug: String,
      renewal_date:    Option<String>,
    }

    let rows: Vec<Row> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT r.reminder_id, r.reminder_date, r.is_expiry,
                  c.card_id, m.email, d.name, d.slug, c.renewal_date
           FROM card_reminders r
           JOIN cards       c ON c.card_id       = r.card_id
           JOIN combatants  m ON m.combatant_id  = c.combatant_id
           JOIN disciplines d ON d.discipline_id = c.discipline_id
           WHERE r.reminder_date <= ?1
           ORDER BY r.reminder_date",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![today_str], |row| {
            Ok(Row {
              reminder:        RawReminder {
                reminder_id:   row.get(0)?,
                reminder_date: row.get(1)?,
                is_expiry:     row.get(2)?,
              },
              card_id:         row.get(3)?,
              combatant_email: row.get(4)?,
              discipline_name: row.get(5)?,
              discipline_slug: row.get(6)?,
              renewal_date:    row.get(7)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut due = Vec::with_capacity(rows.len());
    for row in rows {
      // Reminders only exist after a renewal set the date.
      let Some(renewal_str) = row.renewal_date else { continue };
      let renewal = decode_date(&renewal_str)?;
      due.push(DueCardReminder {
        reminder:        row.reminder.into_reminder()?,
        card_id:         CardId(decode_uuid(&row.card_id)?),
        combatant_email: row.combatant_email,
        discipline_name: row.discipline_name,
        discipline_slug: row.discipline_slug,
        expiry_date:     add_years(
          renewal,
          CredentialKind::Card.duration_years(),
        ),
      });
    }
    Ok(due)
  }

  async fn due_waiver_reminders(
    &self,
    today: NaiveDate,
  ) -> Result<Vec<DueWaiverReminder>> {
    let today_str = encode_date(today);

    struct Row {
      reminder:        RawReminder,
      waiver_id:       String,
      combatant_email: String,
      renewal_date:    Option<String>,
    }

    let rows: Vec<Row> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT r.reminder_id, r.reminder_date, r.is_expiry,
                  w.waiver_id, m.email, w.renewal_date
           FROM waiver_reminders r
           JOIN waivers    w ON w.waiver_id    = r.waiver_id
           JOIN combatants m ON m.combatant_id = w.combatant_id
           WHERE r.reminder_date <= ?1
           ORDER BY r.reminder_date",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![today_str], |row| {
            Ok(Row {
              reminder:        RawReminder {
                reminder_id:   row.get(0)?,
                reminder_date: row.get(1)?,
                is_expiry:     row.get(2)?,
              },
              waiver_id:       row.get(3)?,
              combatant_email: row.get(4)?,
              renewal_date:    row.get(5)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut due = Vec::with_capacity(rows.len());
    for row in rows {
      let Some(renewal_str) = row.renewal_date else { continue };
      let renewal = decode_date(&renewal_str)?;
      due.push(DueWaiverReminder {
        reminder:        row.reminder.into_reminder()?,
        waiver_id:       WaiverId(decode_uuid(&row.waiver_id)?),
        combatant_email: row.combatant_email,
        expiry_date:     add_years(
          renewal,
          CredentialKind::Waiver.duration_years(),
        ),
      });
    }
    Ok(due)
  }

  async fn delete_card_reminder(&self, reminder: ReminderId) -> Result<()> {
    let id_str = encode_uuid(reminder.0);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM card_reminders WHERE reminder_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_waiver_reminder(&self, reminder: ReminderId) -> Result<()> {
    let id_str = encode_uuid(reminder.0);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM waiver_reminders WHERE reminder_id = ?1",
          rusqlite::params![id_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Privacy acceptance ────────────────────────────────────────────────────

  async fn privacy_acceptance(
    &self,
    combatant: CombatantId,
  ) -> Result<Option<PrivacyAcceptance>> {
    let combatant_str = encode_uuid(combatant.0);

    let raw: Option<RawPrivacyAcceptance> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT combatant_id, token, accepted
               FROM privacy_acceptances WHERE combatant_id = ?1",
              rusqlite::params![combatant_str],
              |row| {
                Ok(RawPrivacyAcceptance {
                  combatant_id: row.get(0)?,
                  token:        row.get(1)?,
                  accepted:     row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPrivacyAcceptance::into_privacy).transpose()
  }

  async fn privacy_acceptance_by_token(
    &self,
    token: Uuid,
  ) -> Result<Option<PrivacyAcceptance>> {
    let token_str = encode_uuid(token);

    let raw: Option<RawPrivacyAcceptance> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT combatant_id, token, accepted
               FROM privacy_acceptances WHERE token = ?1",
              rusqlite::params![token_str],
              |row| {
                Ok(RawPrivacyAcceptance {
                  combatant_id: row.get(0)?,
                  token:        row.get(1)?,
                  accepted:     row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPrivacyAcceptance::into_privacy).transpose()
  }

  async fn set_privacy_accepted(
    &self,
    combatant: CombatantId,
    accepted: DateTime<Utc>,
  ) -> Result<()> {
    let combatant_str = encode_uuid(combatant.0);
    let accepted_str = encode_dt(accepted);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE privacy_acceptances SET accepted = ?2 WHERE combatant_id = ?1",
          rusqlite::params![combatant_str, accepted_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Update requests ───────────────────────────────────────────────────────

  async fn insert_update_request(&self, request: UpdateRequest) -> Result<()> {
    let token_str = encode_uuid(request.token);
    let combatant_str = encode_uuid(request.combatant_id.0);
    let expiry_str = encode_dt(request.expiry);
    let consumed_str = request.consumed.map(encode_dt);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO update_requests (token, combatant_id, expiry, consumed)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![token_str, combatant_str, expiry_str, consumed_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn update_request_by_token(
    &self,
    token: Uuid,
  ) -> Result<Option<UpdateRequest>> {
    let token_str = encode_uuid(token);

    let raw: Option<RawUpdateRequest> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT token, combatant_id, expiry, consumed
               FROM update_requests WHERE token = ?1",
              rusqlite::params![token_str],
              |row| {
                Ok(RawUpdateRequest {
                  token:        row.get(0)?,
                  combatant_id: row.get(1)?,
                  expiry:       row.get(2)?,
                  consumed:     row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawUpdateRequest::into_update_request).transpose()
  }

  async fn consume_update_request(
    &self,
    token: Uuid,
    consumed: DateTime<Utc>,
  ) -> Result<()> {
    let token_str = encode_uuid(token);
    let consumed_str = encode_dt(consumed);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE update_requests SET consumed = ?2 WHERE token = ?1",
          rusqlite::params![token_str, consumed_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Users and role grants ─────────────────────────────────────────────────

  async fn add_user(&self, email: String, is_system_admin: bool) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO users (email, system_admin) VALUES (?1, ?2)",
          rusqlite::params![email, is_system_admin],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn user_by_email(&self, email: String) -> Result<Option<UserAccount>> {
    let lookup = email.clone();

    let row: Option<(String, bool)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT email, system_admin FROM users WHERE email = ?1",
              rusqlite::params![lookup],
              |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;

    let Some((email, is_system_admin)) = row else {
      return Ok(None);
    };

    let lookup = email.clone();
    let grant_rows: Vec<(String, Option<String>)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT role_slug, discipline_id FROM user_roles WHERE user_email = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![lookup], |row| {
            Ok((row.get(0)?, row.get(1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut grants = Vec::with_capacity(grant_rows.len());
    for (slug, discipline_str) in grant_rows {
      grants.push(RoleGrant {
        role:       RoleSlug::from_slug(&slug).map_err(Error::Core)?,
        discipline: discipline_str
          .as_deref()
          .map(|s| Ok::<_, Error>(DisciplineId(decode_uuid(s)?)))
          .transpose()?,
      });
    }

    Ok(Some(UserAccount { email, is_system_admin, grants }))
  }

  async fn add_user_role(
    &self,
    email: String,
    role: RoleSlug,
    discipline: Option<DisciplineId>,
  ) -> Result<()> {
    let slug = role.as_slug().to_owned();
    let discipline_str = discipline.map(|d| encode_uuid(d.0));
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR IGNORE INTO user_roles (user_email, role_slug, discipline_id)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![email, slug, discipline_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn remove_user_role(
    &self,
    email: String,
    role: RoleSlug,
    discipline: Option<DisciplineId>,
  ) -> Result<()> {
    let slug = role.as_slug().to_owned();
    let discipline_str = discipline.map(|d| encode_uuid(d.0));
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "DELETE FROM user_roles
           WHERE user_email = ?1 AND role_slug = ?2
             AND discipline_id IS ?3",
          rusqlite::params![email, slug, discipline_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Settings ──────────────────────────────────────────────────────────────

  async fn setting(&self, key: String) -> Result<Option<serde_json::Value>> {
    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT value FROM settings WHERE key = ?1",
              rusqlite::params![key],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(|s| serde_json::from_str(&s).map_err(Error::Json)).transpose()
  }

  async fn set_setting(
    &self,
    key: String,
    value: serde_json::Value,
  ) -> Result<()> {
    let value_str = value.to_string();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO settings (key, value) VALUES (?1, ?2)
           ON CONFLICT(key) DO UPDATE SET value = excluded.value",
          rusqlite::params![key, value_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
