//! Service-level tests over an in-memory store with recording collaborators.

use std::sync::{
  Arc, Mutex,
  atomic::{AtomicBool, Ordering},
};

use chrono::{Duration, NaiveDate, Utc};
use tiltyard_core::{
  Error as CoreError,
  combatant::{CombatantId, NewCombatant, PersonalInfo, SelfServeUpdate},
  crypto::Encryptor,
  discipline::{Discipline, NewDiscipline},
  notify::Notifier,
  principal::{Principal, RoleGrant, RoleSlug, UserAccount},
  store::RosterStore,
  update_request::UpdateRequest,
};
use tiltyard_store_sqlite::SqliteStore;

use crate::{
  Error, Roster, RosterConfig, SETTING_ROLE_POLICY, combatant::CreatedCombatant,
};

// ─── Collaborator doubles ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct SentMail {
  recipient: String,
  subject:   String,
  body:      String,
}

#[derive(Default)]
struct RecordingNotifier {
  sent:   Mutex<Vec<SentMail>>,
  refuse: AtomicBool,
}

impl RecordingNotifier {
  fn mails(&self) -> Vec<SentMail> {
    self.sent.lock().unwrap().clone()
  }

  fn refuse_deliveries(&self) {
    self.refuse.store(true, Ordering::SeqCst);
  }
}

impl Notifier for RecordingNotifier {
  fn send(&self, recipient: &str, subject: &str, body: &str) -> bool {
    self.sent.lock().unwrap().push(SentMail {
      recipient: recipient.to_string(),
      subject:   subject.to_string(),
      body:      body.to_string(),
    });
    !self.refuse.load(Ordering::SeqCst)
  }
}

struct PlainEncryptor;

impl Encryptor for PlainEncryptor {
  fn encrypt_json(
    &self,
    value: &serde_json::Value,
  ) -> tiltyard_core::Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
  }

  fn decrypt_json(
    &self,
    blob: &[u8],
  ) -> tiltyard_core::Result<serde_json::Value> {
    Ok(serde_json::from_slice(blob)?)
  }
}

// ─── Harness ─────────────────────────────────────────────────────────────────

struct Harness {
  roster: Roster<SqliteStore, Arc<RecordingNotifier>, PlainEncryptor>,
  store:  SqliteStore,
  mail:   Arc<RecordingNotifier>,
}

async fn harness() -> Harness {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  let mail = Arc::new(RecordingNotifier::default());
  let roster = Roster::new(
    store.clone(),
    mail.clone(),
    PlainEncryptor,
    RosterConfig {
      base_url:     "https://mol.example.org".into(),
      card_id_salt: "test-salt".into(),
    },
  );
  Harness { roster, store, mail }
}

fn admin() -> Principal {
  Principal::User(UserAccount {
    email:           "admin@example.org".into(),
    is_system_admin: true,
    grants:          vec![],
  })
}

fn user(grants: Vec<RoleGrant>) -> Principal {
  Principal::User(UserAccount {
    email: "clerk@example.org".into(),
    is_system_admin: false,
    grants,
  })
}

fn new_input(email: &str, sca_name: Option<&str>) -> NewCombatant {
  NewCombatant {
    email:    email.into(),
    sca_name: sca_name.map(Into::into),
    info:     PersonalInfo {
      legal_name: Some("John Fletcher".into()),
      phone: Some("6135550100".into()),
      address1: Some("12 Tourney Lane".into()),
      city: Some("Ottawa".into()),
      province: Some("ON".into()),
      postal_code: Some("K1A 0A1".into()),
      ..Default::default()
    },
  }
}

async fn armoured_combat(h: &Harness) -> Discipline {
  h.store
    .add_discipline(NewDiscipline {
      name:             "Armoured Combat".into(),
      slug:             "armoured-combat".into(),
      authorizations:   vec![(
        "Weapon and Shield".into(),
        "weapon-shield".into(),
      )],
      marshal_types:    vec![("Marshal".into(), "marshal".into())],
      reminder_offsets: None,
    })
    .await
    .unwrap()
}

async fn rapier(h: &Harness) -> Discipline {
  h.store
    .add_discipline(NewDiscipline {
      name:             "Rapier".into(),
      slug:             "rapier".into(),
      authorizations:   vec![("Heavy Rapier".into(), "heavy-rapier".into())],
      marshal_types:    vec![],
      reminder_offsets: None,
    })
    .await
    .unwrap()
}

async fn create_accepted(
  h: &Harness,
  email: &str,
  sca_name: Option<&str>,
) -> CreatedCombatant {
  let created = h
    .roster
    .create_combatant(&admin(), new_input(email, sca_name))
    .await
    .unwrap();
  h.roster.accept_privacy(created.privacy_token).await.unwrap();
  created
}

fn assert_unauthorized(result: Result<impl std::fmt::Debug, Error>) {
  assert!(matches!(result, Err(Error::Core(CoreError::Unauthorized))));
}

fn d(s: &str) -> NaiveDate {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

// ─── Creation ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_requires_global_combatant_edit_role() {
  let h = harness().await;
  let discipline = armoured_combat(&h).await;

  assert_unauthorized(
    h.roster
      .create_combatant(&Principal::Anonymous, new_input("a@example.com", None))
      .await,
  );
  // A discipline-scoped grant does not satisfy the global check.
  let scoped = user(vec![RoleGrant {
    role:       RoleSlug::EditCombatantInfo,
    discipline: Some(discipline.discipline_id),
  }]);
  assert_unauthorized(
    h.roster
      .create_combatant(&scoped, new_input("a@example.com", None))
      .await,
  );
}

#[tokio::test]
async fn create_validates_required_fields() {
  let h = harness().await;
  let mut input = new_input("a@example.com", None);
  input.info.phone = Some("   ".into());

  let err = h.roster.create_combatant(&admin(), input).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::Validation { field }) if field == "phone"
  ));
}

#[tokio::test]
async fn create_rejects_duplicate_email() {
  let h = harness().await;
  h.roster
    .create_combatant(&admin(), new_input("a@example.com", None))
    .await
    .unwrap();

  let err = h
    .roster
    .create_combatant(&admin(), new_input("a@example.com", None))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::DuplicateEmail(_))));
}

#[tokio::test]
async fn create_sends_privacy_policy_email() {
  let h = harness().await;
  let created = h
    .roster
    .create_combatant(&admin(), new_input("a@example.com", None))
    .await
    .unwrap();
  assert!(created.delivered);

  let mails = h.mail.mails();
  assert_eq!(mails.len(), 1);
  assert_eq!(mails[0].recipient, "a@example.com");
  assert!(mails[0].body.contains(&created.privacy_token.to_string()));
}

// ─── Privacy flow and card ids ───────────────────────────────────────────────

#[tokio::test]
async fn accept_privacy_allocates_card_id_and_mails_the_link() {
  let h = harness().await;
  let created = h
    .roster
    .create_combatant(&admin(), new_input("a@example.com", Some("Aldric of the Oak")))
    .await
    .unwrap();

  let accepted = h.roster.accept_privacy(created.privacy_token).await.unwrap();
  assert_eq!(accepted.card_id, "aldric-of-the-oak");
  assert!(accepted.delivered);

  let mails = h.mail.mails();
  assert_eq!(mails.len(), 2);
  assert!(mails[1].body.contains("/card/aldric-of-the-oak"));
}

#[tokio::test]
async fn decline_privacy_deletes_the_combatant() {
  let h = harness().await;
  let created = h
    .roster
    .create_combatant(&admin(), new_input("a@example.com", None))
    .await
    .unwrap();

  h.roster.decline_privacy(created.privacy_token).await.unwrap();
  assert!(h
    .store
    .combatant(created.combatant.combatant_id)
    .await
    .unwrap()
    .is_none());
}

#[tokio::test]
async fn generate_card_id_requires_privacy_acceptance() {
  let h = harness().await;
  let created = h
    .roster
    .create_combatant(&admin(), new_input("a@example.com", Some("Aldric")))
    .await
    .unwrap();

  let err = h
    .roster
    .generate_card_id(created.combatant.combatant_id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::PrivacyPolicyNotAccepted)));
}

#[tokio::test]
async fn card_id_collision_extends_deterministically() {
  let h = harness().await;
  let first = create_accepted(&h, "a@example.com", Some("Aldric")).await;
  let second = create_accepted(&h, "b@example.com", Some("Aldric")).await;

  let first_id = h
    .store
    .combatant(first.combatant.combatant_id)
    .await
    .unwrap()
    .unwrap()
    .card_id
    .unwrap();
  let second_id = h
    .store
    .combatant(second.combatant.combatant_id)
    .await
    .unwrap()
    .unwrap()
    .card_id
    .unwrap();

  assert_eq!(first_id, "aldric");
  assert!(second_id.starts_with("aldric-"));
  assert_eq!(second_id.len(), "aldric".len() + 5);

  // Re-running with unchanged inputs keeps the allocated ids.
  let again = h
    .roster
    .generate_card_id(second.combatant.combatant_id)
    .await
    .unwrap();
  assert_eq!(again, second_id);
}

#[tokio::test]
async fn card_id_without_sca_name_comes_from_the_name_hash() {
  let h = harness().await;
  let created = create_accepted(&h, "a@example.com", None).await;

  let card_id = h
    .store
    .combatant(created.combatant.combatant_id)
    .await
    .unwrap()
    .unwrap()
    .card_id
    .unwrap();
  assert_eq!(card_id.len(), 6);
  assert!(card_id.chars().all(|c| c.is_ascii_hexdigit()));
}

// ─── Cards, authorizations, warrants ─────────────────────────────────────────

#[tokio::test]
async fn rapier_grant_cannot_create_an_armoured_combat_card() {
  let h = harness().await;
  let armoured = armoured_combat(&h).await;
  let rapier = rapier(&h).await;
  let created = create_accepted(&h, "a@example.com", Some("Aldric")).await;

  let marshal = user(vec![RoleGrant {
    role:       RoleSlug::EditAuthorizations,
    discipline: Some(rapier.discipline_id),
  }]);
  assert_unauthorized(
    h.roster
      .get_card(
        &marshal,
        created.combatant.combatant_id,
        armoured.discipline_id,
        true,
      )
      .await,
  );
}

#[tokio::test]
async fn get_card_create_renews_as_of_today() {
  let h = harness().await;
  let armoured = armoured_combat(&h).await;
  let created = create_accepted(&h, "a@example.com", Some("Aldric")).await;

  let marshal = user(vec![RoleGrant {
    role:       RoleSlug::EditAuthorizations,
    discipline: Some(armoured.discipline_id),
  }]);
  let card = h
    .roster
    .get_card(
      &marshal,
      created.combatant.combatant_id,
      armoured.discipline_id,
      true,
    )
    .await
    .unwrap();

  assert_eq!(card.renewal_date, Some(Utc::now().date_naive()));
  let reminders = h.store.card_reminders(card.card_id).await.unwrap();
  assert_eq!(reminders.len(), 3);
}

#[tokio::test]
async fn get_card_read_needs_no_role() {
  let h = harness().await;
  let armoured = armoured_combat(&h).await;
  let created = create_accepted(&h, "a@example.com", Some("Aldric")).await;
  let id = created.combatant.combatant_id;

  let err = h
    .roster
    .get_card(&Principal::Anonymous, id, armoured.discipline_id, false)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::CardNotFound { .. })));

  h.roster
    .get_card(&admin(), id, armoured.discipline_id, true)
    .await
    .unwrap();
  let card = h
    .roster
    .get_card(&Principal::Anonymous, id, armoured.discipline_id, false)
    .await
    .unwrap();
  assert_eq!(card.combatant_id, id);
}

#[tokio::test]
async fn authorizations_are_granted_idempotently_by_slug() {
  let h = harness().await;
  let armoured = armoured_combat(&h).await;
  let created = create_accepted(&h, "a@example.com", Some("Aldric")).await;
  let id = created.combatant.combatant_id;

  h.roster
    .get_card(&admin(), id, armoured.discipline_id, true)
    .await
    .unwrap();

  h.roster
    .add_authorization(&admin(), id, armoured.discipline_id, "weapon-shield")
    .await
    .unwrap();
  h.roster
    .add_authorization(&admin(), id, armoured.discipline_id, "weapon-shield")
    .await
    .unwrap();

  let card = h
    .roster
    .get_card(&admin(), id, armoured.discipline_id, false)
    .await
    .unwrap();
  assert_eq!(card.authorizations.len(), 1);

  let err = h
    .roster
    .add_authorization(&admin(), id, armoured.discipline_id, "polearm")
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::Core(CoreError::AuthorizationNotFound { .. })
  ));

  h.roster
    .remove_authorization(&admin(), id, armoured.discipline_id, "weapon-shield")
    .await
    .unwrap();
  // Removing again is a no-op.
  h.roster
    .remove_authorization(&admin(), id, armoured.discipline_id, "weapon-shield")
    .await
    .unwrap();
}

#[tokio::test]
async fn warrants_require_the_marshal_role() {
  let h = harness().await;
  let armoured = armoured_combat(&h).await;
  let created = create_accepted(&h, "a@example.com", Some("Aldric")).await;
  let id = created.combatant.combatant_id;

  h.roster
    .get_card(&admin(), id, armoured.discipline_id, true)
    .await
    .unwrap();

  // The authorization role does not cover warrants.
  let auth_only = user(vec![RoleGrant {
    role:       RoleSlug::EditAuthorizations,
    discipline: Some(armoured.discipline_id),
  }]);
  assert_unauthorized(
    h.roster
      .add_warrant(&auth_only, id, armoured.discipline_id, "marshal")
      .await,
  );

  let marshal = user(vec![RoleGrant {
    role:       RoleSlug::EditMarshal,
    discipline: Some(armoured.discipline_id),
  }]);
  h.roster
    .add_warrant(&marshal, id, armoured.discipline_id, "marshal")
    .await
    .unwrap();

  let card = h
    .roster
    .get_card(&admin(), id, armoured.discipline_id, false)
    .await
    .unwrap();
  assert_eq!(card.warrants.len(), 1);
}

// ─── Renewal and role policy ─────────────────────────────────────────────────

#[tokio::test]
async fn card_date_role_is_global_by_default() {
  let h = harness().await;
  let armoured = armoured_combat(&h).await;
  let created = create_accepted(&h, "a@example.com", Some("Aldric")).await;
  let id = created.combatant.combatant_id;
  h.roster
    .get_card(&admin(), id, armoured.discipline_id, true)
    .await
    .unwrap();

  // Under the default policy a discipline-scoped grant is the wrong scope.
  let scoped = user(vec![RoleGrant {
    role:       RoleSlug::EditCardDate,
    discipline: Some(armoured.discipline_id),
  }]);
  assert_unauthorized(
    h.roster
      .renew_card(&scoped, id, armoured.discipline_id, Some("2024-03-15".into()))
      .await,
  );

  let global = user(vec![RoleGrant {
    role:       RoleSlug::EditCardDate,
    discipline: None,
  }]);
  let schedule = h
    .roster
    .renew_card(&global, id, armoured.discipline_id, Some("2024-03-15".into()))
    .await
    .unwrap();
  assert_eq!(schedule.expiry_date, d("2026-03-15"));
}

#[tokio::test]
async fn card_date_role_can_be_made_per_discipline() {
  let h = harness().await;
  let armoured = armoured_combat(&h).await;
  let created = create_accepted(&h, "a@example.com", Some("Aldric")).await;
  let id = created.combatant.combatant_id;
  h.roster
    .get_card(&admin(), id, armoured.discipline_id, true)
    .await
    .unwrap();

  h.store
    .set_setting(
      SETTING_ROLE_POLICY.to_string(),
      serde_json::json!({
        "card_date_is_global": false,
        "waiver_date_is_global": true,
      }),
    )
    .await
    .unwrap();

  let scoped = user(vec![RoleGrant {
    role:       RoleSlug::EditCardDate,
    discipline: Some(armoured.discipline_id),
  }]);
  h.roster
    .renew_card(&scoped, id, armoured.discipline_id, Some("2024-03-15".into()))
    .await
    .unwrap();

  let global = user(vec![RoleGrant {
    role:       RoleSlug::EditCardDate,
    discipline: None,
  }]);
  assert_unauthorized(
    h.roster
      .renew_card(&global, id, armoured.discipline_id, Some("2024-04-01".into()))
      .await,
  );
}

#[tokio::test]
async fn renewing_twice_replaces_the_schedule() {
  let h = harness().await;
  let armoured = armoured_combat(&h).await;
  let created = create_accepted(&h, "a@example.com", Some("Aldric")).await;
  let id = created.combatant.combatant_id;
  let card = h
    .roster
    .get_card(&admin(), id, armoured.discipline_id, true)
    .await
    .unwrap();

  h.roster
    .renew_card(&admin(), id, armoured.discipline_id, Some("2024-03-15".into()))
    .await
    .unwrap();
  h.roster
    .renew_card(&admin(), id, armoured.discipline_id, Some("2025-06-01".into()))
    .await
    .unwrap();

  let reminders = h.store.card_reminders(card.card_id).await.unwrap();
  assert_eq!(reminders.len(), 3);
  assert!(reminders.iter().any(|r| r.reminder_date == d("2027-06-01")));
  assert!(reminders.iter().all(|r| r.reminder_date > d("2026-03-15")));
}

#[tokio::test]
async fn malformed_renewal_date_is_rejected() {
  let h = harness().await;
  let armoured = armoured_combat(&h).await;
  let created = create_accepted(&h, "a@example.com", Some("Aldric")).await;
  let id = created.combatant.combatant_id;
  h.roster
    .get_card(&admin(), id, armoured.discipline_id, true)
    .await
    .unwrap();

  let err = h
    .roster
    .renew_card(&admin(), id, armoured.discipline_id, Some("15/03/2024".into()))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::MalformedDate { .. })));
}

// ─── Waiver end to end ───────────────────────────────────────────────────────

#[tokio::test]
async fn waiver_lifecycle_with_sweep() {
  let h = harness().await;
  let created = create_accepted(&h, "a@example.com", Some("Aldric")).await;
  let id = created.combatant.combatant_id;

  // First renewal creates the waiver row.
  let schedule = h
    .roster
    .renew_waiver(&admin(), id, Some("2024-01-01".into()))
    .await
    .unwrap();
  assert_eq!(schedule.expiry_date, d("2031-01-01"));

  let waiver = h.store.waiver(id).await.unwrap().unwrap();
  let mut dates: Vec<_> = h
    .store
    .waiver_reminders(waiver.waiver_id)
    .await
    .unwrap()
    .iter()
    .map(|r| r.reminder_date)
    .collect();
  dates.sort();
  assert_eq!(dates, vec![d("2030-11-02"), d("2030-12-02"), d("2031-01-01")]);

  // A sweep on the first advance date consumes exactly that reminder.
  let mails_before = h.mail.mails().len();
  let report = h.roster.run_sweep(d("2030-11-02")).await.unwrap();
  assert_eq!(report.sent, 1);
  assert_eq!(report.failed, 0);

  let mails = h.mail.mails();
  assert_eq!(mails.len(), mails_before + 1);
  assert!(mails.last().unwrap().body.contains("60 days"));

  assert_eq!(
    h.store.waiver_reminders(waiver.waiver_id).await.unwrap().len(),
    2,
  );

  // Running again the same day sends nothing further.
  let report = h.roster.run_sweep(d("2030-11-02")).await.unwrap();
  assert_eq!(report, crate::sweep::SweepReport::default());
}

#[tokio::test]
async fn waiver_renewal_requires_the_waiver_date_role() {
  let h = harness().await;
  let created = create_accepted(&h, "a@example.com", Some("Aldric")).await;
  let id = created.combatant.combatant_id;

  let clerk = user(vec![RoleGrant {
    role:       RoleSlug::EditCombatantInfo,
    discipline: None,
  }]);
  assert_unauthorized(
    h.roster.renew_waiver(&clerk, id, Some("2024-01-01".into())).await,
  );
}

#[tokio::test]
async fn sweep_deletes_the_reminder_even_when_delivery_fails() {
  let h = harness().await;
  let created = create_accepted(&h, "a@example.com", Some("Aldric")).await;
  let id = created.combatant.combatant_id;

  h.roster
    .renew_waiver(&admin(), id, Some("2024-01-01".into()))
    .await
    .unwrap();
  h.mail.refuse_deliveries();

  let report = h.roster.run_sweep(d("2031-01-01")).await.unwrap();
  assert_eq!(report.sent, 0);
  assert_eq!(report.failed, 3);

  // No retry on the next run.
  let report = h.roster.run_sweep(d("2031-01-01")).await.unwrap();
  assert_eq!(report, crate::sweep::SweepReport::default());
}

// ─── Self-serve updates ──────────────────────────────────────────────────────

#[tokio::test]
async fn self_serve_update_normalizes_phone_and_consumes_the_token() {
  let h = harness().await;
  let created = create_accepted(&h, "a@example.com", Some("Aldric")).await;
  let id = created.combatant.combatant_id;

  let requested = h
    .roster
    .request_self_serve_update(&admin(), id)
    .await
    .unwrap();
  assert!(requested.delivered);

  let applied = h
    .roster
    .update_self_serve(requested.token, SelfServeUpdate {
      phone: Some("(613) 555-0199".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(applied.card_delivered.is_none());

  let info = applied.combatant.personal_info(&PlainEncryptor).unwrap();
  assert_eq!(info.phone.as_deref(), Some("6135550199"));

  // The token is one-time.
  assert_unauthorized(
    h.roster
      .update_self_serve(requested.token, SelfServeUpdate::default())
      .await,
  );
}

#[tokio::test]
async fn self_serve_name_change_regenerates_the_card_id() {
  let h = harness().await;
  let created = create_accepted(&h, "a@example.com", Some("Aldric")).await;
  let id = created.combatant.combatant_id;

  let requested = h
    .roster
    .request_self_serve_update(&admin(), id)
    .await
    .unwrap();
  let applied = h
    .roster
    .update_self_serve(requested.token, SelfServeUpdate {
      sca_name: Some("Aldric the Bold".into()),
      ..Default::default()
    })
    .await
    .unwrap();

  assert_eq!(applied.combatant.card_id.as_deref(), Some("aldric-the-bold"));
  assert_eq!(applied.card_delivered, Some(true));
  assert!(h
    .mail
    .mails()
    .last()
    .unwrap()
    .body
    .contains("/card/aldric-the-bold"));
}

#[tokio::test]
async fn expired_self_serve_token_is_unauthorized() {
  let h = harness().await;
  let created = create_accepted(&h, "a@example.com", Some("Aldric")).await;
  let id = created.combatant.combatant_id;

  let request = UpdateRequest::new(id, Utc::now() - Duration::days(2), 1);
  h.store.insert_update_request(request.clone()).await.unwrap();

  assert_unauthorized(
    h.roster
      .update_self_serve(request.token, SelfServeUpdate::default())
      .await,
  );
}

#[tokio::test]
async fn update_link_requires_accepted_privacy_policy() {
  let h = harness().await;
  let created = h
    .roster
    .create_combatant(&admin(), new_input("a@example.com", None))
    .await
    .unwrap();
  let id = created.combatant.combatant_id;

  let err = h
    .roster
    .request_self_serve_update(&admin(), id)
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::PrivacyPolicyNotAccepted)));
  // Only the creation email went out; the rejection mailed nothing.
  assert_eq!(h.mail.mails().len(), 1);

  // Once the policy is accepted the same request goes through.
  h.roster.accept_privacy(created.privacy_token).await.unwrap();
  let requested = h
    .roster
    .request_self_serve_update(&admin(), id)
    .await
    .unwrap();
  assert!(requested.delivered);
}

// ─── Restricted updates ──────────────────────────────────────────────────────

#[tokio::test]
async fn restricted_update_waiver_date_needs_the_waiver_role() {
  let h = harness().await;
  let created = create_accepted(&h, "a@example.com", Some("Aldric")).await;
  let id = created.combatant.combatant_id;

  let clerk = user(vec![RoleGrant {
    role:       RoleSlug::EditCombatantInfo,
    discipline: None,
  }]);

  // Plain info fields are fine.
  h.roster
    .update_restricted(&clerk, id, tiltyard_core::combatant::CombatantUpdate {
      city: Some("Kingston".into()),
      ..Default::default()
    })
    .await
    .unwrap();

  // But a waiver date needs the waiver-date role too, and the rejection
  // must not commit the rest of the update.
  assert_unauthorized(
    h.roster
      .update_restricted(&clerk, id, tiltyard_core::combatant::CombatantUpdate {
        city: Some("Almonte".into()),
        waiver_date: Some("2024-01-01".into()),
        ..Default::default()
      })
      .await,
  );
  let info = h
    .store
    .combatant(id)
    .await
    .unwrap()
    .unwrap()
    .personal_info(&PlainEncryptor)
    .unwrap();
  assert_eq!(info.city.as_deref(), Some("Kingston"));
  assert!(h.store.waiver(id).await.unwrap().is_none());

  let both = user(vec![
    RoleGrant { role: RoleSlug::EditCombatantInfo, discipline: None },
    RoleGrant { role: RoleSlug::EditWaiverDate, discipline: None },
  ]);
  h.roster
    .update_restricted(&both, id, tiltyard_core::combatant::CombatantUpdate {
      waiver_date: Some("2024-01-01".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(h.store.waiver(id).await.unwrap().is_some());
}

#[tokio::test]
async fn missing_combatant_is_not_found() {
  let h = harness().await;
  let err = h
    .roster
    .combatant(&admin(), CombatantId::new())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(CoreError::CombatantNotFound(_))));
}
