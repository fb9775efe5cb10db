//! SQL schema for the Tiltyard SQLite store.
//!
//! Executed once at connection startup; idempotent thanks to
//! `CREATE TABLE IF NOT EXISTS`. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS disciplines (
    discipline_id    TEXT PRIMARY KEY,
    slug             TEXT NOT NULL UNIQUE,
    name             TEXT NOT NULL,
    reminder_offsets TEXT             -- JSON array of day counts, or NULL
);

CREATE TABLE IF NOT EXISTS authorizations (
    authorization_id TEXT PRIMARY KEY,
    discipline_id    TEXT NOT NULL REFERENCES disciplines(discipline_id),
    slug             TEXT NOT NULL,
    name             TEXT NOT NULL,
    UNIQUE (discipline_id, slug)
);

CREATE TABLE IF NOT EXISTS marshal_types (
    marshal_type_id TEXT PRIMARY KEY,
    discipline_id   TEXT NOT NULL REFERENCES disciplines(discipline_id),
    slug            TEXT NOT NULL,
    name            TEXT NOT NULL,
    UNIQUE (discipline_id, slug)
);

CREATE TABLE IF NOT EXISTS combatants (
    combatant_id TEXT PRIMARY KEY,
    email        TEXT NOT NULL UNIQUE,
    sca_name     TEXT,
    card_id      TEXT UNIQUE,
    encrypted    BLOB,             -- opaque ciphertext of PersonalInfo
    last_update  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS privacy_acceptances (
    combatant_id TEXT PRIMARY KEY
                 REFERENCES combatants(combatant_id) ON DELETE CASCADE,
    token        TEXT NOT NULL UNIQUE,
    accepted     TEXT              -- NULL until resolved affirmatively
);

-- At most one card per (combatant, discipline).
CREATE TABLE IF NOT EXISTS cards (
    card_id       TEXT PRIMARY KEY,
    combatant_id  TEXT NOT NULL
                  REFERENCES combatants(combatant_id) ON DELETE CASCADE,
    discipline_id TEXT NOT NULL REFERENCES disciplines(discipline_id),
    renewal_date  TEXT,
    UNIQUE (combatant_id, discipline_id)
);

CREATE TABLE IF NOT EXISTS card_authorizations (
    card_id          TEXT NOT NULL
                     REFERENCES cards(card_id) ON DELETE CASCADE,
    authorization_id TEXT NOT NULL
                     REFERENCES authorizations(authorization_id),
    PRIMARY KEY (card_id, authorization_id)
);

CREATE TABLE IF NOT EXISTS card_warrants (
    card_id         TEXT NOT NULL
                    REFERENCES cards(card_id) ON DELETE CASCADE,
    marshal_type_id TEXT NOT NULL
                    REFERENCES marshal_types(marshal_type_id),
    PRIMARY KEY (card_id, marshal_type_id)
);

-- Reminders are written only by renewal (full replace) and deleted only by
-- the sweep or by the next renewal.
CREATE TABLE IF NOT EXISTS card_reminders (
    reminder_id   TEXT PRIMARY KEY,
    card_id       TEXT NOT NULL REFERENCES cards(card_id) ON DELETE CASCADE,
    reminder_date TEXT NOT NULL,
    is_expiry     INTEGER NOT NULL
);

-- At most one waiver per combatant.
CREATE TABLE IF NOT EXISTS waivers (
    waiver_id    TEXT PRIMARY KEY,
    combatant_id TEXT NOT NULL UNIQUE
                 REFERENCES combatants(combatant_id) ON DELETE CASCADE,
    renewal_date TEXT
);

CREATE TABLE IF NOT EXISTS waiver_reminders (
    reminder_id   TEXT PRIMARY KEY,
    waiver_id     TEXT NOT NULL
                  REFERENCES waivers(waiver_id) ON DELETE CASCADE,
    reminder_date TEXT NOT NULL,
    is_expiry     INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS update_requests (
    token        TEXT PRIMARY KEY,
    combatant_id TEXT NOT NULL
                 REFERENCES combatants(combatant_id) ON DELETE CASCADE,
    expiry       TEXT NOT NULL,
    consumed     TEXT
);

CREATE TABLE IF NOT EXISTS users (
    email        TEXT PRIMARY KEY,
    system_admin INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS user_roles (
    user_email    TEXT NOT NULL REFERENCES users(email) ON DELETE CASCADE,
    role_slug     TEXT NOT NULL,
    discipline_id TEXT REFERENCES disciplines(discipline_id),
    UNIQUE (user_email, role_slug, discipline_id)
);

CREATE TABLE IF NOT EXISTS settings (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL       -- JSON
);

CREATE INDEX IF NOT EXISTS card_reminders_date_idx
    ON card_reminders(reminder_date);
CREATE INDEX IF NOT EXISTS waiver_reminders_date_idx
    ON waiver_reminders(reminder_date);
CREATE INDEX IF NOT EXISTS cards_combatant_idx ON cards(combatant_id);

PRAGMA user_version = 1;
";
