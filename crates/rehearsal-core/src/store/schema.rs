//! Canonical SQLite schema for the booking calendar.
//!
//! - `slot_dates` records that a date has a live slot set at all, so a date
//!   whose set is empty is distinguishable from a date never seeded
//! - `time_slots` holds the ordered live labels per date
//! - `reservations` holds one row per (date, user)
//! - `pending_changes` / `pending_slots` hold staged slot sets awaiting cutover
//! - `calendar_meta` tracks schema version and the most recent cutover

/// Migration v1: live schedule, reservations, staged changes, metadata.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS slot_dates (
    date_key TEXT PRIMARY KEY,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS time_slots (
    date_key TEXT NOT NULL REFERENCES slot_dates(date_key) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    label TEXT NOT NULL CHECK (length(trim(label)) > 0),
    PRIMARY KEY (date_key, label),
    UNIQUE (date_key, position)
);

CREATE TABLE IF NOT EXISTS reservations (
    date_key TEXT NOT NULL,
    user_name TEXT NOT NULL CHECK (length(trim(user_name)) > 0),
    band_name TEXT NOT NULL CHECK (length(trim(band_name)) > 0),
    time_slot TEXT NOT NULL CHECK (length(trim(time_slot)) > 0),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL,
    PRIMARY KEY (date_key, user_name)
);

CREATE TABLE IF NOT EXISTS pending_changes (
    date_key TEXT PRIMARY KEY,
    action TEXT NOT NULL CHECK (action IN ('clear', 'replace')),
    staged_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS pending_slots (
    date_key TEXT NOT NULL REFERENCES pending_changes(date_key) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    label TEXT NOT NULL CHECK (length(trim(label)) > 0),
    PRIMARY KEY (date_key, label)
);

CREATE TABLE IF NOT EXISTS calendar_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL,
    last_cutover_at TEXT,
    last_cutover_trigger TEXT CHECK (
        last_cutover_trigger IS NULL OR last_cutover_trigger IN ('scheduled', 'manual')
    ),
    last_cutover_promoted INTEGER NOT NULL DEFAULT 0,
    last_cutover_seeded INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO calendar_meta (id, schema_version) VALUES (1, 1);
";

/// Migration v2: read-path indexes for per-date joins.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_time_slots_date_position
    ON time_slots(date_key, position);

CREATE INDEX IF NOT EXISTS idx_reservations_date_slot
    ON reservations(date_key, time_slot);

CREATE INDEX IF NOT EXISTS idx_pending_slots_date_position
    ON pending_slots(date_key, position);
";

/// Indexes the read paths depend on.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_time_slots_date_position",
    "idx_reservations_date_slot",
    "idx_pending_slots_date_position",
];
