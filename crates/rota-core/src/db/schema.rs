//! Canonical SQLite schema for the assignment ledger.
//!
//! - `assignments` holds one row per record with its scalar fields
//! - `assignment_assignees` and `assignment_completions` model the
//!   multi-valued assignee and confirmation sets
//! - `store_meta` tracks the schema version alongside `PRAGMA user_version`
//! - `legacy_skipped` keeps single-assignee rows the v2 upgrade could not
//!   carry over because nobody was assigned

/// Migration v1: the original single-assignee layout.
///
/// Early ledgers stored one `assignee` per row. It is kept here so stores
/// created back then can be upgraded in place.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS assignments (
    record_id INTEGER PRIMARY KEY AUTOINCREMENT,
    cycle TEXT NOT NULL CHECK (length(trim(cycle)) > 0),
    chore_title TEXT NOT NULL CHECK (length(trim(chore_title)) > 0),
    assignee TEXT,
    created_at_us INTEGER NOT NULL,
    due_at_us INTEGER,
    completed INTEGER NOT NULL DEFAULT 0 CHECK (completed IN (0, 1)),
    completed_at_us INTEGER,
    triggered_by TEXT
);

CREATE TABLE IF NOT EXISTS store_meta (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version INTEGER NOT NULL
);

INSERT OR IGNORE INTO store_meta (id, schema_version) VALUES (1, 1);

CREATE INDEX IF NOT EXISTS idx_assignments_cycle ON assignments(cycle, chore_title);
CREATE INDEX IF NOT EXISTS idx_assignments_created ON assignments(created_at_us);
";

/// Migration v2: assignees become a list, confirmations become a set.
///
/// Legacy scalar `assignee` values are backfilled as single-entry lists, and
/// completed legacy rows get a matching confirmation so the
/// `completed ⇔ completed_by == assignees` rule holds for old data too.
/// Rows with a NULL or blank `assignee` cannot satisfy the non-empty
/// assignee rule, so they move to `legacy_skipped` instead.
pub const MIGRATION_V2_SQL: &str = r"
CREATE TABLE IF NOT EXISTS assignment_assignees (
    record_id INTEGER NOT NULL REFERENCES assignments(record_id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    person_id TEXT NOT NULL CHECK (length(trim(person_id)) > 0),
    PRIMARY KEY (record_id, person_id)
);

CREATE TABLE IF NOT EXISTS assignment_completions (
    record_id INTEGER NOT NULL REFERENCES assignments(record_id) ON DELETE CASCADE,
    person_id TEXT NOT NULL CHECK (length(trim(person_id)) > 0),
    PRIMARY KEY (record_id, person_id)
);

CREATE TABLE IF NOT EXISTS legacy_skipped (
    record_id INTEGER PRIMARY KEY,
    cycle TEXT NOT NULL,
    chore_title TEXT NOT NULL,
    created_at_us INTEGER NOT NULL,
    reason TEXT NOT NULL
);

INSERT OR IGNORE INTO legacy_skipped (record_id, cycle, chore_title, created_at_us, reason)
SELECT record_id, cycle, chore_title, created_at_us, 'no assignee'
FROM assignments
WHERE assignee IS NULL OR length(trim(assignee)) = 0;

DELETE FROM assignments
WHERE assignee IS NULL OR length(trim(assignee)) = 0;

INSERT OR IGNORE INTO assignment_assignees (record_id, position, person_id)
SELECT record_id, 0, trim(assignee)
FROM assignments
WHERE assignee IS NOT NULL AND length(trim(assignee)) > 0;

INSERT OR IGNORE INTO assignment_completions (record_id, person_id)
SELECT record_id, trim(assignee)
FROM assignments
WHERE completed = 1 AND assignee IS NOT NULL AND length(trim(assignee)) > 0;

ALTER TABLE assignments DROP COLUMN assignee;

CREATE INDEX IF NOT EXISTS idx_assignment_assignees_person
    ON assignment_assignees(person_id, record_id);
CREATE INDEX IF NOT EXISTS idx_assignments_due
    ON assignments(due_at_us) WHERE completed = 0;
";

/// Indexes that must exist after all migrations.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_assignments_cycle",
    "idx_assignments_created",
    "idx_assignment_assignees_person",
    "idx_assignments_due",
];
