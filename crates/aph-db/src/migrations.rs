//! Embedded schema revisions.
//!
//! The schema ships inside the binary as an ordered list of named
//! [`Migration`]s. A tracker table remembers the high-water mark, so a
//! restarted (or upgraded) process applies only the revisions it has
//! never seen, each inside its own transaction.

use rusqlite::Connection;

use aph_core::{Error, Result};

/// V1: initial schema -- jobs, per-item results, and history.
const V1_JOBS: &str = r#"
-- Badging / revert jobs
CREATE TABLE jobs (
    id               TEXT PRIMARY KEY,
    job_type         TEXT NOT NULL,
    status           TEXT NOT NULL DEFAULT 'queued',
    item_ids         TEXT NOT NULL,
    badge_mask       TEXT NOT NULL DEFAULT '[]',
    options          TEXT NOT NULL DEFAULT '{}',
    progress_total   INTEGER NOT NULL DEFAULT 0,
    progress_done    INTEGER NOT NULL DEFAULT 0,
    progress_failed  INTEGER NOT NULL DEFAULT 0,
    progress_skipped INTEGER NOT NULL DEFAULT 0,
    cancel_requested INTEGER NOT NULL DEFAULT 0,
    result_summary   TEXT,
    created_at       TEXT NOT NULL,
    started_at       TEXT,
    finished_at      TEXT
);

-- One terminal row per (job, item)
CREATE TABLE job_items (
    job_id         TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
    item_id        TEXT NOT NULL,
    status         TEXT NOT NULL,
    error_kind     TEXT,
    error_message  TEXT,
    badges_applied TEXT NOT NULL DEFAULT '[]',
    attempts       INTEGER NOT NULL DEFAULT 1,
    duration_ms    INTEGER NOT NULL DEFAULT 0,
    finished_at    TEXT NOT NULL,
    PRIMARY KEY (job_id, item_id)
);

-- Append-only record of notable operations (job runs, reverts, schedule fires)
CREATE TABLE job_history (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id      TEXT,
    item_id     TEXT,
    operation   TEXT NOT NULL,
    detail      TEXT,
    created_at  TEXT NOT NULL
);

CREATE INDEX idx_jobs_status      ON jobs(status);
CREATE INDEX idx_job_items_item   ON job_items(item_id);
CREATE INDEX idx_job_history_job  ON job_history(job_id);
"#;

/// V2: configuration store -- typed settings, API keys, badge styles,
/// review-source priorities.
const V2_SETTINGS: &str = r#"
CREATE TABLE settings (
    key        TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    type       TEXT NOT NULL,
    category   TEXT NOT NULL DEFAULT 'general',
    updated_at TEXT NOT NULL
);

CREATE TABLE api_keys (
    service    TEXT NOT NULL,
    name       TEXT NOT NULL,
    value      TEXT NOT NULL,
    key_group  TEXT NOT NULL DEFAULT 'default',
    PRIMARY KEY (service, name, key_group)
);

CREATE TABLE badge_settings (
    badge_type TEXT NOT NULL,
    name       TEXT NOT NULL,
    value      TEXT NOT NULL,
    PRIMARY KEY (badge_type, name)
);

CREATE TABLE review_sources (
    name       TEXT PRIMARY KEY,
    enabled    INTEGER NOT NULL DEFAULT 1,
    priority   INTEGER NOT NULL DEFAULT 100,
    conditions TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE settings_version (
    id      INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL DEFAULT 0
);

INSERT INTO settings_version (id, version) VALUES (1, 0);

CREATE INDEX idx_settings_category ON settings(category);
"#;

/// V3: enrichment response cache, keyed by (source, logical key).
const V3_SOURCE_CACHE: &str = r#"
CREATE TABLE source_cache (
    source     TEXT NOT NULL,
    key        TEXT NOT NULL,
    payload    TEXT NOT NULL,
    fetched_at TEXT NOT NULL,
    expires_at TEXT NOT NULL,
    PRIMARY KEY (source, key)
);

CREATE INDEX idx_source_cache_expiry ON source_cache(expires_at);
"#;

/// V4: schedules and their targets/options for the scheduler hook.
const V4_SCHEDULES: &str = r#"
CREATE TABLE schedules (
    id          TEXT PRIMARY KEY,
    name        TEXT NOT NULL,
    cron        TEXT NOT NULL,
    enabled     INTEGER NOT NULL DEFAULT 1,
    last_run_at TEXT,
    next_run_at TEXT,
    created_at  TEXT NOT NULL
);

CREATE TABLE schedule_options (
    schedule_id TEXT NOT NULL REFERENCES schedules(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    value       TEXT NOT NULL,
    PRIMARY KEY (schedule_id, name)
);

CREATE TABLE schedule_targets (
    schedule_id TEXT NOT NULL REFERENCES schedules(id) ON DELETE CASCADE,
    library_id  TEXT NOT NULL,
    PRIMARY KEY (schedule_id, library_id)
);
"#;

/// One shipped schema revision.
struct Migration {
    version: i64,
    /// Short label stored alongside the version for post-mortem reading
    /// of the tracker table.
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "jobs",
        sql: V1_JOBS,
    },
    Migration {
        version: 2,
        name: "settings",
        sql: V2_SETTINGS,
    },
    Migration {
        version: 3,
        name: "source-cache",
        sql: V3_SOURCE_CACHE,
    },
    Migration {
        version: 4,
        name: "schedules",
        sql: V4_SCHEDULES,
    },
];

/// Highest schema version this build ships.
pub fn latest_version() -> i64 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Bring `conn`'s schema up to [`latest_version`].
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            name       TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("migration tracker table: {e}")))?;

    let current = applied_version(conn)?;
    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply(conn, migration)?;
    }
    Ok(())
}

/// The high-water mark already applied, or 0 on a fresh database.
///
/// Migrations are strictly ordered, so the maximum recorded version is
/// the complete picture; there are no gaps to probe for.
fn applied_version(conn: &Connection) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(format!("reading schema version: {e}")))
}

/// Apply one revision and record it, atomically.
fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(format!("opening migration transaction: {e}")))?;

    tx.execute_batch(migration.sql).map_err(|e| {
        Error::database(format!(
            "schema migration v{} ({}) did not apply: {e}",
            migration.version, migration.name
        ))
    })?;
    tx.execute(
        "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
        rusqlite::params![migration.version, migration.name],
    )
    .map_err(|e| Error::database(format!("recording migration v{}: {e}", migration.version)))?;

    tx.commit()
        .map_err(|e| Error::database(format!("committing migration v{}: {e}", migration.version)))?;

    tracing::info!(
        version = migration.version,
        name = migration.name,
        "schema migration applied"
    );
    Ok(())
}
