//! SQL DDL for all Vigil tables.
//!
//! Defines `users` (profile + streak state), `checkins` (one row per user and
//! check-in date), `sessions` (in-flight conversation snapshots), the
//! `streak_log` audit table, and `schema_meta`. All DDL uses `IF NOT EXISTS`
//! for idempotent initialization.

use rusqlite::Connection;

/// All schema DDL statements for the version-1 tables.
const SCHEMA_SQL: &str = r#"
-- Profiles, each carrying its streak state
CREATE TABLE IF NOT EXISTS users (
    user_id TEXT PRIMARY KEY,
    display_name TEXT,
    timezone TEXT NOT NULL,
    mode TEXT NOT NULL DEFAULT 'maintenance',
    current_streak INTEGER NOT NULL DEFAULT 0 CHECK(current_streak >= 0),
    longest_streak INTEGER NOT NULL DEFAULT 0 CHECK(longest_streak >= current_streak),
    last_checkin_date TEXT,
    total_checkins INTEGER NOT NULL DEFAULT 0 CHECK(total_checkins >= 0),
    streak_before_reset INTEGER NOT NULL DEFAULT 0,
    last_reset_date TEXT,
    streak_shields INTEGER NOT NULL DEFAULT 0 CHECK(streak_shields >= 0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Committed check-ins; (user_id, date) is the natural key
CREATE TABLE IF NOT EXISTS checkins (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL REFERENCES users(user_id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    mode TEXT NOT NULL,
    kind TEXT NOT NULL CHECK(kind IN ('full','abbreviated')),
    checklist TEXT NOT NULL,
    responses TEXT NOT NULL,
    compliance_score REAL NOT NULL CHECK(compliance_score >= 0.0 AND compliance_score <= 100.0),
    completed_at TEXT NOT NULL,
    duration_secs INTEGER NOT NULL,
    UNIQUE(user_id, date)
);

CREATE INDEX IF NOT EXISTS idx_checkins_user_date ON checkins(user_id, date);
CREATE INDEX IF NOT EXISTS idx_checkins_user_kind ON checkins(user_id, kind);

-- In-flight conversation snapshots
CREATE TABLE IF NOT EXISTS sessions (
    user_id TEXT PRIMARY KEY,
    state TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Audit log
CREATE TABLE IF NOT EXISTS streak_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    operation TEXT NOT NULL CHECK(operation IN ('commit','shield','correct')),
    user_id TEXT NOT NULL,
    details TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_streak_log_user ON streak_log(user_id);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
