mod helpers;

use vigil::db;
use vigil::db::migrations::{get_schema_version, run_migrations, CURRENT_SCHEMA_VERSION};

#[test]
fn fresh_db_migrates_to_current_version() {
    let conn = helpers::test_db();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn migrations_are_idempotent() {
    let mut conn = helpers::test_db();
    // Running again should be a no-op
    run_migrations(&mut conn).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn manual_v1_db_upgrades_and_keeps_rows() {
    // Simulate a v1 database that hasn't been migrated
    let mut conn = rusqlite::Connection::open_in_memory().unwrap();
    conn.pragma_update(None, "foreign_keys", "ON").unwrap();
    db::schema::init_schema(&conn).unwrap();
    assert_eq!(get_schema_version(&conn).unwrap(), 1);

    conn.execute_batch(
        "INSERT INTO users (user_id, timezone, created_at, updated_at) VALUES ('u1', 'UTC', 'now', 'now');
         INSERT INTO checkins (id, user_id, date, mode, kind, checklist, responses, compliance_score, completed_at, duration_secs)
         VALUES ('c1', 'u1', '2026-03-01', 'maintenance', 'full', '{}', '{}', 50.0, 'now', 10);",
    )
    .unwrap();

    run_migrations(&mut conn).unwrap();

    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
    let corrected: Option<String> = conn
        .query_row("SELECT corrected_at FROM checkins WHERE id = 'c1'", [], |row| row.get(0))
        .unwrap();
    assert!(corrected.is_none());
}
