//! SQLite-backed repository and session store.
//!
//! Every write that touches streak state runs in an `IMMEDIATE` transaction,
//! so the write lock is taken before the optimistic state check and released
//! only after both the check-in row and the profile row are written.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{CheckInRepository, RepositoryError, UserProfile};
use crate::checkin::{CheckIn, CheckInKind};
use crate::session::{SessionState, SessionStore};
use crate::streak::{ShieldOutcome, StreakOutcome, StreakState};

const PROFILE_COLUMNS: &str = "user_id, display_name, timezone, mode, current_streak, longest_streak, \
     last_checkin_date, total_checkins, streak_before_reset, last_reset_date, streak_shields, created_at";

const CHECKIN_COLUMNS: &str = "user_id, date, mode, kind, checklist, responses, compliance_score, \
     completed_at, duration_secs, corrected_at";

/// Repository over a shared SQLite connection.
#[derive(Clone)]
pub struct SqliteRepository {
    db: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        lock(&self.db)
    }
}

pub(crate) fn lock(db: &Mutex<Connection>) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
    db.lock()
        .map_err(|e| RepositoryError::Unavailable(format!("db lock poisoned: {e}")))
}

impl CheckInRepository for SqliteRepository {
    fn create_profile(&self, profile: &UserProfile) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        let s = &profile.streak;
        let now = Utc::now().to_rfc3339();
        let result = conn.execute(
            "INSERT INTO users (user_id, display_name, timezone, mode, current_streak, longest_streak, \
             last_checkin_date, total_checkins, streak_before_reset, last_reset_date, streak_shields, \
             created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                profile.user_id,
                profile.display_name,
                profile.timezone,
                profile.mode,
                s.current_streak,
                s.longest_streak,
                s.last_checkin_date.map(|d| d.to_string()),
                s.total_checkins,
                s.streak_before_reset,
                s.last_reset_date.map(|d| d.to_string()),
                profile.streak_shields,
                profile.created_at.to_rfc3339(),
                now,
            ],
        );
        match result {
            Ok(_) => {
                tracing::info!(user_id = %profile.user_id, timezone = %profile.timezone, "profile created");
                Ok(())
            }
            Err(e) if is_constraint_violation(&e) => {
                Err(RepositoryError::UserExists(profile.user_id.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>, RepositoryError> {
        let conn = self.conn()?;
        let profile = conn
            .query_row(
                &format!("SELECT {PROFILE_COLUMNS} FROM users WHERE user_id = ?1"),
                params![user_id],
                row_to_profile,
            )
            .optional()?;
        Ok(profile)
    }

    fn checkin_exists(&self, user_id: &str, date: NaiveDate) -> Result<bool, RepositoryError> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM checkins WHERE user_id = ?1 AND date = ?2",
            params![user_id, date.to_string()],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn abbreviated_count_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, RepositoryError> {
        let conn = self.conn()?;
        // Coarse date filter in SQL, exact instant comparison in Rust.
        let earliest_date = (since - Duration::days(2)).date_naive().to_string();
        let mut stmt = conn.prepare(
            "SELECT completed_at FROM checkins \
             WHERE user_id = ?1 AND kind = 'abbreviated' AND date >= ?2",
        )?;
        let stamps = stmt
            .query_map(params![user_id, earliest_date], |row| get_timestamp(row, 0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(stamps.iter().filter(|t| **t >= since).count() as u32)
    }

    fn commit(&self, checkin: &CheckIn, outcome: &StreakOutcome) -> Result<(), RepositoryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let stored = read_streak(&tx, &checkin.user_id)?
            .ok_or_else(|| RepositoryError::UnknownUser(checkin.user_id.clone()))?;
        if stored != outcome.previous {
            tracing::warn!(user_id = %checkin.user_id, date = %checkin.date, "streak changed under commit");
            return Err(RepositoryError::Conflict(checkin.user_id.clone()));
        }

        insert_checkin(&tx, checkin)?;
        write_streak(&tx, &checkin.user_id, &outcome.state, outcome.shields)?;
        write_audit_log(
            &tx,
            "commit",
            &checkin.user_id,
            Some(&serde_json::json!({
                "date": checkin.date,
                "kind": checkin.kind,
                "score": checkin.compliance_score,
                "current_streak": outcome.state.current_streak,
                "events": outcome.events,
            })),
        )?;

        tx.commit()?;

        tracing::info!(
            user_id = %checkin.user_id,
            date = %checkin.date,
            current_streak = outcome.state.current_streak,
            "check-in committed"
        );
        Ok(())
    }

    fn apply_shield(&self, user_id: &str, outcome: &ShieldOutcome) -> Result<(), RepositoryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let stored = read_streak(&tx, user_id)?
            .ok_or_else(|| RepositoryError::UnknownUser(user_id.to_string()))?;
        let shields: u32 = tx.query_row(
            "SELECT streak_shields FROM users WHERE user_id = ?1",
            params![user_id],
            |row| row.get(0),
        )?;
        if stored != outcome.previous || shields != outcome.shields_remaining + 1 {
            return Err(RepositoryError::Conflict(user_id.to_string()));
        }

        write_streak(&tx, user_id, &outcome.state, outcome.shields_remaining)?;
        write_audit_log(
            &tx,
            "shield",
            user_id,
            Some(&serde_json::json!({
                "covered_date": outcome.covered_date,
                "shields_remaining": outcome.shields_remaining,
            })),
        )?;

        tx.commit()?;
        tracing::info!(user_id, covered = %outcome.covered_date, "streak shield applied");
        Ok(())
    }

    fn get_checkin(&self, user_id: &str, date: NaiveDate) -> Result<Option<CheckIn>, RepositoryError> {
        let conn = self.conn()?;
        let checkin = conn
            .query_row(
                &format!("SELECT {CHECKIN_COLUMNS} FROM checkins WHERE user_id = ?1 AND date = ?2"),
                params![user_id, date.to_string()],
                row_to_checkin,
            )
            .optional()?;
        Ok(checkin)
    }

    fn recent_checkins(&self, user_id: &str, limit: usize) -> Result<Vec<CheckIn>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHECKIN_COLUMNS} FROM checkins WHERE user_id = ?1 ORDER BY date DESC LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(params![user_id, limit as i64], row_to_checkin)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn correct_checkin(
        &self,
        corrected: &CheckIn,
        corrected_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let rows = tx.execute(
            "UPDATE checkins SET checklist = ?1, responses = ?2, compliance_score = ?3, corrected_at = ?4 \
             WHERE user_id = ?5 AND date = ?6",
            params![
                serde_json::to_string(&corrected.checklist)?,
                serde_json::to_string(&corrected.responses)?,
                corrected.compliance_score,
                corrected_at.to_rfc3339(),
                corrected.user_id,
                corrected.date.to_string(),
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::NotFound {
                user_id: corrected.user_id.clone(),
                date: corrected.date,
            });
        }
        write_audit_log(
            &tx,
            "correct",
            &corrected.user_id,
            Some(&serde_json::json!({ "date": corrected.date })),
        )?;

        tx.commit()?;
        Ok(())
    }
}

fn read_streak(tx: &Transaction, user_id: &str) -> Result<Option<StreakState>, RepositoryError> {
    let state = tx
        .query_row(
            "SELECT current_streak, longest_streak, last_checkin_date, total_checkins, \
             streak_before_reset, last_reset_date FROM users WHERE user_id = ?1",
            params![user_id],
            |row| row_to_streak(row, 0),
        )
        .optional()?;
    Ok(state)
}

fn write_streak(
    tx: &Transaction,
    user_id: &str,
    state: &StreakState,
    shields: u32,
) -> Result<(), RepositoryError> {
    let rows = tx.execute(
        "UPDATE users SET current_streak = ?1, longest_streak = ?2, last_checkin_date = ?3, \
         total_checkins = ?4, streak_before_reset = ?5, last_reset_date = ?6, streak_shields = ?7, \
         updated_at = ?8 WHERE user_id = ?9",
        params![
            state.current_streak,
            state.longest_streak,
            state.last_checkin_date.map(|d| d.to_string()),
            state.total_checkins,
            state.streak_before_reset,
            state.last_reset_date.map(|d| d.to_string()),
            shields,
            Utc::now().to_rfc3339(),
            user_id,
        ],
    )?;
    if rows == 0 {
        return Err(RepositoryError::UnknownUser(user_id.to_string()));
    }
    Ok(())
}

fn insert_checkin(tx: &Transaction, checkin: &CheckIn) -> Result<(), RepositoryError> {
    let id = uuid::Uuid::now_v7().to_string();
    let result = tx.execute(
        "INSERT INTO checkins (id, user_id, date, mode, kind, checklist, responses, compliance_score, \
         completed_at, duration_secs, corrected_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            id,
            checkin.user_id,
            checkin.date.to_string(),
            checkin.mode,
            checkin.kind.as_str(),
            serde_json::to_string(&checkin.checklist)?,
            serde_json::to_string(&checkin.responses)?,
            checkin.compliance_score,
            checkin.completed_at.to_rfc3339(),
            checkin.duration_secs,
            checkin.corrected_at.map(|t| t.to_rfc3339()),
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(e) if is_constraint_violation(&e) => Err(RepositoryError::Duplicate {
            user_id: checkin.user_id.clone(),
            date: checkin.date,
        }),
        Err(e) => Err(e.into()),
    }
}

/// Write an entry to the streak_log audit table.
fn write_audit_log(
    conn: &Connection,
    operation: &str,
    user_id: &str,
    details: Option<&serde_json::Value>,
) -> Result<(), RepositoryError> {
    let now = Utc::now().to_rfc3339();
    let details_json = details.map(|d| d.to_string());
    conn.execute(
        "INSERT INTO streak_log (operation, user_id, details, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![operation, user_id, details_json, now],
    )?;
    Ok(())
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn conversion_error(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn get_date(row: &Row, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| s.parse::<NaiveDate>().map_err(|e| conversion_error(idx, e)))
        .transpose()
}

fn get_timestamp(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn get_json<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

/// Read the six streak columns starting at `offset`.
fn row_to_streak(row: &Row, offset: usize) -> rusqlite::Result<StreakState> {
    Ok(StreakState {
        current_streak: row.get(offset)?,
        longest_streak: row.get(offset + 1)?,
        last_checkin_date: get_date(row, offset + 2)?,
        total_checkins: row.get(offset + 3)?,
        streak_before_reset: row.get(offset + 4)?,
        last_reset_date: get_date(row, offset + 5)?,
    })
}

fn row_to_profile(row: &Row) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        user_id: row.get(0)?,
        display_name: row.get(1)?,
        timezone: row.get(2)?,
        mode: row.get(3)?,
        streak: row_to_streak(row, 4)?,
        streak_shields: row.get(10)?,
        created_at: get_timestamp(row, 11)?,
    })
}

fn row_to_checkin(row: &Row) -> rusqlite::Result<CheckIn> {
    let kind: String = row.get(3)?;
    let kind = kind.parse::<CheckInKind>().map_err(|e| {
        conversion_error(3, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    let corrected_at = match row.get::<_, Option<String>>(9)? {
        Some(_) => Some(get_timestamp(row, 9)?),
        None => None,
    };

    Ok(CheckIn {
        user_id: row.get(0)?,
        date: get_date(row, 1)?
            .ok_or_else(|| rusqlite::Error::InvalidColumnType(1, "date".into(), Type::Null))?,
        mode: row.get(2)?,
        kind,
        checklist: get_json(row, 4)?,
        responses: get_json(row, 5)?,
        compliance_score: row.get(6)?,
        completed_at: get_timestamp(row, 7)?,
        duration_secs: row.get(8)?,
        corrected_at,
    })
}

/// Session snapshots stored in the `sessions` table.
#[derive(Clone)]
pub struct SqliteSessionStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteSessionStore {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self { db }
    }
}

impl SessionStore for SqliteSessionStore {
    fn load(&self, user_id: &str) -> Result<Option<SessionState>, RepositoryError> {
        let conn = lock(&self.db)?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT state FROM sessions WHERE user_id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn save(&self, state: &SessionState) -> Result<(), RepositoryError> {
        let conn = lock(&self.db)?;
        conn.execute(
            "INSERT OR REPLACE INTO sessions (user_id, state, updated_at) VALUES (?1, ?2, ?3)",
            params![
                state.user_id,
                serde_json::to_string(state)?,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(())
    }

    fn remove(&self, user_id: &str) -> Result<bool, RepositoryError> {
        let conn = lock(&self.db)?;
        let rows = conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
        Ok(rows > 0)
    }

    fn list(&self) -> Result<Vec<SessionState>, RepositoryError> {
        let conn = lock(&self.db)?;
        let mut stmt = conn.prepare("SELECT user_id, state FROM sessions")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut sessions = Vec::with_capacity(rows.len());
        for (user_id, json) in rows {
            match serde_json::from_str(&json) {
                Ok(state) => sessions.push(state),
                Err(e) => tracing::warn!(%user_id, error = %e, "skipping unreadable session snapshot"),
            }
        }
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkin::{CheckInResponses, Checklist, ChecklistAnswer, ChecklistItem};
    use crate::db;
    use crate::streak::{advance, apply_shield, StreakRules};

    fn repo() -> (SqliteRepository, Arc<Mutex<Connection>>) {
        let conn = Arc::new(Mutex::new(db::open_memory_database().unwrap()));
        (SqliteRepository::new(Arc::clone(&conn)), conn)
    }

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn checkin(user: &str, date: &str, kind: CheckInKind, completed_at: &str) -> CheckIn {
        let checklist: Checklist = ChecklistItem::ALL
            .iter()
            .map(|i| (*i, ChecklistAnswer::yes()))
            .collect();
        CheckIn {
            user_id: user.into(),
            date: d(date),
            mode: "maintenance".into(),
            kind,
            compliance_score: crate::checkin::score(&checklist),
            checklist,
            responses: CheckInResponses::abbreviated(),
            completed_at: ts(completed_at),
            duration_secs: 90,
            corrected_at: None,
        }
    }

    fn commit_day(repo: &SqliteRepository, user: &str, date: &str) -> StreakOutcome {
        let profile = repo.load_profile(user).unwrap().unwrap();
        let outcome = advance(&profile.streak, profile.streak_shields, d(date), &StreakRules::default()).unwrap();
        let c = checkin(user, date, CheckInKind::Full, &format!("{date}T20:00:00Z"));
        repo.commit(&c, &outcome).unwrap();
        outcome
    }

    #[test]
    fn create_and_load_profile() {
        let (repo, _) = repo();
        let profile = UserProfile::new("u1", "Europe/Berlin", ts("2026-01-01T00:00:00Z"));
        repo.create_profile(&profile).unwrap();

        assert_eq!(repo.load_profile("u1").unwrap(), Some(profile.clone()));
        assert!(repo.load_profile("nobody").unwrap().is_none());
        assert!(matches!(
            repo.create_profile(&profile),
            Err(RepositoryError::UserExists(_))
        ));
    }

    #[test]
    fn commit_writes_checkin_and_streak_together() {
        let (repo, conn) = repo();
        repo.create_profile(&UserProfile::new("u1", "UTC", Utc::now())).unwrap();

        commit_day(&repo, "u1", "2026-02-01");
        commit_day(&repo, "u1", "2026-02-02");

        let profile = repo.load_profile("u1").unwrap().unwrap();
        assert_eq!(profile.streak.current_streak, 2);
        assert_eq!(profile.streak.total_checkins, 2);
        assert_eq!(profile.streak.last_checkin_date, Some(d("2026-02-02")));
        assert!(repo.checkin_exists("u1", d("2026-02-02")).unwrap());

        let stored = repo.get_checkin("u1", d("2026-02-01")).unwrap().unwrap();
        assert_eq!(stored.compliance_score, 100.0);
        assert_eq!(stored.checklist.len(), 6);

        let log_count: i64 = lock(&conn)
            .unwrap()
            .query_row("SELECT COUNT(*) FROM streak_log WHERE operation = 'commit'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(log_count, 2);
    }

    #[test]
    fn stale_outcome_is_a_conflict() {
        let (repo, _) = repo();
        repo.create_profile(&UserProfile::new("u1", "UTC", Utc::now())).unwrap();
        let profile = repo.load_profile("u1").unwrap().unwrap();
        let stale = advance(&profile.streak, 0, d("2026-02-02"), &StreakRules::default()).unwrap();

        commit_day(&repo, "u1", "2026-02-01");

        let err = repo
            .commit(&checkin("u1", "2026-02-02", CheckInKind::Full, "2026-02-02T20:00:00Z"), &stale)
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert!(!repo.checkin_exists("u1", d("2026-02-02")).unwrap());
    }

    #[test]
    fn duplicate_date_is_rejected_and_rolled_back() {
        let (repo, _) = repo();
        repo.create_profile(&UserProfile::new("u1", "UTC", Utc::now())).unwrap();
        commit_day(&repo, "u1", "2026-02-01");

        // Forge an outcome that passes the optimistic check for the same date.
        let profile = repo.load_profile("u1").unwrap().unwrap();
        let mut forged = advance(&profile.streak, 0, d("2026-02-02"), &StreakRules::default()).unwrap();
        forged.state.total_checkins = 99;

        let err = repo
            .commit(&checkin("u1", "2026-02-01", CheckInKind::Full, "2026-02-01T21:00:00Z"), &forged)
            .unwrap_err();
        assert!(matches!(err, RepositoryError::Duplicate { .. }));
        assert_eq!(repo.load_profile("u1").unwrap().unwrap().streak.total_checkins, 1);
    }

    #[test]
    fn failed_profile_update_rolls_back_checkin() {
        let (repo, conn) = repo();
        repo.create_profile(&UserProfile::new("u1", "UTC", Utc::now())).unwrap();
        commit_day(&repo, "u1", "2026-02-01");

        lock(&conn)
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER fail_profile_update BEFORE UPDATE ON users \
                 BEGIN SELECT RAISE(ABORT, 'injected'); END;",
            )
            .unwrap();

        let profile = repo.load_profile("u1").unwrap().unwrap();
        let outcome = advance(&profile.streak, 0, d("2026-02-02"), &StreakRules::default()).unwrap();
        let result = repo.commit(
            &checkin("u1", "2026-02-02", CheckInKind::Full, "2026-02-02T20:00:00Z"),
            &outcome,
        );
        assert!(matches!(result, Err(RepositoryError::Database(_))));

        // Neither half of the commit is visible.
        assert!(!repo.checkin_exists("u1", d("2026-02-02")).unwrap());
        let after = repo.load_profile("u1").unwrap().unwrap();
        assert_eq!(after.streak, profile.streak);

        lock(&conn)
            .unwrap()
            .execute_batch("DROP TRIGGER fail_profile_update;")
            .unwrap();
        repo.commit(
            &checkin("u1", "2026-02-02", CheckInKind::Full, "2026-02-02T20:00:00Z"),
            &outcome,
        )
        .unwrap();
        assert_eq!(repo.load_profile("u1").unwrap().unwrap().streak.current_streak, 2);
    }

    #[test]
    fn abbreviated_count_respects_instant() {
        let (repo, _) = repo();
        repo.create_profile(&UserProfile::new("u1", "UTC", Utc::now())).unwrap();

        for (date, at) in [
            ("2026-06-07", "2026-06-07T21:00:00Z"), // Sunday, previous week
            ("2026-06-08", "2026-06-08T21:00:00Z"),
            ("2026-06-09", "2026-06-09T21:00:00Z"),
        ] {
            let profile = repo.load_profile("u1").unwrap().unwrap();
            let outcome = advance(&profile.streak, 0, d(date), &StreakRules::default()).unwrap();
            repo.commit(&checkin("u1", date, CheckInKind::Abbreviated, at), &outcome).unwrap();
        }

        assert_eq!(repo.abbreviated_count_since("u1", ts("2026-06-08T00:00:00Z")).unwrap(), 2);
        assert_eq!(repo.abbreviated_count_since("u1", ts("2026-06-01T00:00:00Z")).unwrap(), 3);
    }

    #[test]
    fn shield_is_persisted_and_consumed() {
        let (repo, _) = repo();
        let mut profile = UserProfile::new("u1", "UTC", Utc::now());
        profile.streak_shields = 1;
        repo.create_profile(&profile).unwrap();
        commit_day(&repo, "u1", "2026-03-01");

        let profile = repo.load_profile("u1").unwrap().unwrap();
        let outcome = apply_shield(&profile.streak, profile.streak_shields, d("2026-03-03")).unwrap();
        repo.apply_shield("u1", &outcome).unwrap();

        let profile = repo.load_profile("u1").unwrap().unwrap();
        assert_eq!(profile.streak_shields, 0);
        assert_eq!(profile.streak.last_checkin_date, Some(d("2026-03-02")));
        assert_eq!(profile.streak.total_checkins, 1);

        // Replaying the same outcome no longer matches stored state.
        assert!(matches!(
            repo.apply_shield("u1", &outcome),
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[test]
    fn correction_keeps_date_key() {
        let (repo, _) = repo();
        repo.create_profile(&UserProfile::new("u1", "UTC", Utc::now())).unwrap();
        commit_day(&repo, "u1", "2026-02-01");

        let mut fixed = repo.get_checkin("u1", d("2026-02-01")).unwrap().unwrap();
        fixed.checklist.record(ChecklistItem::Sleep, ChecklistAnswer::no());
        fixed.compliance_score = crate::checkin::score(&fixed.checklist);
        repo.correct_checkin(&fixed, ts("2026-02-02T08:00:00Z")).unwrap();

        let stored = repo.get_checkin("u1", d("2026-02-01")).unwrap().unwrap();
        assert_eq!(stored.date, d("2026-02-01"));
        assert_eq!(stored.corrected_at, Some(ts("2026-02-02T08:00:00Z")));
        assert!(!stored.checklist.is_done(ChecklistItem::Sleep));
        assert_eq!(repo.load_profile("u1").unwrap().unwrap().streak.current_streak, 1);

        let mut missing = fixed.clone();
        missing.date = d("2026-02-05");
        assert!(matches!(
            repo.correct_checkin(&missing, Utc::now()),
            Err(RepositoryError::NotFound { .. })
        ));
    }

    #[test]
    fn recent_checkins_newest_first() {
        let (repo, _) = repo();
        repo.create_profile(&UserProfile::new("u1", "UTC", Utc::now())).unwrap();
        for date in ["2026-02-01", "2026-02-02", "2026-02-03"] {
            commit_day(&repo, "u1", date);
        }
        let recent = repo.recent_checkins("u1", 2).unwrap();
        let dates: Vec<_> = recent.iter().map(|c| c.date).collect();
        assert_eq!(dates, vec![d("2026-02-03"), d("2026-02-02")]);
    }

    #[test]
    fn session_store_round_trip() {
        let (_, conn) = repo();
        let store = SqliteSessionStore::new(conn);
        let state = SessionState::new("u9", CheckInKind::Full, d("2026-02-01"), ts("2026-02-01T20:00:00Z"));

        store.save(&state).unwrap();
        assert_eq!(store.load("u9").unwrap(), Some(state.clone()));
        assert_eq!(store.list().unwrap(), vec![state]);
        assert!(store.remove("u9").unwrap());
        assert!(store.load("u9").unwrap().is_none());
    }
}
