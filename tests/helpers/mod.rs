#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use vigil::checkin::{ChecklistItem, FixedClock};
use vigil::db;
use vigil::feedback::TemplateFeedback;
use vigil::repository::{CheckInRepository, SqliteRepository, SqliteSessionStore, UserProfile};
use vigil::session::{CheckInService, ServiceSettings, Turn};
use vigil::streak::StreakState;

/// Open a fresh in-memory database with schema and migrations applied.
pub fn test_db() -> Connection {
    db::open_memory_database().unwrap()
}

pub fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// A service over a shared in-memory SQLite database and a pinned clock.
pub struct TestApp {
    pub db: Arc<Mutex<Connection>>,
    pub repo: Arc<SqliteRepository>,
    pub clock: Arc<FixedClock>,
    pub service: CheckInService,
}

impl TestApp {
    pub fn new(now: &str) -> Self {
        let db = Arc::new(Mutex::new(test_db()));
        let repo = Arc::new(SqliteRepository::new(Arc::clone(&db)));
        let clock = Arc::new(FixedClock::new(utc(now)));
        let service = CheckInService::new(
            repo.clone(),
            Arc::new(SqliteSessionStore::new(Arc::clone(&db))),
            clock.clone(),
            Arc::new(TemplateFeedback),
            ServiceSettings::default(),
        );
        Self {
            db,
            repo,
            clock,
            service,
        }
    }

    /// Insert a profile with a pre-existing streak.
    pub fn seed_user(&self, user_id: &str, timezone: &str, streak: StreakState) {
        let mut profile = UserProfile::new(user_id, timezone, utc("2026-01-01T00:00:00Z"));
        profile.streak = streak;
        self.repo.create_profile(&profile).unwrap();
    }

    /// Answer the checklist with `done` for the first `yes` items and "no" for the rest.
    pub fn answer_checklist(&self, user_id: &str, yes: usize) -> Turn {
        let mut last = None;
        for (i, item) in ChecklistItem::ALL.iter().enumerate() {
            let payload = format!("{}_{}", item.key(), if i < yes { "yes" } else { "no" });
            last = Some(self.service.reply(user_id, &payload).unwrap());
        }
        last.unwrap()
    }

    /// Run a full check-in through to completion.
    pub fn full_checkin(&self, user_id: &str, yes: usize) -> Turn {
        self.answer_checklist(user_id, yes);
        self.service
            .reply(user_id, "Client call ran long and ate my focus block")
            .unwrap();
        self.service
            .reply(user_id, "7 - solid day overall")
            .unwrap();
        self.service
            .reply(user_id, "Finish the migration | review backlog")
            .unwrap()
    }
}

pub fn streak(current: u32, longest: u32, last: &str, total: u32) -> StreakState {
    StreakState {
        current_streak: current,
        longest_streak: longest,
        last_checkin_date: Some(date(last)),
        total_checkins: total,
        ..Default::default()
    }
}
