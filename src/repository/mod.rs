//! Persistence boundary for check-ins and streak state.
//!
//! [`CheckInRepository::commit`] is the one operation that must be atomic:
//! the check-in row and the updated [`StreakState`] become visible together
//! or not at all. A stale `last_checkin_date` would make the next check-in see
//! a false gap and reset a valid streak.
//!
//! Implementations: [`sqlite::SqliteRepository`] (production) and
//! [`memory::InMemoryRepository`] (tests, with failure injection).

pub mod memory;
pub mod sqlite;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::checkin::CheckIn;
use crate::streak::{ShieldOutcome, StreakOutcome, StreakState};

pub use memory::InMemoryRepository;
pub use sqlite::{SqliteRepository, SqliteSessionStore};

/// Default mode label for new profiles.
pub const DEFAULT_MODE: &str = "maintenance";

/// A user's profile document: account metadata plus streak state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub display_name: Option<String>,
    /// IANA zone name, e.g. `"Europe/Berlin"`.
    pub timezone: String,
    pub mode: String,
    pub streak: StreakState,
    pub streak_shields: u32,
    pub created_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>, timezone: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
            timezone: timezone.into(),
            mode: DEFAULT_MODE.to_string(),
            streak: StreakState::default(),
            streak_shields: 0,
            created_at: now,
        }
    }
}

#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("user already exists: {0}")]
    UserExists(String),

    #[error("a check-in for {user_id} on {date} already exists")]
    Duplicate { user_id: String, date: NaiveDate },

    #[error("no check-in for {user_id} on {date}")]
    NotFound { user_id: String, date: NaiveDate },

    /// The stored streak no longer matches the state the update was computed from.
    #[error("streak state for {0} changed since it was read")]
    Conflict(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable store for profiles, check-ins and streak state.
///
/// All methods are synchronous; async callers should use
/// `tokio::task::spawn_blocking`.
pub trait CheckInRepository: Send + Sync {
    fn create_profile(&self, profile: &UserProfile) -> Result<(), RepositoryError>;

    fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>, RepositoryError>;

    fn checkin_exists(&self, user_id: &str, date: NaiveDate) -> Result<bool, RepositoryError>;

    /// Abbreviated check-ins completed at or after `since`.
    fn abbreviated_count_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, RepositoryError>;

    /// Atomically insert `checkin` and replace the profile's streak with
    /// `outcome.state`. Fails with [`RepositoryError::Conflict`] if the stored
    /// streak is not `outcome.previous`. Does not deduplicate: callers check
    /// [`Self::checkin_exists`] first.
    fn commit(&self, checkin: &CheckIn, outcome: &StreakOutcome) -> Result<(), RepositoryError>;

    /// Atomically persist a shield application and the reduced shield count.
    fn apply_shield(&self, user_id: &str, outcome: &ShieldOutcome) -> Result<(), RepositoryError>;

    fn get_checkin(&self, user_id: &str, date: NaiveDate) -> Result<Option<CheckIn>, RepositoryError>;

    /// Most recent check-ins first.
    fn recent_checkins(&self, user_id: &str, limit: usize) -> Result<Vec<CheckIn>, RepositoryError>;

    /// Replace the answers of an existing check-in and stamp `corrected_at`.
    /// The `(user_id, date)` key and the streak are never changed.
    fn correct_checkin(
        &self,
        corrected: &CheckIn,
        corrected_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}
