use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::milestones::Milestone;

/// Persisted streak bookkeeping for one user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakState {
    pub current_streak: u32,
    /// Always `>= current_streak`.
    pub longest_streak: u32,
    pub last_checkin_date: Option<NaiveDate>,
    pub total_checkins: u32,
    /// Streak length lost at the most recent reset. Carried until the next reset.
    pub streak_before_reset: u32,
    pub last_reset_date: Option<NaiveDate>,
}

/// Tunables for the streak engine, built from [`crate::config::StreakConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakRules {
    pub milestones: Vec<u32>,
    pub recovery_checkpoints: Vec<u32>,
    pub recovery_window_days: i64,
    /// Earn a shield every N consecutive days; 0 disables earning.
    pub shield_every: u32,
    pub max_shields: u32,
}

impl Default for StreakRules {
    fn default() -> Self {
        crate::config::StreakConfig::default().rules()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "days")]
pub enum RecoveryKind {
    /// Reached a post-reset checkpoint (e.g. 3, 7, 14 days).
    Checkpoint(u32),
    /// Beat the streak that was lost at the last reset.
    SurpassedPrevious,
}

/// Something the caller may want to announce after a successful commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum StreakEvent {
    Reset {
        streak_before_reset: u32,
        last_reset_date: NaiveDate,
        missed_days: i64,
    },
    Milestone(Milestone),
    Recovery {
        recovery: RecoveryKind,
        current_streak: u32,
        streak_before_reset: u32,
    },
    ShieldEarned {
        shields: u32,
    },
}

/// Result of [`super::advance`]: the state it was computed from, the new state
/// and the events it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakOutcome {
    pub previous: StreakState,
    pub state: StreakState,
    pub shields: u32,
    pub events: Vec<StreakEvent>,
}

impl StreakOutcome {
    pub fn milestone(&self) -> Option<&Milestone> {
        self.events.iter().find_map(|e| match e {
            StreakEvent::Milestone(m) => Some(m),
            _ => None,
        })
    }

    pub fn was_reset(&self) -> bool {
        self.events.iter().any(|e| matches!(e, StreakEvent::Reset { .. }))
    }
}

/// Result of [`super::apply_shield`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShieldOutcome {
    pub previous: StreakState,
    pub state: StreakState,
    pub covered_date: NaiveDate,
    pub shields_remaining: u32,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreakError {
    /// A second check-in on the same date; the existence check upstream should prevent this.
    #[error("a check-in is already recorded for {date}")]
    SameDay { date: NaiveDate },

    #[error("check-in date {new} is before the last recorded check-in {last}")]
    OutOfOrder { last: NaiveDate, new: NaiveDate },

    #[error("no check-in has been recorded yet, nothing to protect")]
    NoPriorCheckIn,

    #[error("streak is intact (last check-in {last}), no shield needed")]
    ShieldNotNeeded { last: NaiveDate },

    #[error("{missed_days} days were missed, a shield covers only one")]
    StreakAlreadyBroken { missed_days: i64 },

    #[error("no streak shields left")]
    NoShieldsLeft,
}
