//! In-process [`CheckInRepository`] for tests.
//!
//! Commits clone the whole store, apply both writes to the clone and swap it
//! in, so a failure between the two writes leaves nothing behind.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::{CheckInRepository, RepositoryError, UserProfile};
use crate::checkin::CheckIn;
use crate::streak::{ShieldOutcome, StreakOutcome};

#[derive(Debug, Clone, Default)]
struct Store {
    profiles: HashMap<String, UserProfile>,
    checkins: HashMap<String, BTreeMap<NaiveDate, CheckIn>>,
}

#[derive(Debug, Default)]
pub struct InMemoryRepository {
    store: Mutex<Store>,
    fail_between_writes: AtomicBool,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following commit fail after the check-in is written but
    /// before the profile is updated.
    pub fn fail_between_writes(&self, fail: bool) {
        self.fail_between_writes.store(fail, Ordering::SeqCst);
    }

    fn guard(&self) -> Result<MutexGuard<'_, Store>, RepositoryError> {
        self.store
            .lock()
            .map_err(|e| RepositoryError::Unavailable(format!("store lock poisoned: {e}")))
    }

    fn injected_failure(&self) -> Result<(), RepositoryError> {
        if self.fail_between_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable("injected failure".to_string()));
        }
        Ok(())
    }
}

impl CheckInRepository for InMemoryRepository {
    fn create_profile(&self, profile: &UserProfile) -> Result<(), RepositoryError> {
        let mut store = self.guard()?;
        if store.profiles.contains_key(&profile.user_id) {
            return Err(RepositoryError::UserExists(profile.user_id.clone()));
        }
        store.profiles.insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    fn load_profile(&self, user_id: &str) -> Result<Option<UserProfile>, RepositoryError> {
        Ok(self.guard()?.profiles.get(user_id).cloned())
    }

    fn checkin_exists(&self, user_id: &str, date: NaiveDate) -> Result<bool, RepositoryError> {
        Ok(self
            .guard()?
            .checkins
            .get(user_id)
            .is_some_and(|days| days.contains_key(&date)))
    }

    fn abbreviated_count_since(
        &self,
        user_id: &str,
        since: DateTime<Utc>,
    ) -> Result<u32, RepositoryError> {
        let store = self.guard()?;
        let count = store
            .checkins
            .get(user_id)
            .map(|days| {
                days.values()
                    .filter(|c| c.is_abbreviated() && c.completed_at >= since)
                    .count()
            })
            .unwrap_or(0);
        Ok(count as u32)
    }

    fn commit(&self, checkin: &CheckIn, outcome: &StreakOutcome) -> Result<(), RepositoryError> {
        let mut store = self.guard()?;
        let profile = store
            .profiles
            .get(&checkin.user_id)
            .ok_or_else(|| RepositoryError::UnknownUser(checkin.user_id.clone()))?;
        if profile.streak != outcome.previous {
            return Err(RepositoryError::Conflict(checkin.user_id.clone()));
        }

        let mut staged = store.clone();
        let days = staged.checkins.entry(checkin.user_id.clone()).or_default();
        if days.contains_key(&checkin.date) {
            return Err(RepositoryError::Duplicate {
                user_id: checkin.user_id.clone(),
                date: checkin.date,
            });
        }
        days.insert(checkin.date, checkin.clone());

        self.injected_failure()?;

        if let Some(profile) = staged.profiles.get_mut(&checkin.user_id) {
            profile.streak = outcome.state.clone();
            profile.streak_shields = outcome.shields;
        }

        *store = staged;
        Ok(())
    }

    fn apply_shield(&self, user_id: &str, outcome: &ShieldOutcome) -> Result<(), RepositoryError> {
        let mut store = self.guard()?;
        let profile = store
            .profiles
            .get_mut(user_id)
            .ok_or_else(|| RepositoryError::UnknownUser(user_id.to_string()))?;
        if profile.streak != outcome.previous || profile.streak_shields != outcome.shields_remaining + 1 {
            return Err(RepositoryError::Conflict(user_id.to_string()));
        }
        profile.streak = outcome.state.clone();
        profile.streak_shields = outcome.shields_remaining;
        Ok(())
    }

    fn get_checkin(&self, user_id: &str, date: NaiveDate) -> Result<Option<CheckIn>, RepositoryError> {
        Ok(self
            .guard()?
            .checkins
            .get(user_id)
            .and_then(|days| days.get(&date))
            .cloned())
    }

    fn recent_checkins(&self, user_id: &str, limit: usize) -> Result<Vec<CheckIn>, RepositoryError> {
        let store = self.guard()?;
        Ok(store
            .checkins
            .get(user_id)
            .map(|days| days.values().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    fn correct_checkin(
        &self,
        corrected: &CheckIn,
        corrected_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut store = self.guard()?;
        let existing = store
            .checkins
            .get_mut(&corrected.user_id)
            .and_then(|days| days.get_mut(&corrected.date))
            .ok_or_else(|| RepositoryError::NotFound {
                user_id: corrected.user_id.clone(),
                date: corrected.date,
            })?;
        existing.checklist = corrected.checklist.clone();
        existing.responses = corrected.responses.clone();
        existing.compliance_score = corrected.compliance_score;
        existing.corrected_at = Some(corrected_at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkin::{CheckInKind, CheckInResponses, Checklist, ChecklistAnswer, ChecklistItem};
    use crate::streak::{advance, StreakRules};

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn checkin(date: &str) -> CheckIn {
        let checklist: Checklist = ChecklistItem::ALL
            .iter()
            .map(|i| (*i, ChecklistAnswer::yes()))
            .collect();
        CheckIn {
            user_id: "u1".into(),
            date: d(date),
            mode: "maintenance".into(),
            kind: CheckInKind::Full,
            compliance_score: 100.0,
            checklist,
            responses: CheckInResponses::abbreviated(),
            completed_at: Utc::now(),
            duration_secs: 60,
            corrected_at: None,
        }
    }

    fn outcome_for(repo: &InMemoryRepository, date: &str) -> StreakOutcome {
        let profile = repo.load_profile("u1").unwrap().unwrap();
        advance(&profile.streak, profile.streak_shields, d(date), &StreakRules::default()).unwrap()
    }

    #[test]
    fn injected_failure_leaves_no_partial_write() {
        let repo = InMemoryRepository::new();
        repo.create_profile(&UserProfile::new("u1", "UTC", Utc::now())).unwrap();

        repo.fail_between_writes(true);
        let outcome = outcome_for(&repo, "2026-04-01");
        assert!(repo.commit(&checkin("2026-04-01"), &outcome).is_err());
        assert!(!repo.checkin_exists("u1", d("2026-04-01")).unwrap());
        assert_eq!(repo.load_profile("u1").unwrap().unwrap().streak.total_checkins, 0);

        repo.fail_between_writes(false);
        repo.commit(&checkin("2026-04-01"), &outcome).unwrap();
        assert!(repo.checkin_exists("u1", d("2026-04-01")).unwrap());
        assert_eq!(repo.load_profile("u1").unwrap().unwrap().streak.current_streak, 1);
    }

    #[test]
    fn stale_outcome_conflicts() {
        let repo = InMemoryRepository::new();
        repo.create_profile(&UserProfile::new("u1", "UTC", Utc::now())).unwrap();
        let stale = outcome_for(&repo, "2026-04-02");
        let fresh = outcome_for(&repo, "2026-04-01");
        repo.commit(&checkin("2026-04-01"), &fresh).unwrap();

        assert!(matches!(
            repo.commit(&checkin("2026-04-02"), &stale),
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[test]
    fn unknown_user_is_reported() {
        let repo = InMemoryRepository::new();
        let outcome = advance(&Default::default(), 0, d("2026-04-01"), &StreakRules::default()).unwrap();
        assert!(matches!(
            repo.commit(&checkin("2026-04-01"), &outcome),
            Err(RepositoryError::UnknownUser(_))
        ));
    }

    #[test]
    fn recent_is_newest_first() {
        let repo = InMemoryRepository::new();
        repo.create_profile(&UserProfile::new("u1", "UTC", Utc::now())).unwrap();
        for date in ["2026-04-01", "2026-04-02", "2026-04-03"] {
            let outcome = outcome_for(&repo, date);
            repo.commit(&checkin(date), &outcome).unwrap();
        }
        let dates: Vec<_> = repo.recent_checkins("u1", 10).unwrap().iter().map(|c| c.date).collect();
        assert_eq!(dates, vec![d("2026-04-03"), d("2026-04-02"), d("2026-04-01")]);
    }
}
