//! Orchestrates check-in conversations on top of the pure state machine.
//!
//! [`CheckInService`] owns the collaborators (repository, session store,
//! clock, feedback provider) and turns one decoded input into one [`Turn`].
//! Completion scores the checklist, advances the streak and commits both in
//! a single repository call. A failed commit keeps the computed result on the
//! session so [`CheckInService::retry_commit`] can try again unchanged.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::input::Reply;
use super::state::{PendingCommit, Prompt, SessionError, SessionState, Step};
use super::store::SessionStore;
use super::validate::{parse_yes_no, TextLimits};
use crate::checkin::calendar::{checkin_date, parse_timezone, week_start, Clock};
use crate::checkin::{scoring, CheckIn, CheckInKind, ChecklistAnswer, ChecklistItem};
use crate::config::VigilConfig;
use crate::feedback::{feedback_or_fallback, FeedbackProvider};
use crate::repository::{CheckInRepository, RepositoryError, UserProfile};
use crate::streak::{advance, apply_shield, ShieldOutcome, StreakError, StreakOutcome, StreakRules, StreakState};

/// Tunables the service reads on every call.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub grace_hour: u32,
    pub session_timeout: Duration,
    pub abbreviated_weekly_limit: u32,
    pub limits: TextLimits,
    pub default_tz: Tz,
    pub rules: StreakRules,
}

impl ServiceSettings {
    pub fn from_config(config: &VigilConfig) -> Self {
        Self {
            grace_hour: config.checkin.grace_hour,
            session_timeout: config.checkin.session_timeout(),
            abbreviated_weekly_limit: config.checkin.abbreviated_weekly_limit,
            limits: TextLimits::from(&config.checkin),
            default_tz: config.checkin.default_tz(),
            rules: config.streak.rules(),
        }
    }
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::from_config(&VigilConfig::default())
    }
}

/// Why a session could not be opened.
#[derive(Error, Debug)]
pub enum StartError {
    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("already checked in for {date}")]
    AlreadyCheckedIn { date: NaiveDate },

    #[error("quick check-in limit reached ({used} of {limit} this week)")]
    WeeklyLimitExceeded { used: u32, limit: u32 },

    #[error("a check-in is already in progress ({step})")]
    SessionActive { step: Step },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("no check-in in progress for {0}")]
    NoActiveSession(String),

    #[error("check-in for {0} is finished but not saved yet, retry or cancel")]
    CommitPending(String),

    #[error("nothing to retry for {0}")]
    NoPendingCommit(String),

    /// The session computed its result but the commit failed. Nothing was saved.
    #[error("check-in was NOT saved: {0}")]
    CommitFailed(#[source] RepositoryError),

    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("unknown time zone: {0}")]
    InvalidTimezone(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Streak(#[from] StreakError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// A freshly opened session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Started {
    pub user_id: String,
    pub kind: CheckInKind,
    pub date: NaiveDate,
    pub prompt: Prompt,
}

/// Everything the caller needs to announce a committed check-in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionReport {
    pub checkin: CheckIn,
    pub outcome: StreakOutcome,
    pub message: String,
}

/// The result of one reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "turn")]
pub enum Turn {
    /// Answer accepted; ask the next question.
    Prompt { prompt: Prompt },
    /// Answer rejected; ask the same question again.
    Reprompt { prompt: Prompt, error: String },
    Undone { item: ChecklistItem, prompt: Prompt },
    Completed(CompletionReport),
    Cancelled,
    TimedOut,
}

impl Turn {
    /// Human-readable text for chat surfaces.
    pub fn message(&self) -> String {
        match self {
            Self::Prompt { prompt } => prompt.text(),
            Self::Reprompt { prompt, error } => format!("{error}. {}", prompt.text()),
            Self::Undone { item, prompt } => format!("Removed your answer for {item}. {}", prompt.text()),
            Self::Completed(report) => report.message.clone(),
            Self::Cancelled => "Check-in cancelled.".to_string(),
            Self::TimedOut => "Check-in timed out. Start again with /checkin.".to_string(),
        }
    }
}

/// Summary of an open session for status displays.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub kind: CheckInKind,
    pub date: NaiveDate,
    pub step: Step,
    pub prompt: Prompt,
    pub answered: usize,
    pub commit_pending: bool,
    pub expired: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub user_id: String,
    pub timezone: String,
    pub today: NaiveDate,
    pub checked_in_today: bool,
    pub streak: StreakState,
    pub streak_shields: u32,
    pub abbreviated_used: u32,
    pub abbreviated_limit: u32,
    pub session: Option<SessionSummary>,
}

pub struct CheckInService {
    repo: Arc<dyn CheckInRepository>,
    sessions: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    feedback: Arc<dyn FeedbackProvider>,
    settings: ServiceSettings,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl CheckInService {
    pub fn new(
        repo: Arc<dyn CheckInRepository>,
        sessions: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        feedback: Arc<dyn FeedbackProvider>,
        settings: ServiceSettings,
    ) -> Self {
        Self {
            repo,
            sessions,
            clock,
            feedback,
            settings,
            user_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Run `f` while holding the per-user lock.
    fn with_user<T, E>(&self, user_id: &str, f: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<RepositoryError>,
    {
        let lock = {
            let mut locks = self
                .user_locks
                .lock()
                .map_err(|e| RepositoryError::Unavailable(format!("user lock table poisoned: {e}")))?;
            Arc::clone(locks.entry(user_id.to_string()).or_default())
        };
        let result = match lock.lock() {
            Ok(_guard) => f(),
            Err(e) => Err(RepositoryError::Unavailable(format!("user lock poisoned: {e}")).into()),
        };
        self.release_user(user_id, &lock);
        result
    }

    /// Drop the user's lock entry once no other call holds or waits on it.
    fn release_user(&self, user_id: &str, lock: &Arc<Mutex<()>>) {
        if let Ok(mut locks) = self.user_locks.lock() {
            // One reference in the map, one held by the caller.
            if Arc::strong_count(lock) == 2 {
                locks.remove(user_id);
            }
        }
    }

    fn zone_of(&self, profile: &UserProfile) -> Tz {
        parse_timezone(&profile.timezone, self.settings.default_tz)
    }

    fn today_for(&self, profile: &UserProfile, now: DateTime<Utc>) -> NaiveDate {
        checkin_date(now, self.zone_of(profile), self.settings.grace_hour)
    }

    /// Create a profile with an empty streak.
    pub fn register(
        &self,
        user_id: &str,
        timezone: Option<&str>,
        display_name: Option<&str>,
    ) -> Result<UserProfile, ServiceError> {
        let timezone = match timezone {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|_| ServiceError::InvalidTimezone(name.to_string()))?
                .name()
                .to_string(),
            None => self.settings.default_tz.name().to_string(),
        };
        let mut profile = UserProfile::new(user_id, timezone, self.clock.now());
        profile.display_name = display_name.map(str::to_string);
        self.repo.create_profile(&profile)?;
        Ok(profile)
    }

    /// Open a check-in session after checking every precondition.
    pub fn start(&self, user_id: &str, kind: CheckInKind) -> Result<Started, StartError> {
        self.with_user(user_id, || {
            let profile = self
                .repo
                .load_profile(user_id)?
                .ok_or_else(|| StartError::UnknownUser(user_id.to_string()))?;
            let now = self.clock.now();
            let tz = self.zone_of(&profile);
            let date = checkin_date(now, tz, self.settings.grace_hour);

            if self.repo.checkin_exists(user_id, date)? {
                return Err(StartError::AlreadyCheckedIn { date });
            }

            if kind == CheckInKind::Abbreviated {
                let used = self.repo.abbreviated_count_since(user_id, week_start(now, tz))?;
                let limit = self.settings.abbreviated_weekly_limit;
                if used >= limit {
                    return Err(StartError::WeeklyLimitExceeded { used, limit });
                }
            }

            if let Some(existing) = self.sessions.load(user_id)? {
                let live = !existing.is_finished()
                    && !existing.is_expired(now, self.settings.session_timeout);
                if live || existing.pending.is_some() {
                    return Err(StartError::SessionActive { step: existing.step });
                }
                tracing::debug!(user_id, step = %existing.step, "replacing stale session");
            }

            let state = SessionState::new(user_id, kind, date, now);
            self.sessions.save(&state)?;
            tracing::info!(user_id, %date, kind = %kind, "check-in started");

            Ok(Started {
                user_id: user_id.to_string(),
                kind,
                date,
                prompt: state.prompt(),
            })
        })
    }

    /// Decode a raw payload and apply it to the user's open session.
    ///
    /// Outside the checklist step, text shaped like a button payload is
    /// treated as a free-text answer.
    pub fn reply(&self, user_id: &str, raw: &str) -> Result<Turn, ServiceError> {
        self.dispatch(user_id, Reply::parse(raw), Some(raw))
    }

    /// Apply one decoded reply to the user's open session.
    pub fn handle(&self, user_id: &str, reply: Reply) -> Result<Turn, ServiceError> {
        self.dispatch(user_id, reply, None)
    }

    fn dispatch(&self, user_id: &str, reply: Reply, raw: Option<&str>) -> Result<Turn, ServiceError> {
        self.with_user(user_id, || {
            let mut state = self
                .sessions
                .load(user_id)?
                .ok_or_else(|| ServiceError::NoActiveSession(user_id.to_string()))?;

            if state.pending.is_some() {
                if reply == Reply::Cancel {
                    self.sessions.remove(user_id)?;
                    tracing::info!(user_id, "unsaved check-in discarded");
                    return Ok(Turn::Cancelled);
                }
                return Err(ServiceError::CommitPending(user_id.to_string()));
            }
            if state.is_finished() {
                self.sessions.remove(user_id)?;
                return Err(ServiceError::NoActiveSession(user_id.to_string()));
            }

            let now = self.clock.now();
            if state.is_expired(now, self.settings.session_timeout) {
                state.time_out();
                self.sessions.remove(user_id)?;
                tracing::info!(user_id, "check-in timed out");
                return Ok(Turn::TimedOut);
            }

            let reply = match (reply, raw) {
                (Reply::Checklist { .. }, Some(raw)) if state.step != Step::AwaitingChecklist => {
                    Reply::Text(raw.to_string())
                }
                (reply, _) => reply,
            };

            let limits = self.settings.limits;
            let applied = match reply {
                Reply::Cancel => {
                    state.cancel();
                    self.sessions.remove(user_id)?;
                    tracing::info!(user_id, "check-in cancelled");
                    return Ok(Turn::Cancelled);
                }
                Reply::Undo => state.undo(now).map(|item| Turn::Undone {
                    item,
                    prompt: state.prompt(),
                }),
                Reply::Checklist { item, answer } => state
                    .answer_checklist_item(item, answer, now)
                    .map(|prompt| Turn::Prompt { prompt }),
                Reply::Text(text) => self
                    .apply_text(&mut state, &text, limits, now)
                    .map(|prompt| Turn::Prompt { prompt }),
            };

            match applied {
                Ok(_) if state.step == Step::Done => self.complete(state, now),
                Ok(turn) => {
                    self.sessions.save(&state)?;
                    Ok(turn)
                }
                Err(SessionError::Closed(step)) => {
                    self.sessions.remove(user_id)?;
                    Err(SessionError::Closed(step).into())
                }
                Err(e) => {
                    tracing::debug!(user_id, step = %state.step, error = %e, "reply rejected");
                    state.touch(now);
                    self.sessions.save(&state)?;
                    Ok(Turn::Reprompt {
                        prompt: state.prompt(),
                        error: e.to_string(),
                    })
                }
            }
        })
    }

    fn apply_text(
        &self,
        state: &mut SessionState,
        text: &str,
        limits: TextLimits,
        now: DateTime<Utc>,
    ) -> Result<Prompt, SessionError> {
        match (state.step, state.prompt()) {
            (Step::AwaitingChecklist, Prompt::Checklist(item)) => {
                let answer: ChecklistAnswer = parse_yes_no(text)?;
                state.answer_checklist_item(item, answer, now)
            }
            (Step::AwaitingChallenges, _) => state.answer_challenges(text, limits, now),
            (Step::AwaitingRating, _) => state.answer_rating(text, limits, now),
            (Step::AwaitingPlan, _) => state.answer_plan(text, limits, now),
            (step, _) => Err(SessionError::Closed(step)),
        }
    }

    /// Score, advance and commit a session that reached `Done`.
    fn complete(&self, mut state: SessionState, now: DateTime<Utc>) -> Result<Turn, ServiceError> {
        let user_id = state.user_id.clone();
        let profile = self
            .repo
            .load_profile(&user_id)?
            .ok_or_else(|| ServiceError::UnknownUser(user_id.clone()))?;

        let checkin = state.build_checkin(&profile.mode, now)?;
        let outcome = match advance(
            &profile.streak,
            profile.streak_shields,
            state.date,
            &self.settings.rules,
        ) {
            Ok(outcome) => outcome,
            Err(e) => {
                // The date was committed elsewhere while this session was open.
                self.sessions.remove(&user_id)?;
                return Err(e.into());
            }
        };

        state.pending = Some(PendingCommit { checkin, outcome });
        if let Err(e) = self.sessions.save(&state) {
            tracing::warn!(%user_id, error = %e, "could not snapshot finished session before commit");
        }
        self.commit_pending(state).map(Turn::Completed)
    }

    /// Re-run the commit of a finished session whose previous commit failed.
    pub fn retry_commit(&self, user_id: &str) -> Result<CompletionReport, ServiceError> {
        self.with_user(user_id, || {
            let state = self
                .sessions
                .load(user_id)?
                .filter(|s| s.pending.is_some())
                .ok_or_else(|| ServiceError::NoPendingCommit(user_id.to_string()))?;
            tracing::info!(user_id, "retrying check-in commit");
            self.commit_pending(state)
        })
    }

    fn commit_pending(&self, state: SessionState) -> Result<CompletionReport, ServiceError> {
        let Some(PendingCommit { checkin, outcome }) = state.pending.clone() else {
            return Err(ServiceError::NoPendingCommit(state.user_id.clone()));
        };

        if let Err(e) = self.repo.commit(&checkin, &outcome) {
            tracing::warn!(user_id = %checkin.user_id, date = %checkin.date, error = %e, "check-in commit failed");
            if let Err(save_err) = self.sessions.save(&state) {
                tracing::warn!(user_id = %checkin.user_id, error = %save_err, "could not keep unsaved check-in for retry");
            }
            return Err(ServiceError::CommitFailed(e));
        }

        if let Err(e) = self.sessions.remove(&checkin.user_id) {
            tracing::warn!(user_id = %checkin.user_id, error = %e, "committed session snapshot not removed");
        }

        let message = feedback_or_fallback(self.feedback.as_ref(), &checkin, &outcome);
        Ok(CompletionReport {
            checkin,
            outcome,
            message,
        })
    }

    /// Discard the user's session, including an unsaved finished one.
    pub fn cancel(&self, user_id: &str) -> Result<bool, ServiceError> {
        self.with_user(user_id, || {
            let removed = self.sessions.remove(user_id)?;
            if removed {
                tracing::info!(user_id, "check-in cancelled");
            }
            Ok(removed)
        })
    }

    pub fn status(&self, user_id: &str) -> Result<StatusReport, ServiceError> {
        let profile = self
            .repo
            .load_profile(user_id)?
            .ok_or_else(|| ServiceError::UnknownUser(user_id.to_string()))?;
        let now = self.clock.now();
        let tz = self.zone_of(&profile);
        let today = checkin_date(now, tz, self.settings.grace_hour);

        let session = self.sessions.load(user_id)?.map(|s| SessionSummary {
            kind: s.kind,
            date: s.date,
            step: s.step,
            prompt: s.prompt(),
            answered: s.checklist.len(),
            commit_pending: s.pending.is_some(),
            expired: s.is_expired(now, self.settings.session_timeout),
        });

        Ok(StatusReport {
            user_id: profile.user_id.clone(),
            timezone: profile.timezone.clone(),
            today,
            checked_in_today: self.repo.checkin_exists(user_id, today)?,
            abbreviated_used: self.repo.abbreviated_count_since(user_id, week_start(now, tz))?,
            abbreviated_limit: self.settings.abbreviated_weekly_limit,
            streak: profile.streak,
            streak_shields: profile.streak_shields,
            session,
        })
    }

    pub fn history(&self, user_id: &str, limit: usize) -> Result<Vec<CheckIn>, ServiceError> {
        if self.repo.load_profile(user_id)?.is_none() {
            return Err(ServiceError::UnknownUser(user_id.to_string()));
        }
        Ok(self.repo.recent_checkins(user_id, limit)?)
    }

    /// Drop sessions that are expired or already closed. Finished sessions
    /// waiting for a commit retry are kept. Returns the affected user ids.
    pub fn expire_idle(&self) -> Result<Vec<String>, ServiceError> {
        let now = self.clock.now();
        let mut expired = Vec::new();
        for state in self.sessions.list()? {
            if state.pending.is_some() {
                continue;
            }
            let stale = state.is_finished() || state.is_expired(now, self.settings.session_timeout);
            if stale && self.sessions.remove(&state.user_id)? {
                expired.push(state.user_id);
            }
        }
        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "expired idle check-in sessions");
        }
        Ok(expired)
    }

    /// Spend a streak shield to cover yesterday.
    pub fn use_shield(&self, user_id: &str) -> Result<ShieldOutcome, ServiceError> {
        self.with_user(user_id, || {
            let profile = self
                .repo
                .load_profile(user_id)?
                .ok_or_else(|| ServiceError::UnknownUser(user_id.to_string()))?;
            let today = self.today_for(&profile, self.clock.now());
            let outcome = apply_shield(&profile.streak, profile.streak_shields, today)?;
            self.repo.apply_shield(user_id, &outcome)?;
            Ok(outcome)
        })
    }

    /// Change one checklist answer of a committed check-in and rescore it.
    /// The streak is not touched.
    pub fn correct_checklist(
        &self,
        user_id: &str,
        date: NaiveDate,
        item: ChecklistItem,
        answer: ChecklistAnswer,
    ) -> Result<CheckIn, ServiceError> {
        self.with_user(user_id, || {
            let mut checkin = self.repo.get_checkin(user_id, date)?.ok_or_else(|| {
                RepositoryError::NotFound {
                    user_id: user_id.to_string(),
                    date,
                }
            })?;
            let now = self.clock.now();
            checkin.checklist.record(item, answer);
            checkin.compliance_score = scoring::score(&checkin.checklist);
            checkin.corrected_at = Some(now);
            self.repo.correct_checkin(&checkin, now)?;
            tracing::info!(user_id, %date, item = %item, "check-in corrected");
            Ok(checkin)
        })
    }
}
