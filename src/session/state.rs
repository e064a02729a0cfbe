//! The per-user check-in state machine.
//!
//! [`SessionState`] is a plain value: the service loads it from a
//! [`super::store::SessionStore`], applies one reply, and saves it back. All
//! transitions are synchronous and side-effect free.
//!
//! ```text
//! AwaitingChecklist ─▶ AwaitingChallenges ─▶ AwaitingRating ─▶ AwaitingPlan ─▶ Done
//!        │ (abbreviated)                                                      ▲
//!        └────────────────────────────────────────────────────────────────────┘
//! any non-terminal step ─▶ Cancelled | TimedOut
//! ```

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::validate::{parse_plan, parse_rating, validate_text, TextLimits, ValidationError};
use crate::checkin::{
    scoring, CheckIn, CheckInKind, CheckInResponses, Checklist, ChecklistAnswer, ChecklistItem,
    Plan, Rating,
};
use crate::streak::StreakOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    AwaitingChecklist,
    AwaitingChallenges,
    AwaitingRating,
    AwaitingPlan,
    Done,
    Cancelled,
    TimedOut,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingChecklist => "awaiting_checklist",
            Self::AwaitingChallenges => "awaiting_challenges",
            Self::AwaitingRating => "awaiting_rating",
            Self::AwaitingPlan => "awaiting_plan",
            Self::Done => "done",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Cancelled | Self::TimedOut)
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The question the user should answer next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "prompt", content = "item")]
pub enum Prompt {
    Checklist(ChecklistItem),
    Challenges,
    Rating,
    Plan,
    Complete,
    Closed,
}

impl Prompt {
    pub fn text(&self) -> String {
        match self {
            Self::Checklist(item) => item.question().to_string(),
            Self::Challenges => "What challenged you today? (10-500 characters)".to_string(),
            Self::Rating => {
                "Rate your day from 1 to 10 and say why, e.g. \"7 - solid day overall\"".to_string()
            }
            Self::Plan => {
                "What is tomorrow's priority, and what might get in the way? (priority | obstacle)"
                    .to_string()
            }
            Self::Complete => "Check-in complete.".to_string(),
            Self::Closed => "This check-in is closed.".to_string(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("cannot do that while {actual} (expected {expected})")]
    WrongStep { expected: Step, actual: Step },

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("undo is not available while {0}")]
    UndoUnavailable(Step),

    #[error("session is already {0}")]
    Closed(Step),
}

/// A computed check-in waiting to be committed (or re-committed after a failure).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingCommit {
    pub checkin: CheckIn,
    pub outcome: StreakOutcome,
}

/// Everything collected during one user's check-in conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub user_id: String,
    pub kind: CheckInKind,
    pub date: NaiveDate,
    pub step: Step,
    pub checklist: Checklist,
    /// Recording order of checklist items; the last entry is what `undo` removes.
    pub answer_order: Vec<ChecklistItem>,
    /// Item removed by the last undo, asked again before anything else.
    #[serde(default)]
    pub redo: Option<ChecklistItem>,
    pub challenges: Option<String>,
    pub rating: Option<Rating>,
    pub plan: Option<Plan>,
    pub started_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    #[serde(default)]
    pub pending: Option<PendingCommit>,
}

impl SessionState {
    pub fn new(user_id: impl Into<String>, kind: CheckInKind, date: NaiveDate, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            kind,
            date,
            step: Step::AwaitingChecklist,
            checklist: Checklist::new(),
            answer_order: Vec::new(),
            redo: None,
            challenges: None,
            rating: None,
            plan: None,
            started_at: now,
            last_activity_at: now,
            pending: None,
        }
    }

    pub fn prompt(&self) -> Prompt {
        match self.step {
            Step::AwaitingChecklist => {
                let item = self
                    .redo
                    .or_else(|| self.checklist.missing().first().copied())
                    .unwrap_or(ChecklistItem::ALL[0]);
                Prompt::Checklist(item)
            }
            Step::AwaitingChallenges => Prompt::Challenges,
            Step::AwaitingRating => Prompt::Rating,
            Step::AwaitingPlan => Prompt::Plan,
            Step::Done => Prompt::Complete,
            Step::Cancelled | Step::TimedOut => Prompt::Closed,
        }
    }

    /// Inactivity predicate; the caller decides when to check it.
    pub fn is_expired(&self, now: DateTime<Utc>, window: Duration) -> bool {
        !self.step.is_terminal() && now - self.last_activity_at >= window
    }

    pub fn is_finished(&self) -> bool {
        self.step.is_terminal()
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_activity_at {
            self.last_activity_at = now;
        }
    }

    fn expect_step(&self, expected: Step) -> Result<(), SessionError> {
        if self.step.is_terminal() {
            return Err(SessionError::Closed(self.step));
        }
        if self.step != expected {
            return Err(SessionError::WrongStep {
                expected,
                actual: self.step,
            });
        }
        Ok(())
    }

    /// Record (or replace) one checklist answer.
    ///
    /// A replaced item moves to the end of the undo order, so a later undo
    /// removes the correction rather than the original answer.
    pub fn answer_checklist_item(
        &mut self,
        item: ChecklistItem,
        answer: ChecklistAnswer,
        now: DateTime<Utc>,
    ) -> Result<Prompt, SessionError> {
        self.expect_step(Step::AwaitingChecklist)?;
        self.touch(now);

        self.checklist.record(item, answer);
        self.answer_order.retain(|i| *i != item);
        self.answer_order.push(item);
        if self.redo == Some(item) {
            self.redo = None;
        }

        if self.checklist.is_complete() {
            self.redo = None;
            self.step = match self.kind {
                CheckInKind::Full => Step::AwaitingChallenges,
                CheckInKind::Abbreviated => Step::Done,
            };
        }
        Ok(self.prompt())
    }

    /// Remove the most recently recorded checklist item and ask for it again.
    pub fn undo(&mut self, now: DateTime<Utc>) -> Result<ChecklistItem, SessionError> {
        match self.step {
            Step::AwaitingChecklist => {}
            Step::AwaitingChallenges if self.challenges.is_none() => {}
            s if s.is_terminal() => return Err(SessionError::Closed(s)),
            s => return Err(SessionError::UndoUnavailable(s)),
        }
        let item = self.answer_order.pop().ok_or(SessionError::NothingToUndo)?;
        self.touch(now);
        self.checklist.remove(item);
        self.redo = Some(item);
        self.step = Step::AwaitingChecklist;
        Ok(item)
    }

    pub fn answer_challenges(
        &mut self,
        text: &str,
        limits: TextLimits,
        now: DateTime<Utc>,
    ) -> Result<Prompt, SessionError> {
        self.expect_step(Step::AwaitingChallenges)?;
        self.touch(now);
        self.challenges = Some(validate_text("challenges", text, limits)?);
        self.step = Step::AwaitingRating;
        Ok(self.prompt())
    }

    pub fn answer_rating(
        &mut self,
        text: &str,
        limits: TextLimits,
        now: DateTime<Utc>,
    ) -> Result<Prompt, SessionError> {
        self.expect_step(Step::AwaitingRating)?;
        self.touch(now);
        self.rating = Some(parse_rating(text, limits)?);
        self.step = Step::AwaitingPlan;
        Ok(self.prompt())
    }

    pub fn answer_plan(
        &mut self,
        text: &str,
        limits: TextLimits,
        now: DateTime<Utc>,
    ) -> Result<Prompt, SessionError> {
        self.expect_step(Step::AwaitingPlan)?;
        self.touch(now);
        self.plan = Some(parse_plan(text, limits)?);
        self.step = Step::Done;
        Ok(self.prompt())
    }

    pub fn cancel(&mut self) {
        if !self.step.is_terminal() {
            self.step = Step::Cancelled;
        }
    }

    pub fn time_out(&mut self) {
        if !self.step.is_terminal() {
            self.step = Step::TimedOut;
        }
    }

    /// Assemble the check-in record from a finished session.
    pub fn build_checkin(&self, mode: &str, now: DateTime<Utc>) -> Result<CheckIn, SessionError> {
        if self.step != Step::Done {
            return Err(SessionError::WrongStep {
                expected: Step::Done,
                actual: self.step,
            });
        }

        let missing = self.checklist.missing();
        if !missing.is_empty() {
            let keys: Vec<&str> = missing.iter().map(|i| i.key()).collect();
            return Err(ValidationError::ChecklistIncomplete(keys.join(", ")).into());
        }

        let responses = match (self.kind, &self.challenges, &self.rating, &self.plan) {
            (CheckInKind::Abbreviated, ..) => CheckInResponses::abbreviated(),
            (CheckInKind::Full, Some(challenges), Some(rating), Some(plan)) => CheckInResponses {
                challenges: challenges.clone(),
                rating: rating.clone(),
                plan: plan.clone(),
            },
            _ => {
                return Err(SessionError::WrongStep {
                    expected: Step::AwaitingPlan,
                    actual: self.step,
                })
            }
        };

        Ok(CheckIn {
            user_id: self.user_id.clone(),
            date: self.date,
            mode: mode.to_string(),
            kind: self.kind,
            compliance_score: scoring::score(&self.checklist),
            checklist: self.checklist.clone(),
            responses,
            completed_at: now,
            duration_secs: (now - self.started_at).num_seconds().max(0),
            corrected_at: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-05-04T20:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn session(kind: CheckInKind) -> SessionState {
        SessionState::new("u1", kind, NaiveDate::from_ymd_opt(2026, 5, 4).unwrap(), t0())
    }

    fn answer_all(s: &mut SessionState, done: bool) {
        for item in ChecklistItem::ALL {
            let answer = if done { ChecklistAnswer::yes() } else { ChecklistAnswer::no() };
            s.answer_checklist_item(item, answer, t0()).unwrap();
        }
    }

    #[test]
    fn prompts_checklist_items_in_order() {
        let mut s = session(CheckInKind::Full);
        assert_eq!(s.prompt(), Prompt::Checklist(ChecklistItem::Sleep));
        let next = s
            .answer_checklist_item(ChecklistItem::Sleep, ChecklistAnswer::yes().with_detail("7.5h"), t0())
            .unwrap();
        assert_eq!(next, Prompt::Checklist(ChecklistItem::Training));
        assert_eq!(s.checklist.get(ChecklistItem::Sleep).unwrap().detail.as_deref(), Some("7.5h"));
    }

    #[test]
    fn full_flow_reaches_done() {
        let mut s = session(CheckInKind::Full);
        answer_all(&mut s, true);
        assert_eq!(s.step, Step::AwaitingChallenges);
        s.answer_challenges("Stayed focused despite noise", TextLimits::default(), t0())
            .unwrap();
        s.answer_rating("8 - good energy all day", TextLimits::default(), t0())
            .unwrap();
        let prompt = s
            .answer_plan("Write the design doc | meetings", TextLimits::default(), t0())
            .unwrap();
        assert_eq!(prompt, Prompt::Complete);
        assert_eq!(s.step, Step::Done);

        let checkin = s.build_checkin("maintenance", t0() + Duration::minutes(4)).unwrap();
        assert_eq!(checkin.compliance_score, 100.0);
        assert_eq!(checkin.duration_secs, 240);
        assert_eq!(checkin.responses.rating.score, 8);
        assert_eq!(checkin.responses.plan.obstacle, "meetings");
    }

    #[test]
    fn abbreviated_flow_skips_reflection() {
        let mut s = session(CheckInKind::Abbreviated);
        answer_all(&mut s, false);
        assert_eq!(s.step, Step::Done);
        let checkin = s.build_checkin("maintenance", t0()).unwrap();
        assert!(checkin.is_abbreviated());
        assert_eq!(checkin.responses, CheckInResponses::abbreviated());
        assert_eq!(checkin.compliance_score, 0.0);
    }

    #[test]
    fn invalid_text_keeps_step() {
        let mut s = session(CheckInKind::Full);
        answer_all(&mut s, true);
        let err = s.answer_challenges("short", TextLimits::default(), t0()).unwrap_err();
        assert!(matches!(err, SessionError::Invalid(ValidationError::TooShort { .. })));
        assert_eq!(s.step, Step::AwaitingChallenges);
        assert!(s.challenges.is_none());
    }

    #[test]
    fn undo_removes_most_recent_item() {
        let mut s = session(CheckInKind::Full);
        s.answer_checklist_item(ChecklistItem::Sleep, ChecklistAnswer::yes(), t0()).unwrap();
        s.answer_checklist_item(ChecklistItem::Training, ChecklistAnswer::no(), t0()).unwrap();

        assert_eq!(s.undo(t0()).unwrap(), ChecklistItem::Training);
        assert!(s.checklist.get(ChecklistItem::Training).is_none());
        assert!(s.checklist.get(ChecklistItem::Sleep).is_some());
        assert_eq!(s.prompt(), Prompt::Checklist(ChecklistItem::Training));
    }

    #[test]
    fn second_undo_removes_correction_not_original() {
        let mut s = session(CheckInKind::Full);
        s.answer_checklist_item(ChecklistItem::Sleep, ChecklistAnswer::no(), t0()).unwrap();
        s.answer_checklist_item(ChecklistItem::Training, ChecklistAnswer::yes(), t0()).unwrap();
        // Correct sleep without undoing: it becomes the most recent answer.
        s.answer_checklist_item(ChecklistItem::Sleep, ChecklistAnswer::yes(), t0()).unwrap();
        assert_eq!(s.answer_order, vec![ChecklistItem::Training, ChecklistItem::Sleep]);

        assert_eq!(s.undo(t0()).unwrap(), ChecklistItem::Sleep);
        assert_eq!(s.undo(t0()).unwrap(), ChecklistItem::Training);
        assert_eq!(s.undo(t0()).unwrap_err(), SessionError::NothingToUndo);
    }

    #[test]
    fn undo_after_reanswer_removes_the_reanswer() {
        let mut s = session(CheckInKind::Full);
        s.answer_checklist_item(ChecklistItem::Sleep, ChecklistAnswer::yes(), t0()).unwrap();
        s.answer_checklist_item(ChecklistItem::Training, ChecklistAnswer::yes(), t0()).unwrap();
        s.undo(t0()).unwrap();
        s.answer_checklist_item(ChecklistItem::Training, ChecklistAnswer::no(), t0()).unwrap();

        assert_eq!(s.undo(t0()).unwrap(), ChecklistItem::Training);
        assert!(s.checklist.get(ChecklistItem::Training).is_none());
        assert!(s.checklist.is_done(ChecklistItem::Sleep));
    }

    #[test]
    fn undo_from_challenges_reopens_checklist() {
        let mut s = session(CheckInKind::Full);
        answer_all(&mut s, true);
        assert_eq!(s.undo(t0()).unwrap(), ChecklistItem::Boundaries);
        assert_eq!(s.step, Step::AwaitingChecklist);
        assert_eq!(s.prompt(), Prompt::Checklist(ChecklistItem::Boundaries));
    }

    #[test]
    fn undo_unavailable_once_reflection_started() {
        let mut s = session(CheckInKind::Full);
        answer_all(&mut s, true);
        s.answer_challenges("A long and tiring day", TextLimits::default(), t0()).unwrap();
        assert_eq!(
            s.undo(t0()).unwrap_err(),
            SessionError::UndoUnavailable(Step::AwaitingRating)
        );
    }

    #[test]
    fn answers_out_of_step_are_refused() {
        let mut s = session(CheckInKind::Full);
        let err = s.answer_rating("7 - solid day overall", TextLimits::default(), t0()).unwrap_err();
        assert_eq!(
            err,
            SessionError::WrongStep {
                expected: Step::AwaitingRating,
                actual: Step::AwaitingChecklist,
            }
        );
    }

    #[test]
    fn expiry_tracks_last_activity() {
        let mut s = session(CheckInKind::Full);
        let window = Duration::minutes(15);
        assert!(!s.is_expired(t0() + Duration::minutes(14), window));
        assert!(s.is_expired(t0() + Duration::minutes(15), window));

        s.answer_checklist_item(ChecklistItem::Sleep, ChecklistAnswer::yes(), t0() + Duration::minutes(10))
            .unwrap();
        assert!(!s.is_expired(t0() + Duration::minutes(20), window));

        s.cancel();
        assert!(!s.is_expired(t0() + Duration::hours(5), window));
    }

    #[test]
    fn cancelled_session_refuses_answers() {
        let mut s = session(CheckInKind::Full);
        s.cancel();
        assert_eq!(s.step, Step::Cancelled);
        assert_eq!(
            s.answer_checklist_item(ChecklistItem::Sleep, ChecklistAnswer::yes(), t0())
                .unwrap_err(),
            SessionError::Closed(Step::Cancelled)
        );
        s.time_out();
        assert_eq!(s.step, Step::Cancelled);
    }

    #[test]
    fn state_survives_snapshot_round_trip() {
        let mut s = session(CheckInKind::Full);
        s.answer_checklist_item(ChecklistItem::DeepWork, ChecklistAnswer::yes(), t0()).unwrap();
        let json = serde_json::to_string(&s).unwrap();
        let back: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}
