//! Post-commit feedback messages.
//!
//! Provides the [`FeedbackProvider`] trait and a [`TemplateFeedback`]
//! implementation that builds the message from the score and streak events.
//! Feedback runs only after a successful commit; a failing provider is logged
//! and replaced by [`FALLBACK_MESSAGE`], it never affects the stored check-in.

use anyhow::Result;

use crate::checkin::{scoring::display_score, CheckIn};
use crate::streak::{RecoveryKind, StreakEvent, StreakOutcome};

/// Sent when a provider cannot produce a personalized message.
pub const FALLBACK_MESSAGE: &str =
    "Check-in saved. Thanks for showing up today, see you tomorrow.";

/// Produces the message shown after a check-in is committed.
///
/// Implementations are synchronous; callers in async contexts should use
/// `tokio::task::spawn_blocking`.
pub trait FeedbackProvider: Send + Sync {
    fn feedback(&self, checkin: &CheckIn, outcome: &StreakOutcome) -> Result<String>;
}

/// Ask `provider` for a message, falling back to [`FALLBACK_MESSAGE`].
pub fn feedback_or_fallback(
    provider: &dyn FeedbackProvider,
    checkin: &CheckIn,
    outcome: &StreakOutcome,
) -> String {
    match provider.feedback(checkin, outcome) {
        Ok(message) if !message.trim().is_empty() => message,
        Ok(_) => {
            tracing::warn!(user_id = %checkin.user_id, "feedback provider returned an empty message");
            FALLBACK_MESSAGE.to_string()
        }
        Err(e) => {
            tracing::warn!(user_id = %checkin.user_id, error = %e, "feedback generation failed, using fallback");
            FALLBACK_MESSAGE.to_string()
        }
    }
}

/// Deterministic feedback assembled from fixed templates.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateFeedback;

impl FeedbackProvider for TemplateFeedback {
    fn feedback(&self, checkin: &CheckIn, outcome: &StreakOutcome) -> Result<String> {
        let mut lines = Vec::new();

        let score = checkin.compliance_score;
        let verdict = if score >= 100.0 {
            "Perfect day."
        } else if score >= 80.0 {
            "Strong day."
        } else if score >= 50.0 {
            "Mixed day, tomorrow is a fresh start."
        } else {
            "Tough day. Showing up still counts."
        };
        lines.push(format!("Compliance {}. {verdict}", display_score(score)));

        let streak = &outcome.state;
        lines.push(format!(
            "Streak: {} day{} (longest {}).",
            streak.current_streak,
            if streak.current_streak == 1 { "" } else { "s" },
            streak.longest_streak
        ));

        for event in &outcome.events {
            match event {
                StreakEvent::Reset {
                    streak_before_reset,
                    missed_days,
                    ..
                } => lines.push(format!(
                    "Your {streak_before_reset}-day streak ended after {missed_days} missed day(s). Day 1 starts now."
                )),
                StreakEvent::Milestone(m) => lines.push(format!("{}: {}", m.title, m.message)),
                StreakEvent::Recovery {
                    recovery: RecoveryKind::SurpassedPrevious,
                    streak_before_reset,
                    ..
                } => lines.push(format!(
                    "You just beat your previous {streak_before_reset}-day streak."
                )),
                StreakEvent::Recovery {
                    recovery: RecoveryKind::Checkpoint(days),
                    streak_before_reset,
                    ..
                } => lines.push(format!(
                    "{days} days back on track, {} to go to beat {streak_before_reset}.",
                    streak_before_reset.saturating_sub(*days) + 1
                )),
                StreakEvent::ShieldEarned { shields } => lines.push(format!(
                    "You earned a streak shield ({shields} available)."
                )),
            }
        }

        Ok(lines.join("\n"))
    }
}
