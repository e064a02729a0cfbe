//! Pure streak transitions.
//!
//! [`advance`] folds one new check-in date into a [`StreakState`];
//! [`apply_shield`] bridges a single missed day without counting a check-in.
//! Neither touches storage: the repository persists the returned state.

use chrono::{Duration, NaiveDate};

use super::milestones::milestone_for;
use super::types::{
    RecoveryKind, ShieldOutcome, StreakError, StreakEvent, StreakOutcome, StreakRules, StreakState,
};
use crate::checkin::calendar::day_gap;

/// Advance `state` by a check-in on `new_date`.
///
/// Not idempotent: every successful call bumps `total_checkins`, so callers
/// must make sure a date is only ever committed once.
pub fn advance(
    state: &StreakState,
    shields: u32,
    new_date: NaiveDate,
    rules: &StreakRules,
) -> Result<StreakOutcome, StreakError> {
    let mut next = state.clone();
    let mut events = Vec::new();
    let mut reset = false;

    match state.last_checkin_date {
        None => next.current_streak = 1,
        Some(last) => {
            let gap = day_gap(last, new_date);
            match gap {
                g if g < 0 => return Err(StreakError::OutOfOrder { last, new: new_date }),
                0 => return Err(StreakError::SameDay { date: new_date }),
                1 => next.current_streak = state.current_streak.saturating_add(1),
                _ => {
                    reset = true;
                    next.current_streak = 1;
                    next.streak_before_reset = state.current_streak;
                    next.last_reset_date = Some(new_date);
                    events.push(StreakEvent::Reset {
                        streak_before_reset: state.current_streak,
                        last_reset_date: new_date,
                        missed_days: gap - 1,
                    });
                }
            }
        }
    }

    next.last_checkin_date = Some(new_date);
    next.longest_streak = next.longest_streak.max(next.current_streak);
    next.total_checkins = next.total_checkins.saturating_add(1);

    if let Some(milestone) = milestone_for(next.current_streak, &rules.milestones) {
        events.push(StreakEvent::Milestone(milestone));
    }

    if !reset {
        if let Some(recovery) = recovery_for(&next, new_date, rules) {
            events.push(StreakEvent::Recovery {
                recovery,
                current_streak: next.current_streak,
                streak_before_reset: next.streak_before_reset,
            });
        }
    }

    let mut shields_after = shields;
    if rules.shield_every > 0
        && next.current_streak % rules.shield_every == 0
        && shields < rules.max_shields
    {
        shields_after += 1;
        events.push(StreakEvent::ShieldEarned { shields: shields_after });
    }

    Ok(StreakOutcome {
        previous: state.clone(),
        state: next,
        shields: shields_after,
        events,
    })
}

/// Recovery messaging only applies shortly after a reset and only until the
/// user has beaten the streak they lost.
fn recovery_for(state: &StreakState, today: NaiveDate, rules: &StreakRules) -> Option<RecoveryKind> {
    let before = state.streak_before_reset;
    let reset_date = state.last_reset_date?;
    if before == 0 || day_gap(reset_date, today) > rules.recovery_window_days {
        return None;
    }

    let current = state.current_streak;
    if current == before.saturating_add(1) {
        Some(RecoveryKind::SurpassedPrevious)
    } else if current <= before && rules.recovery_checkpoints.contains(&current) {
        Some(RecoveryKind::Checkpoint(current))
    } else {
        None
    }
}

/// Spend a shield to bridge the single day missed before `today`.
///
/// Moves `last_checkin_date` to yesterday so the next real check-in sees a
/// one-day gap. `current_streak` and `total_checkins` are left untouched.
pub fn apply_shield(
    state: &StreakState,
    shields: u32,
    today: NaiveDate,
) -> Result<ShieldOutcome, StreakError> {
    let last = state.last_checkin_date.ok_or(StreakError::NoPriorCheckIn)?;
    let gap = day_gap(last, today);
    if gap <= 1 {
        return Err(StreakError::ShieldNotNeeded { last });
    }
    if gap > 2 {
        return Err(StreakError::StreakAlreadyBroken { missed_days: gap - 1 });
    }
    if shields == 0 {
        return Err(StreakError::NoShieldsLeft);
    }

    let covered_date = today - Duration::days(1);
    let mut next = state.clone();
    next.last_checkin_date = Some(covered_date);

    Ok(ShieldOutcome {
        previous: state.clone(),
        state: next,
        covered_date,
        shields_remaining: shields - 1,
    })
}
