//! Milestone lookup. Stateless: a streak length either is a configured
//! threshold or it is not.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub days: u32,
    pub title: String,
    pub message: String,
}

/// Return the milestone for `days` if it exactly matches a threshold.
pub fn milestone_for(days: u32, thresholds: &[u32]) -> Option<Milestone> {
    if days == 0 || !thresholds.contains(&days) {
        return None;
    }
    Some(Milestone {
        days,
        title: title_for(days),
        message: message_for(days),
    })
}

fn title_for(days: u32) -> String {
    match days {
        7 => "One Week".into(),
        14 => "Two Weeks".into(),
        30 => "Thirty Days".into(),
        60 => "Two Months".into(),
        90 => "Ninety Days".into(),
        180 => "Half a Year".into(),
        365 => "One Year".into(),
        n => format!("{n}-Day Streak"),
    }
}

fn message_for(days: u32) -> String {
    match days {
        1..=14 => format!("{days} days in a row. The habit is taking hold."),
        15..=90 => format!("{days} consecutive days. This is who you are now."),
        _ => format!("{days} days without a gap. Rare territory."),
    }
}
