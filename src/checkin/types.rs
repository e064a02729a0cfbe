//! Check-in record types.
//!
//! Defines the fixed Tier-1 [`ChecklistItem`] set, the [`Checklist`] of
//! answers, the free-text [`CheckInResponses`], and the durable [`CheckIn`]
//! record that is committed together with the streak update.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The fixed, ordered Tier-1 checklist. Declaration order is prompt order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistItem {
    Sleep,
    Training,
    DeepWork,
    SkillBuilding,
    ZeroTolerance,
    Boundaries,
}

/// Number of items in the checklist; the scoring denominator.
pub const CHECKLIST_SIZE: usize = ChecklistItem::ALL.len();

impl ChecklistItem {
    pub const ALL: [ChecklistItem; 6] = [
        Self::Sleep,
        Self::Training,
        Self::DeepWork,
        Self::SkillBuilding,
        Self::ZeroTolerance,
        Self::Boundaries,
    ];

    /// Stable key used in storage and button payloads.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Sleep => "sleep",
            Self::Training => "training",
            Self::DeepWork => "deep_work",
            Self::SkillBuilding => "skill_building",
            Self::ZeroTolerance => "zero_tolerance",
            Self::Boundaries => "boundaries",
        }
    }

    /// Question shown to the user for this item.
    pub fn question(&self) -> &'static str {
        match self {
            Self::Sleep => "Did you get 7+ hours of sleep?",
            Self::Training => "Did you train today?",
            Self::DeepWork => "Did you complete at least 2 hours of focused work?",
            Self::SkillBuilding => "Did you spend time building a skill?",
            Self::ZeroTolerance => "Did you avoid every zero-tolerance item?",
            Self::Boundaries => "Did you hold your boundaries today?",
        }
    }
}

impl std::fmt::Display for ChecklistItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl std::str::FromStr for ChecklistItem {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|item| item.key() == s)
            .ok_or_else(|| format!("unknown checklist item: {s}"))
    }
}

/// One checklist answer: the boolean plus an optional detail (hours, category).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistAnswer {
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ChecklistAnswer {
    pub fn yes() -> Self {
        Self { done: true, detail: None }
    }

    pub fn no() -> Self {
        Self { done: false, detail: None }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Answers keyed by item. Items never answered are treated as `false` when scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Checklist {
    answers: BTreeMap<ChecklistItem, ChecklistAnswer>,
}

impl Checklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an answer, returning the previous one.
    pub fn record(&mut self, item: ChecklistItem, answer: ChecklistAnswer) -> Option<ChecklistAnswer> {
        self.answers.insert(item, answer)
    }

    pub fn remove(&mut self, item: ChecklistItem) -> Option<ChecklistAnswer> {
        self.answers.remove(&item)
    }

    pub fn get(&self, item: ChecklistItem) -> Option<&ChecklistAnswer> {
        self.answers.get(&item)
    }

    pub fn is_done(&self, item: ChecklistItem) -> bool {
        self.answers.get(&item).is_some_and(|a| a.done)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    /// Items not yet answered, in prompt order.
    pub fn missing(&self) -> Vec<ChecklistItem> {
        ChecklistItem::ALL
            .iter()
            .copied()
            .filter(|item| !self.answers.contains_key(item))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ChecklistItem, &ChecklistAnswer)> {
        self.answers.iter().map(|(k, v)| (*k, v))
    }
}

impl FromIterator<(ChecklistItem, ChecklistAnswer)> for Checklist {
    fn from_iter<T: IntoIterator<Item = (ChecklistItem, ChecklistAnswer)>>(iter: T) -> Self {
        Self {
            answers: iter.into_iter().collect(),
        }
    }
}

/// Which variant of the flow produced a check-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckInKind {
    Full,
    Abbreviated,
}

impl CheckInKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Abbreviated => "abbreviated",
        }
    }
}

impl std::fmt::Display for CheckInKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for CheckInKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "full" => Ok(Self::Full),
            "abbreviated" => Ok(Self::Abbreviated),
            _ => Err(format!("unknown check-in kind: {s}")),
        }
    }
}

/// Self-rating with its justification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rating {
    pub score: u8,
    pub reason: String,
}

/// Tomorrow's priority and the obstacle expected to get in the way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub priority: String,
    pub obstacle: String,
}

/// Free-text reflection answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckInResponses {
    pub challenges: String,
    pub rating: Rating,
    pub plan: Plan,
}

impl CheckInResponses {
    /// Placeholder responses recorded for the abbreviated flow.
    pub fn abbreviated() -> Self {
        const SKIPPED: &str = "Quick check-in, reflection skipped";
        Self {
            challenges: SKIPPED.to_string(),
            rating: Rating {
                score: 5,
                reason: SKIPPED.to_string(),
            },
            plan: Plan {
                priority: SKIPPED.to_string(),
                obstacle: SKIPPED.to_string(),
            },
        }
    }
}

/// A committed daily check-in. `(user_id, date)` is the natural key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckIn {
    pub user_id: String,
    /// Check-in day after the grace-hour shift, in the user's zone.
    pub date: NaiveDate,
    pub mode: String,
    pub kind: CheckInKind,
    pub checklist: Checklist,
    pub responses: CheckInResponses,
    pub compliance_score: f64,
    pub completed_at: DateTime<Utc>,
    pub duration_secs: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_at: Option<DateTime<Utc>>,
}

impl CheckIn {
    pub fn is_abbreviated(&self) -> bool {
        self.kind == CheckInKind::Abbreviated
    }
}
