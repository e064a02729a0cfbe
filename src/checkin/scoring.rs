//! Compliance scoring.
//!
//! The score is the share of checklist items answered `true`, scaled to
//! 0–100. The denominator is always [`CHECKLIST_SIZE`]; items a caller did not
//! supply count as `false`.

use super::types::{Checklist, ChecklistItem, CHECKLIST_SIZE};

/// Compute the compliance score for a checklist.
pub fn score(checklist: &Checklist) -> f64 {
    let done = ChecklistItem::ALL
        .iter()
        .filter(|item| checklist.is_done(**item))
        .count();
    100.0 * done as f64 / CHECKLIST_SIZE as f64
}

/// Format a score the way it is shown to users (one decimal place).
pub fn display_score(score: f64) -> String {
    format!("{score:.1}%")
}
