//! Free-text validation for the reflection questions.
//!
//! Every failure here is recoverable: the session re-prompts the same
//! question and keeps everything collected so far.

use thiserror::Error;

use crate::checkin::{ChecklistAnswer, Plan, Rating};

/// Character bounds applied to every free-text answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLimits {
    pub min_chars: usize,
    pub max_chars: usize,
}

impl Default for TextLimits {
    fn default() -> Self {
        Self {
            min_chars: 10,
            max_chars: 500,
        }
    }
}

impl From<&crate::config::CheckInConfig> for TextLimits {
    fn from(config: &crate::config::CheckInConfig) -> Self {
        Self {
            min_chars: config.text_min_chars,
            max_chars: config.text_max_chars,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} is too short ({actual} characters, at least {min} needed)")]
    TooShort {
        field: &'static str,
        min: usize,
        actual: usize,
    },

    #[error("{field} is too long ({actual} characters, at most {max} allowed)")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    #[error("start your answer with a number from 1 to 10")]
    MissingRating,

    #[error("rating {0} is out of range, use a number from 1 to 10")]
    RatingOutOfRange(String),

    #[error("answer every checklist item first (missing: {0})")]
    ChecklistIncomplete(String),

    #[error("answer yes or no")]
    ExpectedYesNo,
}

/// Separators allowed between the rating number and its justification.
const RATING_SEPARATORS: &[char] = &['-', '–', '—', ':', ',', '.', '|', '/'];

/// Trim and bounds-check a free-text answer.
pub fn validate_text(
    field: &'static str,
    text: &str,
    limits: TextLimits,
) -> Result<String, ValidationError> {
    let trimmed = text.trim();
    let actual = trimmed.chars().count();
    if actual < limits.min_chars {
        return Err(ValidationError::TooShort {
            field,
            min: limits.min_chars,
            actual,
        });
    }
    if actual > limits.max_chars {
        return Err(ValidationError::TooLong {
            field,
            max: limits.max_chars,
            actual,
        });
    }
    Ok(trimmed.to_string())
}

/// Parse `"<1-10> <sep> <justification>"`.
pub fn parse_rating(text: &str, limits: TextLimits) -> Result<Rating, ValidationError> {
    let trimmed = text.trim_start();
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let digits = &trimmed[..digits_end];
    if digits.is_empty() {
        return Err(ValidationError::MissingRating);
    }

    let score = match digits.parse::<u8>() {
        Ok(n @ 1..=10) => n,
        _ => return Err(ValidationError::RatingOutOfRange(digits.to_string())),
    };

    // "7.5" or "7,5" is a fractional rating, not "7" followed by a separator.
    let mut after = trimmed[digits_end..].chars();
    if matches!(after.next(), Some('.' | ','))
        && after.next().is_some_and(|c| c.is_ascii_digit())
    {
        let fraction_end = trimmed[digits_end + 1..]
            .find(|c: char| !c.is_ascii_digit())
            .map_or(trimmed.len(), |i| digits_end + 1 + i);
        return Err(ValidationError::RatingOutOfRange(
            trimmed[..fraction_end].to_string(),
        ));
    }

    let rest = trimmed[digits_end..]
        .trim_start()
        .trim_start_matches(RATING_SEPARATORS);
    let reason = validate_text("rating justification", rest, limits)?;

    Ok(Rating { score, reason })
}

/// Interpret a typed checklist answer such as `"yes"` or `"no, 5h"`.
///
/// Anything after the first word (minus a leading separator) becomes the detail.
pub fn parse_yes_no(text: &str) -> Result<ChecklistAnswer, ValidationError> {
    let trimmed = text.trim();
    let word_end = trimmed
        .find(|c: char| !c.is_alphabetic())
        .unwrap_or(trimmed.len());
    let mut answer = match trimmed[..word_end].to_lowercase().as_str() {
        "yes" | "y" | "yeah" | "yep" | "done" => ChecklistAnswer::yes(),
        "no" | "n" | "nope" => ChecklistAnswer::no(),
        _ => return Err(ValidationError::ExpectedYesNo),
    };
    let detail = trimmed[word_end..]
        .trim_start()
        .trim_start_matches(RATING_SEPARATORS)
        .trim();
    if !detail.is_empty() {
        answer = answer.with_detail(detail);
    }
    Ok(answer)
}

/// Split tomorrow's answer into priority and obstacle.
///
/// Splits on the first `|`, otherwise on the first `" - "`. Without a usable
/// separator both fields receive the full text.
pub fn parse_plan(text: &str, limits: TextLimits) -> Result<Plan, ValidationError> {
    let full = validate_text("tomorrow's plan", text, limits)?;

    let split = full
        .split_once('|')
        .or_else(|| full.split_once(" - "))
        .map(|(a, b)| (a.trim(), b.trim()))
        .filter(|(a, b)| !a.is_empty() && !b.is_empty());

    Ok(match split {
        Some((priority, obstacle)) => Plan {
            priority: priority.to_string(),
            obstacle: obstacle.to_string(),
        },
        None => Plan {
            priority: full.clone(),
            obstacle: full,
        },
    })
}
