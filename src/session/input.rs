//! Decoding raw chat payloads into typed inputs.
//!
//! The state machine never sees strings it has to interpret as commands:
//! everything is converted here first. Button payloads follow the
//! `<item>_yes` / `<item>_no` convention, optionally with `:<detail>`.

use crate::checkin::{CheckInKind, ChecklistAnswer, ChecklistItem};

/// Entry commands that open a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start(CheckInKind),
}

impl Command {
    /// Parse a slash command such as `/checkin` or `/quickcheckin@SomeBot`.
    pub fn parse(raw: &str) -> Option<Self> {
        let word = raw.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_ascii_lowercase().as_str() {
            "checkin" => Some(Self::Start(CheckInKind::Full)),
            "quickcheckin" | "quick_checkin" => Some(Self::Start(CheckInKind::Abbreviated)),
            _ => None,
        }
    }
}

/// One turn of user input inside an open session.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Checklist {
        item: ChecklistItem,
        answer: ChecklistAnswer,
    },
    Undo,
    Cancel,
    Text(String),
}

impl Reply {
    /// Decode a button payload or free-text message.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "undo" | "/undo" => return Self::Undo,
            "cancel" | "/cancel" => return Self::Cancel,
            _ => {}
        }
        parse_checklist_payload(trimmed).unwrap_or_else(|| Self::Text(raw.to_string()))
    }
}

fn parse_checklist_payload(payload: &str) -> Option<Reply> {
    let (head, detail) = match payload.split_once(':') {
        Some((head, detail)) => (head, Some(detail.trim()).filter(|d| !d.is_empty())),
        None => (payload, None),
    };

    let (key, done) = if let Some(key) = head.strip_suffix("_yes") {
        (key, true)
    } else if let Some(key) = head.strip_suffix("_no") {
        (key, false)
    } else {
        return None;
    };

    let item = key.parse::<ChecklistItem>().ok()?;
    let mut answer = if done { ChecklistAnswer::yes() } else { ChecklistAnswer::no() };
    if let Some(detail) = detail {
        answer = answer.with_detail(detail);
    }
    Some(Reply::Checklist { item, answer })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_start_commands() {
        assert_eq!(Command::parse("/checkin"), Some(Command::Start(CheckInKind::Full)));
        assert_eq!(
            Command::parse("/quickcheckin@VigilBot now"),
            Some(Command::Start(CheckInKind::Abbreviated))
        );
        assert_eq!(Command::parse("checkin"), None);
        assert_eq!(Command::parse("/stats"), None);
    }

    #[test]
    fn parses_button_payloads() {
        assert_eq!(
            Reply::parse("sleep_yes"),
            Reply::Checklist {
                item: ChecklistItem::Sleep,
                answer: ChecklistAnswer::yes(),
            }
        );
        assert_eq!(
            Reply::parse("deep_work_no"),
            Reply::Checklist {
                item: ChecklistItem::DeepWork,
                answer: ChecklistAnswer::no(),
            }
        );
        assert_eq!(
            Reply::parse("training_yes: strength"),
            Reply::Checklist {
                item: ChecklistItem::Training,
                answer: ChecklistAnswer::yes().with_detail("strength"),
            }
        );
    }

    #[test]
    fn reserved_words_and_free_text() {
        assert_eq!(Reply::parse("undo"), Reply::Undo);
        assert_eq!(Reply::parse(" Cancel "), Reply::Cancel);
        assert_eq!(Reply::parse("naps_yes"), Reply::Text("naps_yes".into()));
        assert_eq!(
            Reply::parse("7 - solid day overall"),
            Reply::Text("7 - solid day overall".into())
        );
    }
}
