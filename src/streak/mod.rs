pub mod engine;
pub mod milestones;
pub mod types;

pub use engine::{advance, apply_shield};
pub use milestones::{milestone_for, Milestone};
pub use types::{
    RecoveryKind, ShieldOutcome, StreakError, StreakEvent, StreakOutcome, StreakRules, StreakState,
};
