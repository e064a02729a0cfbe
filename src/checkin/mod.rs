pub mod calendar;
pub mod scoring;
pub mod types;

pub use calendar::{Clock, FixedClock, SystemClock};
pub use scoring::score;
pub use types::{
    CheckIn, CheckInKind, CheckInResponses, Checklist, ChecklistAnswer, ChecklistItem, Plan,
    Rating, CHECKLIST_SIZE,
};
