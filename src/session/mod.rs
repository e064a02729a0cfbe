//! The check-in conversation: input decoding, the per-user state machine,
//! snapshot storage and the service that ties them to persistence.

pub mod input;
pub mod service;
pub mod state;
pub mod store;
pub mod validate;

pub use input::{Command, Reply};
pub use service::{
    CheckInService, CompletionReport, ServiceError, ServiceSettings, SessionSummary, StartError,
    Started, StatusReport, Turn,
};
pub use state::{PendingCommit, Prompt, SessionError, SessionState, Step};
pub use store::{InMemorySessionStore, SessionStore};
pub use validate::{TextLimits, ValidationError};
