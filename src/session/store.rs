//! Where in-flight [`SessionState`] snapshots live between turns.
//!
//! The store is best-effort: losing a snapshot loses an unfinished
//! conversation, never a committed check-in.

use std::collections::HashMap;
use std::sync::Mutex;

use super::state::SessionState;
use crate::repository::RepositoryError;

pub trait SessionStore: Send + Sync {
    fn load(&self, user_id: &str) -> Result<Option<SessionState>, RepositoryError>;

    /// Insert or replace the snapshot for `state.user_id`.
    fn save(&self, state: &SessionState) -> Result<(), RepositoryError>;

    /// Returns `true` if a snapshot was removed.
    fn remove(&self, user_id: &str) -> Result<bool, RepositoryError>;

    fn list(&self) -> Result<Vec<SessionState>, RepositoryError>;
}

/// Process-local session store.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: Mutex<HashMap<String, SessionState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(
        &self,
    ) -> Result<std::sync::MutexGuard<'_, HashMap<String, SessionState>>, RepositoryError> {
        self.sessions
            .lock()
            .map_err(|e| RepositoryError::Unavailable(format!("session lock poisoned: {e}")))
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self, user_id: &str) -> Result<Option<SessionState>, RepositoryError> {
        Ok(self.guard()?.get(user_id).cloned())
    }

    fn save(&self, state: &SessionState) -> Result<(), RepositoryError> {
        self.guard()?.insert(state.user_id.clone(), state.clone());
        Ok(())
    }

    fn remove(&self, user_id: &str) -> Result<bool, RepositoryError> {
        Ok(self.guard()?.remove(user_id).is_some())
    }

    fn list(&self) -> Result<Vec<SessionState>, RepositoryError> {
        Ok(self.guard()?.values().cloned().collect())
    }
}
