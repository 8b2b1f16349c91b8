use std::time::Duration;

use moka::sync::Cache;

use super::SessionState;
use crate::config::SessionConfig;

/// Keyed storage for [`SessionState`]. An expired session behaves exactly
/// like one that never existed.
pub trait SessionStore: Send + Sync {
    fn load(&self, session_id: &str) -> Option<SessionState>;
    fn save(&self, session_id: &str, state: SessionState);
    fn remove(&self, session_id: &str);
}

/// In-process store with idle expiry.
#[derive(Clone)]
pub struct MemorySessionStore {
    sessions: Cache<String, SessionState>,
}

impl MemorySessionStore {
    pub fn new(idle_timeout: Duration, max_sessions: u64) -> Self {
        Self {
            sessions: Cache::builder()
                .max_capacity(max_sessions)
                .time_to_idle(idle_timeout)
                .build(),
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(
            Duration::from_secs(config.idle_timeout_secs),
            config.max_sessions,
        )
    }

    pub fn len(&self) -> u64 {
        self.sessions.run_pending_tasks();
        self.sessions.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, session_id: &str) -> Option<SessionState> {
        self.sessions.get(session_id)
    }

    fn save(&self, session_id: &str, state: SessionState) {
        self.sessions.insert(session_id.to_string(), state);
    }

    fn remove(&self, session_id: &str) {
        self.sessions.invalidate(session_id);
    }
}
