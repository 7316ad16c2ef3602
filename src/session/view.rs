//! UI session views and their store.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ChatError;
use crate::llm::Message;
use crate::thread::{MessageStore, ThreadId, ThreadRegistry};

/// Default session timeout (30 minutes).
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// A single UI session.
///
/// Holds which thread is active and the messages currently displayed for
/// it. The displayed messages are a projection of the [`MessageStore`] and
/// are rebuilt from it whenever the active thread changes.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    /// Unique session identifier.
    id: String,
    view: RwLock<View>,
    /// Session creation time.
    created_at: DateTime<Utc>,
    /// Last activity time.
    last_activity: RwLock<DateTime<Utc>>,
}

#[derive(Debug)]
struct View {
    active: ThreadId,
    messages: Vec<Message>,
}

/// Serializable snapshot of a session view.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub active_thread: ThreadId,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    fn new(id: String, active: ThreadId, messages: Vec<Message>) -> Self {
        let now = Utc::now();
        Self {
            inner: Arc::new(SessionInner {
                id,
                view: RwLock::new(View { active, messages }),
                created_at: now,
                last_activity: RwLock::new(now),
            }),
        }
    }

    /// Get the session ID.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// The thread this session is displaying and appending to.
    #[must_use]
    pub fn active_thread(&self) -> ThreadId {
        self.inner
            .view
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .active
            .clone()
    }

    /// Switch to another existing thread and reload its history.
    pub fn set_active(&self, id: &ThreadId, store: &MessageStore) -> Result<(), ChatError> {
        if !store.contains(id.as_str()) {
            return Err(ChatError::NotFound(id.clone()));
        }
        let messages = store.read(id.as_str());

        let mut guard = self
            .inner
            .view
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.active = id.clone();
        guard.messages = messages;
        drop(guard);

        self.touch();
        tracing::debug!(session_id = %self.id(), thread_id = %id, "Switched active thread");
        Ok(())
    }

    /// Start a new chat: create a thread, activate it and clear the view.
    pub fn new_chat(&self, registry: &ThreadRegistry) -> ThreadId {
        let id = registry.create_thread();

        let mut guard = self
            .inner
            .view
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.active = id.clone();
        guard.messages.clear();
        drop(guard);

        self.touch();
        tracing::debug!(session_id = %self.id(), thread_id = %id, "Started new chat");
        id
    }

    /// Rebuild the displayed messages from the active thread's history.
    pub fn refresh(&self, store: &MessageStore) {
        let mut guard = self
            .inner
            .view
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let messages = store.read(guard.active.as_str());
        guard.messages = messages;
        drop(guard);
        self.touch();
    }

    /// Messages currently displayed.
    #[must_use]
    pub fn messages(&self) -> Vec<Message> {
        self.inner
            .view
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .messages
            .clone()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let guard = self
            .inner
            .view
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        SessionSnapshot {
            session_id: self.inner.id.clone(),
            active_thread: guard.active.clone(),
            messages: guard.messages.clone(),
            created_at: self.inner.created_at,
        }
    }

    /// Update the last activity timestamp.
    pub fn touch(&self) {
        let mut guard = self
            .inner
            .last_activity
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Utc::now();
    }

    /// Check if the session has been idle for at least `timeout`.
    #[must_use]
    pub fn is_expired_with_timeout(&self, timeout: Duration) -> bool {
        let last = *self
            .inner
            .last_activity
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        // A negative duration means clock skew; treat it as fresh.
        (Utc::now() - last)
            .to_std()
            .is_ok_and(|idle| idle >= timeout)
    }
}

/// Thread-safe store for UI sessions.
///
/// Expiring a session drops only its view; threads and messages stay in
/// the [`MessageStore`].
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<SessionStoreInner>,
}

#[derive(Debug, Default)]
struct SessionStoreInner {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    /// Create a new session store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session whose active thread is a freshly created thread.
    #[must_use]
    pub fn create(&self, registry: &ThreadRegistry) -> Session {
        let thread = registry.create_thread();
        let session = Session::new(Uuid::new_v4().to_string(), thread, Vec::new());
        self.insert(session.clone());
        tracing::debug!(
            session_id = %session.id(),
            thread_id = %session.active_thread(),
            "Created session"
        );
        session
    }

    fn insert(&self, session: Session) {
        let mut guard = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.insert(session.id().to_string(), session);
    }

    /// Get a session by ID.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Session> {
        let guard = self
            .inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        guard.get(id).cloned()
    }

    /// Remove a session by ID.
    pub fn remove(&self, id: &str) -> Option<Session> {
        let mut guard = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.remove(id)
    }

    /// Get the number of live sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if there are no sessions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all sessions idle for longer than [`DEFAULT_SESSION_TIMEOUT`].
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_with_timeout(DEFAULT_SESSION_TIMEOUT)
    }

    /// Remove sessions that have been inactive longer than the timeout.
    ///
    /// Returns the number of sessions removed.
    pub fn cleanup_expired_with_timeout(&self, timeout: Duration) -> usize {
        let mut guard = self
            .inner
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|_, session| !session.is_expired_with_timeout(timeout));
        before - guard.len()
    }

    /// List all session IDs.
    #[must_use]
    pub fn list_ids(&self) -> Vec<String> {
        self.inner
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}
