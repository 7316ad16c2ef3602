//! Append-only per-thread message storage.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::ChatError;
use crate::llm::Message;

use super::ThreadId;

/// Thread-safe, in-memory store of message history keyed by thread.
///
/// Sequences only ever grow. Concurrent appends to the *same* thread from
/// two callers are serialized by the lock but their relative order is
/// unspecified.
#[derive(Debug, Clone, Default)]
pub struct MessageStore {
    inner: Arc<MessageStoreInner>,
}

#[derive(Debug, Default)]
struct MessageStoreInner {
    threads: RwLock<HashMap<ThreadId, Vec<Message>>>,
}

impl MessageStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an empty history for `id`. Existing history is left untouched.
    pub fn create(&self, id: &ThreadId) {
        let mut guard = self
            .inner
            .threads
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.entry(id.clone()).or_default();
    }

    /// Append a message to the end of a thread's history.
    pub fn append(&self, id: &ThreadId, message: Message) -> Result<(), ChatError> {
        let mut guard = self
            .inner
            .threads
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let history = guard
            .get_mut(id.as_str())
            .ok_or_else(|| ChatError::NotFound(id.clone()))?;
        history.push(message);
        Ok(())
    }

    /// Ordered history of a thread; empty for unknown or empty threads.
    #[must_use]
    pub fn read(&self, id: &str) -> Vec<Message> {
        self.inner
            .threads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether the thread was ever created.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.inner
            .threads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Number of messages stored for a thread.
    #[must_use]
    pub fn message_count(&self, id: &str) -> usize {
        self.inner
            .threads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map_or(0, Vec::len)
    }
}
