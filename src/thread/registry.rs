//! Registry of known conversation threads.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{MessageStore, ThreadId};

#[derive(Debug, Clone)]
struct ThreadEntry {
    id: ThreadId,
    created_at: DateTime<Utc>,
}

/// Sidebar projection of a thread.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadSummary {
    pub id: ThreadId,
    pub label: String,
    pub created_at: DateTime<Utc>,
    pub message_count: usize,
}

/// Thread-safe registry of every thread created in this process.
///
/// Creating a thread also registers an empty history in the injected
/// [`MessageStore`], so appends to a registered thread never fail.
#[derive(Debug, Clone)]
pub struct ThreadRegistry {
    inner: Arc<ThreadRegistryInner>,
}

#[derive(Debug)]
struct ThreadRegistryInner {
    store: MessageStore,
    threads: RwLock<Threads>,
}

#[derive(Debug, Default)]
struct Threads {
    /// Creation order, oldest first.
    order: Vec<ThreadEntry>,
    known: HashSet<ThreadId>,
}

impl ThreadRegistry {
    /// Create an empty registry backed by `store`.
    #[must_use]
    pub fn new(store: MessageStore) -> Self {
        Self {
            inner: Arc::new(ThreadRegistryInner {
                store,
                threads: RwLock::new(Threads::default()),
            }),
        }
    }

    /// The message store this registry creates histories in.
    #[must_use]
    pub fn store(&self) -> &MessageStore {
        &self.inner.store
    }

    /// Generate and register a fresh thread with empty history.
    #[must_use]
    pub fn create_thread(&self) -> ThreadId {
        let id = ThreadId::generate();
        self.register(id.clone());
        tracing::debug!(thread_id = %id, "Created thread");
        id
    }

    /// Register a caller-supplied identifier if it is not known yet.
    ///
    /// Returns `true` when the thread was newly registered.
    pub fn ensure(&self, id: &ThreadId) -> bool {
        if self.contains(id.as_str()) {
            return false;
        }
        self.register(id.clone())
    }

    fn register(&self, id: ThreadId) -> bool {
        let mut guard = self
            .inner
            .threads
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        // Re-check under the write lock; another caller may have won the race.
        if !guard.known.insert(id.clone()) {
            return false;
        }
        self.inner.store.create(&id);
        guard.order.push(ThreadEntry {
            id,
            created_at: Utc::now(),
        });
        true
    }

    /// Whether `id` has been registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.inner
            .threads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .known
            .contains(id)
    }

    /// Known threads, most recently created first.
    #[must_use]
    pub fn list_threads(&self) -> Vec<ThreadId> {
        self.inner
            .threads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .iter()
            .rev()
            .map(|entry| entry.id.clone())
            .collect()
    }

    /// Sidebar summaries, most recently created first.
    #[must_use]
    pub fn summaries(&self) -> Vec<ThreadSummary> {
        let entries: Vec<ThreadEntry> = self
            .inner
            .threads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .clone();

        entries
            .into_iter()
            .rev()
            .map(|entry| ThreadSummary {
                label: entry.id.label(),
                message_count: self.inner.store.message_count(entry.id.as_str()),
                created_at: entry.created_at,
                id: entry.id,
            })
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .threads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
