//! Conversation threads and their message history.
//!
//! A thread is one independent conversation, identified by an opaque string
//! and owning an ordered, append-only sequence of [`Message`]s.
//!
//! # Architecture
//!
//! - [`MessageStore`]: per-thread ordered message sequences
//! - [`ThreadRegistry`]: the set of known threads, newest first
//!
//! Both are cheap, cloneable handles over shared state and are passed
//! explicitly to every component that needs them.
//!
//! # Example
//!
//! ```rust
//! use thread_chat::llm::Message;
//! use thread_chat::thread::{MessageStore, ThreadRegistry};
//!
//! let store = MessageStore::new();
//! let registry = ThreadRegistry::new(store.clone());
//!
//! let id = registry.create_thread();
//! assert!(store.read(id.as_str()).is_empty());
//!
//! store.append(&id, Message::user("Hello!")).unwrap();
//! assert_eq!(store.read(id.as_str()).len(), 1);
//! ```

mod registry;
mod store;

pub use registry::{ThreadRegistry, ThreadSummary};
pub use store::MessageStore;

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of identifier characters shown in sidebar labels.
const LABEL_PREFIX_LEN: usize = 8;

/// Opaque, stable identifier of a conversation thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    /// Generate a fresh identifier from 128 random bits.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Sidebar label, e.g. `Chat 1a2b3c4d...`.
    #[must_use]
    pub fn label(&self) -> String {
        let prefix: String = self.0.chars().take(LABEL_PREFIX_LEN).collect();
        format!("Chat {prefix}...")
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for ThreadId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ThreadId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_is_uuid() {
        let id = ThreadId::generate();
        assert!(Uuid::parse_str(id.as_str()).is_ok());
    }

    #[test]
    fn test_label_uses_prefix() {
        let id = ThreadId::from("1a2b3c4d-0000-4000-8000-000000000000");
        assert_eq!(id.label(), "Chat 1a2b3c4d...");

        let short = ThreadId::from("abc");
        assert_eq!(short.label(), "Chat abc...");
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let id = ThreadId::from("t-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"t-1\"");
    }
}
