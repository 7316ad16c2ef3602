//! UI session management.
//!
//! A UI session is the transient, per-client projection of "which thread is
//! active" and "what messages are displayed". Sessions are identified by
//! UUID, are never persisted, and expire after a period of inactivity.
//!
//! # Architecture
//!
//! - [`Session`]: active thread plus displayed messages for one client
//! - [`SessionStore`]: thread-safe store for all live sessions
//!
//! # Example
//!
//! ```rust
//! use thread_chat::session::SessionStore;
//! use thread_chat::thread::{MessageStore, ThreadRegistry};
//!
//! let registry = ThreadRegistry::new(MessageStore::new());
//! let sessions = SessionStore::new();
//!
//! let session = sessions.create(&registry);
//! let first = session.active_thread();
//! let second = session.new_chat(&registry);
//!
//! assert_eq!(registry.list_threads(), vec![second, first]);
//! ```

mod view;

pub use view::{DEFAULT_SESSION_TIMEOUT, Session, SessionSnapshot, SessionStore};
