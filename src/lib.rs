//! Multi-thread chat with streamed LLM replies.
//!
//! Keeps an ordered message history per conversation thread, lets a UI
//! create and switch between threads, and streams model replies fragment by
//! fragment while persisting the completed reply into the thread.
//!
//! # Architecture
//!
//! - **Server**: Axum-based HTTP server with SSE streaming
//! - **Runner**: submit a message to a thread and stream the reply
//! - **Threads**: in-memory message store and thread registry
//! - **LLM**: streaming driver for OpenAI-compatible Chat Completions APIs
//!
//! # Modules
//!
//! - [`thread`]: message store, thread ids and the thread registry
//! - [`runner`]: the conversation runner
//! - [`llm`]: LLM driver trait and implementations
//! - [`normalized`]: unified streaming event model
//! - [`session`]: per-client UI session views
//! - [`server`]: HTTP routes

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::unused_async)]

pub mod config;
pub mod error;
pub mod llm;
pub mod normalized;
pub mod runner;
pub mod server;
pub mod session;
pub mod thread;

use crate::config::AppConfig;

use runner::ConversationRunner;
use session::SessionStore;
use std::sync::Arc;
use thread::{MessageStore, ThreadRegistry};

/// Application state shared across all handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Runs submissions against threads.
    pub runner: Arc<ConversationRunner>,
    /// Message histories, keyed by thread.
    pub store: MessageStore,
    /// Every thread created in this process.
    pub registry: ThreadRegistry,
    /// Session store for UI views.
    pub sessions: SessionStore,
    /// Global Configuration
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wire the stores, registry and runner around one model driver.
    #[must_use]
    pub fn new(driver: Arc<dyn llm::LlmDriver>, config: Arc<AppConfig>) -> Self {
        let store = MessageStore::new();
        let registry = ThreadRegistry::new(store.clone());
        let runner = Arc::new(ConversationRunner::new(driver, store.clone()));
        Self {
            runner,
            store,
            registry,
            sessions: SessionStore::new(),
            config,
        }
    }
}
