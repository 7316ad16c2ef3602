//! LLM driver traits and implementations.
//!
//! This module provides the client side of the model API boundary: the
//! conversation [`Message`] type and the [`LlmDriver`] streaming trait.
//!
//! # Drivers
//!
//! - [`ChatCompletionsDriver`]: OpenAI-compatible Chat Completions API (`/v1/chat/completions`)
//! - [`ScriptedDriver`]: replays canned fragments, for tests and offline runs
//!
//! # Example
//!
//! ```rust,ignore
//! use thread_chat::llm::{ChatCompletionsDriver, LlmSettings, Provider};
//!
//! let settings = LlmSettings {
//!     base_url: "https://api.openai.com".to_string(),
//!     api_key: Some("sk-...".to_string()),
//!     model: "gpt-3.5-turbo".to_string(),
//!     provider: Provider::OpenAI,
//! };
//! let driver = ChatCompletionsDriver::new(settings);
//! ```

pub mod chat_completions;
pub mod provider;
pub mod scripted;

pub use chat_completions::ChatCompletionsDriver;
pub use provider::Provider;
pub use scripted::ScriptedDriver;

use std::pin::Pin;

use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::normalized::NormalizedEvent;

/// LLM connection and model settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL for the LLM API (e.g., `https://api.openai.com`).
    pub base_url: String,
    /// Optional API key for authentication.
    pub api_key: Option<String>,
    /// Model identifier (e.g., `gpt-3.5-turbo`).
    pub model: String,
    /// Provider type (auto-detected from `base_url` if not specified).
    pub provider: Provider,
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role of the message author.
    pub role: MessageRole,
    /// Text of the message.
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Role of a message author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message.
    User,
    /// Assistant response.
    Assistant,
}

/// Request to an LLM driver.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Full ordered conversation history, oldest first.
    pub messages: Vec<Message>,
}

/// Boxed stream of driver events.
pub type EventStream = Pin<Box<dyn Stream<Item = anyhow::Result<NormalizedEvent>> + Send>>;

/// Trait for LLM streaming drivers.
///
/// Implementations emit [`NormalizedEvent::MessageDelta`] for each output
/// fragment, in generation order, and [`NormalizedEvent::Done`] once the
/// model signals completion.
#[async_trait::async_trait]
pub trait LlmDriver: Send + Sync {
    /// Stream a response from the LLM.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the connection is interrupted.
    async fn stream(&self, req: LlmRequest) -> anyhow::Result<EventStream>;
}
