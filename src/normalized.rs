//! Normalized event types for streaming chat responses.
//!
//! The same event model is produced by every [`LlmDriver`](crate::llm::LlmDriver)
//! and is what both front-ends receive over Server-Sent Events.
//!
//! # Event Types
//!
//! - Stream lifecycle: [`NormalizedEvent::StreamStart`], [`NormalizedEvent::Done`]
//! - Content: [`NormalizedEvent::MessageDelta`], one per response fragment
//! - Failure: [`NormalizedEvent::Error`]
//!
//! # Example
//!
//! ```rust
//! use thread_chat::normalized::{NormalizedEvent, sse_event};
//!
//! let event = NormalizedEvent::MessageDelta {
//!     text: "Hello".to_string(),
//! };
//! let sse = sse_event(&event);
//! assert!(sse.contains("message.delta"));
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ChatError;
use crate::thread::ThreadId;

/// Normalized streaming events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "data")]
pub enum NormalizedEvent {
    /// Indicates the start of a new streaming response.
    #[serde(rename = "stream.start")]
    StreamStart {
        /// Unique identifier for this request/response pair.
        request_id: String,
        /// Thread the response belongs to.
        thread_id: ThreadId,
    },

    /// Incremental text fragment of the assistant's response.
    #[serde(rename = "message.delta")]
    MessageDelta {
        /// The text fragment to append.
        text: String,
    },

    /// An error occurred during streaming.
    #[serde(rename = "error")]
    Error {
        /// Error message.
        message: String,
        /// Optional error code for programmatic handling.
        #[serde(skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    /// Stream has completed.
    #[serde(rename = "done")]
    Done,
}

impl From<&ChatError> for NormalizedEvent {
    fn from(err: &ChatError) -> Self {
        Self::Error {
            message: err.to_string(),
            code: Some(err.code().to_string()),
        }
    }
}

/// Convert a [`NormalizedEvent`] to an SSE-formatted string.
///
/// The output carries both an `event:` line (for `EventSource` listeners)
/// and a `data:` line containing the JSON payload.
///
/// ```rust
/// use thread_chat::normalized::{NormalizedEvent, sse_event};
///
/// let sse = sse_event(&NormalizedEvent::Done);
/// assert!(sse.contains("event: done"));
/// ```
pub fn sse_event(evt: &NormalizedEvent) -> String {
    let json = serde_json::to_string(evt).unwrap_or_else(|e| {
        serde_json::json!({ "type": "error", "data": { "message": e.to_string() } }).to_string()
    });

    let event_name = event_name(evt);

    format!("event: {event_name}\ndata: {json}\n\n")
}

/// Get the SSE event name for a [`NormalizedEvent`].
pub fn event_name(evt: &NormalizedEvent) -> &'static str {
    match evt {
        NormalizedEvent::StreamStart { .. } => "stream.start",
        NormalizedEvent::MessageDelta { .. } => "message.delta",
        NormalizedEvent::Error { .. } => "error",
        NormalizedEvent::Done => "done",
    }
}
