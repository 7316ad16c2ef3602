//! Conversation runner: the single-node chat graph.
//!
//! A submission moves through `Idle → Streaming → Completed` or
//! `Idle → Streaming → Failed`:
//! 1. Append the user message to the thread's history
//! 2. Send the full ordered history to the model
//! 3. Yield each response fragment as soon as the model produces it
//! 4. On completion, persist the concatenated reply as an assistant message
//!
//! If the model fails at any point the partial reply is discarded; the user
//! message stays in the history. Nothing is retried.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use thread_chat::llm::ScriptedDriver;
//! use thread_chat::runner::ConversationRunner;
//! use thread_chat::thread::{MessageStore, ThreadRegistry};
//!
//! # tokio_test_block_on(async {
//! let store = MessageStore::new();
//! let registry = ThreadRegistry::new(store.clone());
//! let runner = ConversationRunner::new(Arc::new(ScriptedDriver::new(["4", "."])), store.clone());
//!
//! let thread = registry.create_thread();
//! let fragments: Vec<_> = runner.submit(&thread, "2+2?").unwrap().collect().await;
//! assert_eq!(fragments.len(), 2);
//! assert_eq!(store.read(thread.as_str())[1].content, "4.");
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::sync::Arc;

use futures::{Stream, StreamExt};
use uuid::Uuid;

use crate::error::ChatError;
use crate::llm::{ChatCompletionsDriver, LlmDriver, LlmRequest, LlmSettings, Message};
use crate::normalized::NormalizedEvent;
use crate::thread::{MessageStore, ThreadId};

/// Lifecycle of a single submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Streaming,
    Completed,
    Failed,
}

/// Runs submissions against a thread's history and a model driver.
#[derive(Clone)]
pub struct ConversationRunner {
    store: MessageStore,
    driver: Arc<dyn LlmDriver>,
}

impl std::fmt::Debug for ConversationRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationRunner")
            .field("store", &self.store)
            .field("driver", &"LlmDriver")
            .finish()
    }
}

impl ConversationRunner {
    /// Create a runner over an explicit driver.
    #[must_use]
    pub fn new(driver: Arc<dyn LlmDriver>, store: MessageStore) -> Self {
        Self { store, driver }
    }

    /// Create a runner that talks to an OpenAI-compatible endpoint.
    #[must_use]
    pub fn from_settings(settings: LlmSettings, store: MessageStore) -> Self {
        Self::new(Arc::new(ChatCompletionsDriver::new(settings)), store)
    }

    #[must_use]
    pub fn store(&self) -> &MessageStore {
        &self.store
    }

    /// Submit a user message to a thread and stream the reply.
    ///
    /// The user message is appended before this returns, so a thread that
    /// was never created fails immediately with [`ChatError::NotFound`].
    /// The returned stream is lazy: the model is not contacted until it is
    /// polled. It yields each fragment in generation order and ends either
    /// after the last fragment (the reply is then persisted) or after a
    /// single [`ChatError::ModelUnavailable`] item (nothing is persisted).
    pub fn submit(
        &self,
        thread_id: &ThreadId,
        user_text: impl Into<String>,
    ) -> Result<impl Stream<Item = Result<String, ChatError>> + Send + 'static, ChatError> {
        self.submit_with_request_id(Uuid::new_v4().to_string(), thread_id, user_text)
    }

    /// Like [`submit`](Self::submit), tagging every log line with `request_id`.
    pub fn submit_with_request_id(
        &self,
        request_id: impl Into<String>,
        thread_id: &ThreadId,
        user_text: impl Into<String>,
    ) -> Result<impl Stream<Item = Result<String, ChatError>> + Send + 'static, ChatError> {
        self.store.append(thread_id, Message::user(user_text))?;

        let messages = self.store.read(thread_id.as_str());
        let request_id = request_id.into();
        let thread_id = thread_id.clone();
        let store = self.store.clone();
        let driver = Arc::clone(&self.driver);

        tracing::info!(
            request_id = %request_id,
            thread_id = %thread_id,
            message_count = messages.len(),
            "Submitting message"
        );

        let stream = async_stream::stream! {
            let mut state = SubmissionState::Idle;
            let mut reply = String::new();
            let mut fragment_count = 0usize;

            let driver_stream = match driver.stream(LlmRequest { messages }).await {
                Ok(s) => {
                    state = SubmissionState::Streaming;
                    tracing::debug!(request_id = %request_id, state = ?state, "Model stream opened");
                    s
                }
                Err(e) => {
                    let err = ChatError::from(e);
                    tracing::error!(
                        request_id = %request_id,
                        thread_id = %thread_id,
                        from_state = ?state,
                        error = %err,
                        "Failed to open model stream"
                    );
                    yield Err(err);
                    return;
                }
            };

            futures::pin_mut!(driver_stream);
            while let Some(result) = driver_stream.next().await {
                match result {
                    Ok(NormalizedEvent::MessageDelta { text }) => {
                        fragment_count += 1;
                        reply.push_str(&text);
                        tracing::trace!(request_id = %request_id, delta_length = text.len(), "Fragment");
                        yield Ok(text);
                    }
                    Ok(NormalizedEvent::Done) => {
                        state = SubmissionState::Completed;
                        break;
                    }
                    Ok(NormalizedEvent::Error { message, .. }) => {
                        state = SubmissionState::Failed;
                        tracing::error!(
                            request_id = %request_id,
                            thread_id = %thread_id,
                            state = ?state,
                            error = %message,
                            "Model reported an error"
                        );
                        yield Err(ChatError::ModelUnavailable(message));
                        return;
                    }
                    Ok(NormalizedEvent::StreamStart { .. }) => {}
                    Err(e) => {
                        state = SubmissionState::Failed;
                        let err = ChatError::from(e);
                        tracing::error!(
                            request_id = %request_id,
                            thread_id = %thread_id,
                            fragment_count,
                            state = ?state,
                            error = %err,
                            "Model stream failed, discarding partial reply"
                        );
                        yield Err(err);
                        return;
                    }
                }
            }

            if state != SubmissionState::Completed {
                tracing::error!(
                    request_id = %request_id,
                    thread_id = %thread_id,
                    fragment_count,
                    "Model stream ended before completion, discarding partial reply"
                );
                yield Err(ChatError::ModelUnavailable(
                    "model stream ended before completion".to_string(),
                ));
                return;
            }

            let content_length = reply.len();
            if let Err(err) = store.append(&thread_id, Message::assistant(reply)) {
                yield Err(err);
                return;
            }

            tracing::info!(
                request_id = %request_id,
                thread_id = %thread_id,
                fragment_count,
                content_length,
                state = ?state,
                "Saved assistant reply"
            );
        };

        Ok(stream)
    }

    /// Submit a message and wait for the complete reply.
    pub async fn invoke(
        &self,
        thread_id: &ThreadId,
        user_text: impl Into<String>,
    ) -> Result<String, ChatError> {
        let stream = self.submit(thread_id, user_text)?;
        futures::pin_mut!(stream);

        let mut reply = String::new();
        while let Some(fragment) = stream.next().await {
            reply.push_str(&fragment?);
        }
        Ok(reply)
    }
}
