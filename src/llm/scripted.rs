//! In-process driver that replays canned fragments.
//!
//! Used by tests to exercise the streaming path deterministically, and by
//! the binary when `LLM_PROVIDER=scripted` for running without network access.

use std::sync::{Arc, Mutex, PoisonError};

use crate::normalized::NormalizedEvent;

use super::{EventStream, LlmDriver, LlmRequest, MessageRole};

#[derive(Debug, Clone)]
enum Script {
    /// Emit these fragments, then `Done`.
    Fragments(Vec<String>),
    /// Echo the last user message back as a single fragment.
    Echo,
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    None,
    /// Refuse the request before any output.
    OnConnect,
    /// Emit this many fragments, then fail.
    AfterFragments(usize),
    /// Emit every fragment but end without signalling completion.
    Truncated,
}

/// Driver that replays a fixed script instead of calling a model.
///
/// Every request it receives is recorded and can be inspected with
/// [`ScriptedDriver::requests`].
#[derive(Debug, Clone)]
pub struct ScriptedDriver {
    script: Script,
    failure: Failure,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
}

impl ScriptedDriver {
    /// Reply with `fragments`, in order, then complete.
    #[must_use]
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_script(Script::Fragments(
            fragments.into_iter().map(Into::into).collect(),
        ))
    }

    /// Reply with the content of the most recent user message.
    #[must_use]
    pub fn echo() -> Self {
        Self::with_script(Script::Echo)
    }

    fn with_script(script: Script) -> Self {
        Self {
            script,
            failure: Failure::None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail the request before producing any output.
    #[must_use]
    pub fn failing_on_connect(mut self) -> Self {
        self.failure = Failure::OnConnect;
        self
    }

    /// Fail mid-stream after `n` fragments have been emitted.
    ///
    /// An `n` at or past the end of the script fails after the last fragment;
    /// the stream never completes.
    #[must_use]
    pub fn failing_after(mut self, n: usize) -> Self {
        self.failure = Failure::AfterFragments(n);
        self
    }

    /// End the stream without a completion signal.
    #[must_use]
    pub fn truncated(mut self) -> Self {
        self.failure = Failure::Truncated;
        self
    }

    /// Requests received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn fragments_for(&self, req: &LlmRequest) -> Vec<String> {
        match &self.script {
            Script::Fragments(fragments) => fragments.clone(),
            Script::Echo => req
                .messages
                .iter()
                .rev()
                .find(|m| m.role == MessageRole::User)
                .map(|m| vec![m.content.clone()])
                .unwrap_or_default(),
        }
    }
}

#[async_trait::async_trait]
impl LlmDriver for ScriptedDriver {
    async fn stream(&self, req: LlmRequest) -> anyhow::Result<EventStream> {
        let fragments = self.fragments_for(&req);
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(req);

        let failure = self.failure;
        if matches!(failure, Failure::OnConnect) {
            anyhow::bail!("scripted model refused the request");
        }

        let out = async_stream::stream! {
            let mut emitted = 0usize;
            for text in fragments {
                if let Failure::AfterFragments(n) = failure
                    && emitted == n
                {
                    break;
                }
                emitted += 1;
                yield Ok::<_, anyhow::Error>(NormalizedEvent::MessageDelta { text });
            }
            match failure {
                Failure::AfterFragments(_) => {
                    yield Err(anyhow::anyhow!("scripted stream interrupted after {emitted} fragments"));
                }
                Failure::Truncated => {}
                Failure::None | Failure::OnConnect => {
                    yield Ok(NormalizedEvent::Done);
                }
            }
        };

        Ok(Box::pin(out))
    }
}
