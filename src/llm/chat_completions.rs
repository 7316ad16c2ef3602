//! OpenAI Chat Completions API driver.
//!
//! This module implements the [`LlmDriver`] trait for OpenAI-compatible
//! Chat Completions endpoints (`/v1/chat/completions`), streaming text
//! fragments as they are generated.

use anyhow::Context;
use futures::StreamExt;

use crate::normalized::NormalizedEvent;

use super::provider::AuthStyle;
use super::{EventStream, LlmDriver, LlmRequest, LlmSettings};

/// Driver for the OpenAI Chat Completions API.
///
/// Sends the full conversation history with `stream: true` and converts
/// the SSE response into [`NormalizedEvent`]s.
#[derive(Clone)]
pub struct ChatCompletionsDriver {
    http: reqwest::Client,
    settings: LlmSettings,
}

impl std::fmt::Debug for ChatCompletionsDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatCompletionsDriver")
            .field("base_url", &self.settings.base_url)
            .field("model", &self.settings.model)
            .field("provider", &self.settings.provider)
            .finish_non_exhaustive()
    }
}

impl ChatCompletionsDriver {
    /// Create a new Chat Completions driver with the given settings.
    #[must_use]
    pub fn new(settings: LlmSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    fn request_body(&self, req: &LlmRequest) -> serde_json::Value {
        serde_json::json!({
            "model": self.settings.model,
            "stream": true,
            "messages": req.messages,
        })
    }
}

#[async_trait::async_trait]
impl LlmDriver for ChatCompletionsDriver {
    async fn stream(&self, req: LlmRequest) -> anyhow::Result<EventStream> {
        let url = self
            .settings
            .provider
            .build_chat_url(&self.settings.base_url);

        tracing::debug!(
            url = %url,
            model = %self.settings.model,
            message_count = req.messages.len(),
            "Sending chat completions request"
        );

        let mut rb = self.http.post(&url).json(&self.request_body(&req));
        if let Some(k) = &self.settings.api_key {
            rb = match self.settings.provider.auth_style() {
                AuthStyle::Bearer => rb.bearer_auth(k),
                AuthStyle::ApiKeyHeader => rb.header("api-key", k),
            };
        }

        let resp = rb
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()?;
        let byte_stream = resp.bytes_stream();

        let out: EventStream = Box::pin(async_stream::try_stream! {
            let mut frames = FrameBuffer::default();

            futures::pin_mut!(byte_stream);
            while let Some(chunk) = byte_stream.next().await {
                let chunk = chunk?;
                frames.push(&chunk);

                while let Some(frame) = frames.next_frame() {
                    for event in parse_frame(&frame)? {
                        yield event;
                    }
                }
            }

            // A last frame may arrive without its terminating blank line.
            if let Some(frame) = frames.finish() {
                for event in parse_frame(&frame)? {
                    yield event;
                }
            }
        });

        Ok(out)
    }
}

/// Parse one SSE line of a chat completions stream.
///
/// Non-`data:` lines produce no events. A non-null `finish_reason` and the
/// `[DONE]` sentinel both produce [`NormalizedEvent::Done`]; consumers stop
/// at the first one.
fn parse_data_line(line: &str) -> anyhow::Result<Vec<NormalizedEvent>> {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(Vec::new());
    };
    let data = data.trim();

    if data == "[DONE]" {
        return Ok(vec![NormalizedEvent::Done]);
    }

    let v: serde_json::Value =
        serde_json::from_str(data).context("malformed chat completions chunk")?;

    if let Some(err) = v.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown provider error");
        anyhow::bail!("provider error: {message}");
    }

    let mut events = Vec::new();
    let choice = &v["choices"][0];

    if let Some(s) = choice["delta"].get("content").and_then(|x| x.as_str())
        && !s.is_empty()
    {
        events.push(NormalizedEvent::MessageDelta {
            text: s.to_string(),
        });
    }

    if choice
        .get("finish_reason")
        .is_some_and(|fr| !fr.is_null())
    {
        events.push(NormalizedEvent::Done);
    }

    Ok(events)
}

/// Parse every line of one SSE frame.
///
/// Lines may end in `\n`, `\r\n` or a bare `\r`.
fn parse_frame(frame: &str) -> anyhow::Result<Vec<NormalizedEvent>> {
    let mut events = Vec::new();
    for line in frame.split(['\r', '\n']) {
        events.extend(parse_data_line(line)?);
    }
    Ok(events)
}

/// Accumulates response bytes and cuts them into SSE frames.
#[derive(Debug, Default)]
struct FrameBuffer {
    buf: Vec<u8>,
}

impl FrameBuffer {
    fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Take the next complete frame, without its terminating blank line.
    fn next_frame(&mut self) -> Option<String> {
        let (end, consumed) = find_frame_end(&self.buf)?;
        let frame = String::from_utf8_lossy(&self.buf[..end]).into_owned();
        self.buf.drain(..consumed);
        Some(frame)
    }

    /// Take whatever is left once the byte stream has ended.
    fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buf);
        let text = String::from_utf8_lossy(&rest);
        (!text.trim().is_empty()).then(|| text.into_owned())
    }
}

/// Locate the blank line ending the first frame in `buf`.
///
/// Returns the frame length and the number of bytes up to and including the
/// blank line. A `\r` at the very end is left pending since its `\n` may
/// still be in flight.
fn find_frame_end(buf: &[u8]) -> Option<(usize, usize)> {
    let mut i = 0;
    let mut line_start = 0;
    let mut frame_end = None;

    while i < buf.len() {
        let eol = match buf[i] {
            b'\n' => 1,
            b'\r' => match buf.get(i + 1) {
                Some(b'\n') => 2,
                Some(_) => 1,
                None => return None,
            },
            _ => {
                i += 1;
                continue;
            }
        };

        if i == line_start {
            if let Some(end) = frame_end {
                return Some((end, i + eol));
            }
        } else {
            frame_end = Some(i);
        }
        i += eol;
        line_start = i;
    }
    None
}
