use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Path, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use tracing::info;

use crate::AppState;
use crate::config::{AppConfig, DriverSettings};
use crate::error::ChatError;
use crate::llm::{ChatCompletionsDriver, LlmDriver, Message, ScriptedDriver};
use crate::normalized::{NormalizedEvent, sse_event};
use crate::session::{Session, SessionSnapshot, SessionStore};
use crate::thread::{MessageStore, ThreadId, ThreadSummary};

/// Build the model driver selected by the environment.
#[must_use]
pub fn build_driver(settings: DriverSettings) -> Arc<dyn LlmDriver> {
    match settings {
        DriverSettings::Remote(settings) => {
            info!(
                name: "llm.config.loaded",
                base_url = %settings.base_url,
                model = %settings.model,
                provider = ?settings.provider,
                "LLM configuration loaded"
            );
            Arc::new(ChatCompletionsDriver::new(settings))
        }
        DriverSettings::Scripted => {
            info!(name: "llm.config.loaded", provider = "scripted", "Using offline echo driver");
            Arc::new(ScriptedDriver::echo())
        }
    }
}

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>, driver: Arc<dyn LlmDriver>) -> anyhow::Result<()> {
    let state = AppState::new(driver, Arc::clone(&config));

    spawn_session_janitor(
        state.sessions.clone(),
        config.server.cleanup_interval(),
        config.server.session_timeout(),
    );

    let app = build_router(state);

    let addr = config.server.address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

/// Build the application router.
pub fn build_router(state: AppState) -> Router {
    // Bounds the time to produce response headers; SSE bodies keep streaming.
    let timeout_duration = state.config.server.request_timeout();

    Router::new()
        .route("/health", get(health))
        // Web-app front-end
        .route("/api/sessions", post(api_create_session))
        .route("/api/sessions/{sid}", get(api_get_session))
        .route("/api/sessions/{sid}/threads", post(api_new_chat))
        .route("/api/sessions/{sid}/active", put(api_set_active))
        .route("/api/sessions/{sid}/chat", post(api_session_chat))
        .route("/api/threads", get(api_list_threads))
        .route("/api/threads/{id}/messages", get(api_get_messages))
        // Chat-widget front-end
        .route("/api/widget/chat", post(api_widget_chat))
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .layer(axum::middleware::from_fn(
            move |req: Request, next: Next| {
                let duration = timeout_duration;
                async move {
                    match tokio::time::timeout(duration, next.run(req)).await {
                        Ok(res) => res,
                        Err(_) => {
                            (StatusCode::REQUEST_TIMEOUT, "Request timed out").into_response()
                        }
                    }
                }
            },
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Periodically drop UI sessions that have been idle too long.
fn spawn_session_janitor(
    sessions: SessionStore,
    every: Duration,
    timeout: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        // The first tick completes immediately.
        interval.tick().await;
        loop {
            interval.tick().await;
            let removed = sessions.cleanup_expired_with_timeout(timeout);
            if removed > 0 {
                info!(
                    name: "sessions.expired",
                    removed,
                    remaining = sessions.len(),
                    "Expired idle sessions"
                );
            }
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Errors returned by the JSON endpoints.
#[derive(Debug)]
pub enum ApiError {
    /// No UI session with this id (never created, or expired).
    SessionNotFound(String),
    Chat(ChatError),
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        Self::Chat(err)
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::SessionNotFound(id) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: format!("Session not found: {id}"),
                    code: "SESSION_NOT_FOUND",
                },
            ),
            Self::Chat(err) => {
                let status = match err {
                    ChatError::NotFound(_) => StatusCode::NOT_FOUND,
                    ChatError::ModelUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                };
                (
                    status,
                    ErrorBody {
                        error: err.to_string(),
                        code: err.code(),
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

fn find_session(state: &AppState, sid: &str) -> Result<Session, ApiError> {
    state
        .sessions
        .get(sid)
        .ok_or_else(|| ApiError::SessionNotFound(sid.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// API Handlers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    threads: usize,
    sessions: usize,
}

/// GET /health - Liveness probe.
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        threads: state.registry.len(),
        sessions: state.sessions.len(),
    })
}

/// POST /api/sessions - Create a UI session with a fresh active thread.
async fn api_create_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    let session = state.sessions.create(&state.registry);
    Json(session.snapshot())
}

/// GET /api/sessions/:sid - Active thread and displayed messages.
async fn api_get_session(
    State(state): State<AppState>,
    Path(sid): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, &sid)?;
    session.touch();
    Ok(Json(session.snapshot()))
}

/// POST /api/sessions/:sid/threads - "New Chat".
async fn api_new_chat(
    State(state): State<AppState>,
    Path(sid): Path<String>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, &sid)?;
    session.new_chat(&state.registry);
    Ok(Json(session.snapshot()))
}

/// Request body for switching the active thread.
#[derive(Debug, Deserialize)]
struct SetActiveRequest {
    thread_id: ThreadId,
}

/// PUT /api/sessions/:sid/active - Switch to an existing thread.
async fn api_set_active(
    State(state): State<AppState>,
    Path(sid): Path<String>,
    Json(req): Json<SetActiveRequest>,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let session = find_session(&state, &sid)?;
    session.set_active(&req.thread_id, &state.store)?;
    Ok(Json(session.snapshot()))
}

/// Request body for the web-app chat endpoint.
#[derive(Debug, Deserialize)]
struct SessionChatRequest {
    /// User message content.
    message: String,
}

/// POST /api/sessions/:sid/chat - Submit to the active thread, SSE reply.
async fn api_session_chat(
    State(state): State<AppState>,
    Path(sid): Path<String>,
    Json(req): Json<SessionChatRequest>,
) -> Result<Response, ApiError> {
    let session = find_session(&state, &sid)?;
    let thread_id = session.active_thread();

    tracing::info!(
        session_id = %sid,
        thread_id = %thread_id,
        message_length = req.message.len(),
        "Received chat request"
    );

    let refresh = Some((session, state.store.clone()));
    Ok(stream_reply(&state, thread_id, req.message, refresh))
}

/// Request body for the widget chat endpoint.
#[derive(Debug, Deserialize)]
struct WidgetChatRequest {
    /// User message content.
    message: String,
    /// Thread to continue (creates new if not provided).
    #[serde(default)]
    session_id: Option<String>,
}

/// POST /api/widget/chat - Submit to a caller-addressed thread, SSE reply.
async fn api_widget_chat(
    State(state): State<AppState>,
    Json(req): Json<WidgetChatRequest>,
) -> Response {
    let thread_id = match req.session_id.filter(|id| !id.is_empty()) {
        Some(id) => {
            let id = ThreadId::from(id);
            if state.registry.ensure(&id) {
                tracing::debug!(thread_id = %id, "Registered widget thread");
            }
            id
        }
        None => state.registry.create_thread(),
    };

    tracing::info!(
        thread_id = %thread_id,
        message_length = req.message.len(),
        "Received widget chat request"
    );

    stream_reply(&state, thread_id, req.message, None)
}

/// GET /api/threads - Sidebar listing, newest first.
async fn api_list_threads(State(state): State<AppState>) -> Json<Vec<ThreadSummary>> {
    Json(state.registry.summaries())
}

/// GET /api/threads/:id/messages - Full history of a thread.
async fn api_get_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Message>>, ApiError> {
    if !state.registry.contains(&id) {
        return Err(ChatError::NotFound(ThreadId::from(id)).into());
    }
    Ok(Json(state.store.read(&id)))
}

// ─────────────────────────────────────────────────────────────────────────────
// SSE
// ─────────────────────────────────────────────────────────────────────────────

/// Submit `message` to `thread_id` and stream the reply as SSE.
///
/// When `refresh` is set, that session's view is rebuilt from the store once
/// the reply has finished, whether it succeeded or not.
fn stream_reply(
    state: &AppState,
    thread_id: ThreadId,
    message: String,
    refresh: Option<(Session, MessageStore)>,
) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();

    match state
        .runner
        .submit_with_request_id(request_id.clone(), &thread_id, message)
    {
        Ok(fragments) => {
            let events = reply_events(request_id, thread_id, fragments, refresh);
            build_sse_response(Body::from_stream(events))
        }
        Err(err) => {
            tracing::error!(
                request_id = %request_id,
                thread_id = %thread_id,
                error = %err,
                "Submission rejected"
            );
            single_error_sse(&err)
        }
    }
}

fn reply_events<S>(
    request_id: String,
    thread_id: ThreadId,
    fragments: S,
    refresh: Option<(Session, MessageStore)>,
) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static
where
    S: Stream<Item = Result<String, ChatError>> + Send + 'static,
{
    async_stream::stream! {
        yield Ok::<String, Infallible>(sse_event(&NormalizedEvent::StreamStart {
            request_id: request_id.clone(),
            thread_id,
        }));

        futures::pin_mut!(fragments);
        while let Some(item) = fragments.next().await {
            match item {
                Ok(text) => yield Ok(sse_event(&NormalizedEvent::MessageDelta { text })),
                Err(err) => {
                    tracing::error!(
                        request_id = %request_id,
                        error = %err,
                        code = err.code(),
                        "Stream error"
                    );
                    yield Ok(sse_event(&NormalizedEvent::from(&err)));
                    break;
                }
            }
        }

        if let Some((session, store)) = &refresh {
            session.refresh(store);
        }

        tracing::info!(request_id = %request_id, "Stream complete");
        yield Ok(sse_event(&NormalizedEvent::Done));
    }
}

fn single_error_sse(err: &ChatError) -> Response {
    let payload = format!(
        "{}{}",
        sse_event(&NormalizedEvent::from(err)),
        sse_event(&NormalizedEvent::Done)
    );
    build_sse_response(Body::from(payload))
}

fn build_sse_response(body: Body) -> Response {
    let mut resp = Response::new(body);
    let h = resp.headers_mut();
    h.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    h.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    h.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    h.insert("X-Accel-Buffering", HeaderValue::from_static("no"));
    resp
}
