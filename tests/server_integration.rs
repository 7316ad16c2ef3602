use std::sync::Arc;

use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{Value, json};

use thread_chat::AppState;
use thread_chat::config::{AppConfig, LoggingConfig, ServerConfig};
use thread_chat::llm::{LlmDriver, ScriptedDriver};
use thread_chat::server::build_router;

fn test_config() -> Arc<AppConfig> {
    Arc::new(AppConfig {
        server: ServerConfig {
            port: 0,
            host: "127.0.0.1".to_string(),
            request_timeout_secs: 30,
            session_timeout_secs: 1800,
            cleanup_interval_secs: 300,
        },
        logging: LoggingConfig { json: false },
    })
}

fn setup(driver: ScriptedDriver) -> (TestServer, AppState) {
    let driver: Arc<dyn LlmDriver> = Arc::new(driver);
    let state = AppState::new(driver, test_config());
    let server = TestServer::new(build_router(state.clone())).unwrap();
    (server, state)
}

/// Split an SSE body into `(event, data)` pairs.
fn sse_events(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter(|frame| !frame.trim().is_empty())
        .map(|frame| {
            let mut event = String::new();
            let mut data = Value::Null;
            for line in frame.lines() {
                if let Some(name) = line.strip_prefix("event: ") {
                    event = name.to_string();
                } else if let Some(payload) = line.strip_prefix("data: ") {
                    data = serde_json::from_str(payload).unwrap();
                }
            }
            (event, data)
        })
        .collect()
}

fn event_names(events: &[(String, Value)]) -> Vec<&str> {
    events.iter().map(|(name, _)| name.as_str()).collect()
}

#[tokio::test]
async fn test_health() {
    let (server, _) = setup(ScriptedDriver::echo());

    let response = server.get("/health").await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "ok");
}

#[tokio::test]
async fn test_widget_chat_without_session_creates_thread() {
    let (server, state) = setup(ScriptedDriver::new(["4", "."]));

    let response = server
        .post("/api/widget/chat")
        .json(&json!({ "message": "2+2?" }))
        .await;
    response.assert_status_ok();
    assert_eq!(
        response.header("content-type").to_str().unwrap(),
        "text/event-stream"
    );

    let events = sse_events(&response.text());
    assert_eq!(
        event_names(&events),
        vec!["stream.start", "message.delta", "message.delta", "done"]
    );
    assert_eq!(events[1].1["data"]["text"], "4");
    assert_eq!(events[2].1["data"]["text"], ".");

    let thread_id = events[0].1["data"]["thread_id"].as_str().unwrap().to_string();
    assert!(state.registry.contains(&thread_id));

    let history = server
        .get(&format!("/api/threads/{thread_id}/messages"))
        .await
        .json::<Value>();
    assert_eq!(
        history,
        json!([
            { "role": "user", "content": "2+2?" },
            { "role": "assistant", "content": "4." },
        ])
    );
}

#[tokio::test]
async fn test_widget_chat_reuses_session_id() {
    let (server, state) = setup(ScriptedDriver::echo());

    for message in ["one", "two"] {
        server
            .post("/api/widget/chat")
            .json(&json!({ "message": message, "session_id": "widget-1" }))
            .await
            .assert_status_ok();
    }

    assert_eq!(state.registry.len(), 1);
    assert_eq!(state.store.message_count("widget-1"), 4);
}

#[tokio::test]
async fn test_widget_chat_empty_session_id_creates_thread() {
    let (server, state) = setup(ScriptedDriver::echo());

    server
        .post("/api/widget/chat")
        .json(&json!({ "message": "hi", "session_id": "" }))
        .await
        .assert_status_ok();

    assert_eq!(state.registry.len(), 1);
    assert!(!state.registry.contains(""));
}

#[tokio::test]
async fn test_session_new_chat_switch_submit_round_trip() {
    let (server, state) = setup(ScriptedDriver::echo());

    let session = server.post("/api/sessions").await.json::<Value>();
    let sid = session["session_id"].as_str().unwrap().to_string();
    let first = session["active_thread"].as_str().unwrap().to_string();

    let response = server
        .post(&format!("/api/sessions/{sid}/chat"))
        .json(&json!({ "message": "hello" }))
        .await;
    response.assert_status_ok();
    let events = sse_events(&response.text());
    assert_eq!(event_names(&events).last(), Some(&"done"));
    assert_eq!(events[0].1["data"]["thread_id"], first.as_str());

    let view = server.get(&format!("/api/sessions/{sid}")).await.json::<Value>();
    assert_eq!(view["messages"].as_array().unwrap().len(), 2);
    let first_messages = view["messages"].clone();

    // New Chat
    let view = server
        .post(&format!("/api/sessions/{sid}/threads"))
        .await
        .json::<Value>();
    let second = view["active_thread"].as_str().unwrap().to_string();
    assert_ne!(second, first);
    assert_eq!(view["messages"], json!([]));

    // Switch back
    let view = server
        .put(&format!("/api/sessions/{sid}/active"))
        .json(&json!({ "thread_id": first }))
        .await
        .json::<Value>();
    assert_eq!(view["active_thread"], first.as_str());
    assert_eq!(view["messages"], first_messages);

    assert_eq!(state.registry.len(), 2);
}

#[tokio::test]
async fn test_thread_listing_is_newest_first() {
    let (server, _) = setup(ScriptedDriver::echo());

    let session = server.post("/api/sessions").await.json::<Value>();
    let sid = session["session_id"].as_str().unwrap();
    let a = session["active_thread"].as_str().unwrap().to_string();

    let b = server
        .post(&format!("/api/sessions/{sid}/threads"))
        .await
        .json::<Value>()["active_thread"]
        .as_str()
        .unwrap()
        .to_string();
    let c = server
        .post(&format!("/api/sessions/{sid}/threads"))
        .await
        .json::<Value>()["active_thread"]
        .as_str()
        .unwrap()
        .to_string();

    let listing = server.get("/api/threads").await.json::<Value>();
    let ids: Vec<&str> = listing
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![c.as_str(), b.as_str(), a.as_str()]);
    assert!(listing[0]["label"].as_str().unwrap().starts_with("Chat "));
}

#[tokio::test]
async fn test_unknown_session_is_404() {
    let (server, _) = setup(ScriptedDriver::echo());

    let response = server.get("/api/sessions/nope").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["code"], "SESSION_NOT_FOUND");

    server
        .post("/api/sessions/nope/chat")
        .json(&json!({ "message": "hi" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unknown_thread_is_404() {
    let (server, _) = setup(ScriptedDriver::echo());

    let response = server.get("/api/threads/ghost/messages").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["code"], "THREAD_NOT_FOUND");

    let session = server.post("/api/sessions").await.json::<Value>();
    let sid = session["session_id"].as_str().unwrap();
    let response = server
        .put(&format!("/api/sessions/{sid}/active"))
        .json(&json!({ "thread_id": "ghost" }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["code"], "THREAD_NOT_FOUND");
}

#[tokio::test]
async fn test_model_failure_streams_error_then_done() {
    let (server, state) = setup(ScriptedDriver::new(["4", ".", "!"]).failing_after(1));

    let session = server.post("/api/sessions").await.json::<Value>();
    let sid = session["session_id"].as_str().unwrap().to_string();
    let thread = session["active_thread"].as_str().unwrap().to_string();

    let response = server
        .post(&format!("/api/sessions/{sid}/chat"))
        .json(&json!({ "message": "2+2?" }))
        .await;
    response.assert_status_ok();

    let events = sse_events(&response.text());
    assert_eq!(
        event_names(&events),
        vec!["stream.start", "message.delta", "error", "done"]
    );
    assert_eq!(events[2].1["data"]["code"], "MODEL_UNAVAILABLE");

    // Partial reply discarded, user message kept; the view reflects that.
    assert_eq!(state.store.message_count(&thread), 1);
    let view = server.get(&format!("/api/sessions/{sid}")).await.json::<Value>();
    assert_eq!(view["messages"], json!([{ "role": "user", "content": "2+2?" }]));
}
