//! thread-chat server
//!
//! Entry point for the multi-thread streaming chat service.

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::sync::Arc;

use dotenvy::dotenv;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use thread_chat::config::{AppConfig, load_llm_settings};
use thread_chat::server::{build_driver, start_server};

#[tokio::main]
async fn main() {
    // Load .env (if present) before anything reads the environment.
    let _ = dotenv();

    let config = match AppConfig::load() {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(config.logging.json);

    let settings = match load_llm_settings() {
        Ok(s) => s,
        Err(msg) => {
            eprintln!("Configuration error: {msg}");
            std::process::exit(1);
        }
    };

    let driver = build_driver(settings);

    if let Err(e) = start_server(config, driver).await {
        tracing::error!(error = %e, "Server terminated");
        std::process::exit(1);
    }
}

/// Initialize tracing (M-LOG-STRUCTURED).
///
/// `LOG_FORMAT=json` forces JSON output regardless of configuration.
fn init_tracing(json_from_config: bool) {
    let json = json_from_config
        || std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(json.then(|| fmt::layer().json().with_target(true)))
        .with((!json).then(|| fmt::layer().with_target(true)))
        .with(filter)
        .init();
}
