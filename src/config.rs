//! Layered application configuration.
//!
//! Priority: CLI flag (or its env var) > `CHAT_`-prefixed environment
//! variables > config file > defaults.

use crate::llm::{LlmSettings, Provider};
use crate::llm::provider::DEFAULT_AZURE_API_VERSION;
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Default model endpoint when `LLM_BASE_URL` is unset.
pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com";

/// Default model when `LLM_MODEL` is unset.
pub const DEFAULT_LLM_MODEL: &str = "gpt-3.5-turbo";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Host to bind
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Upper bound on producing response headers; streamed bodies are not cut.
    pub request_timeout_secs: u64,
    /// Idle time after which a UI session view is dropped.
    pub session_timeout_secs: u64,
    /// How often expired UI sessions are swept.
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub json: bool,
}

impl ServerConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }

    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let mut builder = Config::builder()
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.request_timeout_secs", 30)?
            .set_default("server.session_timeout_secs", 30 * 60)?
            .set_default("server.cleanup_interval_secs", 5 * 60)?
            .set_default("logging.json", false)?;

        // An explicit file must exist; ./config.{yaml,toml,json} is optional.
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path)),
            None => builder.add_source(File::with_name("config").required(false)),
        };

        // E.g. CHAT_SERVER__PORT=8000
        builder = builder.add_source(
            Environment::with_prefix("CHAT")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", port)?;
        }
        if let Some(json) = cli.log_json {
            builder = builder.set_override("logging.json", json)?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}

/// Which model driver the binary should use.
#[derive(Debug, Clone)]
pub enum DriverSettings {
    /// OpenAI-compatible Chat Completions endpoint.
    Remote(LlmSettings),
    /// Offline driver that echoes the last user message.
    Scripted,
}

pub fn load_llm_settings() -> Result<DriverSettings, String> {
    if env::var("LLM_PROVIDER").is_ok_and(|p| p.eq_ignore_ascii_case("scripted")) {
        return Ok(DriverSettings::Scripted);
    }

    let base_url = env::var("LLM_BASE_URL").unwrap_or_else(|_| DEFAULT_LLM_BASE_URL.to_string());
    if base_url.trim().is_empty() {
        return Err("LLM_BASE_URL cannot be empty".to_string());
    }

    let model = env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_LLM_MODEL.to_string());
    if model.trim().is_empty() {
        return Err("LLM_MODEL cannot be empty".to_string());
    }

    let api_key = env::var("LLM_API_KEY")
        .or_else(|_| env::var("OPENAI_API_KEY"))
        .ok()
        .filter(|s| !s.trim().is_empty());

    let mut provider = Provider::detect_from_url(&base_url);
    if let Provider::AzureOpenAI { .. } = &provider {
        let deployment_name = env::var("AZURE_DEPLOYMENT_NAME")
            .map_err(|_| "AZURE_DEPLOYMENT_NAME is required for Azure OpenAI".to_string())?;
        provider = Provider::AzureOpenAI {
            deployment_name,
            api_version: env::var("AZURE_API_VERSION")
                .unwrap_or_else(|_| DEFAULT_AZURE_API_VERSION.to_string()),
        };
    }

    if api_key.is_none() && provider != Provider::Generic {
        return Err("Missing API key: set LLM_API_KEY or OPENAI_API_KEY".to_string());
    }

    Ok(DriverSettings::Remote(LlmSettings {
        base_url,
        api_key,
        model,
        provider,
    }))
}
