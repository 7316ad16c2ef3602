use serial_test::serial;
use std::env;
use std::fs;
use std::io::Write;
use thread_chat::config::{AppConfig, DriverSettings, load_llm_settings};
use thread_chat::llm::Provider;

const ARGS: [&str; 1] = ["thread-chat"];

// Helper to clear environment variables that might interfere with tests
fn clear_env_vars() {
    unsafe {
        for key in [
            "CHAT_SERVER__PORT",
            "CHAT_SERVER__SESSION_TIMEOUT_SECS",
            "CHAT_LOGGING__JSON",
            "CONFIG_FILE",
            "HOST",
            "PORT",
            "LOG_JSON",
            "LLM_PROVIDER",
            "LLM_BASE_URL",
            "LLM_MODEL",
            "LLM_API_KEY",
            "OPENAI_API_KEY",
            "AZURE_DEPLOYMENT_NAME",
            "AZURE_API_VERSION",
        ] {
            env::remove_var(key);
        }
    }
}

#[test]
#[serial]
fn test_default_config() {
    clear_env_vars();

    let config = AppConfig::load_from_args(ARGS).expect("defaults should load");
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.server.host, "0.0.0.0");
    assert_eq!(config.server.request_timeout_secs, 30);
    assert_eq!(config.server.session_timeout_secs, 1800);
    assert_eq!(config.server.cleanup_interval_secs, 300);
    assert!(!config.logging.json);
}

#[test]
#[serial]
fn test_env_override() {
    clear_env_vars();
    unsafe {
        env::set_var("CHAT_SERVER__PORT", "9090");
        env::set_var("CHAT_LOGGING__JSON", "true");
    }

    let config = AppConfig::load_from_args(ARGS).expect("Failed to load config");
    assert_eq!(config.server.port, 9090);
    assert!(config.logging.json);

    clear_env_vars();
}

#[test]
#[serial]
fn test_cli_beats_env() {
    clear_env_vars();
    unsafe {
        env::set_var("CHAT_SERVER__PORT", "9090");
    }

    let config = AppConfig::load_from_args(["thread-chat", "--port", "4040"])
        .expect("Failed to load config");
    assert_eq!(config.server.port, 4040);

    clear_env_vars();
}

#[test]
#[serial]
fn test_file_load() {
    clear_env_vars();

    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("Failed to create temp config");
    writeln!(
        file,
        "server:\n  port: 7070\n  session_timeout_secs: 60\nlogging:\n  json: true"
    )
    .expect("Failed to write temp config");

    // Tell AppConfig to use this file via Env Var (mocking CLI arg indirectly)
    unsafe {
        env::set_var("CONFIG_FILE", file.path());
    }

    let config = AppConfig::load_from_args(ARGS).expect("Failed to load config from file");
    assert_eq!(config.server.port, 7070);
    assert_eq!(config.server.session_timeout_secs, 60);
    assert_eq!(config.server.host, "0.0.0.0");
    assert!(config.logging.json);

    clear_env_vars();
}

#[test]
#[serial]
fn test_env_beats_file() {
    clear_env_vars();

    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("Failed to create temp config");
    writeln!(file, "server:\n  port: 7070").expect("Failed to write temp config");

    unsafe {
        env::set_var("CONFIG_FILE", file.path());
        env::set_var("CHAT_SERVER__PORT", "8181");
    }

    let config = AppConfig::load_from_args(ARGS).expect("Failed to load config");
    assert_eq!(config.server.port, 8181);

    clear_env_vars();
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    clear_env_vars();

    let result = AppConfig::load_from_args(["thread-chat", "--config", "/nonexistent/chat.yaml"]);
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_cwd_config_fallback() {
    clear_env_vars();

    let cwd_path = "config.yaml";
    fs::write(cwd_path, "server:\n  port: 6060\n").expect("Failed to write ./config.yaml");

    let config = AppConfig::load_from_args(ARGS);

    fs::remove_file(cwd_path).expect("Failed to remove ./config.yaml");

    assert_eq!(config.expect("Failed to load config").server.port, 6060);
}

#[test]
#[serial]
fn test_llm_settings_defaults() {
    clear_env_vars();
    unsafe {
        env::set_var("OPENAI_API_KEY", "sk-test");
    }

    let settings = load_llm_settings().expect("settings should load");
    let DriverSettings::Remote(settings) = settings else {
        panic!("expected a remote driver");
    };
    assert_eq!(settings.base_url, "https://api.openai.com");
    assert_eq!(settings.model, "gpt-3.5-turbo");
    assert_eq!(settings.api_key.as_deref(), Some("sk-test"));
    assert_eq!(settings.provider, Provider::OpenAI);

    clear_env_vars();
}

#[test]
#[serial]
fn test_llm_settings_require_api_key_for_hosted_providers() {
    clear_env_vars();

    assert!(load_llm_settings().is_err());
}

#[test]
#[serial]
fn test_llm_settings_azure_needs_deployment() {
    clear_env_vars();
    unsafe {
        env::set_var("LLM_BASE_URL", "https://example.openai.azure.com");
        env::set_var("LLM_API_KEY", "key");
    }
    assert!(load_llm_settings().is_err());

    unsafe {
        env::set_var("AZURE_DEPLOYMENT_NAME", "gpt-4o");
    }
    let DriverSettings::Remote(settings) = load_llm_settings().expect("azure settings") else {
        panic!("expected a remote driver");
    };
    assert!(matches!(
        settings.provider,
        Provider::AzureOpenAI { ref deployment_name, .. } if deployment_name == "gpt-4o"
    ));

    clear_env_vars();
}

#[test]
#[serial]
fn test_llm_settings_scripted() {
    clear_env_vars();
    unsafe {
        env::set_var("LLM_PROVIDER", "scripted");
    }

    assert!(matches!(load_llm_settings(), Ok(DriverSettings::Scripted)));

    clear_env_vars();
}
