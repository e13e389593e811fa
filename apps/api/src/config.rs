use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// JSON document rewritten on every store mutation.
    pub store_path: PathBuf,
    pub persist_timeout: Duration,
    /// Reported in analytics as `model_info`; not used for any call.
    pub model_name: String,
    pub model_framework: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: env_or("PORT", "8080")
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: env_or("RUST_LOG", "info"),
            store_path: PathBuf::from(env_or("EVALUATION_STORE_PATH", "model_evaluations.json")),
            persist_timeout: Duration::from_secs(
                env_or("PERSIST_TIMEOUT_SECS", "30")
                    .parse::<u64>()
                    .context("PERSIST_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            model_name: env_or("MODEL_NAME", "gpt-3.5-turbo"),
            model_framework: env_or("MODEL_FRAMEWORK", "LangChain"),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
