use std::time::Duration;

use anyhow::{Context, Result};

use crate::profiling::session::SessionLimits;

const DEFAULT_LLM_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";

/// Application configuration loaded from environment variables.
/// Fails at startup if a required variable is missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm_api_key: String,
    pub llm_base_url: String,
    pub llm_timeout: Duration,
    pub max_upload_bytes: usize,
    pub session_idle_ttl: Duration,
    pub max_sessions: usize,
    pub port: u16,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            llm_api_key: require_env("LLM_API_KEY")?,
            llm_base_url: std::env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_LLM_BASE_URL.to_string()),
            llm_timeout: Duration::from_secs(
                parse_env("LLM_TIMEOUT_SECS", 120)
                    .context("LLM_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", 10 * 1024 * 1024)
                .context("MAX_UPLOAD_BYTES must be a byte count")?,
            session_idle_ttl: Duration::from_secs(
                parse_env("SESSION_IDLE_TTL_SECS", 3600)
                    .context("SESSION_IDLE_TTL_SECS must be a whole number of seconds")?,
            ),
            max_sessions: parse_env("MAX_SESSIONS", 1000)
                .context("MAX_SESSIONS must be a session count")?,
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            idle_ttl: self.session_idle_ttl,
            max_sessions: self.max_sessions,
            ..SessionLimits::default()
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => Ok(raw.trim().parse::<T>()?),
        Err(_) => Ok(default),
    }
}
