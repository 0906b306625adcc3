//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development. Nothing optional is fatal when absent:
//! a missing database URL selects the in-memory stores and missing model
//! credentials leave the analysis capability unavailable.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const GEMINI_DEFAULT_MODEL: &str = "gemini-1.5-flash";
const MAX_AI_RETRIES: u32 = 10;
const GEMINI_OPENAI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Which hosted model API the analysis capability talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AiProvider {
    OpenAi,
    Gemini,
}

/// Credentials and endpoint for the analysis capability.
#[derive(Clone, Debug)]
pub struct AiSettings {
    pub provider: AiProvider,
    pub api_key: String,
    /// `None` keeps the client's default OpenAI base URL.
    pub api_base: Option<String>,
    pub model: String,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: Option<String>,
    pub log_level: Level,
    /// `None` when no model credential was supplied.
    pub ai: Option<AiSettings>,
    pub ai_timeout: Duration,
    pub ai_max_retries: u32,
    pub require_ai_capability: bool,
    /// Characters of document text kept per history record; 0 keeps everything.
    pub history_excerpt_chars: usize,
    pub session_ttl: chrono::Duration,
    pub cookie_secure: bool,
    pub cors_origin: String,
    pub login_page_url: String,
    pub app_page_url: String,
    pub max_upload_bytes: usize,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset.
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        // --- Load Server and Database Settings ---
        let bind_address = parse_or(&var, "BIND_ADDRESS", "0.0.0.0:3000".parse::<SocketAddr>())?;
        let database_url = var("DATABASE_URL");

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Model Settings (as optional) ---
        let ai = match (var("OPENAI_API_KEY"), var("GEMINI_API_KEY")) {
            (Some(api_key), _) => Some(AiSettings {
                provider: AiProvider::OpenAi,
                api_key,
                api_base: var("AI_API_BASE"),
                model: var("AI_MODEL").unwrap_or_else(|| OPENAI_DEFAULT_MODEL.to_string()),
            }),
            (None, Some(api_key)) => Some(AiSettings {
                provider: AiProvider::Gemini,
                api_key,
                api_base: Some(var("AI_API_BASE").unwrap_or_else(|| GEMINI_OPENAI_BASE.to_string())),
                model: var("AI_MODEL").unwrap_or_else(|| GEMINI_DEFAULT_MODEL.to_string()),
            }),
            (None, None) => None,
        };

        let ai_timeout_secs: u64 = parse_or(&var, "AI_TIMEOUT_SECS", Ok(20))?;
        if ai_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "AI_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let ai_max_retries: u32 = parse_or(&var, "AI_MAX_RETRIES", Ok(0))?;
        if ai_max_retries > MAX_AI_RETRIES {
            return Err(ConfigError::InvalidValue(
                "AI_MAX_RETRIES".to_string(),
                format!("must be at most {}", MAX_AI_RETRIES),
            ));
        }
        let require_ai_capability = parse_bool_or(&var, "REQUIRE_AI_CAPABILITY", false)?;

        // --- Load History and Session Settings ---
        let history_excerpt_chars = parse_or(&var, "HISTORY_EXCERPT_CHARS", Ok(300))?;
        let session_ttl_hours: i64 = parse_or(&var, "SESSION_TTL_HOURS", Ok(24 * 30))?;
        if session_ttl_hours <= 0 {
            return Err(ConfigError::InvalidValue(
                "SESSION_TTL_HOURS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        let cookie_secure = parse_bool_or(&var, "COOKIE_SECURE", true)?;

        // --- Load Browser-facing Settings ---
        let cors_origin = var("CORS_ORIGIN").unwrap_or_else(|| "http://127.0.0.1:5500".to_string());
        let login_page_url = var("LOGIN_PAGE_URL")
            .unwrap_or_else(|| "http://127.0.0.1:5500/frontend/index.html".to_string());
        let app_page_url = var("APP_PAGE_URL")
            .unwrap_or_else(|| "http://127.0.0.1:5500/frontend/app.html".to_string());
        let max_upload_bytes = parse_or(&var, "MAX_UPLOAD_BYTES", Ok(10 * 1024 * 1024))?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            ai,
            ai_timeout: Duration::from_secs(ai_timeout_secs),
            ai_max_retries,
            require_ai_capability,
            history_excerpt_chars,
            session_ttl: chrono::Duration::hours(session_ttl_hours),
            cookie_secure,
            cors_origin,
            login_page_url,
            app_page_url,
            max_upload_bytes,
        })
    }
}

fn parse_or<T, V>(var: &V, key: &str, default: Result<T, T::Err>) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    V: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => default.map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
    }
}

fn parse_bool_or<V>(var: &V, key: &str, default: bool) -> Result<bool, ConfigError>
where
    V: Fn(&str) -> Option<String>,
{
    match var(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => Err(ConfigError::InvalidValue(
            key.to_string(),
            format!("'{}' is not a boolean", v),
        )),
    }
}
