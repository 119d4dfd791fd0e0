//! Configuration module for the revision client.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::time::Duration;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend API root, without trailing slash
    pub api_base_url: String,
    /// Bearer access token issued by the auth collaborator
    pub auth_token: Option<String>,
    /// IANA timezone sent so the backend can compute "today" locally
    pub timezone: Option<String>,
    /// Exit-animation window before an optimistic removal is committed
    pub presentation_delay: Duration,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

const DEFAULT_PRESENTATION_DELAY_MS: u64 = 500;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let api_base_url = env::var("SRS_API_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8000/api".to_string())
            .trim_end_matches('/')
            .to_string();

        let auth_token = env::var("SRS_AUTH_TOKEN").ok().filter(|t| !t.is_empty());
        let timezone = env::var("SRS_TIMEZONE").ok().filter(|t| !t.is_empty());

        let presentation_delay = Duration::from_millis(parse_or_default(
            "SRS_PRESENTATION_DELAY_MS",
            DEFAULT_PRESENTATION_DELAY_MS,
        ));

        let request_timeout = Duration::from_secs(parse_or_default(
            "SRS_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        ));

        let log_level = env::var("SRS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            api_base_url,
            auth_token,
            timezone,
            presentation_delay,
            request_timeout,
            log_level,
        }
    }
}

fn parse_or_default(name: &str, default: u64) -> u64 {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid {} value {:?}, using {}", name, raw, default);
            default
        }),
        Err(_) => default,
    }
}
