//! Console configuration loaded from environment variables.

use std::time::Duration;

use laneguard_client::client::ws_base_from_http;
use laneguard_client::poller::DEFAULT_POLL_INTERVAL;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Where the detection service lives and how to talk to it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleConfig {
    /// HTTP base URL, without a trailing slash.
    pub api_url: String,
    /// WebSocket base URL for the realtime stream.
    pub ws_url: String,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be {expected}, got {value:?}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl ConsoleConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                         |
    /// |------------------------|---------------------------------|
    /// | `LANEGUARD_API_URL`    | `http://127.0.0.1:8000`         |
    /// | `LANEGUARD_WS_URL`     | API URL with `http` → `ws`      |
    /// | `POLL_INTERVAL_MS`     | `800`                           |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                            |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), reading variables through
    /// `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_url = non_empty(lookup("LANEGUARD_API_URL"))
            .unwrap_or_else(|| DEFAULT_API_URL.into())
            .trim_end_matches('/')
            .to_string();

        let ws_url = non_empty(lookup("LANEGUARD_WS_URL"))
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| ws_base_from_http(&api_url));

        let poll_interval = match non_empty(lookup("POLL_INTERVAL_MS")) {
            Some(raw) => Duration::from_millis(parse_positive("POLL_INTERVAL_MS", raw)?),
            None => DEFAULT_POLL_INTERVAL,
        };

        let request_timeout = match non_empty(lookup("REQUEST_TIMEOUT_SECS")) {
            Some(raw) => Duration::from_secs(parse_positive("REQUEST_TIMEOUT_SECS", raw)?),
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        Ok(Self {
            api_url,
            ws_url,
            poll_interval,
            request_timeout,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_positive(var: &'static str, raw: String) -> Result<u64, ConfigError> {
    match raw.parse::<u64>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError::Invalid {
            var,
            value: raw,
            expected: "a positive integer",
        }),
    }
}
