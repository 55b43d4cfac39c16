//! Chat client configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Missing or unparsable numeric values
//! fall back to defaults; malformed URLs are rejected.

use std::time::Duration;

use crate::domain::ConversationPolicy;
use crate::error::ChatError;

/// Top-level chat client configuration.
///
/// Loaded once at startup via [`ChatClientConfig::from_env`], or built from
/// [`ChatClientConfig::default`] in tests.
#[derive(Debug, Clone)]
pub struct ChatClientConfig {
    /// REST base URL, without trailing slash (e.g. `http://host/api`).
    pub api_base_url: String,

    /// WebSocket URL of the live channel (e.g. `ws://host/socket`).
    pub socket_url: String,

    /// Bearer token attached to every REST call, if any.
    pub auth_token: Option<String>,

    /// Upper bound for a single REST request.
    pub request_timeout: Duration,

    /// Upper bound for establishing the live channel.
    pub connect_timeout: Duration,

    /// Capacity of the live event broadcast channel.
    pub event_bus_capacity: usize,

    /// Live messages kept per inactive conversation.
    pub stash_capacity: usize,

    /// Conversation lifecycle policy.
    pub policy: ConversationPolicy,
}

impl Default for ChatClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:3000/api".to_string(),
            socket_url: "ws://localhost:3000/socket".to_string(),
            auth_token: None,
            request_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
            event_bus_capacity: 1024,
            stash_capacity: 200,
            policy: ConversationPolicy::default(),
        }
    }
}

impl ChatClientConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to [`ChatClientConfig::default`] values when a variable is
    /// not set. Calls `dotenvy::dotenv().ok()` to optionally load a `.env`
    /// file.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] if `CHAT_API_BASE_URL` or
    /// `CHAT_SOCKET_URL` is set but is not a valid URL of the expected
    /// scheme, or if a timeout is set to zero.
    pub fn from_env() -> Result<Self, ChatError> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let api_base_url = std::env::var("CHAT_API_BASE_URL").unwrap_or(defaults.api_base_url);
        let socket_url = std::env::var("CHAT_SOCKET_URL").unwrap_or(defaults.socket_url);
        let auth_token = std::env::var("CHAT_AUTH_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty());

        let request_timeout = Duration::from_secs(parse_env("CHAT_REQUEST_TIMEOUT_SECS", 10));
        let connect_timeout = Duration::from_secs(parse_env("CHAT_CONNECT_TIMEOUT_SECS", 10));
        let event_bus_capacity = parse_env("CHAT_EVENT_BUS_CAPACITY", defaults.event_bus_capacity);
        let stash_capacity = parse_env("CHAT_STASH_CAPACITY", defaults.stash_capacity);

        let policy = ConversationPolicy {
            allow_reopen: parse_env_bool("CHAT_ALLOW_REOPEN", false),
            reuse_open_conversation: parse_env_bool("CHAT_REUSE_OPEN_CONVERSATION", false),
        };

        Self {
            api_base_url,
            socket_url,
            auth_token,
            request_timeout,
            connect_timeout,
            event_bus_capacity,
            stash_capacity,
            policy,
        }
        .validated()
    }

    /// Checks URL schemes and timeouts and normalises the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError::Config`] when the API URL is not `http(s)`, the
    /// socket URL is not `ws(s)` or a timeout is zero.
    pub fn validated(mut self) -> Result<Self, ChatError> {
        if self.request_timeout.is_zero() {
            return Err(ChatError::Config(
                "CHAT_REQUEST_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(ChatError::Config(
                "CHAT_CONNECT_TIMEOUT_SECS must be greater than zero".to_string(),
            ));
        }
        let api = reqwest::Url::parse(&self.api_base_url)
            .map_err(|e| ChatError::Config(format!("CHAT_API_BASE_URL: {e}")))?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(ChatError::Config(format!(
                "CHAT_API_BASE_URL must be http(s), got {}",
                api.scheme()
            )));
        }
        let socket = reqwest::Url::parse(&self.socket_url)
            .map_err(|e| ChatError::Config(format!("CHAT_SOCKET_URL: {e}")))?;
        if !matches!(socket.scheme(), "ws" | "wss") {
            return Err(ChatError::Config(format!(
                "CHAT_SOCKET_URL must be ws(s), got {}",
                socket.scheme()
            )));
        }
        self.api_base_url = self.api_base_url.trim_end_matches('/').to_string();
        Ok(self)
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    parse_bool(std::env::var(key).ok().as_deref(), default)
}

fn parse_bool(raw: Option<&str>, default: bool) -> bool {
    match raw.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}
