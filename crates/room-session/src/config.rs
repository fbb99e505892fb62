//! Room session configuration.
//!
//! Configuration is loaded from environment variables. The broker API token
//! is redacted in Debug output.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default broker request timeout in seconds.
pub const DEFAULT_BROKER_TIMEOUT_SECONDS: u64 = 10;

/// Default data-channel message lifetime in milliseconds.
///
/// Matches the retry window the transport applies to unordered data
/// messages (chat, recording-status).
pub const DEFAULT_DATA_MESSAGE_LIFETIME_MS: u64 = 10_000;

/// Data-channel topic carrying chat messages.
pub const CHAT_TOPIC: &str = "chat";

/// Data-channel topic carrying recording-status signals.
pub const RECORDING_STATUS_TOPIC: &str = "recording-status";

/// Room session configuration.
///
/// Loaded from environment variables with sensible defaults. The broker API
/// token is redacted in Debug output.
#[derive(Clone)]
pub struct Config {
    /// Base URL of the meeting broker API.
    pub broker_base_url: String,

    /// Bearer token for broker requests, if the deployment requires one.
    pub broker_api_token: Option<String>,

    /// Broker request timeout.
    pub broker_timeout: Duration,

    /// Lifetime applied to outbound data-channel messages.
    pub data_message_lifetime: Duration,
}

/// Custom Debug implementation that redacts the API token.
impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("broker_base_url", &self.broker_base_url)
            .field(
                "broker_api_token",
                &self.broker_api_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("broker_timeout", &self.broker_timeout)
            .field("data_message_lifetime", &self.data_message_lifetime)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let broker_base_url = vars
            .get("ROOM_BROKER_BASE_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("ROOM_BROKER_BASE_URL".to_string()))?
            .trim_end_matches('/')
            .to_string();

        if broker_base_url.is_empty() {
            return Err(ConfigError::InvalidValue(
                "ROOM_BROKER_BASE_URL must not be empty".to_string(),
            ));
        }

        let broker_api_token = vars.get("ROOM_BROKER_API_TOKEN").cloned();

        let broker_timeout_seconds = vars
            .get("ROOM_BROKER_TIMEOUT_SECONDS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_BROKER_TIMEOUT_SECONDS);

        let data_message_lifetime_ms = vars
            .get("ROOM_DATA_MESSAGE_LIFETIME_MS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_DATA_MESSAGE_LIFETIME_MS);

        Ok(Config {
            broker_base_url,
            broker_api_token,
            broker_timeout: Duration::from_secs(broker_timeout_seconds),
            data_message_lifetime: Duration::from_millis(data_message_lifetime_ms),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([(
            "ROOM_BROKER_BASE_URL".to_string(),
            "https://broker.example.com/api/".to_string(),
        )])
    }

    #[test]
    fn test_from_vars_success_with_defaults() {
        let config = Config::from_vars(&base_vars()).expect("Config should load");

        assert_eq!(config.broker_base_url, "https://broker.example.com/api");
        assert!(config.broker_api_token.is_none());
        assert_eq!(
            config.broker_timeout,
            Duration::from_secs(DEFAULT_BROKER_TIMEOUT_SECONDS)
        );
        assert_eq!(
            config.data_message_lifetime,
            Duration::from_millis(DEFAULT_DATA_MESSAGE_LIFETIME_MS)
        );
    }

    #[test]
    fn test_missing_base_url() {
        let result = Config::from_vars(&HashMap::new());
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(_))));
    }

    #[test]
    fn test_overrides() {
        let mut vars = base_vars();
        vars.insert("ROOM_BROKER_TIMEOUT_SECONDS".to_string(), "3".to_string());
        vars.insert(
            "ROOM_DATA_MESSAGE_LIFETIME_MS".to_string(),
            "5000".to_string(),
        );
        vars.insert("ROOM_BROKER_API_TOKEN".to_string(), "tok-123".to_string());

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.broker_timeout, Duration::from_secs(3));
        assert_eq!(config.data_message_lifetime, Duration::from_millis(5000));
        assert_eq!(config.broker_api_token.as_deref(), Some("tok-123"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let mut vars = base_vars();
        vars.insert(
            "ROOM_BROKER_API_TOKEN".to_string(),
            "super-secret".to_string(),
        );
        let config = Config::from_vars(&vars).unwrap();

        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
