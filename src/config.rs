//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the REST backend being fronted
    pub upstream_url: String,
    /// TTL in milliseconds applied to cached responses
    pub default_ttl_ms: u64,
    /// Debounce window in milliseconds, 0 disables debouncing
    pub default_debounce_ms: u64,
    /// HTTP server port
    pub server_port: u16,
    /// Interval in seconds of the expired-entry sweep, 0 disables it
    pub sweep_interval: u64,
    /// Upstream request timeout in seconds
    pub request_timeout_secs: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `UPSTREAM_URL` - Backend base URL (default: http://127.0.0.1:8000)
    /// - `DEFAULT_TTL_MS` - Cache TTL in milliseconds (default: 60000)
    /// - `DEFAULT_DEBOUNCE_MS` - Debounce window in milliseconds (default: 0)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SWEEP_INTERVAL` - Expired-entry sweep in seconds (default: 0, off)
    /// - `REQUEST_TIMEOUT_SECS` - Upstream timeout in seconds (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            upstream_url: env::var("UPSTREAM_URL").unwrap_or(defaults.upstream_url),
            default_ttl_ms: parse_var("DEFAULT_TTL_MS").unwrap_or(defaults.default_ttl_ms),
            default_debounce_ms: parse_var("DEFAULT_DEBOUNCE_MS")
                .unwrap_or(defaults.default_debounce_ms),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            sweep_interval: parse_var("SWEEP_INTERVAL").unwrap_or(defaults.sweep_interval),
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS")
                .unwrap_or(defaults.request_timeout_secs),
        }
    }

    /// Cache TTL as a Duration.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    /// Debounce window, or None when debouncing is disabled.
    pub fn default_debounce(&self) -> Option<Duration> {
        (self.default_debounce_ms > 0).then(|| Duration::from_millis(self.default_debounce_ms))
    }

    /// Upstream request timeout as a Duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream_url: "http://127.0.0.1:8000".to_string(),
            default_ttl_ms: 60_000,
            default_debounce_ms: 0,
            server_port: 3000,
            sweep_interval: 0,
            request_timeout_secs: 30,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.upstream_url, "http://127.0.0.1:8000");
        assert_eq!(config.default_ttl_ms, 60_000);
        assert_eq!(config.default_debounce_ms, 0);
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.sweep_interval, 0);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_config_from_env_defaults() {
        // Clear any existing env vars to test defaults
        env::remove_var("UPSTREAM_URL");
        env::remove_var("DEFAULT_TTL_MS");
        env::remove_var("DEFAULT_DEBOUNCE_MS");
        env::remove_var("SERVER_PORT");
        env::remove_var("SWEEP_INTERVAL");
        env::remove_var("REQUEST_TIMEOUT_SECS");

        let config = Config::from_env();
        assert_eq!(config.default_ttl_ms, 60_000);
        assert_eq!(config.server_port, 3000);
        assert!(config.default_debounce().is_none());
    }

    #[test]
    fn test_duration_helpers() {
        let config = Config {
            default_ttl_ms: 1500,
            default_debounce_ms: 250,
            request_timeout_secs: 5,
            ..Config::default()
        };

        assert_eq!(config.default_ttl(), Duration::from_millis(1500));
        assert_eq!(config.default_debounce(), Some(Duration::from_millis(250)));
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }
}
