//! Server configuration loaded from environment variables.
//!
//! All settings have defaults so the relay can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use courier_shared::constants::{
    DEFAULT_HTTP_PORT, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_PING_INTERVAL_SECS,
    DEFAULT_STORE_TIMEOUT_MS,
};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for HTTP and WebSocket traffic.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:5000`
    pub http_addr: SocketAddr,

    /// SQLite file holding message history.
    /// Env: `DATABASE_PATH`
    /// Default: `./courier.db`
    pub database_path: PathBuf,

    /// Upper bound on a single message append.
    /// Env: `STORE_TIMEOUT_MS`
    pub store_timeout: Duration,

    /// Human-readable name reported by `/info`.
    /// Env: `INSTANCE_NAME`
    pub instance_name: String,

    /// Allowed browser origin. `None` allows any.
    /// Env: `CORS_ORIGIN`
    pub cors_origin: Option<String>,

    /// Keepalive ping cadence.
    /// Env: `PING_INTERVAL_SECS`
    pub ping_interval: Duration,

    /// Close a socket that sends nothing (not even a pong) for this long.
    /// Env: `IDLE_TIMEOUT_SECS`
    pub idle_timeout: Duration,

    /// Env: `RATE_LIMIT_PER_SEC`
    pub rate_limit_per_sec: f64,

    /// Env: `RATE_LIMIT_BURST`
    pub rate_limit_burst: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            database_path: PathBuf::from("./courier.db"),
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            instance_name: "Courier Relay".to_string(),
            cors_origin: None,
            ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
            rate_limit_per_sec: 10.0,
            rate_limit_burst: 30.0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            match addr.parse::<SocketAddr>() {
                Ok(parsed) => config.http_addr = parsed,
                Err(_) => tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default"),
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            config.database_path = PathBuf::from(path);
        }

        if let Some(ms) = parse_positive(&lookup, "STORE_TIMEOUT_MS") {
            config.store_timeout = Duration::from_millis(ms);
        }

        if let Some(name) = lookup("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Some(origin) = lookup("CORS_ORIGIN") {
            if !origin.is_empty() && origin != "*" {
                config.cors_origin = Some(origin);
            }
        }

        if let Some(secs) = parse_positive(&lookup, "PING_INTERVAL_SECS") {
            config.ping_interval = Duration::from_secs(secs);
        }

        if let Some(secs) = parse_positive(&lookup, "IDLE_TIMEOUT_SECS") {
            config.idle_timeout = Duration::from_secs(secs);
        }

        if let Some(rate) = parse_rate(&lookup, "RATE_LIMIT_PER_SEC") {
            config.rate_limit_per_sec = rate;
        }

        if let Some(burst) = parse_rate(&lookup, "RATE_LIMIT_BURST") {
            config.rate_limit_burst = burst;
        }

        if config.idle_timeout <= config.ping_interval {
            tracing::warn!(
                idle = ?config.idle_timeout,
                ping = ?config.ping_interval,
                "IDLE_TIMEOUT_SECS must exceed PING_INTERVAL_SECS, using defaults"
            );
            let defaults = Self::default();
            config.idle_timeout = defaults.idle_timeout;
            config.ping_interval = defaults.ping_interval;
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter.

        config
    }
}

fn parse_positive(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let value = lookup(key)?;
    match value.parse::<u64>() {
        Ok(n) if n > 0 => Some(n),
        _ => {
            tracing::warn!(key, value = %value, "Invalid value, using default");
            None
        }
    }
}

fn parse_rate(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<f64> {
    let value = lookup(key)?;
    match value.parse::<f64>() {
        Ok(n) if n.is_finite() && n > 0.0 => Some(n),
        _ => {
            tracing::warn!(key, value = %value, "Invalid value, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> ServerConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.http_addr, ([0, 0, 0, 0], 5000).into());
        assert_eq!(config.store_timeout, Duration::from_secs(5));
        assert!(config.cors_origin.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("STORE_TIMEOUT_MS", "250"),
            ("CORS_ORIGIN", "http://localhost:5173"),
            ("RATE_LIMIT_BURST", "5"),
        ]);
        assert_eq!(config.http_addr, ([127, 0, 0, 1], 9000).into());
        assert_eq!(config.store_timeout, Duration::from_millis(250));
        assert_eq!(config.cors_origin.as_deref(), Some("http://localhost:5173"));
        assert_eq!(config.rate_limit_burst, 5.0);
    }

    #[test]
    fn test_invalid_values_keep_defaults() {
        let config = config_from(&[
            ("HTTP_ADDR", "not-an-addr"),
            ("STORE_TIMEOUT_MS", "0"),
            ("PING_INTERVAL_SECS", "soon"),
            ("RATE_LIMIT_PER_SEC", "-3"),
            ("CORS_ORIGIN", "*"),
        ]);
        let defaults = ServerConfig::default();
        assert_eq!(config.http_addr, defaults.http_addr);
        assert_eq!(config.store_timeout, defaults.store_timeout);
        assert_eq!(config.ping_interval, defaults.ping_interval);
        assert_eq!(config.rate_limit_per_sec, defaults.rate_limit_per_sec);
        assert!(config.cors_origin.is_none());
    }

    #[test]
    fn test_idle_timeout_not_above_ping_keeps_default_timings() {
        let config = config_from(&[("PING_INTERVAL_SECS", "60"), ("IDLE_TIMEOUT_SECS", "45")]);
        let defaults = ServerConfig::default();
        assert_eq!(config.ping_interval, defaults.ping_interval);
        assert_eq!(config.idle_timeout, defaults.idle_timeout);

        let config = config_from(&[("PING_INTERVAL_SECS", "10"), ("IDLE_TIMEOUT_SECS", "25")]);
        assert_eq!(config.ping_interval, Duration::from_secs(10));
        assert_eq!(config.idle_timeout, Duration::from_secs(25));
    }
}
