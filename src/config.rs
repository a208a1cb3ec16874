//! Server configuration.
//!
//! Transport tuning knobs with conservative defaults. All structures
//! deserialise from JSON so a host can load them from a file, but the
//! defaults are complete: `HttpConfig::default()` is a working
//! configuration.

use std::net::SocketAddr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// Configuration for the HTTP + SSE transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct HttpConfig {
    /// Host to bind to.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// Path prefix for the `/sse` and `/message` endpoints.
    ///
    /// Empty means the endpoints sit at the server root. A non-empty value
    /// must start with `/` and not end with one.
    pub base_path: String,

    /// Bound of each session's SSE event queue.
    pub event_queue_size: usize,

    /// Bound of each session's notification channel.
    pub notification_queue_size: usize,

    /// Seconds between `system/heartbeat` broadcasts; `0` disables them.
    pub heartbeat_secs: u64,

    /// Seconds to wait for the engine to produce a response to a POSTed
    /// request before giving up.
    pub dispatch_timeout_secs: u64,

    /// Seconds granted to in-flight requests during graceful shutdown.
    pub shutdown_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            base_path: String::new(),
            event_queue_size: 100,
            notification_queue_size: 100,
            heartbeat_secs: 30,
            dispatch_timeout_secs: 10,
            shutdown_timeout_secs: 5,
        }
    }
}

impl HttpConfig {
    /// Creates a configuration bound to the given address, keeping every
    /// other default.
    #[must_use]
    pub fn with_addr(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// The socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a valid address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::ValidationError {
                message: format!("invalid bind address: {}:{}", self.host, self.port),
            })
    }

    /// The heartbeat interval, or `None` when heartbeats are disabled.
    #[must_use]
    pub const fn heartbeat_interval(&self) -> Option<Duration> {
        if self.heartbeat_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.heartbeat_secs))
        }
    }

    /// How long a POSTed request may wait for its response.
    #[must_use]
    pub const fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }

    /// How long graceful shutdown waits for in-flight work.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any validation check fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_queue_size == 0 || self.notification_queue_size == 0 {
            return Err(ConfigError::ValidationError {
                message: "queue sizes must be at least 1".to_string(),
            });
        }

        if !self.base_path.is_empty()
            && (!self.base_path.starts_with('/') || self.base_path.ends_with('/'))
        {
            return Err(ConfigError::ValidationError {
                message: format!(
                    "base path must start with '/' and not end with one: {}",
                    self.base_path
                ),
            });
        }

        self.socket_addr().map(|_| ())
    }
}

/// Configuration for the stdio transport.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct StdioConfig {
    /// Bytes read per chunk; bounds how long cancellation can lag a read.
    pub read_chunk_size: usize,

    /// Milliseconds to back off after a transient read error.
    pub retry_backoff_ms: u64,
}

impl Default for StdioConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: 4096,
            retry_backoff_ms: 50,
        }
    }
}

impl StdioConfig {
    /// The backoff applied after a transient read error.
    #[must_use]
    pub const fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_http_config_is_valid() {
        let cfg = HttpConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.event_queue_size, 100);
        assert_eq!(cfg.heartbeat_secs, 30);
    }

    #[test]
    fn zero_heartbeat_disables_interval() {
        let cfg = HttpConfig {
            heartbeat_secs: 0,
            ..HttpConfig::default()
        };
        assert!(cfg.heartbeat_interval().is_none());
    }

    #[test]
    fn zero_queue_size_rejected() {
        let cfg = HttpConfig {
            event_queue_size: 0,
            ..HttpConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn base_path_must_be_anchored() {
        let cfg = HttpConfig {
            base_path: "mcp".to_string(),
            ..HttpConfig::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = HttpConfig {
            base_path: "/mcp".to_string(),
            ..HttpConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn invalid_host_rejected() {
        let cfg = HttpConfig {
            host: "not a host".to_string(),
            ..HttpConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
