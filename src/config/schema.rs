//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the device proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (local bind address).
    pub listener: ListenerConfig,

    /// The device every request is forwarded to.
    pub upstream: Endpoint,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Per-operation timeouts.
    pub timeouts: TimeoutConfig,

    /// Console and durable error log settings.
    pub logging: LoggingConfig,

    /// Size limits for inbound requests and upstream responses.
    pub limits: LimitsConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Fixed upstream target, configured once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Value for the `Host` request header. The port is omitted when it is 80.
    pub fn host_header(&self) -> String {
        if self.port == 80 {
            self.host.clone()
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Absolute `http://` URI for a request path on this endpoint.
    pub fn uri_for(&self, path: &str) -> String {
        format!("http://{}:{}{}", self.host, self.port, path)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host: "192.168.100.2".to_string(),
            port: 80,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl std::str::FromStr for Endpoint {
    type Err = String;

    /// Parse `host:port`, or a bare `host` meaning port 80.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_start_matches("http://").trim_end_matches('/');
        match s.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|e| format!("invalid port '{}': {}", port, e))?;
                Ok(Self::new(host, port))
            }
            None => Ok(Self::new(s, 80)),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt. A request makes at most `max_attempts + 1` calls.
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds.
    pub initial_backoff_ms: u64,

    /// Factor applied to the delay after every retryable failure.
    pub multiplier: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 500,
            multiplier: 2,
        }
    }
}

/// Timeout configuration for each forwarding strategy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// GET forwarding timeout in seconds.
    pub get_secs: u64,

    /// OPTIONS forwarding timeout in seconds.
    pub options_secs: u64,

    /// Raw POST socket operation timeout in seconds.
    pub post_secs: u64,
}

impl TimeoutConfig {
    pub fn get(&self) -> Duration {
        Duration::from_secs(self.get_secs)
    }

    pub fn options(&self) -> Duration {
        Duration::from_secs(self.options_secs)
    }

    pub fn post(&self) -> Duration {
        Duration::from_secs(self.post_secs)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            get_secs: 10,
            options_secs: 5,
            post_secs: 10,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Console log level (trace, debug, info, warn, error).
    pub level: String,

    /// Suppress console output; the error log is still written.
    pub quiet: bool,

    /// Path of the durable error log.
    pub error_log: PathBuf,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            quiet: false,
            error_log: PathBuf::from("temp/proxy_errors.log"),
        }
    }
}

/// Size limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum inbound request body size in bytes.
    pub max_request_body_bytes: usize,

    /// Maximum size of a raw upstream response header block in bytes.
    pub max_header_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_request_body_bytes: 2 * 1024 * 1024, // 2MB
            max_header_bytes: 64 * 1024,
        }
    }
}
