//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files. Every
//! field has a default so an empty file (or no file) yields a working client.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the shared client.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Deadline for DNS, TCP connect, TLS and HTTP handshake, in milliseconds.
    pub connect_timeout_ms: u64,

    /// Deadline for sending a request and reading its full response.
    pub socket_timeout_ms: u64,

    /// Maximum wait for a pooled connection.
    pub connection_request_timeout_ms: u64,

    /// Pool-wide connection cap.
    pub max_total_connections: usize,

    /// Connection cap per route (scheme, host, port).
    pub per_route_max_connections: usize,

    /// Retry budget per request.
    pub max_retries: u32,

    /// Keep-alive applied when the peer does not advertise one.
    pub default_keep_alive_ms: u64,

    /// Interval of the background idle eviction task (0 disables it).
    pub eviction_interval_ms: u64,

    /// Default `User-Agent` header (empty disables it).
    pub user_agent: String,

    /// Per fault kind overrides of the retry table, keyed by fault name
    /// (e.g. `other = false`).
    pub retry_overrides: BTreeMap<String, bool>,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            socket_timeout_ms: 5_000,
            connection_request_timeout_ms: 5_000,
            max_total_connections: 200,
            per_route_max_connections: 50,
            max_retries: 2,
            default_keep_alive_ms: 60_000,
            eviction_interval_ms: 10_000,
            user_agent: concat!("pooled-http/", env!("CARGO_PKG_VERSION")).to_string(),
            retry_overrides: BTreeMap::new(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    pub fn connection_request_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_request_timeout_ms)
    }

    pub fn default_keep_alive(&self) -> Duration {
        Duration::from_millis(self.default_keep_alive_ms)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_millis(self.eviction_interval_ms)
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Bind address of the Prometheus endpoint; no endpoint when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_address: None,
        }
    }
}
