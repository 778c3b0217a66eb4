//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the reverse proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Route definitions, evaluated in declaration order.
    pub routes: Vec<RouteConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:5000".to_string(),
        }
    }
}

/// On-disk representation of a route rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Regex the request path must match.
    #[serde(rename = "match")]
    pub pattern: String,

    /// Path rewrite applied before forwarding.
    pub rewrite: RewriteConfig,

    /// Destination base URL (http, https, ws or wss).
    pub destination: String,

    /// Keep-alive overrides for WebSocket destinations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub websocket: Option<RelayConfig>,
}

impl RouteConfig {
    pub fn new(
        pattern: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self {
            pattern: pattern.into(),
            rewrite: RewriteConfig {
                from: from.into(),
                to: to.into(),
            },
            destination: destination.into(),
            websocket: None,
        }
    }
}

/// On-disk representation of a rewrite rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RewriteConfig {
    /// Regex applied to the request path.
    pub from: String,

    /// Replacement template with `$1`, `$2`, ... backreferences.
    pub to: String,
}

/// WebSocket keep-alive settings for a route.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct RelayConfig {
    /// Deadline for a single frame write, in milliseconds.
    pub write_wait_ms: u64,

    /// Time allowed between pongs before a peer is considered dead, in milliseconds.
    pub pong_wait_ms: u64,

    /// Interval between pings, in milliseconds. Must be shorter than `pong_wait_ms`.
    pub ping_period_ms: u64,

    /// Largest accepted message payload, in bytes.
    pub max_message_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            write_wait_ms: 10_000,
            pong_wait_ms: 60_000,
            ping_period_ms: 54_000,
            max_message_size: 1024,
        }
    }
}

/// Timeout configuration for HTTP requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed for a proxied request, backend call included.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
