//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the balancer.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the load balancer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct TlbConfig {
    /// Frontend listener settings shared by every application.
    pub listener: ListenerConfig,

    /// Marathon connection settings.
    pub marathon: MarathonConfig,

    /// Discovery pipeline settings.
    pub discovery: DiscoveryConfig,

    /// Static application id → frontend port assignments.
    ///
    /// A `tlb.port` label on the application takes precedence.
    pub frontends: HashMap<String, u16>,

    /// Relay settings.
    pub relay: RelayConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host every frontend binds on (e.g., "0.0.0.0").
    pub bind_host: String,

    /// Maximum concurrent connections per frontend (backpressure).
    pub max_connections: usize,

    /// Base delay in milliseconds before retrying a failed accept.
    pub accept_backoff_base_ms: u64,

    /// Upper bound for the accept retry delay in milliseconds.
    pub accept_backoff_max_ms: u64,

    /// How long shutdown waits for in-flight relays, in seconds.
    pub drain_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            max_connections: 10_000,
            accept_backoff_base_ms: 50,
            accept_backoff_max_ms: 2_000,
            drain_timeout_secs: 30,
        }
    }
}

/// Marathon (orchestrator) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MarathonConfig {
    /// Base URL of the Marathon API, e.g. "http://marathon.mesos:8080".
    pub url: String,

    /// Timeout in seconds for non-streaming API calls.
    pub request_timeout_secs: u64,

    /// How many times a lost event stream is re-established before giving up.
    pub resubscribe_attempts: u32,

    /// Base delay in milliseconds between resubscribe attempts.
    pub resubscribe_backoff_base_ms: u64,

    /// Upper bound for the resubscribe delay in milliseconds.
    pub resubscribe_backoff_max_ms: u64,
}

impl Default for MarathonConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8080".to_string(),
            request_timeout_secs: 10,
            resubscribe_attempts: 5,
            resubscribe_backoff_base_ms: 500,
            resubscribe_backoff_max_ms: 30_000,
        }
    }
}

/// Discovery pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Capacity of the command channel between discovery and the router.
    /// Small on purpose: discovery blocks until the router keeps up.
    pub command_buffer: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self { command_buffer: 1 }
    }
}

/// Relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Backend connect timeout in seconds.
    pub connect_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
