//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the relay proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// The single backend every request is forwarded to.
    pub upstream: UpstreamConfig,

    /// Source address allow-listing.
    pub access: AccessConfig,

    /// Request size limits.
    pub limits: LimitsConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Forwarding-chain headers set by the proxy.
    pub forwarding: ForwardingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
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

/// Which Host header the backend receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HostHeaderPolicy {
    /// Send the backend's own authority (`host[:port]` of `base_url`).
    #[default]
    Upstream,
    /// Send the Host the client used to reach the proxy.
    Preserve,
}

/// Upstream (backend) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL, e.g. "http://10.128.0.63:8096". May carry a path prefix.
    pub base_url: String,

    /// Host header policy for outbound requests.
    pub host_header: HostHeaderPolicy,

    /// Idle connections kept per backend host. Dialing itself is unbounded.
    pub pool_max_idle_per_host: usize,

    /// Idle pooled connections are closed after this many seconds.
    pub pool_idle_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8096".to_string(),
            host_header: HostHeaderPolicy::default(),
            pool_max_idle_per_host: 32,
            pool_idle_secs: 90,
        }
    }
}

/// Where the access check takes the client address from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClientAddressSource {
    /// The transport-layer peer address only.
    #[default]
    Peer,
    /// The first entry of `forwarded_header`, honoured only for trusted peers.
    ForwardedHeader,
}

/// Access control configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Allowed source networks in CIDR notation. A bare address is a single host.
    pub allowed_networks: Vec<String>,

    /// Client address source used for the allow-list check.
    pub client_address: ClientAddressSource,

    /// Header carrying the forwarding chain (comma separated, client first).
    pub forwarded_header: String,

    /// Peers whose `forwarded_header` is believed.
    pub trusted_proxies: Vec<String>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            allowed_networks: vec!["127.0.0.0/8".to_string(), "::1/128".to_string()],
            client_address: ClientAddressSource::default(),
            forwarded_header: "x-forwarded-for".to_string(),
            trusted_proxies: Vec::new(),
        }
    }
}

/// Request and connection limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum request body size in bytes.
    pub max_body_bytes: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 100 * 1024 * 1024, // 100MB, large enough for media uploads
        }
    }
}

/// Timeout configuration for the backend exchange.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed until the backend's response head arrives, in seconds.
    pub request_secs: u64,

    /// Maximum silence while relaying a response body, in seconds. 0 disables it.
    pub body_idle_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
            body_idle_secs: 30,
        }
    }
}

/// Forwarding headers written by the proxy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ForwardingConfig {
    /// Set X-Forwarded-For/-Proto/-Host on outbound requests.
    pub set_forwarded_headers: bool,
}

impl Default for ForwardingConfig {
    fn default() -> Self {
        Self {
            set_forwarded_headers: true,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
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

    /// Human readable or JSON log lines.
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
            log_format: LogFormat::default(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
