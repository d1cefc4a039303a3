//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0)
//! - Check that addresses, networks and the upstream URL parse
//! - Enforce the forwarded-header trust boundary
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use axum::http::HeaderName;

use crate::config::schema::{ClientAddressSource, ProxyConfig};
use crate::security::cidr::IpNetwork;
use crate::upstream::target::UpstreamTarget;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field, e.g. `access.allowed_networks`.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Validate a deserialized configuration.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(e) = config.listener.bind_address.parse::<SocketAddr>() {
        errors.push(ValidationError::new("listener.bind_address", e.to_string()));
    }

    if let Err(e) = UpstreamTarget::parse(&config.upstream.base_url) {
        errors.push(ValidationError::new("upstream.base_url", e.to_string()));
    }

    let access = &config.access;
    if access.allowed_networks.is_empty() {
        errors.push(ValidationError::new(
            "access.allowed_networks",
            "at least one network is required (use 0.0.0.0/0 and ::/0 to allow everyone)",
        ));
    }
    check_networks("access.allowed_networks", &access.allowed_networks, &mut errors);
    check_networks("access.trusted_proxies", &access.trusted_proxies, &mut errors);

    if access.client_address == ClientAddressSource::ForwardedHeader {
        if access.trusted_proxies.is_empty() {
            errors.push(ValidationError::new(
                "access.trusted_proxies",
                "forwarded_header mode requires at least one trusted proxy",
            ));
        }
        if HeaderName::from_bytes(access.forwarded_header.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                "access.forwarded_header",
                format!("invalid header name {:?}", access.forwarded_header),
            ));
        }
    }

    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new("limits.max_body_bytes", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be greater than 0"));
    } else if config.timeouts.request_secs > 0
        && config.timeouts.connect_secs >= config.timeouts.request_secs
    {
        // Otherwise an unreachable backend surfaces as 504 instead of 502.
        errors.push(ValidationError::new(
            "timeouts.connect_secs",
            "must be less than timeouts.request_secs",
        ));
    }

    let obs = &config.observability;
    if !LOG_LEVELS.contains(&obs.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level {:?}", obs.log_level),
        ));
    }
    if obs.metrics_enabled {
        if let Err(e) = obs.metrics_address.parse::<SocketAddr>() {
            errors.push(ValidationError::new("observability.metrics_address", e.to_string()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_networks(field: &str, entries: &[String], errors: &mut Vec<ValidationError>) {
    for entry in entries {
        if let Err(e) = entry.parse::<IpNetwork>() {
            errors.push(ValidationError::new(field, e.to_string()));
        }
    }
}
