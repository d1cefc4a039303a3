//! Source address allow-listing.
//!
//! The policy decides which address represents the client and whether that
//! address falls inside one of the allowed networks. A forwarding-chain
//! header is only believed when the transport peer is a trusted proxy;
//! everyone else is judged by their socket address.

use std::net::{IpAddr, SocketAddr};

use axum::http::{HeaderMap, HeaderName};

use crate::config::{AccessConfig, ClientAddressSource, ValidationError};
use crate::error::ProxyError;
use crate::security::cidr::IpNetwork;

/// Read-only access policy shared by every request handler.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    allowed: Vec<IpNetwork>,
    source: ClientAddressSource,
    forwarded_header: HeaderName,
    trusted_proxies: Vec<IpNetwork>,
}

impl AccessPolicy {
    pub fn from_config(config: &AccessConfig) -> Result<Self, ValidationError> {
        let forwarded_header = HeaderName::from_bytes(config.forwarded_header.as_bytes())
            .map_err(|e| ValidationError::new("access.forwarded_header", e.to_string()))?;

        Ok(Self {
            allowed: parse_networks("access.allowed_networks", &config.allowed_networks)?,
            source: config.client_address,
            forwarded_header,
            trusted_proxies: parse_networks("access.trusted_proxies", &config.trusted_proxies)?,
        })
    }

    /// Determine the client address for this request.
    ///
    /// Returns `PolicyDenied` when a trusted proxy supplied an entry that is
    /// not an address.
    pub fn resolve_client(&self, peer: SocketAddr, headers: &HeaderMap) -> Result<IpAddr, ProxyError> {
        let peer_ip = peer.ip().to_canonical();

        if self.source != ClientAddressSource::ForwardedHeader {
            return Ok(peer_ip);
        }

        if !self.trusted_proxies.iter().any(|net| net.contains(peer_ip)) {
            if headers.contains_key(&self.forwarded_header) {
                tracing::debug!(peer = %peer_ip, "Ignoring forwarded header from untrusted peer");
            }
            return Ok(peer_ip);
        }

        let Some(value) = headers.get(&self.forwarded_header) else {
            return Ok(peer_ip);
        };

        let first = value
            .to_str()
            .ok()
            .and_then(|chain| chain.split(',').next())
            .map(str::trim)
            .unwrap_or_default();

        parse_client_entry(first)
            .map(|ip| ip.to_canonical())
            .ok_or_else(|| ProxyError::PolicyDenied {
                client: format!("{:?} via {}", first, peer_ip),
            })
    }

    pub fn is_allowed(&self, ip: IpAddr) -> bool {
        self.allowed.iter().any(|net| net.contains(ip))
    }

    /// Resolve the client and test it against the allow-list.
    pub fn check(&self, peer: SocketAddr, headers: &HeaderMap) -> Result<IpAddr, ProxyError> {
        let client = self.resolve_client(peer, headers)?;
        if self.is_allowed(client) {
            Ok(client)
        } else {
            Err(ProxyError::PolicyDenied {
                client: client.to_string(),
            })
        }
    }
}

fn parse_networks(field: &str, entries: &[String]) -> Result<Vec<IpNetwork>, ValidationError> {
    entries
        .iter()
        .map(|entry| {
            entry
                .parse::<IpNetwork>()
                .map_err(|e| ValidationError::new(field, e.to_string()))
        })
        .collect()
}

/// Accepts `1.2.3.4`, `1.2.3.4:5678`, `::1` and `[::1]:5678`.
fn parse_client_entry(entry: &str) -> Option<IpAddr> {
    entry
        .parse::<IpAddr>()
        .ok()
        .or_else(|| entry.parse::<SocketAddr>().ok().map(|sa| sa.ip()))
}
