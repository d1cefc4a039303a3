//! The per-request forwarding pipeline.
//!
//! ```text
//! RECEIVED ──method/size/source checks──▶ ACCESS_CHECKED ──▶ FORWARDING ──▶ RELAYING ──▶ DONE
//!     │                                                          │
//!     └──────────── REJECTED (405/413/403) ◀─────────────────────┘ (502/504)
//! ```
//!
//! A request is forwarded at most once. Nothing here is shared mutably
//! between requests; the only shared resource is the client's idle pool.

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};

use crate::config::{ConfigError, HostHeaderPolicy, ProxyConfig, ValidationError};
use crate::error::ProxyError;
use crate::http::{request, response};
use crate::proxy::relay::RelayBody;
use crate::security::{limits, AccessPolicy};
use crate::upstream::{UpstreamClient, UpstreamTarget};

const FORWARDED_METHODS: [Method; 7] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
    Method::OPTIONS,
    Method::HEAD,
];

pub fn is_supported_method(method: &Method) -> bool {
    FORWARDED_METHODS.contains(method)
}

/// Immutable forwarding state built once from the configuration.
pub struct Forwarder {
    policy: AccessPolicy,
    target: UpstreamTarget,
    client: UpstreamClient,
    host_policy: HostHeaderPolicy,
    set_forwarded_headers: bool,
    max_body_bytes: u64,
    body_idle_timeout: Option<Duration>,
}

impl Forwarder {
    pub fn from_config(config: &ProxyConfig) -> Result<Self, ConfigError> {
        let policy = AccessPolicy::from_config(&config.access)
            .map_err(|e| ConfigError::Validation(vec![e]))?;
        let target = UpstreamTarget::parse(&config.upstream.base_url).map_err(|e| {
            ConfigError::Validation(vec![ValidationError::new("upstream.base_url", e.to_string())])
        })?;
        let max_body_bytes = config.limits.max_body_bytes;
        let client = UpstreamClient::new(&config.upstream, &config.timeouts, max_body_bytes);

        let body_idle_timeout = match config.timeouts.body_idle_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            policy,
            target,
            client,
            host_policy: config.upstream.host_header,
            set_forwarded_headers: config.forwarding.set_forwarded_headers,
            max_body_bytes,
            body_idle_timeout,
        })
    }

    pub fn target(&self) -> &UpstreamTarget {
        &self.target
    }

    /// Run one request through the pipeline.
    ///
    /// Policy failures return before the backend is contacted.
    pub async fn forward(&self, peer: SocketAddr, inbound: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let (parts, body) = inbound.into_parts();

        if !is_supported_method(&parts.method) {
            return Err(ProxyError::UnsupportedMethod(parts.method));
        }
        limits::check_declared_length(&parts.headers, self.max_body_bytes)?;
        let client_ip = self.policy.check(peer, &parts.headers)?;

        let uri = self
            .target
            .uri_for(&parts.uri)
            .map_err(|e| ProxyError::Internal(format!("cannot build upstream URI: {}", e)))?;

        let inbound_host = request::inbound_host(&parts.headers, &parts.uri);
        let mut headers = request::forward_headers(&parts.headers);
        request::apply_host(&mut headers, self.host_policy, inbound_host.as_ref(), &self.target);
        if self.set_forwarded_headers {
            request::apply_forwarded(&mut headers, client_ip, inbound_host.as_ref());
        }

        let mut outbound = Request::builder()
            .method(parts.method)
            .uri(uri)
            .body(limits::limit_body(body, self.max_body_bytes))
            .map_err(|e| ProxyError::Internal(format!("cannot build upstream request: {}", e)))?;
        *outbound.headers_mut() = headers;

        tracing::debug!(client = %client_ip, uri = %outbound.uri(), "Forwarding request");

        let upstream = self.client.send(outbound).await?;

        let status = upstream.status();
        let relayed_headers = response::relay_headers(upstream.headers());
        let body = RelayBody::new(upstream.into_body(), self.body_idle_timeout);

        let mut reply = Response::new(Body::new(body));
        *reply.status_mut() = status;
        *reply.headers_mut() = relayed_headers;
        Ok(reply)
    }
}
