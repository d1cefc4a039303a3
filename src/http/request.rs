//! Request header transformation.
//!
//! # Responsibilities
//! - Drop hop-by-hop headers and headers named in `Connection`
//! - Drop client-supplied forwarding-chain headers (the proxy writes its own)
//! - Set the outbound Host according to the configured policy
//! - Add X-Forwarded-For/-Proto/-Host when enabled
//!
//! # Design Decisions
//! - Everything else passes through untouched, order and repeated values included
//! - Original request preserved for logging; modified copy forwarded

use std::collections::HashSet;
use std::net::IpAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Uri};

use crate::config::HostHeaderPolicy;
use crate::upstream::UpstreamTarget;

pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
pub const X_FORWARDED_HOST: HeaderName = HeaderName::from_static("x-forwarded-host");
pub const X_FORWARDED_PROTO: HeaderName = HeaderName::from_static("x-forwarded-proto");

/// Headers never copied from the client to the backend.
pub const REQUEST_EXCLUDED_HEADERS: &[&str] = &[
    "host",
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    // forwarding chain
    "forwarded",
    "x-forwarded-for",
    "x-forwarded-host",
    "x-forwarded-proto",
    "x-real-ip",
];

/// Copy `inbound` minus the exclusion set and any header listed in its `Connection` value.
pub fn forward_headers(inbound: &HeaderMap) -> HeaderMap {
    strip_headers(inbound, REQUEST_EXCLUDED_HEADERS)
}

/// Shared by both directions: remove `excluded` and the `Connection` tokens.
pub(crate) fn strip_headers(headers: &HeaderMap, excluded: &[&str]) -> HeaderMap {
    let listed = connection_tokens(headers);
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name_str = name.as_str();
        if excluded.contains(&name_str) || listed.contains(name_str) {
            continue;
        }
        out.append(name.clone(), value.clone());
    }
    out
}

fn connection_tokens(headers: &HeaderMap) -> HashSet<String> {
    headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|token| token.trim().to_ascii_lowercase())
        .filter(|token| !token.is_empty())
        .collect()
}

/// The Host the client addressed, falling back to the HTTP/2 authority.
pub fn inbound_host(headers: &HeaderMap, uri: &Uri) -> Option<HeaderValue> {
    headers.get(header::HOST).cloned().or_else(|| {
        uri.authority()
            .and_then(|a| HeaderValue::from_str(a.as_str()).ok())
    })
}

/// Write the outbound Host header.
pub fn apply_host(
    headers: &mut HeaderMap,
    policy: HostHeaderPolicy,
    inbound_host: Option<&HeaderValue>,
    target: &UpstreamTarget,
) {
    let value = match (policy, inbound_host) {
        (HostHeaderPolicy::Preserve, Some(host)) => host.clone(),
        _ => target.host_header().clone(),
    };
    headers.insert(header::HOST, value);
}

/// Append the proxy's own forwarding headers.
pub fn apply_forwarded(headers: &mut HeaderMap, client: IpAddr, inbound_host: Option<&HeaderValue>) {
    if let Ok(value) = HeaderValue::from_str(&client.to_string()) {
        headers.insert(X_FORWARDED_FOR, value);
    }
    headers.insert(X_FORWARDED_PROTO, HeaderValue::from_static("http"));
    if let Some(host) = inbound_host {
        headers.insert(X_FORWARDED_HOST, host.clone());
    }
}
