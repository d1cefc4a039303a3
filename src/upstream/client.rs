//! Outbound HTTP client.
//!
//! # Responsibilities
//! - Issue exactly one request per forwarded request (no retries)
//! - Never follow redirects; 3xx responses go back to the caller as-is
//! - Bound the exchange up to the response head with a fixed timeout
//! - Undo backend content encodings so the relayed headers stay accurate
//! - Classify failures into 502 / 504 / 413
//!
//! # Design Decisions
//! - hyper-util legacy client: idle pool per host, unbounded dialing
//! - Dropping the response future (timeout or client gone) drops the
//!   backend connection instead of letting it finish in the background

use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response};
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use tower::{Layer, ServiceExt};
use tower_http::decompression::{Decompression, DecompressionBody, DecompressionLayer};

use crate::config::{TimeoutConfig, UpstreamConfig};
use crate::error::ProxyError;
use crate::security::limits::is_length_limit;

/// Body type of a backend response as seen by the relay.
pub type UpstreamBody = DecompressionBody<Incoming>;

/// Shared outbound client. Cheap to clone; all clones use one pool.
#[derive(Clone)]
pub struct UpstreamClient {
    inner: Decompression<Client<HttpConnector, Body>>,
    request_timeout: Duration,
    max_body_bytes: u64,
}

impl UpstreamClient {
    pub fn new(upstream: &UpstreamConfig, timeouts: &TimeoutConfig, max_body_bytes: u64) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(timeouts.connect_secs)));
        connector.set_nodelay(true);

        // The legacy client has no redirect handling at all; 3xx are returned as-is.
        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(Duration::from_secs(upstream.pool_idle_secs))
            .pool_max_idle_per_host(upstream.pool_max_idle_per_host)
            .build(connector);

        Self {
            inner: DecompressionLayer::new().layer(client),
            request_timeout: Duration::from_secs(timeouts.request_secs),
            max_body_bytes,
        }
    }

    /// Send one request and wait for the response head.
    pub async fn send(&self, request: Request<Body>) -> Result<Response<UpstreamBody>, ProxyError> {
        let exchange = self.inner.clone().oneshot(request);

        match tokio::time::timeout(self.request_timeout, exchange).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(self.classify(e)),
            Err(_) => Err(ProxyError::BackendTimeout(self.request_timeout)),
        }
    }

    fn classify(&self, err: hyper_util::client::legacy::Error) -> ProxyError {
        if is_length_limit(&err) {
            return ProxyError::PayloadTooLarge {
                limit: self.max_body_bytes,
            };
        }
        ProxyError::BackendUnreachable(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tokio::net::TcpListener;

    fn client(request_secs: u64) -> UpstreamClient {
        let timeouts = TimeoutConfig {
            request_secs,
            ..TimeoutConfig::default()
        };
        UpstreamClient::new(&UpstreamConfig::default(), &timeouts, 1024)
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let request = Request::get(format!("http://{}/", addr)).body(Body::empty()).unwrap();
        let err = client(5).send(request).await.err().expect("expected upstream error");
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn silent_backend_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let request = Request::get(format!("http://{}/", addr)).body(Body::empty()).unwrap();
        let err = client(1).send(request).await.err().expect("expected upstream error");
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
