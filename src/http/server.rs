//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the catch-all proxy handler
//! - Wire up middleware (request ID, tracing, panic recovery)
//! - Bind server to listener and shut down gracefully
//! - Log and count every request at the request boundary

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{ConfigError, ProxyConfig};
use crate::error::{error_chain, INTERNAL_ERROR_BODY, NOT_FOUND_BODY};
use crate::observability::metrics;
use crate::proxy::Forwarder;

pub const X_REQUEST_ID: &str = "x-request-id";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub forwarder: Arc<Forwarder>,
}

/// HTTP server for the relay proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        let forwarder = Arc::new(Forwarder::from_config(&config)?);

        tracing::info!(
            upstream = %forwarder.target().authority(),
            max_body_bytes = config.limits.max_body_bytes,
            request_timeout_secs = config.timeouts.request_secs,
            allowed_networks = ?config.access.allowed_networks,
            client_address = ?config.access.client_address,
            "Forwarder ready"
        );

        let state = AppState { forwarder };
        let router = Self::build_router(state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(proxy_handler))
            .route("/", any(proxy_handler))
            .fallback(not_found)
            .with_state(state)
            .layer(CatchPanicLayer::custom(handle_panic))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until the shutdown signal fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            upstream = %self.config.upstream.base_url,
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
/// Runs the forwarding pipeline and converts failures at the boundary.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start_time = Instant::now();
    let method = request.method().clone();
    let method_str = method.to_string();
    let path = request.uri().path().to_string();

    match state.forwarder.forward(peer, request).await {
        Ok(response) => {
            let status = response.status();
            tracing::info!(
                method = %method,
                path = %path,
                client = %peer,
                status = status.as_u16(),
                elapsed_ms = start_time.elapsed().as_millis() as u64,
                "Request completed"
            );
            metrics::record_request(&method_str, status.as_u16(), start_time);
            response
        }
        Err(err) => {
            let status = err.status();
            let elapsed_ms = start_time.elapsed().as_millis() as u64;
            match &err {
                e if e.is_rejection() => tracing::warn!(
                    method = %method,
                    path = %path,
                    client = %peer,
                    reason = e.reason(),
                    status = status.as_u16(),
                    "Request rejected: {}", e
                ),
                e => tracing::error!(
                    method = %method,
                    path = %path,
                    client = %peer,
                    reason = e.reason(),
                    status = status.as_u16(),
                    elapsed_ms,
                    error = %error_chain(e),
                    "Request failed"
                ),
            }
            if err.is_rejection() {
                metrics::record_rejection(err.reason());
            }
            metrics::record_request(&method_str, status.as_u16(), start_time);
            err.into_response()
        }
    }
}

async fn not_found(request: Request<Body>) -> Response {
    tracing::warn!(method = %request.method(), uri = %request.uri(), "No route for request target");
    (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response()
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(panic = %detail, "Handler panicked");
    metrics::record_panic();

    (StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR_BODY).into_response()
}
