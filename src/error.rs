//! Request-path error taxonomy.
//!
//! Every failure on the forwarding path ends up as one of these variants and
//! is converted to a client response at the request boundary. Bodies are
//! short fixed strings; backend details only reach the logs.

use std::error::Error as StdError;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Boxed error used for transport and body failures.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Methods the proxy forwards. Everything else is answered with 405.
pub const SUPPORTED_METHODS: &str = "GET, POST, PUT, DELETE, PATCH, OPTIONS, HEAD";

#[derive(Debug, Error)]
pub enum ProxyError {
    /// Source address outside every allowed network.
    #[error("client {client} is not in an allowed network")]
    PolicyDenied { client: String },

    /// Declared or observed body size above the configured limit.
    #[error("request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: u64 },

    /// Connect failure, DNS failure or any transport error talking to the backend.
    #[error("upstream unreachable")]
    BackendUnreachable(#[source] BoxError),

    /// No response head within the configured timeout.
    #[error("upstream did not respond within {0:?}")]
    BackendTimeout(Duration),

    #[error("method {0} is not supported")]
    UnsupportedMethod(Method),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::PolicyDenied { .. } => StatusCode::FORBIDDEN,
            ProxyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ProxyError::BackendUnreachable(_) => StatusCode::BAD_GATEWAY,
            ProxyError::BackendTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ProxyError::UnsupportedMethod(_) => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used for metrics and log fields.
    pub fn reason(&self) -> &'static str {
        match self {
            ProxyError::PolicyDenied { .. } => "policy_denied",
            ProxyError::PayloadTooLarge { .. } => "payload_too_large",
            ProxyError::BackendUnreachable(_) => "backend_unreachable",
            ProxyError::BackendTimeout(_) => "backend_timeout",
            ProxyError::UnsupportedMethod(_) => "unsupported_method",
            ProxyError::Internal(_) => "internal",
        }
    }

    /// True for failures caused by the client or its policy, not by the backend or the proxy.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            ProxyError::PolicyDenied { .. }
                | ProxyError::PayloadTooLarge { .. }
                | ProxyError::UnsupportedMethod(_)
        )
    }

    fn client_message(&self) -> &'static str {
        match self {
            ProxyError::PolicyDenied { .. } => "403 - Access denied",
            ProxyError::PayloadTooLarge { .. } => "413 - Request body too large",
            ProxyError::BackendUnreachable(_) => "502 - Could not connect to the upstream server",
            ProxyError::BackendTimeout(_) => "504 - Upstream server timed out",
            ProxyError::UnsupportedMethod(_) => "405 - Method not allowed",
            ProxyError::Internal(_) => INTERNAL_ERROR_BODY,
        }
    }
}

pub const INTERNAL_ERROR_BODY: &str = "500 - Internal server error";
pub const NOT_FOUND_BODY: &str = "404 - Resource not found";

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let mut response = (self.status(), self.client_message()).into_response();
        if let ProxyError::UnsupportedMethod(_) = self {
            response
                .headers_mut()
                .insert(header::ALLOW, HeaderValue::from_static(SUPPORTED_METHODS));
        }
        response
    }
}

/// Render an error with its whole source chain, e.g. for logs.
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
