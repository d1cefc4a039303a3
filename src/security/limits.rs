//! Request body size limits.
//!
//! # Responsibilities
//! - Reject a declared Content-Length above the limit before reading the body
//! - Cap bodies of unknown length while they stream to the backend
//! - Recognise the cap firing inside a transport error
//!
//! # Design Decisions
//! - Limits checked before any backend contact when the length is declared
//! - Return 413 Payload Too Large in both cases

use std::error::Error as StdError;

use axum::body::Body;
use axum::http::{header, HeaderMap};
use http_body_util::{LengthLimitError, Limited};

use crate::error::ProxyError;

/// Declared body length, if the client sent a well-formed Content-Length.
pub fn declared_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Reject requests whose declared length exceeds `max_bytes`.
pub fn check_declared_length(headers: &HeaderMap, max_bytes: u64) -> Result<(), ProxyError> {
    match declared_length(headers) {
        Some(len) if len > max_bytes => Err(ProxyError::PayloadTooLarge { limit: max_bytes }),
        _ => Ok(()),
    }
}

/// Wrap a body so that it errors once more than `max_bytes` have been read.
pub fn limit_body(body: Body, max_bytes: u64) -> Body {
    let max = usize::try_from(max_bytes).unwrap_or(usize::MAX);
    Body::new(Limited::new(body, max))
}

/// True if `err` or any of its sources is the body cap firing.
pub fn is_length_limit(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        if e.is::<LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use http_body_util::BodyExt;

    fn with_length(len: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from_static(len));
        headers
    }

    #[test]
    fn declared_length_over_limit_rejected() {
        assert!(check_declared_length(&with_length("1025"), 1024).is_err());
        assert!(check_declared_length(&with_length("1024"), 1024).is_ok());
        assert!(check_declared_length(&HeaderMap::new(), 1024).is_ok());
    }

    #[tokio::test]
    async fn limited_body_reports_length_limit() {
        let body = limit_body(Body::from(vec![0u8; 64]), 16);
        let err = body.collect().await.unwrap_err();
        assert!(is_length_limit(&err));
    }

    #[tokio::test]
    async fn body_within_limit_passes_untouched() {
        let body = limit_body(Body::from("hello"), 16);
        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"hello");
    }

    #[test]
    fn unrelated_errors_are_not_length_limits() {
        let err = std::io::Error::other("reset");
        assert!(!is_length_limit(&err));
    }
}
