//! Response handling and transformation.
//!
//! # Responsibilities
//! - Transform backend response headers for the client
//! - Copy the backend status verbatim
//!
//! # Design Decisions
//! - The relay re-frames the body, so framing headers from the backend are dropped
//! - Content-Encoding is dropped because the client decodes encoded bodies
//! - Hop-by-hop headers and those named in `Connection` stripped automatically

use axum::http::HeaderMap;

use crate::http::request::strip_headers;

/// Headers never copied from the backend to the client.
pub const RESPONSE_EXCLUDED_HEADERS: &[&str] = &[
    "content-encoding",
    "content-length",
    "transfer-encoding",
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "upgrade",
];

/// Copy `backend` minus the exclusion set and any header listed in its `Connection` value.
pub fn relay_headers(backend: &HeaderMap) -> HeaderMap {
    strip_headers(backend, RESPONSE_EXCLUDED_HEADERS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn drops_framing_and_hop_by_hop() {
        let mut backend = HeaderMap::new();
        backend.append("content-type", HeaderValue::from_static("video/mp4"));
        backend.append("content-length", HeaderValue::from_static("1048576"));
        backend.append("content-encoding", HeaderValue::from_static("gzip"));
        backend.append("transfer-encoding", HeaderValue::from_static("chunked"));
        backend.append("connection", HeaderValue::from_static("keep-alive"));
        backend.append("keep-alive", HeaderValue::from_static("timeout=5"));
        backend.append("accept-ranges", HeaderValue::from_static("bytes"));

        let out = relay_headers(&backend);
        let names: Vec<_> = out.keys().map(|k| k.as_str()).collect();
        assert_eq!(names, vec!["content-type", "accept-ranges"]);
    }

    #[test]
    fn keeps_location_and_repeated_cookies() {
        let mut backend = HeaderMap::new();
        backend.append("location", HeaderValue::from_static("/web/index.html"));
        backend.append("set-cookie", HeaderValue::from_static("a=1; Path=/"));
        backend.append("set-cookie", HeaderValue::from_static("b=2; Path=/"));

        let out = relay_headers(&backend);
        assert_eq!(out["location"], "/web/index.html");
        let cookies: Vec<_> = out.get_all("set-cookie").iter().collect();
        assert_eq!(cookies, vec!["a=1; Path=/", "b=2; Path=/"]);
    }
}
