//! The fixed backend every request is sent to.

use std::str::FromStr;

use axum::http::uri::{Authority, PathAndQuery, Scheme};
use axum::http::{HeaderValue, Uri};
use thiserror::Error;
use url::{Position, Url};

#[derive(Debug, Error)]
pub enum TargetError {
    #[error("invalid upstream URL: {0}")]
    Parse(#[from] url::ParseError),
    #[error("unsupported scheme {0:?} (only http is supported)")]
    Scheme(String),
    #[error("upstream URL has no host")]
    MissingHost,
    #[error("upstream URL must not carry credentials, a query or a fragment")]
    ExtraComponents,
    #[error("invalid upstream authority {0:?}")]
    Authority(String),
}

/// Parsed upstream base URL: `http://host[:port][/prefix]`.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    authority: Authority,
    base_path: String,
    host_value: HeaderValue,
}

impl UpstreamTarget {
    pub fn parse(base_url: &str) -> Result<Self, TargetError> {
        let url = Url::parse(base_url)?;

        if url.scheme() != "http" {
            return Err(TargetError::Scheme(url.scheme().to_string()));
        }
        if url.host_str().is_none() {
            return Err(TargetError::MissingHost);
        }
        if !url.username().is_empty()
            || url.password().is_some()
            || url.query().is_some()
            || url.fragment().is_some()
        {
            return Err(TargetError::ExtraComponents);
        }

        // `host[:port]` exactly as written, IPv6 brackets included.
        let authority_str = &url[Position::BeforeHost..Position::AfterPort];
        let authority = Authority::from_str(authority_str)
            .map_err(|_| TargetError::Authority(authority_str.to_string()))?;
        let host_value = HeaderValue::from_str(authority.as_str())
            .map_err(|_| TargetError::Authority(authority_str.to_string()))?;

        let base_path = url.path().trim_end_matches('/').to_string();

        Ok(Self {
            authority,
            base_path,
            host_value,
        })
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Value for an outbound `Host` header naming the backend itself.
    pub fn host_header(&self) -> &HeaderValue {
        &self.host_value
    }

    /// Outbound URI: base prefix + original path and query, verbatim.
    pub fn uri_for(&self, original: &Uri) -> Result<Uri, axum::http::Error> {
        let original_pq = original.path_and_query().map(PathAndQuery::as_str).unwrap_or("/");
        let path_and_query = if self.base_path.is_empty() {
            PathAndQuery::from_str(original_pq)?
        } else {
            PathAndQuery::from_str(&format!("{}{}", self.base_path, original_pq))?
        };

        Uri::builder()
            .scheme(Scheme::HTTP)
            .authority(self.authority.clone())
            .path_and_query(path_and_query)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(s: &str) -> UpstreamTarget {
        UpstreamTarget::parse(s).unwrap()
    }

    #[test]
    fn keeps_path_and_query_verbatim() {
        let t = target("http://10.128.0.63:8096");
        let original: Uri = "/Videos/abc%20def/stream?static=true&x=%2F".parse().unwrap();
        assert_eq!(
            t.uri_for(&original).unwrap().to_string(),
            "http://10.128.0.63:8096/Videos/abc%20def/stream?static=true&x=%2F"
        );
    }

    #[test]
    fn prefixes_base_path() {
        let t = target("http://backend:8096/jellyfin/");
        let original: Uri = "/web/index.html?a=1".parse().unwrap();
        assert_eq!(
            t.uri_for(&original).unwrap().to_string(),
            "http://backend:8096/jellyfin/web/index.html?a=1"
        );
    }

    #[test]
    fn root_path_with_root_base() {
        let t = target("http://backend/");
        let original: Uri = "/".parse().unwrap();
        assert_eq!(t.uri_for(&original).unwrap().to_string(), "http://backend/");
        assert_eq!(t.host_header(), "backend");
    }

    #[test]
    fn ipv6_authority_keeps_brackets() {
        let t = target("http://[fd00::5]:8096");
        assert_eq!(t.authority().as_str(), "[fd00::5]:8096");
    }

    #[test]
    fn rejects_unsupported_urls() {
        assert!(matches!(UpstreamTarget::parse("https://backend"), Err(TargetError::Scheme(_))));
        assert!(matches!(
            UpstreamTarget::parse("http://backend/?q=1"),
            Err(TargetError::ExtraComponents)
        ));
        assert!(matches!(
            UpstreamTarget::parse("http://user:pw@backend"),
            Err(TargetError::ExtraComponents)
        ));
        assert!(UpstreamTarget::parse("not a url").is_err());
    }
}
