//! Single-hop HTTP reverse proxy library.
//!
//! Every inbound request is checked against a static access policy,
//! rewritten for one fixed upstream, sent exactly once, and the upstream
//! response is streamed back with hop-by-hop headers removed.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod security;
pub mod upstream;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
