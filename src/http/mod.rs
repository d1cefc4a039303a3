//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, panic recovery)
//!     → proxy::Forwarder (policy checks, forwarding, relay)
//!         → request.rs (outbound header set, Host, X-Forwarded-*)
//!         → response.rs (client header set)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use server::{AppState, HttpServer, X_REQUEST_ID};
