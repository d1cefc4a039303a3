//! Proxy forwarder subsystem.
//!
//! # Data Flow
//! ```text
//! Client → [method / size / access checks] → [request transform]
//!        → UpstreamClient → Backend
//!        → [response transform] → RelayBody → Client
//! ```

pub mod forwarder;
pub mod relay;

pub use forwarder::{is_supported_method, Forwarder};
pub use relay::{RelayBody, RelayError};
