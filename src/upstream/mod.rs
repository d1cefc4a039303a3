//! Upstream subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarder
//!     → target.rs (base URL + original path/query → outbound URI, Host value)
//!     → client.rs (single attempt, head timeout, error classification)
//!     → Backend
//! ```

pub mod client;
pub mod target;

pub use client::{UpstreamBody, UpstreamClient};
pub use target::{TargetError, UpstreamTarget};
