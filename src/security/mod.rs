//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → limits.rs (declared Content-Length against max body size)
//!     → access_control.rs (resolve client address, match allowed networks)
//!     → Pass to forwarder
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No backend contact for rejected requests
//! - Forwarded-for headers are trusted only from configured proxies

pub mod access_control;
pub mod cidr;
pub mod limits;

pub use access_control::AccessPolicy;
pub use cidr::IpNetwork;
