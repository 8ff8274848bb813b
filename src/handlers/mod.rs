//! HTTP request handlers.
//!
//! - [`health`] - the gateway's own liveness and readiness probes
//! - [`proxy`] - the upstream forwarder behind the identity layer

pub mod health;
pub mod proxy;

pub use health::{health_check, readiness_check};
pub use proxy::forward;
