//! # Identity Gateway
//!
//! An authentication gateway that sits in front of backend services. Every
//! request carries a signed token in a cookie; the gateway verifies it,
//! replaces any caller-supplied identity headers with trusted ones derived
//! from the token's claims, and forwards the request. Backends read
//! `X-Account-Number`, `X-User-Type`, and friends without ever seeing or
//! parsing a token.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Request ID → Trace → CORS)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  /gateway/health, /gateway/ready  │  IdentityLayer          │
//! │                                   ├─────────────────────────┤
//! │                                   │  Upstream forwarder     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TokenValidator (HS256/384/512, exp + leeway)               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Using the layer directly
//!
//! The identity layer is an ordinary tower layer and works in front of any
//! `Service<Request<Body>>`:
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use identity_gateway::middleware::{ExemptionList, IdentityLayer, IdentityRewriter};
//! use identity_gateway::token::{IdentityVariant, SecretKey, TokenValidator};
//!
//! # fn main() -> Result<(), identity_gateway::AppError> {
//! let secret = SecretKey::new("an-hmac-secret-of-at-least-32-bytes!")?;
//! let validator = TokenValidator::new(&secret, IdentityVariant::PartnerId, 0);
//! let rewriter = IdentityRewriter::new(validator, ExemptionList::parse("/health,/api/auth/"));
//! let layer = IdentityLayer::new(Arc::new(rewriter));
//! # let _ = layer;
//! # Ok(())
//! # }
//! ```
//!
//! ## Running the gateway
//!
//! ```bash
//! JWT_SECRET=... UPSTREAM_URL=http://backend:8080 EXCLUDE_PATHS=/api/auth/ cargo run
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod shutdown;
pub mod state;
pub mod token;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult, AuthError};
pub use routes::build_router;
pub use state::AppState;
