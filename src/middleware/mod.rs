//! HTTP middleware that authenticates requests and asserts identity.
//!
//! - **Exemptions**: configured path prefixes that skip authentication
//! - **Identity headers**: the fixed set of trusted `X-*` headers
//! - **Identity layer**: cookie token → verify → strip and set headers, or 401
//!
//! # Architecture
//!
//! ```text
//! Request → IdentityLayer → upstream forwarder → Response
//!                ↓
//!          401 Unauthorized (empty body)
//! ```

pub mod exemption;
pub mod headers;
pub mod identity;

pub use exemption::{ExemptionList, has_dot_segments};
pub use headers::{IDENTITY_HEADERS, IdentityHeaders, strip_identity_headers};
pub use identity::{
    DEFAULT_TOKEN_COOKIE, IdentityLayer, IdentityRewriter, IdentityService, Outcome, extract_token,
};
