//! Session token verification and claim decoding.
//!
//! - [`SecretKey`]: the shared HMAC secret, validated once at startup
//! - [`TokenValidator`]: signature, algorithm and expiry checks
//! - [`ClaimSet`]: typed identity claims of an authenticated principal

pub mod claims;
pub mod secret;
pub mod validator;

pub use claims::{ClaimSet, IdentityVariant, LinkedId, PrincipalType};
pub use secret::{MIN_SECRET_LEN, SecretKey};
pub use validator::{ACCEPTED_ALGORITHMS, TokenValidator};
