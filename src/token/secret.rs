//! Shared HMAC secret used to verify session tokens.

use std::fmt;
use std::sync::Arc;

use jsonwebtoken::DecodingKey;

use crate::error::{AppError, AppResult};

/// Minimum secret length in bytes (256 bits, the HS256 key size).
pub const MIN_SECRET_LEN: usize = 32;

/// Process-wide token secret.
///
/// Built once at startup from configuration and injected into the
/// [`TokenValidator`](super::TokenValidator). There is no way to mutate or
/// rotate it at runtime; rotating means restarting with new configuration.
///
/// The `Debug` output never contains the key material.
#[derive(Clone)]
pub struct SecretKey(Arc<[u8]>);

impl SecretKey {
    /// Wrap a raw secret, rejecting blank or too-short values.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` when the secret is blank or shorter than
    /// [`MIN_SECRET_LEN`] bytes.
    pub fn new(secret: impl AsRef<[u8]>) -> AppResult<Self> {
        let bytes = secret.as_ref();

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(AppError::ConfigError("JWT_SECRET must not be blank".to_string()));
        }

        if bytes.len() < MIN_SECRET_LEN {
            return Err(AppError::ConfigError(format!(
                "JWT_SECRET must be at least {MIN_SECRET_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        Ok(Self(Arc::from(bytes)))
    }

    /// Length of the key in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always false; blank secrets are rejected by [`SecretKey::new`].
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub(crate) fn decoding_key(&self) -> DecodingKey {
        DecodingKey::from_secret(&self.0)
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretKey(<redacted, {} bytes>)", self.0.len())
    }
}
