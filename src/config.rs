//! Gateway configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded once at startup from environment variables (a
//! `.env` file is honoured). Everything has a development default except the
//! token secret: without `JWT_SECRET` the gateway cannot decide who a request
//! belongs to, so it refuses to start.
//!
//! # Authentication
//!
//! - `JWT_SECRET`: shared HMAC secret, at least 32 bytes (required)
//! - `JWT_LEEWAY_SECS`: clock skew tolerated on `exp` (default: 0)
//! - `JWT_COOKIE_NAME`: cookie carrying the token (default: `jwt`)
//! - `EXCLUDE_PATHS`: comma-separated path prefixes exempt from authentication
//! - `IDENTITY_VARIANT`: `partner-id` (default) or `user-id`
//!
//! # Forwarding
//!
//! - `UPSTREAM_URL`: base URL every authenticated request is forwarded to
//! - `UPSTREAM_TIMEOUT_SECS`: upstream request timeout (default: 30)
//! - `MAX_REQUEST_BODY_SIZE`: largest request body forwarded (default: 10MB)
//!
//! Logging is configured by `RUST_LOG` directly, before this configuration
//! loads, so configuration errors are logged too.

use std::env;
use std::time::Duration;

use reqwest::Url;

use crate::error::{AppError, AppResult};
use crate::middleware::{DEFAULT_TOKEN_COOKIE, ExemptionList};
use crate::token::{IdentityVariant, SecretKey};

/// Gateway configuration.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// println!("Gateway will listen on {}", config.server_addr());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 8000)
    pub port: u16,

    // =========================================================================
    // Authentication Configuration
    // =========================================================================
    /// Shared token secret
    pub jwt_secret: SecretKey,

    /// Seconds of clock skew tolerated when checking `exp`
    pub jwt_leeway_secs: u64,

    /// Name of the cookie carrying the token
    pub cookie_name: String,

    /// Path prefixes that skip authentication
    pub exclude_paths: ExemptionList,

    /// Which secondary identifier tokens carry
    pub identity_variant: IdentityVariant,

    // =========================================================================
    // Upstream Configuration
    // =========================================================================
    /// Base URL requests are forwarded to (default: "http://127.0.0.1:8080")
    pub upstream_url: String,

    /// Timeout for a single upstream round trip
    pub upstream_timeout: Duration,

    /// Maximum request body size in bytes
    pub max_request_body_size: usize,

    // =========================================================================
    // Cross-Origin & Observability Configuration
    // =========================================================================
    /// Allowed CORS origins; "*" allows any origin
    pub cors_allowed_origins: Vec<String>,

    /// Port for Prometheus metrics endpoint (default: 9090, 0 = disabled)
    pub metrics_port: u16,
}

impl Config {
    /// Configuration with development defaults around the given secret.
    pub fn new(jwt_secret: SecretKey) -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            jwt_secret,
            jwt_leeway_secs: 0,
            cookie_name: DEFAULT_TOKEN_COOKIE.to_string(),
            exclude_paths: ExemptionList::default(),
            identity_variant: IdentityVariant::default(),
            upstream_url: "http://127.0.0.1:8080".to_string(),
            upstream_timeout: Duration::from_secs(30),
            max_request_body_size: 10 * 1024 * 1024, // 10MB
            cors_allowed_origins: vec!["*".to_string()],
            metrics_port: 9090,
        }
    }

    /// Load configuration from the process environment and `.env`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if `JWT_SECRET` is missing or too
    /// short, or any value fails to parse.
    pub fn from_env() -> AppResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = lookup("JWT_SECRET")
            .ok_or_else(|| AppError::ConfigError("JWT_SECRET must be set".to_string()))?;
        let defaults = Self::new(SecretKey::new(secret)?);

        let config = Self {
            // Server
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT", defaults.port)?,

            // Authentication
            jwt_secret: defaults.jwt_secret,
            jwt_leeway_secs: parse_var(&lookup, "JWT_LEEWAY_SECS", defaults.jwt_leeway_secs)?,
            cookie_name: lookup("JWT_COOKIE_NAME")
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(defaults.cookie_name),
            exclude_paths: lookup("EXCLUDE_PATHS")
                .map(|raw| ExemptionList::parse(&raw))
                .unwrap_or(defaults.exclude_paths),
            identity_variant: parse_var(&lookup, "IDENTITY_VARIANT", defaults.identity_variant)?,

            // Upstream
            upstream_url: lookup("UPSTREAM_URL")
                .map(|s| s.trim().to_string())
                .unwrap_or(defaults.upstream_url),
            upstream_timeout: Duration::from_secs(parse_var(
                &lookup,
                "UPSTREAM_TIMEOUT_SECS",
                defaults.upstream_timeout.as_secs(),
            )?),
            max_request_body_size: parse_var(
                &lookup,
                "MAX_REQUEST_BODY_SIZE",
                defaults.max_request_body_size,
            )?,

            // Cross-origin & observability
            cors_allowed_origins: lookup("CORS_ALLOWED_ORIGINS")
                .map(|raw| parse_list(&raw))
                .unwrap_or(defaults.cors_allowed_origins),
            metrics_port: parse_var(&lookup, "METRICS_PORT", defaults.metrics_port)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values for consistency and correctness.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if validation fails.
    fn validate(&self) -> AppResult<()> {
        self.upstream()?;

        if self.upstream_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "UPSTREAM_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        if self.max_request_body_size == 0 {
            return Err(AppError::ConfigError(
                "MAX_REQUEST_BODY_SIZE must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Parse and check the upstream base URL.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` unless the URL is absolute http(s)
    /// without a query or fragment.
    pub fn upstream(&self) -> AppResult<Url> {
        let url = Url::parse(&self.upstream_url)
            .map_err(|e| AppError::ConfigError(format!("Invalid UPSTREAM_URL: {e}")))?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(AppError::ConfigError(format!(
                "UPSTREAM_URL must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if url.query().is_some() || url.fragment().is_some() {
            return Err(AppError::ConfigError(
                "UPSTREAM_URL must not contain a query or fragment".to_string(),
            ));
        }

        Ok(url)
    }

    /// Get the full server address for binding.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if Prometheus metrics export is enabled.
    pub fn metrics_enabled(&self) -> bool {
        self.metrics_port > 0
    }

    /// Get the metrics endpoint address.
    ///
    /// Returns `None` if metrics are disabled (port = 0).
    pub fn metrics_addr(&self) -> Option<std::net::SocketAddr> {
        self.metrics_enabled()
            .then(|| std::net::SocketAddr::from(([0, 0, 0, 0], self.metrics_port)))
    }
}

/// Parse a variable into the specified type, falling back to a default.
fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> AppResult<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(val) => val
            .trim()
            .parse()
            .map_err(|e| AppError::ConfigError(format!("Invalid {name}: {e}"))),
        None => Ok(default),
    }
}

/// Split a comma-separated list, trimming entries and dropping blanks.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
