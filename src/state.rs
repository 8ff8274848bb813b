//! Shared application state for Axum handlers.
//!
//! This module provides thread-safe, clonable state that is shared across
//! all request handlers. It includes:
//!
//! - **Rewriter**: Token validator plus exemption list, behind an `Arc`
//! - **Client**: Pooled `reqwest` client used by the upstream forwarder
//! - **Configuration**: Runtime configuration access
//!
//! # Thread Safety
//!
//! Nothing here is mutated after startup. Every component is either an `Arc`
//! or internally reference counted (`reqwest::Client`), so cloning per request
//! is cheap and no locks are taken.

use std::sync::Arc;
use std::time::Instant;

use reqwest::{Client, Url};
use tracing::info;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::middleware::IdentityRewriter;
use crate::token::TokenValidator;

/// Shared application state for Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Authentication and identity-header rewriting
    pub rewriter: Arc<IdentityRewriter>,
    /// HTTP client for the upstream service
    pub client: Client,
    /// Parsed upstream base URL
    pub upstream: Url,
    /// Timestamp when the application started
    pub started_at: Instant,
}

impl AppState {
    /// Build state from configuration.
    ///
    /// # Errors
    ///
    /// Returns `AppError::ConfigError` if the upstream URL is invalid, or
    /// `AppError::Internal` if the HTTP client cannot be built.
    pub fn new(config: Config) -> AppResult<Self> {
        let upstream = config.upstream()?;

        let validator = TokenValidator::new(
            &config.jwt_secret,
            config.identity_variant,
            config.jwt_leeway_secs,
        );
        let rewriter = IdentityRewriter::new(validator, config.exclude_paths.clone())
            .with_cookie_name(config.cookie_name.clone());

        info!(
            variant = %config.identity_variant,
            cookie = %config.cookie_name,
            exempt_prefixes = config.exclude_paths.len(),
            leeway_secs = config.jwt_leeway_secs,
            "Identity rewriter configured"
        );

        // Redirects are relayed to the caller, not followed
        let client = Client::builder()
            .timeout(config.upstream_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            rewriter: Arc::new(rewriter),
            client,
            upstream,
            started_at: Instant::now(),
        })
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
