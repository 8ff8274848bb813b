use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Reasons a request fails authentication.
///
/// Every variant is scoped to the single failing request and surfaces to the
/// client as the same bare `401 Unauthorized`. The variants and their reason
/// strings exist for logs and metrics only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("No token present in request")]
    MissingToken,

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Token signature verification failed: {0}")]
    BadSignature(String),

    #[error("Token expired: {0}")]
    ExpiredToken(String),

    #[error("Unsupported token format: {0}")]
    UnsupportedTokenFormat(String),

    #[error("Failed to decode token claims: {0}")]
    ClaimDecodeFailure(String),

    #[error("Claim cannot be carried in header {header}: {reason}")]
    HeaderEncoding { header: String, reason: String },

    #[error("Path contains dot segments: {0}")]
    NonCanonicalPath(String),
}

impl AuthError {
    /// Stable label used in log fields and metric labels.
    pub fn category(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::MalformedToken(_) => "malformed_token",
            AuthError::BadSignature(_) => "bad_signature",
            AuthError::ExpiredToken(_) => "expired_token",
            AuthError::UnsupportedTokenFormat(_) => "unsupported_token_format",
            AuthError::ClaimDecodeFailure(_) => "claim_decode_failure",
            AuthError::HeaderEncoding { .. } => "header_encoding",
            AuthError::NonCanonicalPath(_) => "non_canonical_path",
        }
    }

    /// Status code returned to the client. Always 401.
    pub fn status(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }
}

impl IntoResponse for AuthError {
    /// Empty body, no custom headers.
    fn into_response(self) -> Response {
        self.status().into_response()
    }
}

/// Application-wide error types with appropriate HTTP status codes.
///
/// `ConfigError` is raised during startup and stops the process before it
/// accepts traffic. The upstream variants are produced by the forwarder after
/// a request has already been authenticated.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Upstream request failed: {0}")]
    Upstream(String),

    #[error("Upstream request timed out: {0}")]
    UpstreamTimeout(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response body for gateway-generated errors.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Full details stay in the server log
        tracing::error!(error = %self, "Request failed");

        let (status, error_type, message) = match &self {
            AppError::Upstream(_) => (
                StatusCode::BAD_GATEWAY,
                "bad_gateway",
                "Upstream service is unavailable. Please try again later.",
            ),
            AppError::UpstreamTimeout(_) => (
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                "Upstream service did not respond in time. Please try again.",
            ),
            AppError::ConfigError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                "Gateway configuration error. Please contact support.",
            ),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred. Please contact support if the issue persists.",
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.as_str()),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: message.to_string(),
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;
