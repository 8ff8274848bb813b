//! Gateway health and readiness probes.
//!
//! # Endpoints
//!
//! - `GET /gateway/health` - Liveness, always 200 with details
//! - `GET /gateway/ready` - Readiness, 503 if the upstream cannot be reached
//!
//! Both are served by the gateway itself and are never forwarded. They live
//! under `/gateway/` so they cannot shadow an upstream `/health`.

use std::time::Duration;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{instrument, warn};

use crate::state::AppState;

/// Upper bound for the readiness probe's upstream round trip.
const READINESS_TIMEOUT: Duration = Duration::from_secs(2);

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub identity_variant: String,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

/// Health check endpoint.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "identity_variant": "partner-id",
///   "uptime_seconds": 3600,
///   "timestamp": "2024-01-15T10:30:00Z"
/// }
/// ```
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        identity_variant: state.config.identity_variant.to_string(),
        uptime_seconds: state.uptime_seconds(),
        timestamp: Utc::now(),
    })
}

/// Readiness check endpoint for Kubernetes probes.
///
/// The gateway is ready when the upstream answers at all. Any HTTP status
/// counts, since the upstream root may well return 404.
#[instrument(skip(state))]
pub async fn readiness_check(State(state): State<AppState>) -> Result<StatusCode, StatusCode> {
    let probe = state
        .client
        .head(state.upstream.clone())
        .timeout(READINESS_TIMEOUT)
        .send()
        .await;

    match probe {
        Ok(_) => Ok(StatusCode::OK),
        Err(e) => {
            warn!(error = %e, upstream = %state.upstream, "Upstream not reachable");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
