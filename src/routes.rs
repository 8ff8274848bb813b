//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │   Request ID     │ ← Sets X-Request-Id if absent, copies it to the response
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │      CORS        │ ← Cross-origin headers, preflight answered here
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │   Body Limit     │ ← 413 once the forwarder reads past MAX_REQUEST_BODY_SIZE
//! └────────┬─────────┘
//!          │
//!          ├── /gateway/health, /gateway/ready (local)
//!          │
//!          ▼ fallback
//! ┌──────────────────┐
//! │ Identity Layer   │ ← 401 if the path has dot segments, or the cookie
//! └────────┬─────────┘   token is missing or invalid (exempt prefixes skip
//!          │             the token check)
//!          │
//!          ▼
//!   Upstream forwarder
//! ```

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::handler::Handler;
use axum::http::HeaderValue;
use axum::routing::get;
use tower::Layer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::handlers;
use crate::middleware::IdentityLayer;
use crate::state::AppState;

/// Build the gateway router with all routes and middleware configured.
pub fn build_router(state: AppState) -> Router {
    let config = &state.config;

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    let cors = build_cors_layer(&config.cors_allowed_origins);

    // =========================================================================
    // Authenticated Fallback
    // =========================================================================
    let forwarder = handlers::forward.with_state(state.clone());
    let gateway = IdentityLayer::new(state.rewriter.clone()).layer(forwarder);

    info!(
        upstream = %state.upstream,
        timeout_secs = config.upstream_timeout.as_secs(),
        max_body_mb = config.max_request_body_size / (1024 * 1024),
        "Upstream forwarding configured"
    );

    // =========================================================================
    // Apply Middleware Stack (order matters - applied bottom to top)
    // =========================================================================
    Router::new()
        .route("/gateway/health", get(handlers::health_check))
        .route("/gateway/ready", get(handlers::readiness_check))
        .fallback_service(gateway)
        .layer(DefaultBodyLimit::max(config.max_request_body_size))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// Build CORS layer from configuration.
///
/// # Arguments
///
/// * `allowed_origins` - List of allowed origins, or `["*"]` for any origin
///
/// Credentialed requests (the token cookie) are only allowed with explicit
/// origins; browsers refuse credentials for a wildcard origin.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_any = allowed_origins.iter().any(|o| o == "*");

    if allow_any {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(origin) => Some(origin),
                Err(e) => {
                    warn!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(tower_http::cors::AllowMethods::mirror_request())
            .allow_headers(tower_http::cors::AllowHeaders::mirror_request())
            .allow_credentials(true)
    }
}
