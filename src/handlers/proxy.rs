//! Upstream forwarder.
//!
//! Sits behind the identity layer as the router fallback. Every request that
//! reaches it has either been authenticated (identity headers rewritten) or
//! matched an exemption prefix. It is relayed to the single configured
//! upstream with method, path, query, headers, and body preserved.
//!
//! Hop-by-hop headers (RFC 9110 §7.6.1) are dropped in both directions, as is
//! `Host`, which `reqwest` sets from the upstream URL. A `Connection` header
//! can name further hop-by-hop headers, but never the identity headers set by
//! the gateway.
//!
//! The request body is buffered through the `Bytes` extractor, so the
//! router's `DefaultBodyLimit` applies and oversized bodies get a 413.

use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::http::{Method, Uri};
use axum::response::Response;
use reqwest::Url;
use tracing::{debug, instrument, warn};

use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::middleware::IDENTITY_HEADERS;
use crate::state::AppState;

const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Forward a request to the upstream and relay its response.
#[instrument(skip_all, fields(method = %method, path = %uri.path()))]
pub async fn forward(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    mut headers: HeaderMap,
    body: Bytes,
) -> AppResult<Response> {
    let url = upstream_url(&state.upstream, &uri)?;
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);

    debug!(%url, body_bytes = body.len(), "Forwarding request upstream");

    let started = Instant::now();
    let result = state
        .client
        .request(method, url)
        .headers(headers)
        .body(body)
        .send()
        .await;

    let upstream = match result {
        Ok(resp) => resp,
        Err(e) => {
            metrics::record_upstream_request("error", started.elapsed().as_secs_f64());
            return Err(classify(e));
        }
    };

    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::CONTENT_LENGTH);

    let bytes = upstream.bytes().await.map_err(|e| {
        metrics::record_upstream_request("error", started.elapsed().as_secs_f64());
        classify(e)
    })?;
    metrics::record_upstream_request(status.as_str(), started.elapsed().as_secs_f64());

    debug!(status = status.as_u16(), body_bytes = bytes.len(), "Upstream responded");

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Join the request path and query onto the upstream base URL.
///
/// A base path such as `/api` is kept as a prefix: `/orders?id=1` becomes
/// `<base>/api/orders?id=1`.
///
/// # Errors
///
/// Returns `AppError::BadRequest` if URL normalization would change the
/// path, so the upstream always receives the path that was authenticated.
fn upstream_url(base: &Url, uri: &Uri) -> AppResult<Url> {
    let mut url = base.clone();
    let expected = format!("{}{}", base.path().trim_end_matches('/'), uri.path());
    url.set_path(&expected);
    url.set_query(uri.query());

    if url.path() != expected {
        warn!(path = uri.path(), normalized = url.path(), "Path changed by normalization");
        return Err(AppError::BadRequest(
            "Request path is not in canonical form".to_string(),
        ));
    }

    Ok(url)
}

/// Remove hop-by-hop headers, including any listed in `Connection` other
/// than the identity headers.
fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .filter(|name| !IDENTITY_HEADERS.contains(name))
        .collect();

    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

fn classify(e: reqwest::Error) -> AppError {
    if e.is_timeout() {
        AppError::UpstreamTimeout(e.to_string())
    } else {
        AppError::Upstream(e.to_string())
    }
}
