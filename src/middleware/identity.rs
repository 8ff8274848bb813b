//! Cookie-token authentication that rewrites trusted identity headers.
//!
//! # Flow
//!
//! ```text
//! request ─► exempt path? ── yes ──► forward unchanged
//!                 │ no
//!                 ▼
//!          `jwt` cookie ─► verify ─► decode ─► encode headers
//!                 │          │         │            │
//!                 └──────────┴─────────┴────────────┴──► 401, inner not called
//!                                                   │ ok
//!                                                   ▼
//!                              strip client identity headers, set trusted ones
//!                                                   │
//!                                                   ▼
//!                                           forward to inner service
//! ```
//!
//! # Security Considerations
//!
//! - Clients can never pass their own identity headers through: every header
//!   in [`IDENTITY_HEADERS`](super::headers::IDENTITY_HEADERS) is removed
//!   before the trusted values are set.
//! - All failures converge on a bare 401; the category is only logged.
//! - The raw token and the secret never appear in logs.

use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{HeaderMap, Request, Response};
use axum::response::IntoResponse;
use axum_extra::extract::cookie::CookieJar;
use tower::{Layer, Service};
use tracing::{debug, warn};

use super::exemption::{ExemptionList, has_dot_segments};
use super::headers::IdentityHeaders;
use crate::error::AuthError;
use crate::metrics;
use crate::token::TokenValidator;

/// Default cookie carrying the session token.
pub const DEFAULT_TOKEN_COOKIE: &str = "jwt";

/// Result of running the rewriter over one request.
#[derive(Debug)]
pub enum Outcome<B> {
    /// Hand the (possibly rewritten) request to the next service.
    Forward(Request<B>),
    /// Answer with 401 without calling the next service.
    Reject(AuthError),
}

impl<B> Outcome<B> {
    pub fn is_forward(&self) -> bool {
        matches!(self, Outcome::Forward(_))
    }
}

/// Decides, per request, whether to forward and with which identity headers.
///
/// Immutable after construction; share it behind an `Arc`.
#[derive(Debug)]
pub struct IdentityRewriter {
    validator: TokenValidator,
    exemptions: ExemptionList,
    cookie_name: String,
}

impl IdentityRewriter {
    pub fn new(validator: TokenValidator, exemptions: ExemptionList) -> Self {
        Self {
            validator,
            exemptions,
            cookie_name: DEFAULT_TOKEN_COOKIE.to_string(),
        }
    }

    /// Read the token from a cookie other than `jwt`.
    pub fn with_cookie_name(mut self, cookie_name: impl Into<String>) -> Self {
        self.cookie_name = cookie_name.into();
        self
    }

    pub fn exemptions(&self) -> &ExemptionList {
        &self.exemptions
    }

    pub fn validator(&self) -> &TokenValidator {
        &self.validator
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Authenticate `req` and rewrite its identity headers.
    ///
    /// Exempt paths come back untouched. Otherwise the request is either
    /// forwarded with a complete set of trusted identity headers or rejected;
    /// a rejected request is never partially modified.
    pub fn process<B>(&self, mut req: Request<B>) -> Outcome<B> {
        let path = req.uri().path();

        // Exemptions match the raw path, so it must be the path forwarded
        if has_dot_segments(path) {
            let e = AuthError::NonCanonicalPath(path.to_string());
            warn!(path, category = e.category(), "Refusing non-canonical path");
            metrics::record_auth_outcome(metrics::OUTCOME_REJECTED);
            metrics::record_auth_rejection(e.category());
            return Outcome::Reject(e);
        }

        if self.exemptions.is_exempt(path) {
            debug!(path, "Exempt path, skipping authentication");
            metrics::record_auth_outcome(metrics::OUTCOME_EXEMPT);
            return Outcome::Forward(req);
        }

        let token = extract_token(req.headers(), &self.cookie_name);
        debug!(path, token_present = !token.is_empty(), "Authenticating request");

        let identity = match self.authenticate(&token) {
            Ok(identity) => identity,
            Err(e) => {
                warn!(
                    path,
                    category = e.category(),
                    reason = %e,
                    "Authentication failed"
                );
                metrics::record_auth_outcome(metrics::OUTCOME_REJECTED);
                metrics::record_auth_rejection(e.category());
                return Outcome::Reject(e);
            }
        };

        identity.apply(req.headers_mut());
        debug!(path = req.uri().path(), "Identity headers set");
        metrics::record_auth_outcome(metrics::OUTCOME_FORWARDED);

        Outcome::Forward(req)
    }

    fn authenticate(&self, token: &str) -> Result<IdentityHeaders, AuthError> {
        if token.trim().is_empty() {
            return Err(AuthError::MissingToken);
        }

        let claims = self.validator.verify(token)?;
        debug!(
            account_number = claims.subject(),
            user_type = %claims.principal_type(),
            company_name = claims.company_name(),
            headquarters_id = claims.headquarters_id(),
            partner_id = ?claims.partner_id(),
            user_id = ?claims.user_id(),
            level = ?claims.level(),
            tree_path = ?claims.tree_path(),
            "Decoded token claims"
        );

        IdentityHeaders::from_claims(&claims)
    }
}

/// Value of the named cookie, or an empty string when absent.
pub fn extract_token(headers: &HeaderMap, cookie_name: &str) -> String {
    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|cookie| cookie.value().to_string())
        .unwrap_or_default()
}

/// Tower layer applying [`IdentityRewriter`] in front of a service.
#[derive(Clone)]
pub struct IdentityLayer {
    rewriter: Arc<IdentityRewriter>,
}

impl IdentityLayer {
    pub fn new(rewriter: Arc<IdentityRewriter>) -> Self {
        Self { rewriter }
    }
}

impl<S> Layer<S> for IdentityLayer {
    type Service = IdentityService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        IdentityService {
            inner,
            rewriter: self.rewriter.clone(),
        }
    }
}

/// Service produced by [`IdentityLayer`].
#[derive(Clone)]
pub struct IdentityService<S> {
    inner: S,
    rewriter: Arc<IdentityRewriter>,
}

impl<S> Service<Request<Body>> for IdentityService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let outcome = self.rewriter.process(req);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            match outcome {
                Outcome::Forward(req) => inner.call(req).await,
                Outcome::Reject(e) => Ok(e.into_response()),
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::middleware::headers::{ACCOUNT_NUMBER, IDENTITY_HEADERS, PARTNER_ID, USER_TYPE};
    use crate::token::test_support::{OTHER_SECRET, TEST_SECRET, mint};
    use crate::token::{IdentityVariant, SecretKey};
    use axum::http::StatusCode;
    use chrono::Utc;
    use serde_json::{Value, json};
    use std::convert::Infallible;
    use std::sync::Mutex;
    use tower::ServiceExt;
    use tower::util::BoxCloneService;

    fn rewriter(exclude: &str) -> IdentityRewriter {
        let validator = TokenValidator::new(
            &SecretKey::new(TEST_SECRET).unwrap(),
            IdentityVariant::PartnerId,
            0,
        );
        IdentityRewriter::new(validator, ExemptionList::parse(exclude))
    }

    fn hq_token(secret: &str) -> String {
        mint(
            secret,
            &json!({
                "sub": "2412161700",
                "companyName": "Acme HQ",
                "userType": "HEADQUARTERS",
                "headquartersId": 77,
                "exp": Utc::now().timestamp() + 3600
            }),
        )
    }

    fn request(path: &str, cookie: Option<&str>) -> Request<()> {
        let mut builder = Request::builder().uri(path);
        if let Some(cookie) = cookie {
            builder = builder.header("cookie", cookie);
        }
        builder.body(()).unwrap()
    }

    fn forwarded(outcome: Outcome<()>) -> Request<()> {
        match outcome {
            Outcome::Forward(req) => req,
            Outcome::Reject(e) => panic!("expected forward, got reject: {e}"),
        }
    }

    fn rejected(outcome: Outcome<()>) -> AuthError {
        match outcome {
            Outcome::Reject(e) => e,
            Outcome::Forward(_) => panic!("expected reject, got forward"),
        }
    }

    #[test]
    fn test_extract_token_from_cookie_header() {
        let req = request("/", Some("theme=dark; jwt=abc.def.ghi; lang=ko"));
        assert_eq!(extract_token(req.headers(), "jwt"), "abc.def.ghi");
    }

    #[test]
    fn test_extract_token_absent_is_empty() {
        let req = request("/", Some("theme=dark"));
        assert_eq!(extract_token(req.headers(), "jwt"), "");

        let req = request("/", None);
        assert_eq!(extract_token(req.headers(), "jwt"), "");
    }

    #[test]
    fn test_missing_cookie_rejects() {
        let err = rejected(rewriter("").process(request("/api/orders", None)));
        assert_eq!(err, AuthError::MissingToken);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_empty_cookie_rejects() {
        let err = rejected(rewriter("").process(request("/api/orders", Some("jwt="))));
        assert_eq!(err, AuthError::MissingToken);
    }

    #[test]
    fn test_foreign_signature_rejects() {
        let cookie = format!("jwt={}", hq_token(OTHER_SECRET));
        let err = rejected(rewriter("").process(request("/api/orders", Some(&cookie))));
        assert_eq!(err.category(), "bad_signature");
    }

    #[test]
    fn test_exempt_path_skips_cookie_and_headers() {
        let req = Request::builder()
            .uri("/health")
            .header("cookie", "jwt=garbage")
            .header("X-Account-Number", "client-value")
            .body(())
            .unwrap();

        let out = forwarded(rewriter("/health,/api/auth/").process(req));

        assert_eq!(out.headers().get("x-account-number").unwrap(), "client-value");
        assert!(out.headers().get(&USER_TYPE).is_none());
    }

    #[test]
    fn test_dot_segments_never_match_an_exemption() {
        let rewriter = rewriter("/health,/api/auth/");

        for path in ["/health/../api/orders", "/health/%2e%2e/api/orders"] {
            let err = rejected(rewriter.process(request(path, None)));
            assert_eq!(err.category(), "non_canonical_path");
        }

        // A valid token does not make a dot-segment path acceptable either
        let cookie = format!("jwt={}", hq_token(TEST_SECRET));
        let err = rejected(rewriter.process(request("/api/./orders", Some(&cookie))));
        assert_eq!(err.category(), "non_canonical_path");
    }

    #[test]
    fn test_valid_token_replaces_spoofed_headers() {
        let req = Request::builder()
            .uri("/api/orders")
            .header("cookie", format!("jwt={}", hq_token(TEST_SECRET)))
            .header("X-Account-Number", "attacker")
            .header("X-ACCOUNT-NUMBER", "attacker-2")
            .header("X-Partner-Id", "1")
            .body(())
            .unwrap();

        let out = forwarded(rewriter("/health").process(req));

        assert_eq!(out.headers().get(&ACCOUNT_NUMBER).unwrap(), "2412161700");
        assert_eq!(out.headers().get(&USER_TYPE).unwrap(), "HEADQUARTERS");
        assert!(out.headers().get(&PARTNER_ID).is_none());
        assert_eq!(out.headers().get_all(&ACCOUNT_NUMBER).iter().count(), 1);
    }

    #[test]
    fn test_custom_cookie_name() {
        let cookie = format!("session={}", hq_token(TEST_SECRET));
        let rewriter = rewriter("").with_cookie_name("session");

        assert!(rewriter.process(request("/x", Some(&cookie))).is_forward());
        assert!(!rewriter.process(request("/x", Some("jwt=whatever"))).is_forward());
    }

    #[test]
    fn test_unencodable_claim_rejects_without_mutation() {
        let token = mint(
            TEST_SECRET,
            &json!({
                "sub": "2412161700",
                "companyName": "bad\u{7f}name",
                "userType": "HEADQUARTERS",
                "headquartersId": 77
            }),
        );
        let cookie = format!("jwt={token}");
        let err = rejected(rewriter("").process(request("/api", Some(&cookie))));
        assert_eq!(err.category(), "header_encoding");
    }

    /// Inner service that records the headers it was called with.
    fn recording_service(
        seen: Arc<Mutex<Vec<HeaderMap>>>,
    ) -> BoxCloneService<Request<Body>, Response<Body>, Infallible> {
        BoxCloneService::new(tower::service_fn(move |req: Request<Body>| {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(req.headers().clone());
                Ok::<_, Infallible>(Response::new(Body::from("upstream")))
            }
        }))
    }

    #[tokio::test]
    async fn test_layer_rejects_without_calling_inner() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let service =
            IdentityLayer::new(Arc::new(rewriter(""))).layer(recording_service(seen.clone()));

        let req = Request::builder()
            .uri("/api/orders")
            .body(Body::empty())
            .unwrap();
        let response = service.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_layer_forwards_rewritten_request() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let service =
            IdentityLayer::new(Arc::new(rewriter(""))).layer(recording_service(seen.clone()));

        let req = Request::builder()
            .uri("/api/orders")
            .header("cookie", format!("jwt={}", hq_token(TEST_SECRET)))
            .header("x-level", "9")
            .body(Body::empty())
            .unwrap();
        let response = service.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let seen = seen.lock().unwrap();
        let headers = seen.first().unwrap();
        assert_eq!(headers.get("x-level").unwrap(), "0");
        assert_eq!(headers.get("x-tree-path").unwrap(), "/2412161700/");
        let identity_count = IDENTITY_HEADERS
            .iter()
            .filter(|name| headers.contains_key(*name))
            .count();
        assert_eq!(identity_count, 6);
    }

    #[test]
    fn test_rejects_claims_missing_for_variant() {
        let payload: Value = json!({
            "sub": "2412161700-L1-001",
            "companyName": "Supplier",
            "userType": "PARTNER",
            "headquartersId": 77,
            "level": 1,
            "treePath": "/1/L1-001/"
        });
        let cookie = format!("jwt={}", mint(TEST_SECRET, &payload));
        let err = rejected(rewriter("").process(request("/api", Some(&cookie))));
        assert_eq!(err.category(), "claim_decode_failure");
    }
}
