//! Default CORS policy for browser clients.
//!
//! Note:
//! - CORS is enforced by browsers. Server-to-server calls are not restricted by it.
//! - Route-specific config and backend services may add their own CORS headers;
//!   `cors_sanitizer` reconciles them afterwards.
//!
//! Policy:
//! - Allowlist origins from Config (exact match), WITH credentials.
//! - An empty allowlist allows no origin (no CORS headers at all).

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowHeaders, AllowOrigin, CorsLayer};

/// Apply the default CORS policy to the given Router.
///
/// IMPORTANT:
/// - Credentials are allowed, so origins and request headers are never `*`;
///   request headers are mirrored instead.
pub fn apply<S>(router: Router<S>, allowed_origins: &[String]) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(layer(allowed_origins))
}

pub fn layer(allowed_origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|s| match HeaderValue::from_str(s) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %s, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _req| {
        allowed.iter().any(|v| v == origin)
    });

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
        .expose_headers([header::AUTHORIZATION])
        .max_age(std::time::Duration::from_secs(60 * 10))
}
