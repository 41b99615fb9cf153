//! Repairs `Access-Control-Allow-Origin` after the whole chain has run.
//!
//! Several layers can emit CORS headers (default policy, route config, the
//! backend itself). Browsers reject a response carrying more than one
//! allow-origin value, or `*` together with credentials.
//!
//! Rules:
//! - A: several allow-origin values → keep the first that is not `*`;
//!   if all are `*`, keep a single `*`.
//! - B: `Access-Control-Allow-Credentials: true` with allow-origin `*` →
//!   replace `*` by the request `Origin` when present and non-blank.
//!   Without an `Origin` the `*` stays.
//!
//! Status and body are never touched. Must be the outermost layer.

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, HeaderValue, Request, header},
    middleware::{self, Next},
    response::Response,
};

const WILDCARD: &str = "*";

pub fn apply<S>(router: Router<S>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn(sanitize_middleware))
}

async fn sanitize_middleware(req: Request<Body>, next: Next) -> Response {
    let request_origin = req.headers().get(header::ORIGIN).cloned();

    let mut response = next.run(req).await;
    sanitize(response.headers_mut(), request_origin.as_ref());
    response
}

fn is_wildcard(value: &HeaderValue) -> bool {
    value.to_str().is_ok_and(|v| v.trim() == WILDCARD)
}

/// Apply rules A and B to `headers` in place.
pub fn sanitize(headers: &mut HeaderMap, request_origin: Option<&HeaderValue>) {
    let origins: Vec<HeaderValue> = headers
        .get_all(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .iter()
        .cloned()
        .collect();

    if origins.len() > 1 {
        let preferred = origins
            .iter()
            .find(|v| !is_wildcard(v))
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(WILDCARD));
        tracing::debug!(
            count = origins.len(),
            chosen = ?preferred,
            "collapsing duplicate Access-Control-Allow-Origin"
        );
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, preferred);
    }

    let allows_credentials = headers
        .get_all(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
        .iter()
        .any(|v| v.to_str().is_ok_and(|s| s.eq_ignore_ascii_case("true")));
    if !allows_credentials {
        return;
    }

    let origin_is_wildcard = headers
        .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .is_some_and(|v| v == WILDCARD);
    if !origin_is_wildcard {
        return;
    }

    match request_origin.filter(|o| o.to_str().is_ok_and(|s| !s.trim().is_empty())) {
        Some(origin) => {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin.clone());
        }
        None => {
            tracing::warn!("credentialed response keeps wildcard origin: request has no Origin");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get};
    use tower::ServiceExt;

    const APP: &str = "https://app.example.com";

    fn headers(pairs: &[(header::HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.append(name.clone(), HeaderValue::from_static(value));
        }
        map
    }

    fn allow_origins(map: &HeaderMap) -> Vec<&str> {
        map.get_all(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect()
    }

    #[test]
    fn specific_origin_beats_wildcard() {
        let mut map = headers(&[
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, APP),
        ]);
        sanitize(&mut map, None);
        assert_eq!(allow_origins(&map), vec![APP]);
    }

    #[test]
    fn first_non_wildcard_wins() {
        let mut map = headers(&[
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "https://first.example.com"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, " * "),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "https://second.example.com"),
        ]);
        sanitize(&mut map, None);
        assert_eq!(allow_origins(&map), vec!["https://first.example.com"]);
    }

    #[test]
    fn all_wildcards_collapse_to_one() {
        let mut map = headers(&[
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, " *"),
        ]);
        sanitize(&mut map, None);
        assert_eq!(allow_origins(&map), vec!["*"]);
    }

    #[test]
    fn single_value_is_left_alone() {
        let mut map = headers(&[(header::ACCESS_CONTROL_ALLOW_ORIGIN, APP)]);
        sanitize(&mut map, Some(&HeaderValue::from_static("https://other.example.com")));
        assert_eq!(allow_origins(&map), vec![APP]);
    }

    #[test]
    fn credentials_with_wildcard_use_request_origin() {
        let mut map = headers(&[
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_CREDENTIALS, "true"),
        ]);
        sanitize(&mut map, Some(&HeaderValue::from_static(APP)));
        assert_eq!(allow_origins(&map), vec![APP]);
    }

    #[test]
    fn credentials_flag_is_case_insensitive() {
        let mut map = headers(&[
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_CREDENTIALS, "TRUE"),
        ]);
        sanitize(&mut map, Some(&HeaderValue::from_static(APP)));
        assert_eq!(allow_origins(&map), vec![APP]);
    }

    #[test]
    fn wildcard_kept_without_request_origin() {
        for origin in [None, Some(HeaderValue::from_static("   "))] {
            let mut map = headers(&[
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                (header::ACCESS_CONTROL_ALLOW_CREDENTIALS, "true"),
            ]);
            sanitize(&mut map, origin.as_ref());
            assert_eq!(allow_origins(&map), vec!["*"]);
        }
    }

    #[test]
    fn wildcard_without_credentials_is_kept() {
        let mut map = headers(&[
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_CREDENTIALS, "false"),
        ]);
        sanitize(&mut map, Some(&HeaderValue::from_static(APP)));
        assert_eq!(allow_origins(&map), vec!["*"]);
    }

    #[test]
    fn collapse_then_credentials_rule() {
        let mut map = headers(&[
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_CREDENTIALS, "true"),
        ]);
        sanitize(&mut map, Some(&HeaderValue::from_static(APP)));
        assert_eq!(allow_origins(&map), vec![APP]);
    }

    #[test]
    fn other_headers_are_untouched() {
        let mut map = headers(&[
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, APP),
            (header::CONTENT_TYPE, "application/json"),
            (header::ACCESS_CONTROL_EXPOSE_HEADERS, "authorization"),
        ]);
        sanitize(&mut map, None);
        assert_eq!(map[header::CONTENT_TYPE], "application/json");
        assert_eq!(map[header::ACCESS_CONTROL_EXPOSE_HEADERS], "authorization");
    }

    #[tokio::test]
    async fn runs_after_inner_handlers() {
        async fn noisy_backend() -> (StatusCode, HeaderMap, &'static str) {
            let map = headers(&[
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
                (header::ACCESS_CONTROL_ALLOW_CREDENTIALS, "true"),
            ]);
            (StatusCode::ACCEPTED, map, "payload")
        }

        let app = apply(Router::new().route("/data", get(noisy_backend)));
        let req = Request::builder()
            .uri("/data")
            .header(header::ORIGIN, APP)
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(req).await.unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(allow_origins(response.headers()), vec![APP]);
    }
}
