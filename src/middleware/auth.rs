//! Bearer token gate → `X-User-ID` identity header for downstream consumers.
//!
//! Order per request:
//! 1. exempt path (login, health) → `ANONYMOUS`, no validation
//! 2. `Authorization` present, else `MissingAuthHeader`
//! 3. `Bearer ` prefix (case-sensitive, one space), else `MalformedAuthHeader`
//! 4. token validation (`MalformedToken` / `InvalidSignature` / `ExpiredToken`)
//! 5. subject → `X-User-ID` on the forwarded request
//!
//! Every failure is a 401. This is the only writer of `X-User-ID`: a value
//! sent by the client is always replaced.

use axum::{
    Router,
    body::Body,
    extract::{OriginalUri, State},
    http::{HeaderMap, HeaderName, HeaderValue, Request, header},
    middleware::{self, Next},
    response::Response,
};
use std::sync::Arc;

use crate::error::{AppError, AuthFailure};
use crate::services::auth::{Claims, TokenError, TokenValidator};
use crate::state::AppState;

pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");
pub const ANONYMOUS: &str = "ANONYMOUS";

const BEARER_PREFIX: &str = "Bearer ";

/// Per-route settings. Only an on/off switch; a disabled filter still
/// stamps `ANONYMOUS` so downstream can rely on the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthFilterConfig {
    pub enabled: bool,
}

impl Default for AuthFilterConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Caller identity decided by the filter.
#[derive(Debug, Clone)]
pub enum Identity {
    Anonymous,
    Verified(Claims),
}

impl Identity {
    pub fn user_id(&self) -> &str {
        match self {
            Identity::Anonymous => ANONYMOUS,
            Identity::Verified(claims) => claims.subject(),
        }
    }
}

impl From<TokenError> for AuthFailure {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Malformed => AuthFailure::MalformedToken,
            TokenError::InvalidSignature => AuthFailure::InvalidSignature,
            TokenError::Expired => AuthFailure::ExpiredToken,
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthFilter {
    validator: Arc<TokenValidator>,
    exempt_paths: Arc<[String]>,
    config: AuthFilterConfig,
}

impl AuthFilter {
    pub fn new(validator: Arc<TokenValidator>, exempt_paths: Arc<[String]>) -> Self {
        Self {
            validator,
            exempt_paths,
            config: AuthFilterConfig::default(),
        }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.validator.clone(), state.exempt_paths.clone())
    }

    /// Same filter with route-specific settings.
    pub fn with_config(mut self, config: AuthFilterConfig) -> Self {
        self.config = config;
        self
    }

    /// Exempt entries match on a path-segment boundary:
    /// `/nexus/auth` covers `/nexus/auth/login` but not `/nexus/authz`.
    /// A path with `.`/`..` segments (plain or percent-encoded) is never
    /// exempt, since a later hop may resolve it somewhere else.
    pub fn is_exempt(&self, path: &str) -> bool {
        if has_dot_segment(path) {
            return false;
        }
        self.exempt_paths.iter().any(|prefix| match path.strip_prefix(prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.ends_with('/'),
            None => false,
        })
    }

    pub fn authenticate(&self, path: &str, headers: &HeaderMap) -> Result<Identity, AuthFailure> {
        if !self.config.enabled || self.is_exempt(path) {
            return Ok(Identity::Anonymous);
        }

        let auth = headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthFailure::MissingAuthHeader)?
            .to_str()
            .map_err(|_| AuthFailure::MalformedAuthHeader)?;

        let token = auth
            .strip_prefix(BEARER_PREFIX)
            .ok_or(AuthFailure::MalformedAuthHeader)?;

        let claims = self.validator.validate(token)?;
        Ok(Identity::Verified(claims))
    }
}

fn has_dot_segment(path: &str) -> bool {
    path.split('/').any(|segment| {
        let segment = segment.to_ascii_lowercase().replace("%2e", ".");
        segment == "." || segment == ".."
    })
}

/// Apply the auth filter to every route of `router`.
///
/// ```ignore
/// let router = middleware::auth::apply(router, AuthFilter::from_state(&state));
/// ```
pub fn apply<S>(router: Router<S>, filter: AuthFilter) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(filter, auth_middleware))
}

async fn auth_middleware(
    State(filter): State<AuthFilter>,
    OriginalUri(original_uri): OriginalUri,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let path = original_uri.path();

    let identity = filter.authenticate(path, req.headers()).map_err(|failure| {
        tracing::warn!(kind = failure.kind(), %path, "request rejected");
        AppError::Unauthorized(failure)
    })?;

    let user_id = HeaderValue::from_str(identity.user_id()).map_err(|_| {
        let failure = AuthFailure::MalformedToken;
        tracing::warn!(kind = failure.kind(), %path, "subject is not a valid header value");
        AppError::Unauthorized(failure)
    })?;

    // Forward a new request carrying the identity; the inbound one is consumed.
    let (mut parts, body) = req.into_parts();
    parts.headers.insert(USER_ID_HEADER, user_id);
    if let Identity::Verified(claims) = identity {
        tracing::debug!(
            subject = claims.subject(),
            issuer = ?claims.issuer(),
            alg = ?claims.algorithm(),
            expires_at = %claims.expires_at(),
            "request authenticated"
        );
        parts.extensions.insert(claims);
    }

    Ok(next.run(Request::from_parts(parts, body)).await)
}
