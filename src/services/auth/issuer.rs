use jsonwebtoken::Header;
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::error::AppError;
use crate::services::auth::keys::KeyMaterial;

#[derive(Debug, Serialize)]
struct IssuedClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    roles: &'a [String],
    iat: i64,
    exp: i64,
    jti: String,
}

/// Signs login tokens with the same key material and algorithm the
/// validator verifies against.
#[derive(Clone, Debug)]
pub struct TokenIssuer {
    keys: Arc<KeyMaterial>,
    issuer: String,
    ttl_seconds: u64,
}

impl TokenIssuer {
    pub fn new(keys: Arc<KeyMaterial>, issuer: String, ttl_seconds: u64) -> Self {
        Self {
            keys,
            issuer,
            ttl_seconds,
        }
    }

    /// Issue a signed token for `subject` carrying `roles` in order.
    pub fn issue(&self, subject: &str, roles: &[String]) -> Result<String, AppError> {
        let now = chrono::Utc::now().timestamp();
        let ttl = i64::try_from(self.ttl_seconds).unwrap_or(i64::MAX);

        let claims = IssuedClaims {
            iss: &self.issuer,
            sub: subject,
            roles,
            iat: now,
            exp: now.saturating_add(ttl),
            jti: Uuid::new_v4().to_string(),
        };

        let mut header = Header::new(self.keys.algorithm());
        header.typ = Some("JWT".to_string());
        jsonwebtoken::encode(&header, &claims, self.keys.encoding_key()).map_err(|e| {
            error!(error = %e, "failed to sign JWT");
            AppError::Internal
        })
    }
}
