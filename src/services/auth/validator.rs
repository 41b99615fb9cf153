use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, Validation, errors::ErrorKind};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

use crate::services::auth::keys::KeyMaterial;

// Errors returned by token verification. Callers log them per kind; the
// client-visible outcome is the same 401 for all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("expired token")]
    Expired,
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => Self::Expired,
            ErrorKind::InvalidToken
            | ErrorKind::Base64(_)
            | ErrorKind::Json(_)
            | ErrorKind::Utf8(_)
            | ErrorKind::MissingRequiredClaim(_) => Self::Malformed,
            // Anything else failed verification under our key: reject.
            _ => Self::InvalidSignature,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawClaims {
    sub: String,
    exp: i64,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    iss: Option<String>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// Verified token payload.
///
/// Only `TokenValidator` produces this type.
#[derive(Debug, Clone)]
pub struct Claims {
    subject: String,
    roles: Vec<String>,
    expires_at: DateTime<Utc>,
    issuer: Option<String>,
    algorithm: Algorithm,
    extra: serde_json::Map<String, serde_json::Value>,
}

impl Claims {
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Claims other than `sub`, `exp`, `roles` and `iss` (e.g. `iat`, `jti`).
    pub fn extra(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.extra
    }
}

/// Stateless verifier over the process-wide key material.
#[derive(Clone, Debug)]
pub struct TokenValidator {
    keys: Arc<KeyMaterial>,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(keys: Arc<KeyMaterial>) -> Self {
        let mut validation = Validation::new(keys.algorithm());
        validation.set_required_spec_claims(&["exp", "sub"]);
        // Expired means expired: no grace period.
        validation.leeway = 0;
        validation.validate_aud = false;

        Self { keys, validation }
    }

    /// Verify the signature under the configured algorithm, then expiry.
    pub fn validate(&self, token: &str) -> Result<Claims, TokenError> {
        let data =
            jsonwebtoken::decode::<RawClaims>(token, self.keys.decoding_key(), &self.validation)?;

        let raw = data.claims;
        // The subject becomes a header value downstream; it must be usable as one.
        if raw.sub.trim().is_empty() || raw.sub.chars().any(|c| c.is_control()) {
            return Err(TokenError::Malformed);
        }
        let expires_at = DateTime::from_timestamp(raw.exp, 0).ok_or(TokenError::Malformed)?;

        Ok(Claims {
            subject: raw.sub,
            roles: raw.roles,
            expires_at,
            issuer: raw.iss,
            algorithm: data.header.alg,
            extra: raw.extra,
        })
    }
}
