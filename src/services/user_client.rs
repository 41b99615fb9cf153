//! Client for the external user service that checks raw credentials.
//!
//! The reply is untrusted: it is decoded into a typed structure and every
//! required field is checked before a `VerifiedUser` is handed out.
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::{fmt, time::Duration};
use thiserror::Error;
use url::Url;

/// Credentials forwarded verbatim to the user service.
#[derive(Clone, Serialize)]
pub struct Credentials {
    pub identifier: String,
    pub secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("identifier", &self.identifier)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Identity confirmed by the user service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedUser {
    pub subject: String,
    pub roles: Vec<String>,
}

#[derive(Debug, Error)]
pub enum UserServiceError {
    #[error("credentials rejected (status {0})")]
    Rejected(StatusCode),
    #[error("user service unavailable: {0}")]
    Unavailable(String),
    #[error("invalid user service reply: {0}")]
    InvalidReply(String),
}

/// Seam between the login flow and whatever validates credentials.
///
/// Implementations must be cheap to share (`Arc<dyn CredentialVerifier>`).
#[async_trait]
pub trait CredentialVerifier: Send + Sync + 'static {
    // Backend name, for logs.
    fn backend_name(&self) -> &'static str;

    async fn verify(&self, credentials: &Credentials) -> Result<VerifiedUser, UserServiceError>;
}

#[derive(Debug, Deserialize)]
struct ValidateUserReply {
    #[serde(default)]
    data: Option<UserRecord>,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    identifier: Option<String>,
    #[serde(default)]
    roles: Option<Vec<String>>,
}

impl ValidateUserReply {
    fn into_verified_user(self) -> Result<VerifiedUser, UserServiceError> {
        let user = self
            .data
            .ok_or_else(|| UserServiceError::InvalidReply("missing 'data'".into()))?;

        let non_blank = |s: &String| !s.trim().is_empty();
        let subject = user
            .email
            .filter(non_blank)
            .or(user.identifier.filter(non_blank))
            .ok_or_else(|| UserServiceError::InvalidReply("missing user identifier".into()))?;

        let roles = user
            .roles
            .filter(|r| !r.is_empty())
            .ok_or_else(|| UserServiceError::InvalidReply("missing or empty 'roles'".into()))?;

        Ok(VerifiedUser { subject, roles })
    }
}

/// HTTP implementation: `POST <uri>` with `{identifier, secret}`.
#[derive(Clone, Debug)]
pub struct UserServiceClient {
    http: reqwest::Client,
    uri: Url,
}

impl UserServiceClient {
    /// `timeout` bounds the whole exchange; exceeding it counts as unavailable.
    pub fn new(uri: Url, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(Self { http, uri })
    }
}

#[async_trait]
impl CredentialVerifier for UserServiceClient {
    fn backend_name(&self) -> &'static str {
        "user-service"
    }

    async fn verify(&self, credentials: &Credentials) -> Result<VerifiedUser, UserServiceError> {
        let response = self
            .http
            .post(self.uri.clone())
            .json(credentials)
            .send()
            .await
            .map_err(|e| UserServiceError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(UserServiceError::Unavailable(format!("status {status}")));
        }
        if !status.is_success() {
            return Err(UserServiceError::Rejected(status));
        }

        let reply: ValidateUserReply = response.json().await.map_err(|e| {
            if e.is_timeout() {
                UserServiceError::Unavailable(e.to_string())
            } else {
                UserServiceError::InvalidReply(e.to_string())
            }
        })?;

        reply.into_verified_user()
    }
}
