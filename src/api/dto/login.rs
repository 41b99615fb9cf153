use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AppError;
use crate::services::user_client::Credentials;

/// Request body for `POST /nexus/auth/login`.
///
/// `email` / `password` are accepted as aliases for older clients.
#[derive(Clone, Deserialize)]
pub struct LoginRequest {
    #[serde(alias = "email")]
    pub identifier: String,
    #[serde(alias = "password")]
    pub secret: String,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}

impl TryFrom<LoginRequest> for Credentials {
    type Error = AppError;

    fn try_from(req: LoginRequest) -> Result<Self, Self::Error> {
        if req.identifier.trim().is_empty() || req.secret.is_empty() {
            return Err(AppError::InvalidRequest(
                "identifier and secret are required".to_string(),
            ));
        }

        Ok(Credentials {
            identifier: req.identifier,
            secret: req.secret,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    pub message: String,
}
