/*
 * Responsibility
 * - アプリ共通の AppError 定義
 * - IntoResponse 実装 (HTTP status / JSON error body)
 * - 認証失敗の種別 (AuthFailure) はログ用にのみ保持し、クライアントには返さない
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::config::ConfigError;
use crate::services::auth::KeyError;

/// Why a request was refused. Kept server-side for logs; the client only
/// ever sees a generic 401.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthFailure {
    #[error("missing Authorization header")]
    MissingAuthHeader,
    #[error("Authorization header is not a Bearer credential")]
    MalformedAuthHeader,
    #[error("token could not be parsed")]
    MalformedToken,
    #[error("token signature does not verify")]
    InvalidSignature,
    #[error("token has expired")]
    ExpiredToken,
    #[error("credentials rejected by identity service")]
    InvalidCredentials,
    #[error("identity service unavailable")]
    UpstreamUnavailable,
}

impl AuthFailure {
    /// Stable name used in log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingAuthHeader => "MissingAuthHeader",
            Self::MalformedAuthHeader => "MalformedAuthHeader",
            Self::MalformedToken => "MalformedToken",
            Self::InvalidSignature => "InvalidSignature",
            Self::ExpiredToken => "ExpiredToken",
            Self::InvalidCredentials => "InvalidCredentials",
            Self::UpstreamUnavailable => "UpstreamUnavailable",
        }
    }

    fn client_message(&self) -> &'static str {
        match self {
            Self::InvalidCredentials | Self::UpstreamUnavailable => "invalid credentials",
            _ => "unauthorized",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unauthorized: {}", .0.kind())]
    Unauthorized(AuthFailure),

    #[error("not found")]
    NotFound,

    #[error("internal server error")]
    Internal,
}

#[derive(Serialize)]
struct ErrorResponseBody {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::Unauthorized(failure) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                failure.client_message().to_string(),
            ),
            AppError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", "not found".to_string()),
            AppError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "internal server error".to_string(),
            ),
        };

        let body = ErrorResponseBody {
            error: ErrorBody { code, message },
        };

        let mut response = (status, Json(body)).into_response();
        // In-process only: lets outer layers (and tests) see the failure kind.
        if let AppError::Unauthorized(failure) = self {
            response.extensions_mut().insert(failure);
        }
        response
    }
}

impl From<ConfigError> for AppError {
    fn from(e: ConfigError) -> Self {
        tracing::error!(error = %e, kind = "StartupMisconfiguration", "refusing to start");
        AppError::Internal
    }
}

impl From<KeyError> for AppError {
    fn from(e: KeyError) -> Self {
        tracing::error!(error = %e, kind = "StartupMisconfiguration", "refusing to start");
        AppError::Internal
    }
}
