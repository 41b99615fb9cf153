use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::api::dto::login::{LoginRequest, LoginResponse};
use crate::error::AppError;
use crate::services::user_client::Credentials;
use crate::state::AppState;

/// `POST /nexus/auth/login`
///
/// 401 with a generic message on any failure; the reason stays in the logs.
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<(StatusCode, Json<LoginResponse>), AppError> {
    let credentials = Credentials::try_from(req)?;
    let token = state.login.login(&credentials).await?;

    Ok((
        StatusCode::OK,
        Json(LoginResponse {
            token,
            message: "Login successful".to_string(),
        }),
    ))
}
