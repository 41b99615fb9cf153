/*
 * Responsibility
 * - ゲートウェイ自身のルート定義
 * - それ以外のパスは fallback (ルーティング層が後段に来る位置)
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::handlers::{health::health, login::login};
use crate::error::AppError;
use crate::state::AppState;

/// Routes behind the auth filter. The fallback stands in for the downstream
/// chain, so unmatched paths are filtered too.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/actuator/health", get(health))
        .fallback(|| async { AppError::NotFound })
}

/// Routes mounted outside the auth filter, whatever `AUTH_EXEMPT_PATHS` says.
pub fn public_routes() -> Router<AppState> {
    Router::new().route("/nexus/auth/login", post(login))
}
