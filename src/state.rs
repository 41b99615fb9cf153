/*
 * Responsibility
 * - Router に紐づける共有コンテキスト (AppState)
 *   - ex: validator: TokenValidator, login: LoginService
 * - Clone 前提で持つ (内部は Arc/Clone cheap)
 * - 起動後は不変 (鍵素材は書き換えない)
 */
use std::sync::Arc;

use crate::services::{auth::TokenValidator, login::LoginService};

#[derive(Clone)]
pub struct AppState {
    pub validator: Arc<TokenValidator>,
    pub login: Arc<LoginService>,
    pub exempt_paths: Arc<[String]>,
}

impl AppState {
    pub fn new(validator: TokenValidator, login: LoginService, exempt_paths: Vec<String>) -> Self {
        Self {
            validator: Arc::new(validator),
            login: Arc::new(login),
            exempt_paths: exempt_paths.into(),
        }
    }
}
