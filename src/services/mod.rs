/*
 * Responsibility
 * - ドメインロジック (トークン検証/発行, ログイン, 外部 user service 呼び出し)
 * - HTTP / axum に依存しない形で middleware / handler から使う
 */
pub mod auth;
pub mod login;
pub mod user_client;
