/*
 * Responsibility
 * - ゲートウェイ自身が持つエンドポイント (login, health) の公開ポイント
 */
pub mod dto;
pub mod handlers;
mod routes;

pub use routes::{public_routes, routes};
