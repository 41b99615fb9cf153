/*
 * Responsibility
 * - middleware の公開インターフェース
 * - auth (Bearer 検証 → X-User-ID), cors, cors_sanitizer, http
 */
pub mod auth;
pub mod cors;
pub mod cors_sanitizer;
pub mod http;
