/// Factory: build the validator/issuer pair from application `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::services::auth::{KeyError, KeyMaterial, TokenIssuer, TokenValidator};

pub fn build_token_services(config: &Config) -> Result<(TokenValidator, TokenIssuer), KeyError> {
    let keys = Arc::new(KeyMaterial::from_config(&config.jwt)?);

    tracing::info!(algorithm = ?keys.algorithm(), "jwt key material loaded");

    let validator = TokenValidator::new(keys.clone());
    let issuer = TokenIssuer::new(keys, config.jwt.issuer.clone(), config.jwt.ttl_seconds);

    Ok((validator, issuer))
}
