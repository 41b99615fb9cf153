/*
 * Responsibility
 * - 環境変数や設定の読み込み (JWT 鍵, 除外パス, CORS 許可, user service など)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use std::{env, fmt};

use jsonwebtoken::Algorithm;
use url::Url;

const DEFAULT_EXEMPT_PATHS: &str = "/nexus/auth,/actuator/health";
const DEFAULT_CORS_ALLOWED_ORIGINS: &str =
    "http://localhost:5173,http://127.0.0.1:5173,http://localhost:3000,http://127.0.0.1:3000";
const DEFAULT_USER_SERVICE_URI: &str = "http://localhost:3000/api/v1/auth/validate-user";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    pub fn from_env() -> Self {
        match env::var("APP_ENV")
            .unwrap_or_else(|_| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// Startup misconfiguration. Always fatal: the process must not serve.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Signing key settings. Which fields are required depends on `algorithm`;
/// that check happens when the key material is built.
#[derive(Clone)]
pub struct JwtConfig {
    pub algorithm: Algorithm,
    pub secret: Option<String>,
    pub public_key_pem: Option<String>,
    // Issuer signs login tokens with this key under the RSA family
    pub private_key_pem: Option<String>,
    pub issuer: String,
    pub ttl_seconds: u64,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("JwtConfig")
            .field("algorithm", &self.algorithm)
            .field("issuer", &self.issuer)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    pub jwt: JwtConfig,

    pub auth_filter_enabled: bool,
    pub exempt_paths: Vec<String>,
    pub cors_allowed_origins: Vec<String>,

    pub user_service_uri: Url,
    pub user_service_timeout: Duration,

    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::from_env();

        let algorithm = parse_algorithm(
            &env::var("JWT_ALGORITHM").unwrap_or_else(|_| "HS256".to_string()),
        )?;

        let jwt = JwtConfig {
            algorithm,
            secret: non_blank_var("JWT_SECRET"),
            public_key_pem: non_blank_var("JWT_PUBLIC_KEY").map(|s| s.replace("\\n", "\n")),
            private_key_pem: non_blank_var("JWT_PRIVATE_KEY").map(|s| s.replace("\\n", "\n")),
            issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "nexus-api-gateway".to_string()),
            ttl_seconds: env::var("JWT_TTL_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),
        };

        let auth_filter_enabled = match env::var("AUTH_FILTER_ENABLED") {
            Ok(v) => v
                .trim()
                .parse::<bool>()
                .map_err(|_| ConfigError::Invalid("AUTH_FILTER_ENABLED"))?,
            Err(_) => true,
        };

        let exempt_paths = split_list(
            &env::var("AUTH_EXEMPT_PATHS").unwrap_or_else(|_| DEFAULT_EXEMPT_PATHS.to_string()),
        );

        let cors_allowed_origins = split_list(
            &env::var("CORS_ALLOWED_ORIGINS")
                .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGINS.to_string()),
        );

        let user_service_uri = env::var("USER_SERVICE_URI")
            .unwrap_or_else(|_| DEFAULT_USER_SERVICE_URI.to_string());
        let user_service_uri =
            Url::parse(&user_service_uri).map_err(|_| ConfigError::Invalid("USER_SERVICE_URI"))?;

        let user_service_timeout = match env::var("USER_SERVICE_TIMEOUT_SECONDS") {
            Ok(v) => match v.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::Invalid("USER_SERVICE_TIMEOUT_SECONDS")),
            },
            Err(_) => Duration::from_secs(5),
        };

        let request_timeout = Duration::from_secs(
            env::var("REQUEST_TIMEOUT_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),
        );

        Ok(Self {
            addr,
            app_env,
            jwt,
            auth_filter_enabled,
            exempt_paths,
            cors_allowed_origins,
            user_service_uri,
            user_service_timeout,
            request_timeout,
        })
    }
}

/// Only HMAC (`HS*`) and RSA (`RS*`) families are supported.
pub fn parse_algorithm(value: &str) -> Result<Algorithm, ConfigError> {
    match value.trim().to_ascii_uppercase().as_str() {
        "HS256" => Ok(Algorithm::HS256),
        "HS384" => Ok(Algorithm::HS384),
        "HS512" => Ok(Algorithm::HS512),
        "RS256" => Ok(Algorithm::RS256),
        "RS384" => Ok(Algorithm::RS384),
        "RS512" => Ok(Algorithm::RS512),
        _ => Err(ConfigError::Invalid("JWT_ALGORITHM")),
    }
}

fn non_blank_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_names_are_case_insensitive() {
        assert_eq!(parse_algorithm("hs256"), Ok(Algorithm::HS256));
        assert_eq!(parse_algorithm(" RS256 "), Ok(Algorithm::RS256));
        assert_eq!(parse_algorithm("Hs512"), Ok(Algorithm::HS512));
    }

    #[test]
    fn unsupported_algorithm_is_rejected() {
        assert_eq!(
            parse_algorithm("ES256"),
            Err(ConfigError::Invalid("JWT_ALGORITHM"))
        );
        assert_eq!(
            parse_algorithm(""),
            Err(ConfigError::Invalid("JWT_ALGORITHM"))
        );
    }

    #[test]
    fn lists_are_trimmed_and_skip_empty_entries() {
        assert_eq!(
            split_list(" /nexus/auth , ,/actuator/health,"),
            vec!["/nexus/auth".to_string(), "/actuator/health".to_string()]
        );
    }
}
