//! Process-wide signing/verification key material.
//!
//! Built once at startup from `JwtConfig` and shared read-only (behind `Arc`)
//! by the validator and the issuer. Exactly one algorithm is active.

use base64::{
    Engine, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig, general_purpose::STANDARD},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use std::fmt;
use thiserror::Error;

use crate::config::JwtConfig;

const PEM_PUBLIC_HEADER: &str = "-----BEGIN PUBLIC KEY-----";
const PEM_PUBLIC_FOOTER: &str = "-----END PUBLIC KEY-----";

// Secrets are often written without `=` padding; accept both forms.
const SECRET_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Error)]
pub enum KeyError {
    #[error("{0:?} selected but JWT_SECRET is not configured")]
    MissingSecret(Algorithm),
    #[error("{0:?} selected but JWT_PUBLIC_KEY is not configured")]
    MissingPublicKey(Algorithm),
    #[error("{0:?} selected but JWT_PRIVATE_KEY is not configured")]
    MissingPrivateKey(Algorithm),
    #[error("JWT_PUBLIC_KEY is not valid base64 PEM")]
    PublicKeyEncoding,
    #[error("invalid RSA key: {0}")]
    InvalidRsaKey(#[source] jsonwebtoken::errors::Error),
    #[error("unsupported algorithm: {0:?}")]
    UnsupportedAlgorithm(Algorithm),
}

/// Immutable key pair for the configured algorithm.
///
/// - Key material is intentionally not printable via Debug.
pub struct KeyMaterial {
    algorithm: Algorithm,
    decoding: DecodingKey,
    encoding: EncodingKey,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl KeyMaterial {
    pub fn from_config(config: &JwtConfig) -> Result<Self, KeyError> {
        match config.algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                let secret = config
                    .secret
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .ok_or(KeyError::MissingSecret(config.algorithm))?;
                Ok(Self::hmac(config.algorithm, secret))
            }
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512 => {
                let public_pem = config
                    .public_key_pem
                    .as_deref()
                    .ok_or(KeyError::MissingPublicKey(config.algorithm))?;
                let private_pem = config
                    .private_key_pem
                    .as_deref()
                    .ok_or(KeyError::MissingPrivateKey(config.algorithm))?;
                Self::rsa(config.algorithm, public_pem, private_pem)
            }
            other => Err(KeyError::UnsupportedAlgorithm(other)),
        }
    }

    /// HMAC family. The secret is base64-decoded when it parses as base64,
    /// otherwise its raw bytes are used.
    pub fn hmac(algorithm: Algorithm, secret: &str) -> Self {
        let bytes = hmac_secret_bytes(secret);
        Self {
            algorithm,
            decoding: DecodingKey::from_secret(&bytes),
            encoding: EncodingKey::from_secret(&bytes),
        }
    }

    pub fn rsa(algorithm: Algorithm, public_pem: &str, private_pem: &str) -> Result<Self, KeyError> {
        let der = public_key_der(public_pem)?;
        let decoding = DecodingKey::from_rsa_pem(canonical_public_pem(&der).as_bytes())
            .map_err(KeyError::InvalidRsaKey)?;
        let encoding =
            EncodingKey::from_rsa_pem(private_pem.as_bytes()).map_err(KeyError::InvalidRsaKey)?;

        Ok(Self {
            algorithm,
            decoding,
            encoding,
        })
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub(crate) fn decoding_key(&self) -> &DecodingKey {
        &self.decoding
    }

    pub(crate) fn encoding_key(&self) -> &EncodingKey {
        &self.encoding
    }
}

fn hmac_secret_bytes(secret: &str) -> Vec<u8> {
    SECRET_BASE64
        .decode(secret)
        .unwrap_or_else(|_| secret.as_bytes().to_vec())
}

/// Strip PEM armour and whitespace, then base64-decode the SPKI body.
fn public_key_der(pem: &str) -> Result<Vec<u8>, KeyError> {
    let body: String = pem
        .replace(PEM_PUBLIC_HEADER, "")
        .replace(PEM_PUBLIC_FOOTER, "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    if body.is_empty() {
        return Err(KeyError::PublicKeyEncoding);
    }

    STANDARD
        .decode(body)
        .map_err(|_| KeyError::PublicKeyEncoding)
}

// Env vars often arrive as a single line; rebuild a well-formed PEM.
fn canonical_public_pem(der: &[u8]) -> String {
    let encoded = STANDARD.encode(der);
    let mut pem = String::with_capacity(encoded.len() + 128);
    pem.push_str(PEM_PUBLIC_HEADER);
    pem.push('\n');
    for chunk in encoded.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(chunk));
        pem.push('\n');
    }
    pem.push_str(PEM_PUBLIC_FOOTER);
    pem.push('\n');
    pem
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const RSA_PRIVATE_PEM: &str = include_str!("../../../tests/fixtures/rsa_private.pem");
    pub(crate) const RSA_PUBLIC_PEM: &str = include_str!("../../../tests/fixtures/rsa_public.pem");
    pub(crate) const RSA_OTHER_PUBLIC_PEM: &str =
        include_str!("../../../tests/fixtures/rsa_other_public.pem");

    fn jwt_config(algorithm: Algorithm) -> JwtConfig {
        JwtConfig {
            algorithm,
            secret: None,
            public_key_pem: None,
            private_key_pem: None,
            issuer: "test".to_string(),
            ttl_seconds: 60,
        }
    }

    #[test]
    fn base64_secret_is_decoded() {
        let raw = b"0123456789abcdef0123456789abcdef";
        let encoded = STANDARD.encode(raw);
        assert_eq!(hmac_secret_bytes(&encoded), raw.to_vec());
    }

    #[test]
    fn unpadded_base64_secret_is_decoded() {
        assert_eq!(hmac_secret_bytes("c2VjcmV0MQ"), b"secret1".to_vec());
        assert_eq!(hmac_secret_bytes("c2VjcmV0MQ=="), b"secret1".to_vec());
    }

    #[test]
    fn non_base64_secret_is_used_verbatim() {
        let secret = "not base64! just a passphrase";
        assert_eq!(hmac_secret_bytes(secret), secret.as_bytes().to_vec());
    }

    #[test]
    fn hmac_without_secret_is_fatal() {
        let err = KeyMaterial::from_config(&jwt_config(Algorithm::HS256)).unwrap_err();
        assert!(matches!(err, KeyError::MissingSecret(Algorithm::HS256)));

        let mut config = jwt_config(Algorithm::HS512);
        config.secret = Some("   ".to_string());
        let err = KeyMaterial::from_config(&config).unwrap_err();
        assert!(matches!(err, KeyError::MissingSecret(Algorithm::HS512)));
    }

    #[test]
    fn rsa_without_public_key_is_fatal() {
        let mut config = jwt_config(Algorithm::RS256);
        config.private_key_pem = Some(RSA_PRIVATE_PEM.to_string());
        let err = KeyMaterial::from_config(&config).unwrap_err();
        assert!(matches!(err, KeyError::MissingPublicKey(Algorithm::RS256)));
    }

    #[test]
    fn rsa_without_private_key_is_fatal() {
        let mut config = jwt_config(Algorithm::RS256);
        config.public_key_pem = Some(RSA_PUBLIC_PEM.to_string());
        let err = KeyMaterial::from_config(&config).unwrap_err();
        assert!(matches!(err, KeyError::MissingPrivateKey(Algorithm::RS256)));
    }

    #[test]
    fn garbage_public_key_is_fatal() {
        let mut config = jwt_config(Algorithm::RS256);
        config.public_key_pem = Some("-----BEGIN PUBLIC KEY-----\n%%%\n-----END PUBLIC KEY-----".into());
        config.private_key_pem = Some(RSA_PRIVATE_PEM.to_string());
        let err = KeyMaterial::from_config(&config).unwrap_err();
        assert!(matches!(err, KeyError::PublicKeyEncoding));
    }

    #[test]
    fn single_line_public_key_is_accepted() {
        let flattened: String = RSA_PUBLIC_PEM.split_whitespace().collect::<Vec<_>>().join(" ");
        let mut config = jwt_config(Algorithm::RS256);
        config.public_key_pem = Some(flattened);
        config.private_key_pem = Some(RSA_PRIVATE_PEM.to_string());
        let keys = KeyMaterial::from_config(&config).unwrap();
        assert_eq!(keys.algorithm(), Algorithm::RS256);
    }
}
