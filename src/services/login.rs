use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{AppError, AuthFailure};
use crate::services::auth::TokenIssuer;
use crate::services::user_client::{CredentialVerifier, Credentials, UserServiceError};

/// Login flow: user service confirms the credentials, then a token is issued.
///
/// No retries. If the caller goes away, the pending verification future is
/// dropped with the request and no token is minted.
#[derive(Clone)]
pub struct LoginService {
    verifier: Arc<dyn CredentialVerifier>,
    issuer: TokenIssuer,
}

impl LoginService {
    pub fn new(verifier: Arc<dyn CredentialVerifier>, issuer: TokenIssuer) -> Self {
        Self { verifier, issuer }
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<String, AppError> {
        let user = match self.verifier.verify(credentials).await {
            Ok(user) => user,
            Err(UserServiceError::Unavailable(reason)) => {
                let failure = AuthFailure::UpstreamUnavailable;
                warn!(
                    kind = failure.kind(),
                    backend = self.verifier.backend_name(),
                    %reason,
                    "login failed"
                );
                return Err(AppError::Unauthorized(failure));
            }
            Err(err) => {
                let failure = AuthFailure::InvalidCredentials;
                warn!(
                    kind = failure.kind(),
                    backend = self.verifier.backend_name(),
                    error = %err,
                    "login failed"
                );
                return Err(AppError::Unauthorized(failure));
            }
        };

        let token = self.issuer.issue(&user.subject, &user.roles)?;
        info!(subject = %user.subject, roles = ?user.roles, "login succeeded");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth::{KeyMaterial, TokenValidator};
    use crate::services::user_client::VerifiedUser;
    use async_trait::async_trait;
    use jsonwebtoken::Algorithm;
    use reqwest::StatusCode;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    enum Reply {
        User(&'static str, &'static [&'static str]),
        Rejected,
        Down,
        Garbage,
    }

    struct StubVerifier(Reply);

    #[async_trait]
    impl CredentialVerifier for StubVerifier {
        fn backend_name(&self) -> &'static str {
            "stub"
        }

        async fn verify(&self, _: &Credentials) -> Result<VerifiedUser, UserServiceError> {
            match &self.0 {
                Reply::User(subject, roles) => Ok(VerifiedUser {
                    subject: subject.to_string(),
                    roles: roles.iter().map(|r| r.to_string()).collect(),
                }),
                Reply::Rejected => Err(UserServiceError::Rejected(StatusCode::NOT_FOUND)),
                Reply::Down => Err(UserServiceError::Unavailable("connection refused".into())),
                Reply::Garbage => Err(UserServiceError::InvalidReply("missing 'data'".into())),
            }
        }
    }

    fn service(reply: Reply) -> (LoginService, TokenValidator) {
        let keys = Arc::new(KeyMaterial::hmac(
            Algorithm::HS256,
            "login-service-test-secret-0123456789",
        ));
        let issuer = TokenIssuer::new(keys.clone(), "nexus-api-gateway".into(), 300);
        (
            LoginService::new(Arc::new(StubVerifier(reply)), issuer),
            TokenValidator::new(keys),
        )
    }

    fn credentials() -> Credentials {
        Credentials {
            identifier: "a@b.com".into(),
            secret: "pw".into(),
        }
    }

    #[tokio::test]
    async fn issues_token_for_confirmed_user() {
        let (login, validator) = service(Reply::User("a@b.com", &["user"]));
        let token = login.login(&credentials()).await.unwrap();

        let claims = validator.validate(&token).unwrap();
        assert_eq!(claims.subject(), "a@b.com");
        assert_eq!(claims.roles(), ["user".to_string()]);
    }

    #[tokio::test]
    async fn rejection_and_bad_replies_are_invalid_credentials() {
        for reply in [Reply::Rejected, Reply::Garbage] {
            let (login, _) = service(reply);
            let err = login.login(&credentials()).await.unwrap_err();
            assert!(matches!(
                err,
                AppError::Unauthorized(AuthFailure::InvalidCredentials)
            ));
        }
    }

    #[tokio::test]
    async fn outage_is_upstream_unavailable() {
        let (login, _) = service(Reply::Down);
        let err = login.login(&credentials()).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Unauthorized(AuthFailure::UpstreamUnavailable)
        ));
    }

    /// Parks in `verify` until notified; counts entries and resumptions.
    #[derive(Default)]
    struct ParkedVerifier {
        release: tokio::sync::Notify,
        entered: AtomicUsize,
        resumed: AtomicUsize,
    }

    #[async_trait]
    impl CredentialVerifier for ParkedVerifier {
        fn backend_name(&self) -> &'static str {
            "parked"
        }

        async fn verify(&self, _: &Credentials) -> Result<VerifiedUser, UserServiceError> {
            self.entered.fetch_add(1, Ordering::SeqCst);
            self.release.notified().await;
            self.resumed.fetch_add(1, Ordering::SeqCst);
            Ok(VerifiedUser {
                subject: "a@b.com".into(),
                roles: vec!["user".into()],
            })
        }
    }

    #[tokio::test]
    async fn dropped_login_never_resumes_or_issues() {
        let verifier = Arc::new(ParkedVerifier::default());
        let keys = Arc::new(KeyMaterial::hmac(
            Algorithm::HS256,
            "login-service-test-secret-0123456789",
        ));
        let issuer = TokenIssuer::new(keys, "nexus-api-gateway".into(), 300);
        let login = LoginService::new(verifier.clone(), issuer);

        let outcome =
            tokio::time::timeout(Duration::from_millis(50), login.login(&credentials())).await;
        assert!(outcome.is_err());

        // Releasing after the caller went away must not wake anything.
        verifier.release.notify_waiters();
        tokio::task::yield_now().await;

        assert_eq!(verifier.entered.load(Ordering::SeqCst), 1);
        assert_eq!(verifier.resumed.load(Ordering::SeqCst), 0);
    }
}
