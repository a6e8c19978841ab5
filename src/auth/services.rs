use std::sync::Arc;

use tracing::{info, warn};

use crate::accounts::{credentials::CredentialStore, repo_types::User};
use crate::auth::jwt::{AccessToken, TokenIssuer};
use crate::errors::AuthError;

/// Registration, login and self-service email change.
pub struct AuthSessionService {
    credentials: CredentialStore,
    issuer: Arc<dyn TokenIssuer>,
}

impl AuthSessionService {
    pub fn new(credentials: CredentialStore, issuer: Arc<dyn TokenIssuer>) -> Self {
        Self {
            credentials,
            issuer,
        }
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<AccessToken, AuthError> {
        let user = self.credentials.create(email, password).await?;
        let token = self.issuer.issue(&user)?;
        info!(user_id = %user.id, "user registered");
        Ok(token)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AccessToken, AuthError> {
        let user = self.credentials.verify_credentials(email, password).await?;
        let token = self.issuer.issue(&user)?;
        info!(user_id = %user.id, "user logged in");
        Ok(token)
    }

    /// `current_email` proves the caller knows the address, on top of
    /// holding a token for the account.
    pub async fn update_own_email(
        &self,
        subject: &User,
        current_email: &str,
        new_email: &str,
    ) -> Result<User, AuthError> {
        if current_email != subject.email {
            warn!(user_id = %subject.id, "email change with wrong current email");
            return Err(AuthError::EmailMismatch);
        }
        self.credentials.update_email(subject, new_email).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::credentials::tests::store_with_clock;
    use crate::auth::jwt::JwtKeys;
    use crate::clock::testing::ManualClock;
    use crate::config::AppConfig;

    fn setup() -> (CredentialStore, JwtKeys, AuthSessionService) {
        let clock = Arc::new(ManualClock::default());
        let credentials = store_with_clock(clock.clone());
        let keys = JwtKeys::from_config(&AppConfig::for_tests().jwt, clock);
        let service = AuthSessionService::new(credentials.clone(), Arc::new(keys.clone()));
        (credentials, keys, service)
    }

    #[tokio::test]
    async fn registration_token_authenticates_the_new_user() {
        let (credentials, keys, service) = setup();

        let token = service.register("someone@email.com", "123456").await.unwrap();

        let user = credentials
            .find_by_email("someone@email.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(keys.verify(token.as_str()).unwrap().sub, user.id);

        let err = service.register("someone@email.com", "123456").await.unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[tokio::test]
    async fn login_failures_collapse() {
        let (_, keys, service) = setup();
        service.register("someone@email.com", "123456").await.unwrap();

        let token = service.login("someone@email.com", "123456").await.unwrap();
        assert!(keys.verify(token.as_str()).is_ok());

        for (email, password) in [
            ("someone@email.com", "123457"),
            ("nobody@email.com", "123456"),
        ] {
            let err = service.login(email, password).await.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }
    }

    #[tokio::test]
    async fn email_change_requires_current_email() {
        let (credentials, _, service) = setup();
        service.register("user@email.com", "123456").await.unwrap();
        service.register("another@email.com", "123456").await.unwrap();
        let user = credentials.find_by_email("user@email.com").await.unwrap().unwrap();

        let err = service
            .update_own_email(&user, "another@email.com", "newemail@mail.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailMismatch));

        let err = service
            .update_own_email(&user, "user@email.com", "another@email.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));

        let updated = service
            .update_own_email(&user, "user@email.com", "newemail@mail.com")
            .await
            .unwrap();
        assert_eq!(updated.email, "newemail@mail.com");
        assert!(service.login("newemail@mail.com", "123456").await.is_ok());
    }
}
