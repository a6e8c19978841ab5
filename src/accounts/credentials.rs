use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::accounts::repo::UserRepo;
use crate::accounts::repo_types::{User, UserStatus};
use crate::auth::password::PasswordHasher;
use crate::clock::Clock;
use crate::errors::{AuthError, StoreError};

/// Owns user records: creation, lookup, credential checks and the
/// one-way status transition. All writes to users go through here.
#[derive(Clone)]
pub struct CredentialStore {
    users: Arc<dyn UserRepo>,
    hasher: PasswordHasher,
    clock: Arc<dyn Clock>,
}

fn taken_or_store(e: StoreError) -> AuthError {
    match e {
        StoreError::Duplicate => AuthError::EmailTaken,
        other => AuthError::Store(other),
    }
}

impl CredentialStore {
    pub fn new(users: Arc<dyn UserRepo>, hasher: PasswordHasher, clock: Arc<dyn Clock>) -> Self {
        Self {
            users,
            hasher,
            clock,
        }
    }

    pub async fn create(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let now = self.clock.now();
        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: self.hasher.hash(password)?,
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(&user).await.map_err(|e| {
            if matches!(e, StoreError::Duplicate) {
                warn!(email = %email, "email already registered");
            }
            taken_or_store(e)
        })?;
        info!(user_id = %user.id, "user created");
        Ok(user)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>, AuthError> {
        Ok(self.users.find_by_email(email).await?)
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, AuthError> {
        Ok(self.users.find_by_id(id).await?)
    }

    pub async fn list(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.users.list().await?)
    }

    /// Unknown email, wrong password and inactive account are one failure,
    /// and the unknown-email path still pays for a hash verification.
    pub async fn verify_credentials(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let Some(user) = self.users.find_by_email(email).await? else {
            self.hasher.verify_dummy(password);
            debug!("login for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &user.password_hash)? {
            debug!(user_id = %user.id, "login with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.is_active() {
            debug!(user_id = %user.id, "login for inactive account");
            return Err(AuthError::InvalidCredentials);
        }

        Ok(user)
    }

    pub async fn update_email(&self, user: &User, new_email: &str) -> Result<User, AuthError> {
        let updated = self
            .users
            .update_email(user.id, new_email, self.clock.now())
            .await
            .map_err(taken_or_store)?;
        info!(user_id = %user.id, "email updated");
        Ok(updated)
    }

    pub async fn update_password(&self, user_id: Uuid, new_plaintext: &str) -> Result<(), AuthError> {
        let hash = self.hasher.hash(new_plaintext)?;
        self.users
            .update_password_hash(user_id, &hash, self.clock.now())
            .await
            .map_err(|e| match e {
                StoreError::NotFound => AuthError::UserNotFound,
                other => AuthError::Store(other),
            })?;
        info!(user_id = %user_id, "password updated");
        Ok(())
    }

    /// ACTIVE -> INACTIVE. The record and its email stay in place. The
    /// stored status decides, not the caller's copy of `user`.
    pub async fn deactivate(&self, user: &User) -> Result<User, AuthError> {
        let updated = self
            .users
            .deactivate(user.id, self.clock.now())
            .await
            .map_err(|e| match e {
                StoreError::NotFound => AuthError::UserNotFound,
                StoreError::Conflict => AuthError::AlreadyInactive,
                other => AuthError::Store(other),
            })?;
        info!(user_id = %user.id, "user deactivated");
        Ok(updated)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::accounts::repo::MemoryUserRepo;
    use crate::clock::testing::ManualClock;
    use crate::config::AppConfig;

    pub(crate) fn store_with_clock(clock: Arc<ManualClock>) -> CredentialStore {
        let hasher = PasswordHasher::new(AppConfig::for_tests().password_hash).expect("hasher");
        CredentialStore::new(Arc::new(MemoryUserRepo::new()), hasher, clock)
    }

    fn store() -> CredentialStore {
        store_with_clock(Arc::new(ManualClock::default()))
    }

    #[tokio::test]
    async fn create_hashes_and_rejects_duplicates() {
        let store = store();
        let user = store.create("some@email.com", "123456").await.unwrap();
        assert_eq!(user.status, UserStatus::Active);
        assert_ne!(user.password_hash, "123456");

        let err = store.create("some@email.com", "654321").await.unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_are_indistinguishable() {
        let store = store();
        store.create("someone@email.com", "123456").await.unwrap();

        let wrong_password = store
            .verify_credentials("someone@email.com", "123457")
            .await
            .unwrap_err();
        let unknown_email = store
            .verify_credentials("nobody@email.com", "123456")
            .await
            .unwrap_err();

        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_email, AuthError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn update_password_replaces_the_hash() {
        let store = store();
        let user = store.create("someone@email.com", "123456").await.unwrap();

        store.update_password(user.id, "new-password").await.unwrap();

        assert!(store
            .verify_credentials("someone@email.com", "new-password")
            .await
            .is_ok());
        assert!(store
            .verify_credentials("someone@email.com", "123456")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn update_email_rejects_address_of_other_user() {
        let store = store();
        let a = store.create("a@email.com", "123456").await.unwrap();
        store.create("b@email.com", "123456").await.unwrap();

        let err = store.update_email(&a, "b@email.com").await.unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));

        let updated = store.update_email(&a, "newemail@mail.com").await.unwrap();
        assert_eq!(updated.email, "newemail@mail.com");
        assert!(store.find_by_email("newemail@mail.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deactivated_user_keeps_record_and_email() {
        let clock = Arc::new(ManualClock::default());
        let store = store_with_clock(clock.clone());
        let user = store.create("gone@email.com", "123456").await.unwrap();

        clock.advance(time::Duration::minutes(5));
        let inactive = store.deactivate(&user).await.unwrap();
        assert_eq!(inactive.status, UserStatus::Inactive);
        assert!(inactive.updated_at > user.updated_at);

        let stored = store.find_by_email("gone@email.com").await.unwrap().unwrap();
        assert_eq!(stored.status, UserStatus::Inactive);

        let err = store.create("gone@email.com", "123456").await.unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));

        let err = store.deactivate(&inactive).await.unwrap_err();
        assert!(matches!(err, AuthError::AlreadyInactive));

        // A stale active copy does not get past the stored status.
        let err = store.deactivate(&user).await.unwrap_err();
        assert!(matches!(err, AuthError::AlreadyInactive));
    }

    #[tokio::test]
    async fn inactive_user_cannot_authenticate() {
        let store = store();
        let user = store.create("gone@email.com", "123456").await.unwrap();
        store.deactivate(&user).await.unwrap();

        let err = store
            .verify_credentials("gone@email.com", "123456")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }
}
