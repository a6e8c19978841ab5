use std::sync::Arc;

use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use time::Duration;
use tracing::{error, info, warn};

use crate::accounts::credentials::CredentialStore;
use crate::clock::Clock;
use crate::errors::AuthError;
use crate::notify::{Notification, NotificationGateway};
use crate::resets::repo::{PasswordResetToken, ResetTokenRepo};

/// Length of a reset token, in characters of `[A-Za-z0-9]`.
pub const TOKEN_LEN: usize = 64;

/// Result of presenting a reset token that existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    Updated,
    /// Too old. The token is gone either way.
    Expired,
}

pub(crate) fn generate_token() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LEN)
        .map(char::from)
        .collect()
}

pub struct PasswordResetService {
    credentials: CredentialStore,
    tokens: Arc<dyn ResetTokenRepo>,
    gateway: Arc<dyn NotificationGateway>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    link_base: Option<String>,
}

impl PasswordResetService {
    pub fn new(
        credentials: CredentialStore,
        tokens: Arc<dyn ResetTokenRepo>,
        gateway: Arc<dyn NotificationGateway>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        link_base: Option<String>,
    ) -> Self {
        Self {
            credentials,
            tokens,
            gateway,
            clock,
            ttl,
            link_base,
        }
    }

    /// Persist a fresh token for the active user owning `email`.
    pub async fn issue_token(&self, email: &str) -> Result<PasswordResetToken, AuthError> {
        let user = self
            .credentials
            .find_by_email(email)
            .await?
            .filter(|u| u.is_active())
            .ok_or(AuthError::UserNotFound)?;

        let row = PasswordResetToken {
            token: generate_token(),
            user_id: user.id,
            created_at: self.clock.now(),
        };
        self.tokens.insert(&row).await?;
        info!(user_id = %user.id, "password reset token issued");
        Ok(row)
    }

    /// Issue a token and mail it. A failed delivery leaves the token valid.
    pub async fn request_reset(&self, email: &str) -> Result<PasswordResetToken, AuthError> {
        let row = self.issue_token(email).await?;
        let notification = Notification::PasswordReset {
            token: row.token.clone(),
            link: self
                .link_base
                .as_deref()
                .map(|base| format!("{base}?token={}", row.token)),
        };

        if let Err(e) = self.gateway.send(email, notification).await {
            error!(user_id = %row.user_id, error = %e, "password reset mail failed");
            return Err(AuthError::NotificationFailed(e));
        }
        Ok(row)
    }

    /// Consume `token`. The row is deleted before its age is checked, so a
    /// token is single-use even when it turns out to be expired.
    pub async fn consume_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<ResetOutcome, AuthError> {
        let row = self.tokens.take(token).await?.ok_or(AuthError::TokenNotFound)?;

        let age = self.clock.now() - row.created_at;
        if age >= self.ttl {
            warn!(user_id = %row.user_id, age_minutes = age.whole_minutes(), "password reset token expired");
            return Ok(ResetOutcome::Expired);
        }

        // Tokens issued before a closure die with the account.
        let owner_active = self
            .credentials
            .find_by_id(row.user_id)
            .await?
            .is_some_and(|u| u.is_active());
        if !owner_active {
            warn!(user_id = %row.user_id, "password reset token for inactive account");
            return Err(AuthError::TokenNotFound);
        }

        self.credentials
            .update_password(row.user_id, new_password)
            .await?;
        Ok(ResetOutcome::Updated)
    }
}
