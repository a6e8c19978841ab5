use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::errors::StoreError;

/// Reset token record.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct PasswordResetToken {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: OffsetDateTime,
}

/// Persistence seam for reset tokens.
#[async_trait]
pub trait ResetTokenRepo: Send + Sync {
    async fn insert(&self, token: &PasswordResetToken) -> Result<(), StoreError>;
    /// Delete the row and hand it back. Of concurrent callers presenting the
    /// same token, at most one gets `Some`.
    async fn take(&self, token: &str) -> Result<Option<PasswordResetToken>, StoreError>;
}

#[derive(Clone)]
pub struct PgResetTokenRepo {
    db: PgPool,
}

impl PgResetTokenRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ResetTokenRepo for PgResetTokenRepo {
    async fn insert(&self, token: &PasswordResetToken) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO password_resets (token, user_id, created_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(&token.token)
        .bind(token.user_id)
        .bind(token.created_at)
        .execute(&self.db)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn take(&self, token: &str) -> Result<Option<PasswordResetToken>, StoreError> {
        sqlx::query_as::<_, PasswordResetToken>(
            r#"
            DELETE FROM password_resets
             WHERE token = $1
            RETURNING token, user_id, created_at
            "#,
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await
        .map_err(StoreError::from_sqlx)
    }
}

/// In-process token store for development and tests.
#[derive(Default)]
pub struct MemoryResetTokenRepo {
    tokens: Mutex<HashMap<String, PasswordResetToken>>,
}

impl MemoryResetTokenRepo {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn tokens_for(&self, user_id: Uuid) -> Vec<PasswordResetToken> {
        let tokens = self.tokens.lock().await;
        tokens
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ResetTokenRepo for MemoryResetTokenRepo {
    async fn insert(&self, token: &PasswordResetToken) -> Result<(), StoreError> {
        let mut tokens = self.tokens.lock().await;
        if tokens.contains_key(&token.token) {
            return Err(StoreError::Duplicate);
        }
        tokens.insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn take(&self, token: &str) -> Result<Option<PasswordResetToken>, StoreError> {
        Ok(self.tokens.lock().await.remove(token))
    }
}
