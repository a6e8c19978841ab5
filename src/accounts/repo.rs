use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::accounts::repo_types::{User, UserRow, UserStatus};
use crate::errors::StoreError;

/// Persistence seam for user records.
///
/// Email uniqueness is the store's job: `insert` and `update_email` must
/// fail with [`StoreError::Duplicate`] atomically, whatever the status of the
/// user already holding the address.
#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn insert(&self, user: &User) -> Result<(), StoreError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn list(&self) -> Result<Vec<User>, StoreError>;
    async fn update_email(
        &self,
        id: Uuid,
        email: &str,
        at: OffsetDateTime,
    ) -> Result<User, StoreError>;
    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
        at: OffsetDateTime,
    ) -> Result<(), StoreError>;
    /// ACTIVE -> INACTIVE as one atomic step. An already inactive user
    /// yields [`StoreError::Conflict`], so of concurrent callers only one
    /// gets the updated record.
    async fn deactivate(&self, id: Uuid, at: OffsetDateTime) -> Result<User, StoreError>;
}

const USER_COLUMNS: &str = "id, email, password_hash, status, created_at, updated_at";

fn into_user(row: UserRow) -> Result<User, StoreError> {
    User::try_from(row).map_err(|e| StoreError::Database(sqlx::Error::Decode(e.into())))
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, password_hash, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.status.as_str())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.db)
        .await
        .map_err(StoreError::from_sqlx)?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .map_err(StoreError::from_sqlx)?;
        row.map(into_user).transpose()
    }

    /// Find a user by email, whatever their status.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .map_err(StoreError::from_sqlx)?;
        row.map(into_user).transpose()
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"
        ))
        .fetch_all(&self.db)
        .await
        .map_err(StoreError::from_sqlx)?;
        rows.into_iter().map(into_user).collect()
    }

    async fn update_email(
        &self,
        id: Uuid,
        email: &str,
        at: OffsetDateTime,
    ) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET email = $2, updated_at = $3 WHERE id = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(id)
        .bind(email)
        .bind(at)
        .fetch_optional(&self.db)
        .await
        .map_err(StoreError::from_sqlx)?;
        row.map(into_user).transpose()?.ok_or(StoreError::NotFound)
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
        at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let done = sqlx::query(
            r#"UPDATE users SET password_hash = $2, updated_at = $3 WHERE id = $1"#,
        )
        .bind(id)
        .bind(password_hash)
        .bind(at)
        .execute(&self.db)
        .await
        .map_err(StoreError::from_sqlx)?;
        if done.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn deactivate(&self, id: Uuid, at: OffsetDateTime) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users SET status = $2, updated_at = $3
             WHERE id = $1 AND status = $4
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(UserStatus::Inactive.as_str())
        .bind(at)
        .bind(UserStatus::Active.as_str())
        .fetch_optional(&self.db)
        .await
        .map_err(StoreError::from_sqlx)?;

        match row {
            Some(row) => into_user(row),
            None => match self.find_by_id(id).await? {
                Some(_) => Err(StoreError::Conflict),
                None => Err(StoreError::NotFound),
            },
        }
    }
}

/// In-process user store for development and tests.
#[derive(Default)]
pub struct MemoryUserRepo {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

fn email_held_by_other(users: &HashMap<Uuid, User>, email: &str, id: Uuid) -> bool {
    users.values().any(|u| u.email == email && u.id != id)
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.id) || email_held_by_other(&users, &user.email, user.id) {
            return Err(StoreError::Duplicate);
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().find(|u| u.email == email).cloned())
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let mut all: Vec<User> = self.users.read().await.values().cloned().collect();
        all.sort_by_key(|u| u.created_at);
        Ok(all)
    }

    async fn update_email(
        &self,
        id: Uuid,
        email: &str,
        at: OffsetDateTime,
    ) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        if email_held_by_other(&users, email, id) {
            return Err(StoreError::Duplicate);
        }
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.email = email.to_string();
        user.updated_at = at;
        Ok(user.clone())
    }

    async fn update_password_hash(
        &self,
        id: Uuid,
        password_hash: &str,
        at: OffsetDateTime,
    ) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.password_hash = password_hash.to_string();
        user.updated_at = at;
        Ok(())
    }

    async fn deactivate(&self, id: Uuid, at: OffsetDateTime) -> Result<User, StoreError> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.status = user.status.deactivate().ok_or(StoreError::Conflict)?;
        user.updated_at = at;
        Ok(user.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: "hash".into(),
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn insert_rejects_taken_email_even_when_inactive() {
        let repo = MemoryUserRepo::new();
        let first = user("a@example.com");
        repo.insert(&first).await.unwrap();
        repo.deactivate(first.id, OffsetDateTime::now_utc())
            .await
            .unwrap();

        let err = repo.insert(&user("a@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));
    }

    #[tokio::test]
    async fn update_email_checks_other_users_only() {
        let repo = MemoryUserRepo::new();
        let a = user("a@example.com");
        let b = user("b@example.com");
        repo.insert(&a).await.unwrap();
        repo.insert(&b).await.unwrap();
        let now = OffsetDateTime::now_utc();

        let same = repo.update_email(a.id, "a@example.com", now).await.unwrap();
        assert_eq!(same.email, "a@example.com");

        let err = repo.update_email(a.id, "b@example.com", now).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate));

        let moved = repo.update_email(a.id, "c@example.com", now).await.unwrap();
        assert_eq!(moved.email, "c@example.com");
        assert!(repo.find_by_email("a@example.com").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deactivate_checks_the_stored_status() {
        let repo = MemoryUserRepo::new();
        let u = user("a@example.com");
        repo.insert(&u).await.unwrap();
        let now = OffsetDateTime::now_utc();

        let first = repo.deactivate(u.id, now).await.unwrap();
        assert_eq!(first.status, UserStatus::Inactive);

        let err = repo.deactivate(u.id, now).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict));

        let err = repo.deactivate(Uuid::new_v4(), now).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }

    #[tokio::test]
    async fn updates_on_missing_user_are_not_found() {
        let repo = MemoryUserRepo::new();
        let now = OffsetDateTime::now_utc();
        let err = repo
            .update_password_hash(Uuid::new_v4(), "h", now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound));
    }
}
