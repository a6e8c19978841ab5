use crate::{accounts::repo_types::User, errors::AuthError};

/// A subject may act only on its own record.
pub fn can_access(subject: &User, target: &User) -> bool {
    subject.id == target.id
}

pub fn ensure_can_access(subject: &User, target: &User) -> Result<(), AuthError> {
    if can_access(subject, target) {
        Ok(())
    } else {
        Err(AuthError::Forbidden)
    }
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;
    use uuid::Uuid;

    use super::*;
    use crate::accounts::repo_types::UserStatus;

    fn user(email: &str) -> User {
        let now = OffsetDateTime::now_utc();
        User {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: String::new(),
            status: UserStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn self_access_is_allowed() {
        let u = user("a@example.com");
        assert!(can_access(&u, &u));
        assert!(ensure_can_access(&u, &u.clone()).is_ok());
    }

    #[test]
    fn other_users_are_forbidden_even_with_same_email() {
        let a = user("a@example.com");
        let b = user("a@example.com");
        assert!(!can_access(&a, &b));
        assert!(matches!(ensure_can_access(&a, &b), Err(AuthError::Forbidden)));
    }
}
