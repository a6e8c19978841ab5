use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failures raised by the user and reset-token stores.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated")]
    Duplicate,

    #[error("record not found")]
    NotFound,

    /// A conditional update found the record in another state.
    #[error("record is not in the expected state")]
    Conflict,

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub(crate) fn from_sqlx(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Self::Duplicate,
            sqlx::Error::RowNotFound => Self::NotFound,
            _ => Self::Database(e),
        }
    }
}

/// Every failure a service operation can report to its caller.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("validation failed on `{field}`: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("email already taken")]
    EmailTaken,

    /// Unknown email, wrong password and inactive account all land here.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("user not found")]
    UserNotFound,

    #[error("reset token not found")]
    TokenNotFound,

    /// Addressed account does not exist.
    #[error("account not found")]
    AccountNotFound,

    #[error("current email does not match the account")]
    EmailMismatch,

    #[error("account is already inactive")]
    AlreadyInactive,

    #[error("unauthenticated")]
    Unauthenticated,

    #[error("forbidden")]
    Forbidden,

    #[error("notification delivery failed: {0}")]
    NotificationFailed(anyhow::Error),

    #[error("document export failed: {0}")]
    ExportFailed(anyhow::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. }
            | Self::EmailTaken
            | Self::InvalidCredentials
            | Self::UserNotFound
            | Self::TokenNotFound => StatusCode::UNPROCESSABLE_ENTITY,

            Self::EmailMismatch => StatusCode::BAD_REQUEST,
            Self::AlreadyInactive => StatusCode::CONFLICT,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::AccountNotFound => StatusCode::NOT_FOUND,

            Self::NotificationFailed(_)
            | Self::ExportFailed(_)
            | Self::Store(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable client-facing message. Internal details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation { message, .. } => message.clone(),
            Self::EmailTaken => "The email has already been taken.".into(),
            Self::InvalidCredentials => "Invalid credentials".into(),
            Self::UserNotFound => "The selected email is invalid.".into(),
            Self::TokenNotFound => "The selected token is invalid.".into(),
            Self::EmailMismatch => "You do not own this email".into(),
            Self::AlreadyInactive => "Account is already inactive".into(),
            Self::Unauthenticated => "Unauthenticated.".into(),
            Self::Forbidden => "This action is unauthorized.".into(),
            Self::AccountNotFound => "User not found".into(),
            Self::NotificationFailed(_) => "Failed to send email".into(),
            Self::ExportFailed(_) => "Failed to export account data".into(),
            Self::Store(_) | Self::Internal(_) => "Internal server error".into(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let message = self.user_message();
        let body = match &self {
            Self::Validation { field, .. } => {
                let field = field.to_string();
                json!({
                    "message": message,
                    "errors": { field: [message] },
                })
            }
            Self::EmailTaken => json!({
                "message": message,
                "errors": { "email": [message] },
            }),
            _ => json!({ "message": message }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_http_contract() {
        assert_eq!(
            AuthError::InvalidCredentials.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(AuthError::EmailMismatch.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AuthError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(AuthError::AccountNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AuthError::Unauthenticated.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::NotificationFailed(anyhow::anyhow!("smtp down")).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = AuthError::Store(StoreError::NotFound);
        assert_eq!(err.user_message(), "Internal server error");

        let err = AuthError::NotificationFailed(anyhow::anyhow!("relay refused 10.0.0.3"));
        assert_eq!(err.user_message(), "Failed to send email");
    }

    #[test]
    fn not_found_and_row_not_found_map_together() {
        assert!(matches!(
            StoreError::from_sqlx(sqlx::Error::RowNotFound),
            StoreError::NotFound
        ));
    }
}
