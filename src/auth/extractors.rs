use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::jwt::JwtKeys;
use crate::{accounts::repo_types::User, errors::AuthError, state::AppState};

/// The authenticated, active user behind the request's bearer token.
pub struct CurrentUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        // Expect "Bearer <token>"
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer ").or_else(|| h.strip_prefix("bearer ")))
            .ok_or(AuthError::Unauthenticated)?;

        let claims = JwtKeys::from_ref(state).verify(token).map_err(|_| {
            warn!("invalid or expired token");
            AuthError::Unauthenticated
        })?;

        match state.credentials.find_by_id(claims.sub).await? {
            Some(user) if user.is_active() => Ok(CurrentUser(user)),
            _ => {
                warn!(user_id = %claims.sub, "token for missing or inactive user");
                Err(AuthError::Unauthenticated)
            }
        }
    }
}
